use registry_migrator::cli::{AppConfig, Args, Runner};
use registry_migrator::logging::{Logger, init_tracing};

#[tokio::main]
async fn main() {
    let args = Args::parse_args().from_env();
    init_tracing(args.verbose);

    let output = if args.quiet {
        Logger::new_quiet()
    } else {
        Logger::new(args.verbose)
    };

    let config = match AppConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            output.error(&format!("Invalid configuration: {}", e));
            std::process::exit(1);
        }
    };

    if let Err(e) = Runner::new(config).run().await {
        output.error(&format!("Migration aborted: {}", e));
        std::process::exit(1);
    }
}
