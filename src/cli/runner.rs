//! Runner wiring configuration, ECR and the Docker daemon into one migration

use crate::cli::config::{AppConfig, RepositoryList};
use crate::common::{MetadataSource, RegistryClient, TargetResolver};
use crate::error::Result;
use crate::image::MigrationBatch;
use crate::logging::Logger;
use crate::pipeline::{MigrationPipeline, MigrationReport};
use crate::registry::{DockerEngineClient, EcrRegistry};
use std::sync::Arc;
use std::time::Instant;

pub struct Runner {
    config: AppConfig,
    output: Logger,
}

impl Runner {
    pub fn new(config: AppConfig) -> Self {
        let output = if config.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(config.verbose)
        };

        Self { config, output }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run against the configured ECR registries and Docker daemon.
    ///
    /// Returns `None` in dry-run mode, where nothing past the metadata load
    /// is touched.
    pub async fn run(&self) -> Result<Option<MigrationReport>> {
        self.output.section("Registry Migrator");

        let list = self.load_repository_list()?;

        self.output.subsection("Connecting to source registry");
        self.output.info(&format!(
            "Source: profile {} in {}",
            self.config.source.profile, self.config.source.region
        ));
        let source = EcrRegistry::connect(&self.config.source.profile, &self.config.source.region).await;

        if self.config.dry_run {
            let batch = self.load_metadata(&source, &list.repositories).await?;
            self.print_plan(&batch);
            self.output.info("Dry run mode - nothing was pulled, created or pushed");
            return Ok(None);
        }

        self.output.subsection("Connecting to Docker daemon");
        let docker = DockerEngineClient::builder(&self.config.docker.host)
            .with_timeout(self.config.docker.timeout)
            .build()?;
        docker.ping().await?;
        self.output.step(&format!("Docker daemon reachable at {}", docker.endpoint()));

        self.output.info(&format!(
            "Target: profile {} in {}",
            self.config.target.profile, self.config.target.region
        ));
        let target = EcrRegistry::connect(&self.config.target.profile, &self.config.target.region).await;

        let report = self
            .execute(&list.repositories, &source, &target, Arc::new(docker))
            .await?;
        Ok(Some(report))
    }

    /// Load metadata, prepare the target, then run the pipeline to
    /// completion. Any error here is fatal; per-image failures only show up
    /// in the report.
    pub async fn execute(
        &self,
        repository_names: &[String],
        source: &dyn MetadataSource,
        target: &dyn TargetResolver,
        client: Arc<dyn RegistryClient>,
    ) -> Result<MigrationReport> {
        let batch = self.load_metadata(source, repository_names).await?;
        self.print_plan(&batch);

        self.output.subsection("Preparing target registry");
        let (target_auth, targets) = target.prepare(&batch).await?;
        self.output.step(&format!(
            "{} of {} target repositories ready",
            targets.len(),
            batch.repositories.len()
        ));

        self.output.subsection("Migrating images");
        let started = Instant::now();
        let pipeline = MigrationPipeline::new(client, self.config.pipeline.clone());
        let report = pipeline.migrate(batch, target_auth, targets).await?;

        self.print_report(&report);
        if report.is_clean() {
            self.output.success(&format!(
                "Migration completed in {}",
                self.output.format_duration(started.elapsed())
            ));
        } else {
            self.output.warning(&format!(
                "Migration finished with {} failed and {} skipped images",
                report.failures(),
                report.pull.skipped
            ));
        }

        Ok(report)
    }

    fn load_repository_list(&self) -> Result<RepositoryList> {
        self.output.subsection("Loading repository list");
        let list = RepositoryList::load(&self.config.repository_file)?;
        self.output.info(&format!(
            "{} repositories listed in {}",
            list.repositories.len(),
            self.config.repository_file.display()
        ));
        if list.is_empty() {
            self.output.warning("Repository list is empty, nothing to migrate");
        }
        Ok(list)
    }

    async fn load_metadata(&self, source: &dyn MetadataSource, names: &[String]) -> Result<MigrationBatch> {
        self.output.subsection("Loading source metadata");
        let started = Instant::now();
        let batch = source.fetch(names).await?;
        self.output.step(&format!(
            "{} repositories, {} images found in {}",
            batch.repositories.len(),
            batch.total_image_count,
            self.output.format_duration(started.elapsed())
        ));
        Ok(batch)
    }

    fn print_plan(&self, batch: &MigrationBatch) {
        let items: Vec<String> = batch
            .repositories
            .iter()
            .map(|repo| format!("{} ({} tags)", repo.name, repo.tags.len()))
            .collect();
        self.output.list("Repositories to migrate", &items);

        for repo in &batch.repositories {
            self.output.detail(&format!("{}: {}", repo.name, repo.tags.join(", ")));
        }
    }

    fn print_report(&self, report: &MigrationReport) {
        let items = report.summary_items();
        self.output.summary_kv("Migration summary", &items);
        self.output.detail(&format!(
            "Elapsed: {}",
            self.output.format_duration(report.elapsed)
        ));
    }
}
