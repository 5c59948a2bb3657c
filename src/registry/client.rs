// Docker Engine client used for the per-image pull, tag and push calls. The
// daemon performs the actual registry transfer; this client only issues the
// requests and watches the streamed progress for errors.

use crate::common::RegistryClient;
use crate::error::handlers::HttpErrorHandler;
use crate::error::{ClientError, MigrateError, Result};
use crate::image::ImageReference;
use crate::registry::auth::Authorizer;
use async_trait::async_trait;
use bollard::API_DEFAULT_VERSION;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::errors::Error as EngineError;
use bollard::image::{CreateImageOptions, PushImageOptions, TagImageOptions};
use bollard::models::{CreateImageInfo, PushImageInfo};
use futures::{Stream, StreamExt};
use std::fmt;
use url::Url;

#[cfg(unix)]
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";
#[cfg(not(unix))]
pub const DEFAULT_DOCKER_HOST: &str = "npipe:////./pipe/docker_engine";

const DEFAULT_TCP_PORT: u16 = 2375;

/// Where the daemon listens, parsed from a `DOCKER_HOST` style address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// Unix socket or Windows named pipe, kept as given
    Socket(String),
    /// Plain TCP, normalized to `tcp://host:port`
    Tcp(String),
}

impl DockerEndpoint {
    pub fn parse(host: &str) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(MigrateError::Config("Docker host cannot be empty".to_string()));
        }

        let candidate = if host.contains("://") {
            host.to_string()
        } else {
            format!("tcp://{}", host)
        };
        let url = Url::parse(&candidate)?;

        match url.scheme() {
            "unix" | "npipe" => {
                if url.path().trim_matches('/').is_empty() {
                    return Err(MigrateError::Config(format!("Docker host {} has no socket path", host)));
                }
                Ok(Self::Socket(candidate))
            }
            "tcp" | "http" => {
                let Some(name) = url.host_str().filter(|h| !h.is_empty()) else {
                    return Err(MigrateError::Config(format!("Docker host {} has no host part", host)));
                };
                let port = url.port().unwrap_or(DEFAULT_TCP_PORT);
                Ok(Self::Tcp(format!("tcp://{}:{}", name, port)))
            }
            "https" => Err(MigrateError::Config(format!(
                "Docker host {} needs TLS, which is not supported; use the local socket or tcp://",
                host
            ))),
            other => Err(MigrateError::Config(format!(
                "Docker host {} has unsupported scheme {}",
                host, other
            ))),
        }
    }
}

impl fmt::Display for DockerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockerEndpoint::Socket(path) => write!(f, "{}", path),
            DockerEndpoint::Tcp(addr) => write!(f, "{}", addr),
        }
    }
}

pub struct DockerEngineClientBuilder {
    host: String,
    timeout: u64,
}

impl DockerEngineClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timeout: 7200,
        }
    }

    /// Per-request timeout in seconds; pulls of large images stream for a
    /// long time, so this is generous by default.
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<DockerEngineClient> {
        let endpoint = DockerEndpoint::parse(&self.host)?;
        let docker = match &endpoint {
            DockerEndpoint::Socket(path) => Docker::connect_with_socket(path, self.timeout, API_DEFAULT_VERSION),
            DockerEndpoint::Tcp(addr) => Docker::connect_with_http(addr, self.timeout, API_DEFAULT_VERSION),
        }
        .map_err(|e| HttpErrorHandler::handle_connect_error(&e, &self.host))?;

        Ok(DockerEngineClient { docker, endpoint })
    }
}

/// Talks to a Docker daemon over its Engine API.
///
/// The underlying connection pool is shared by clones, so a single instance
/// serves every pipeline worker.
#[derive(Debug, Clone)]
pub struct DockerEngineClient {
    docker: Docker,
    endpoint: DockerEndpoint,
}

impl DockerEngineClient {
    pub fn builder(host: impl Into<String>) -> DockerEngineClientBuilder {
        DockerEngineClientBuilder::new(host)
    }

    pub fn endpoint(&self) -> &DockerEndpoint {
        &self.endpoint
    }

    /// Check that the daemon answers before any work is scheduled
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| HttpErrorHandler::handle_connect_error(&e, &self.endpoint.to_string()))?;
        Ok(())
    }

    /// Turn an `X-Registry-Auth` token back into the credentials the engine
    /// client encodes itself. An empty token means anonymous access.
    fn credentials(auth_token: &str) -> std::result::Result<Option<DockerCredentials>, ClientError> {
        if auth_token.is_empty() {
            return Ok(None);
        }
        let credential = Authorizer::decode(auth_token).map_err(|e| ClientError::InvalidAuth(e.to_string()))?;
        Ok(Some(DockerCredentials {
            username: Some(credential.username),
            password: Some(credential.password),
            ..Default::default()
        }))
    }
}

#[async_trait]
impl RegistryClient for DockerEngineClient {
    async fn pull(&self, reference: &str, auth_token: &str) -> std::result::Result<(), ClientError> {
        let image: ImageReference = reference.parse()?;
        let credentials = Self::credentials(auth_token)?;
        let options = CreateImageOptions {
            from_image: image.repository.clone(),
            tag: image.tag.clone(),
            ..Default::default()
        };

        drain_progress(self.docker.create_image(Some(options), None, credentials), "pull").await
    }

    async fn tag_local(&self, from: &str, to: &str) -> std::result::Result<(), ClientError> {
        // Validate the source as well so an empty reference never reaches the daemon
        from.parse::<ImageReference>()?;
        let target: ImageReference = to.parse()?;
        let options = TagImageOptions {
            repo: target.repository.clone(),
            tag: target.tag.clone(),
        };

        self.docker
            .tag_image(from, Some(options))
            .await
            .map_err(|e| HttpErrorHandler::handle_engine_error(e, "tag"))
    }

    async fn push(&self, reference: &str, auth_token: &str) -> std::result::Result<(), ClientError> {
        let image: ImageReference = reference.parse()?;
        let credentials = Self::credentials(auth_token)?;
        let options = PushImageOptions {
            tag: image.tag.clone(),
        };

        drain_progress(
            self.docker.push_image(&image.repository, Some(options), credentials),
            "push",
        )
        .await
    }
}

/// A decoded line of the daemon's progress stream
pub(crate) trait ProgressLine {
    fn failure(&self) -> Option<&str>;
}

impl ProgressLine for CreateImageInfo {
    fn failure(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl ProgressLine for PushImageInfo {
    fn failure(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Consume a progress stream one decoded line at a time, failing on the
/// first in-stream error. The daemon answers 200 before it knows whether a
/// pull or push will succeed, so the stream is the only place failures show.
pub(crate) async fn drain_progress<S, T>(stream: S, operation: &'static str) -> std::result::Result<(), ClientError>
where
    S: Stream<Item = std::result::Result<T, EngineError>>,
    T: ProgressLine,
{
    let mut stream = std::pin::pin!(stream);
    let mut lines = 0usize;

    while let Some(item) = stream.next().await {
        let line = item.map_err(|e| HttpErrorHandler::handle_engine_error(e, operation))?;
        if let Some(error) = line.failure().filter(|e| !e.is_empty()) {
            return Err(ClientError::Stream(error.to_string()));
        }
        lines += 1;
    }

    tracing::trace!(operation, lines, "progress stream drained");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn status(text: &str) -> std::result::Result<CreateImageInfo, EngineError> {
        Ok(CreateImageInfo {
            status: Some(text.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn parses_docker_hosts() {
        assert_eq!(
            DockerEndpoint::parse("tcp://10.0.0.5:2375").unwrap(),
            DockerEndpoint::Tcp("tcp://10.0.0.5:2375".to_string())
        );
        assert_eq!(
            DockerEndpoint::parse("localhost").unwrap(),
            DockerEndpoint::Tcp("tcp://localhost:2375".to_string())
        );
        assert_eq!(
            DockerEndpoint::parse("http://docker.internal:2376/").unwrap(),
            DockerEndpoint::Tcp("tcp://docker.internal:2376".to_string())
        );
        assert_eq!(
            DockerEndpoint::parse("unix:///var/run/docker.sock").unwrap(),
            DockerEndpoint::Socket("unix:///var/run/docker.sock".to_string())
        );
        assert!(DockerEndpoint::parse("https://docker.internal:2376").is_err());
        assert!(DockerEndpoint::parse("unix://").is_err());
        assert!(DockerEndpoint::parse("ftp://docker").is_err());
    }

    #[test]
    fn default_host_is_the_local_socket() {
        assert!(matches!(
            DockerEndpoint::parse(DEFAULT_DOCKER_HOST).unwrap(),
            DockerEndpoint::Socket(_)
        ));
    }

    #[tokio::test]
    async fn drains_successful_progress() {
        let body = stream::iter(vec![
            status("Pulling from team/app"),
            status("Downloading"),
            status("Digest: sha256:abc"),
        ]);
        assert!(drain_progress(body, "pull").await.is_ok());
    }

    #[tokio::test]
    async fn long_streams_drain_line_by_line() {
        let lines = (0..50_000).map(|i| status(&format!("Downloading {}", i)));
        let failing = std::iter::once(Ok(CreateImageInfo {
            error: Some("unexpected EOF".to_string()),
            ..Default::default()
        }));
        let body = stream::iter(lines.chain(failing));

        match drain_progress(body, "pull").await {
            Err(ClientError::Stream(message)) => assert_eq!(message, "unexpected EOF"),
            other => panic!("expected stream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn detects_push_errors() {
        let body = stream::iter(vec![
            Ok(PushImageInfo {
                status: Some("The push refers to repository".to_string()),
                ..Default::default()
            }),
            Ok(PushImageInfo {
                error: Some("denied: not authorized".to_string()),
                ..Default::default()
            }),
        ]);
        match drain_progress(body, "push").await {
            Err(ClientError::Stream(message)) => assert_eq!(message, "denied: not authorized"),
            other => panic!("expected stream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn maps_engine_errors_in_stream() {
        let body = stream::iter(vec![
            status("Pulling"),
            Err(EngineError::DockerResponseServerError {
                status_code: 404,
                message: "manifest unknown".to_string(),
            }),
        ]);
        assert!(matches!(
            drain_progress(body, "pull").await,
            Err(ClientError::Status { operation: "pull", status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn rejects_bad_input_before_any_request() {
        let client = DockerEngineClient::builder("tcp://127.0.0.1:1").build().unwrap();
        assert!(matches!(client.pull("", "").await, Err(ClientError::InvalidReference(_))));
        assert!(matches!(client.tag_local("", "dst/app:v1").await, Err(ClientError::InvalidReference(_))));
        assert!(matches!(client.push("no-tag", "").await, Err(ClientError::InvalidReference(_))));
        assert!(matches!(client.pull("src/app:v1", "%%%").await, Err(ClientError::InvalidAuth(_))));
    }
}
