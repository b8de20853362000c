// ABOUTME: Private registry container helper for integration tests.
// ABOUTME: Runs an htpasswd-protected registry:2 and pushes one image into it.

use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, CreateImageOptions, PushImageOptions,
    RemoveContainerOptions, RemoveImageOptions, StartContainerOptions, TagImageOptions,
};
use bytes::Bytes;
use futures::StreamExt;
use hoist::types::{ImageRef, RegistryCredentials};
use http_body_util::{Either, Full};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::OnceCell;

const REGISTRY_PORT: u16 = 5000;
const IMAGE_NAME: &str = "hoist-auth-registry:test";
const SEED_IMAGE: &str = "hackmann/empty:latest";
const PUSHED_REPOSITORY: &str = "hoist-private";
pub const USERNAME: &str = "testuser";
pub const PASSWORD: &str = "testpassword";
pub const WRONG_PASSWORD: &str = "testwrongpassword";
pub const EMAIL: &str = "foo@bar.de";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Container id for cleanup.
static CONTAINER_ID: OnceLock<String> = OnceLock::new();

/// Cleanup on process exit.
#[ctor::dtor]
fn cleanup_on_exit() {
    let Some(container_id) = CONTAINER_ID.get() else {
        return;
    };

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return;
    };
    rt.block_on(async {
        if let Ok(docker) = Docker::connect_with_local_defaults() {
            let _ = docker
                .remove_container(
                    container_id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;
        }
    });
}

/// Shared registry for all tests in a binary.
static SHARED_REGISTRY: OnceCell<PrivateRegistry> = OnceCell::const_new();

/// Get the shared registry, starting it and pushing the test image if needed.
pub async fn shared_registry() -> &'static PrivateRegistry {
    SHARED_REGISTRY
        .get_or_init(|| async {
            PrivateRegistry::start()
                .await
                .expect("failed to start private registry")
        })
        .await
}

/// Running registry that requires `testuser`/`testpassword`.
pub struct PrivateRegistry {
    port: u16,
}

impl PrivateRegistry {
    async fn start() -> Result<Self, BoxError> {
        let docker = Docker::connect_with_local_defaults()?;

        Self::build_image(&docker).await?;
        let port = Self::find_available_port().await?;

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            format!("{}/tcp", REGISTRY_PORT),
            Some(vec![PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(port.to_string()),
            }]),
        );

        let config = ContainerCreateBody {
            image: Some(IMAGE_NAME.to_string()),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container = docker
            .create_container(
                Some(CreateContainerOptions {
                    name: Some(format!("hoist-registry-test-{}", std::process::id())),
                    ..Default::default()
                }),
                config,
            )
            .await?;
        let _ = CONTAINER_ID.set(container.id.clone());

        docker
            .start_container(&container.id, None::<StartContainerOptions>)
            .await?;

        Self::wait_for_ready(port).await?;

        let registry = Self { port };
        registry.push_seed_image(&docker).await?;
        Ok(registry)
    }

    /// Registry address as used in image references.
    pub fn address(&self) -> String {
        format!("localhost:{}", self.port)
    }

    /// The image pushed into the registry during startup.
    pub fn image(&self) -> ImageRef {
        ImageRef::parse(&format!("{}/{}:latest", self.address(), PUSHED_REPOSITORY))
            .expect("pushed image reference should parse")
    }

    pub fn credentials(&self) -> RegistryCredentials {
        RegistryCredentials::new(USERNAME, PASSWORD, self.address())
    }

    pub fn wrong_credentials(&self) -> RegistryCredentials {
        RegistryCredentials::new(USERNAME, WRONG_PASSWORD, self.address()).with_email(EMAIL)
    }

    async fn build_image(docker: &Docker) -> Result<(), BoxError> {
        if docker.inspect_image(IMAGE_NAME).await.is_ok() {
            return Ok(());
        }

        eprintln!("Building private registry image...");

        let dir = format!("{}/tests/fixtures/registry", env!("CARGO_MANIFEST_DIR"));
        let tar_data = Self::create_build_context(&dir)?;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: Some(IMAGE_NAME.to_string()),
            ..Default::default()
        };

        let body = Either::Left(Full::new(Bytes::from(tar_data)));
        let mut build_stream = docker.build_image(options, None, Some(body));

        while let Some(result) = build_stream.next().await {
            match result {
                Ok(output) => {
                    if let Some(error_detail) = output.error_detail {
                        return Err(format!("Build error: {:?}", error_detail).into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn create_build_context(dir: &str) -> Result<Vec<u8>, BoxError> {
        let mut ar = tar::Builder::new(Vec::new());

        for name in ["Dockerfile", "htpasswd"] {
            let content = std::fs::read(format!("{}/{}", dir, name))?;
            let mut header = tar::Header::new_gnu();
            header.set_path(name)?;
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            ar.append(&header, content.as_slice())?;
        }

        ar.into_inner().map_err(Into::into)
    }

    /// Pull a tiny public image, retag it into the registry, push, and drop the local tag.
    async fn push_seed_image(&self, docker: &Docker) -> Result<(), BoxError> {
        let mut pull = docker.create_image(
            Some(CreateImageOptions {
                from_image: Some(SEED_IMAGE.to_string()),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(result) = pull.next().await {
            result?;
        }

        let repository = format!("{}/{}", self.address(), PUSHED_REPOSITORY);
        docker
            .tag_image(
                SEED_IMAGE,
                Some(TagImageOptions {
                    repo: Some(repository.clone()),
                    tag: Some("latest".to_string()),
                    ..Default::default()
                }),
            )
            .await?;

        let credentials = DockerCredentials {
            username: Some(USERNAME.to_string()),
            password: Some(PASSWORD.to_string()),
            serveraddress: Some(self.address()),
            ..Default::default()
        };
        let mut push = docker.push_image(
            &repository,
            Some(PushImageOptions {
                tag: Some("latest".to_string()),
                ..Default::default()
            }),
            Some(credentials),
        );
        while let Some(result) = push.next().await {
            result?;
        }

        docker
            .remove_image(
                &format!("{}:latest", repository),
                None::<RemoveImageOptions>,
                None,
            )
            .await?;
        Ok(())
    }

    async fn find_available_port() -> Result<u16, BoxError> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        drop(listener);
        Ok(port)
    }

    /// The registry answers `/v2/` with 401 once it is serving.
    async fn wait_for_ready(port: u16) -> Result<(), BoxError> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let addr = format!("127.0.0.1:{}", port);
        for _ in 0..60 {
            if let Ok(mut stream) = tokio::net::TcpStream::connect(&addr).await {
                let request = format!("GET /v2/ HTTP/1.0\r\nHost: {}\r\n\r\n", addr);
                if stream.write_all(request.as_bytes()).await.is_ok() {
                    let mut buf = [0u8; 32];
                    if let Ok(Ok(n)) =
                        tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await
                    {
                        let status = String::from_utf8_lossy(&buf[..n]);
                        if status.starts_with("HTTP/1.") && status.contains("401") {
                            return Ok(());
                        }
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Err("registry did not become ready in time".into())
    }
}
