//! Test server management.
//!
//! Spawns and manages studyd instances for integration testing.

use std::process::{Child, Command};
use tempfile::TempDir;
use tokio::time::{Duration, sleep};

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    data_dir: TempDir,
}

impl TestServer {
    /// Spawn a new test server with default (test-friendly) limits.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(EXTRA_DEFAULT).await
    }

    /// Spawn a new test server, appending `extra` to the generated config.
    pub async fn spawn_with(extra: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let port = free_port()?;

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "studyd.test"
description = "Test instance"
metrics_port = 0

[listen]
address = "127.0.0.1:{port}"

[database]
path = "{dir}/studyd.db"

[storage]
data_dir = "{dir}/data"
max_upload_bytes = 1048576
max_chunk_bytes = 65536
upload_ttl_secs = 60

{extra}
"#,
            port = port,
            dir = data_dir.path().display(),
            extra = extra,
        );

        std::fs::write(&config_path, config_content)?;

        // Spawn the server binary that cargo built for this package
        let child = Command::new(env!("CARGO_BIN_EXE_studyd"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        let server = Self {
            child,
            port,
            data_dir,
        };

        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Base URL of the REST API.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Path of the server's data directory (for on-disk assertions).
    pub fn data_path(&self) -> std::path::PathBuf {
        self.data_dir.path().join("data")
    }

    /// Wait until the server is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("test server did not start listening on port {}", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Rate limits high enough that ordinary tests never trip them.
const EXTRA_DEFAULT: &str = r#"
[security.rate_limits]
requests_per_second = 10000
login_burst_per_ip = 10000
upload_burst_per_user = 10000
"#;

/// Ask the kernel for a free port.
fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
