// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `taiko-relay` binary as a subprocess and exercises it
//! over HTTP and WebSocket.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `taiko-relay` binary.
pub fn relay_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("taiko-relay")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `taiko-relay` process that is killed on drop.
pub struct RelayProcess {
    child: Child,
    port: u16,
}

/// Builder for the flags a [`RelayProcess`] is started with.
#[derive(Default)]
pub struct RelayBuilder {
    allow_origin: Vec<String>,
    port_via_env: bool,
    extra_args: Vec<String>,
}

impl RelayBuilder {
    /// Restrict WebSocket upgrades to `origin` (`--allow-origin`). Repeatable.
    pub fn allow_origin(mut self, origin: &str) -> Self {
        self.allow_origin.push(origin.to_owned());
        self
    }

    /// Pass the port through `PORT` instead of the positional argument.
    pub fn port_via_env(mut self) -> Self {
        self.port_via_env = true;
        self
    }

    /// Append raw command-line arguments.
    pub fn arg(mut self, arg: &str) -> Self {
        self.extra_args.push(arg.to_owned());
        self
    }

    /// Command line for the configured flags, without spawning.
    fn command(&self, port: u16) -> anyhow::Result<Command> {
        let binary = relay_binary();
        anyhow::ensure!(binary.exists(), "taiko-relay binary not found at {}", binary.display());

        let mut args: Vec<String> = vec![
            "--bind-address".into(),
            "127.0.0.1".into(),
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
        ];
        for origin in &self.allow_origin {
            args.extend(["--allow-origin".into(), origin.clone()]);
        }
        args.extend(self.extra_args.iter().cloned());

        let mut cmd = Command::new(&binary);
        cmd.env_remove("TAIKO_RELAY_ALLOW_ORIGIN").env_remove("PORT");
        if self.port_via_env {
            cmd.env("PORT", port.to_string());
        } else {
            args.push(port.to_string());
        }
        cmd.args(&args).stdout(Stdio::null()).stderr(Stdio::null());
        Ok(cmd)
    }

    /// Spawn the relay on a free port.
    pub fn spawn(self) -> anyhow::Result<RelayProcess> {
        let port = free_port()?;
        let child = self.command(port)?.spawn()?;
        Ok(RelayProcess { child, port })
    }

    /// Run the relay to completion and return its exit status. For flag
    /// combinations that are expected to be rejected at startup.
    pub async fn run_to_exit(self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let mut process = self.spawn()?;
        process.wait_exit(timeout).await
    }
}

impl RelayProcess {
    /// Create a builder for custom configuration.
    pub fn build() -> RelayBuilder {
        RelayBuilder::default()
    }

    /// Spawn the relay with default flags.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// WebSocket URL for the game client path.
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/p2", self.port)
    }

    /// Poll `/health` until it answers.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("taiko-relay did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(
        &mut self,
        timeout: Duration,
    ) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("taiko-relay did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for RelayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
