// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use crate::engine::invite::DEFAULT_CODE_LEN;
use crate::engine::DEFAULT_OUTBOX_CAPACITY;

/// Default listen port for the multiplayer relay.
pub const DEFAULT_PORT: u16 = 34802;

/// Multiplayer matchmaking and gameplay relay for taiko-web.
#[derive(Debug, Clone, Parser)]
#[command(name = "taiko-relay", version, about)]
pub struct RelayConfig {
    /// Port to listen on. `PORT` in the environment takes precedence.
    #[arg(value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind the server to.
    #[arg(short = 'b', long, default_value = "0.0.0.0", env = "TAIKO_RELAY_BIND")]
    pub bind_address: String,

    /// Limit incoming WebSocket connections to the given origin. Repeatable.
    #[arg(
        short = 'o',
        long = "allow-origin",
        env = "TAIKO_RELAY_ALLOW_ORIGIN",
        value_delimiter = ','
    )]
    pub allow_origin: Vec<String>,

    /// Outbound message queue length per connection.
    #[arg(long, default_value_t = DEFAULT_OUTBOX_CAPACITY, env = "TAIKO_RELAY_OUTBOX_CAPACITY")]
    pub outbox_capacity: usize,

    /// Length of generated invite codes.
    #[arg(long, default_value_t = DEFAULT_CODE_LEN, env = "TAIKO_RELAY_INVITE_CODE_LEN")]
    pub invite_code_len: usize,

    /// Log filter directive (trace, debug, info, warn, error, or a full EnvFilter directive).
    #[arg(long, default_value = "info", env = "TAIKO_RELAY_LOG")]
    pub log_level: String,

    /// Log format (text or json).
    #[arg(long, default_value = "text", env = "TAIKO_RELAY_LOG_FORMAT")]
    pub log_format: String,
}

impl RelayConfig {
    /// Parse the command line, then apply `PORT` from the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::parse();
        config.apply_port_env(std::env::var("PORT").ok().as_deref())?;
        Ok(config)
    }

    /// Override the listen port with a `PORT` value, if one is set.
    pub fn apply_port_env(&mut self, value: Option<&str>) -> anyhow::Result<()> {
        if let Some(raw) = value {
            self.port = raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT {raw:?}: {e}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.outbox_capacity == 0 {
            anyhow::bail!("--outbox-capacity must be at least 1");
        }
        if self.invite_code_len == 0 {
            anyhow::bail!("--invite-code-len must be at least 1");
        }
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other} (expected text or json)"),
        }
        Ok(())
    }

    /// `host:port` listen address.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Whether a WebSocket upgrade from `origin` may proceed.
    ///
    /// An empty allow-list admits every origin, including requests that send
    /// no `Origin` header at all.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allow_origin.is_empty() {
            return true;
        }
        match origin {
            Some(origin) => self.allow_origin.iter().any(|o| o == origin),
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
