// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tracing::error;

use taiko_relay::config::RelayConfig;

#[tokio::main]
async fn main() {
    let config = match RelayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("error: {e:#}");
        std::process::exit(2);
    }

    taiko_relay::init_tracing(&config);

    if let Err(e) = taiko_relay::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
