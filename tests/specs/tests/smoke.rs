// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `taiko-relay` binary and
//! exercise its HTTP and WebSocket surface.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use taiko_relay_specs::{free_port, RelayProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

async fn next_json<S>(rx: &mut S) -> anyhow::Result<Value>
where
    S: StreamExt<
            Item = Result<
                tokio_tungstenite::tungstenite::Message,
                tokio_tungstenite::tungstenite::Error,
            >,
        > + Unpin,
{
    match tokio::time::timeout(Duration::from_secs(2), rx.next()).await? {
        Some(Ok(Message::Text(text))) => Ok(serde_json::from_str(text.as_str())?),
        other => anyhow::bail!("expected text message, got {other:?}"),
    }
}

// -- HTTP ---------------------------------------------------------------------

#[tokio::test]
async fn http_health() -> anyhow::Result<()> {
    let relay = RelayProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    let resp = reqwest::get(format!("{}/health", relay.base_url())).await?;
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await?, "OK");
    Ok(())
}

#[tokio::test]
async fn port_from_environment() -> anyhow::Result<()> {
    let relay = RelayProcess::build().port_via_env().spawn()?;
    relay.wait_healthy(TIMEOUT).await?;
    Ok(())
}

#[tokio::test]
async fn port_environment_wins_over_argument() -> anyhow::Result<()> {
    let other = free_port()?;
    let relay = RelayProcess::build().port_via_env().arg(&other.to_string()).spawn()?;
    relay.wait_healthy(TIMEOUT).await?;
    Ok(())
}

#[tokio::test]
async fn http_unknown_route_is_404() -> anyhow::Result<()> {
    let relay = RelayProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    let resp = reqwest::get(format!("{}/nope", relay.base_url())).await?;
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    Ok(())
}

// -- Startup validation ---------------------------------------------------------

#[yare::parameterized(
    zero_outbox   = { "--outbox-capacity=0" },
    zero_code_len = { "--invite-code-len=0" },
    bad_format    = { "--log-format=xml" },
)]
#[test_macro(tokio::test)]
async fn invalid_flags_exit_with_usage_status(flag: &str) -> anyhow::Result<()> {
    let status = RelayProcess::build().arg(flag).run_to_exit(TIMEOUT).await?;
    assert_eq!(status.code(), Some(2));
    Ok(())
}

// -- WebSocket ------------------------------------------------------------------

#[tokio::test]
async fn ws_lobby_pairing() -> anyhow::Result<()> {
    let relay = RelayProcess::start()?;
    relay.wait_healthy(TIMEOUT).await?;

    let (a, _) = tokio_tungstenite::connect_async(relay.ws_url()).await?;
    let (b, _) = tokio_tungstenite::connect_async(relay.ws_url()).await?;
    let (mut a_tx, mut a_rx) = a.split();
    let (mut b_tx, mut b_rx) = b.split();

    assert_eq!(next_json(&mut a_rx).await?, json!({"type": "users", "value": []}));
    assert_eq!(next_json(&mut b_rx).await?, json!({"type": "users", "value": []}));

    let join = json!({"type": "join", "value": {"id": "smoke", "diff": "oni", "name": "a"}});
    a_tx.send(Message::text(join.to_string())).await?;
    assert_eq!(next_json(&mut a_rx).await?, json!({"type": "waiting"}));
    assert_eq!(
        next_json(&mut b_rx).await?,
        json!({"type": "users", "value": [{"id": "smoke", "diff": "oni"}]})
    );

    let join = json!({"type": "join", "value": {"id": "smoke", "diff": "easy", "name": "b"}});
    b_tx.send(Message::text(join.to_string())).await?;
    assert_eq!(
        next_json(&mut a_rx).await?,
        json!({"type": "gameload", "value": {"diff": "easy", "player": 1}})
    );
    assert_eq!(
        next_json(&mut b_rx).await?,
        json!({"type": "gameload", "value": {"diff": "oni", "player": 2}})
    );
    Ok(())
}

#[tokio::test]
async fn ws_origin_allow_list() -> anyhow::Result<()> {
    let relay = RelayProcess::build().allow_origin("https://taiko.example").spawn()?;
    relay.wait_healthy(TIMEOUT).await?;

    let mut req = relay.ws_url().into_client_request()?;
    req.headers_mut().insert("origin", HeaderValue::from_static("https://other.example"));
    assert!(tokio_tungstenite::connect_async(req).await.is_err());

    let mut req = relay.ws_url().into_client_request()?;
    req.headers_mut().insert("origin", HeaderValue::from_static("https://taiko.example"));
    let (ws, _) = tokio_tungstenite::connect_async(req).await?;
    let (_tx, mut rx) = ws.split();
    assert_eq!(next_json(&mut rx).await?["type"], "users");
    Ok(())
}
