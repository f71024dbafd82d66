//! `relayd chat`: stdin lines out, relayed payloads in.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_client::{ClientSession, ConnectUri, SessionEvent, WsConnector};
use relay_core::ApplicationMessage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::ChatArgs;

/// Render a received payload for the terminal.
fn render(payload: &str) -> String {
    match serde_json::from_str::<ApplicationMessage>(payload) {
        Ok(msg) => format!("[{}] {}", msg.kind, msg.content),
        Err(_) => payload.to_owned(),
    }
}

/// Encode one input line as an application message.
fn encode_line(kind: &str, line: &str) -> Result<String> {
    serde_json::to_string(&ApplicationMessage::new(kind, line))
        .context("Failed to encode application message")
}

pub(crate) async fn run(args: ChatArgs) -> Result<()> {
    let settings = relay_settings::load_settings().context("Failed to load settings")?;
    relay_core::logging::init_subscriber(&settings.logging.level);

    let url = args.url.clone().unwrap_or_else(|| settings.client.url.clone());
    let heartbeat = match args.heartbeat {
        Some(secs) => Some(Duration::from_secs(secs)),
        None => settings.client.heartbeat_period(),
    };
    let uri = ConnectUri::new(url)
        .token(args.token.as_str())
        .client_id(args.client_id.as_str())
        .user_pool_id(args.user_pool_id.as_str())
        .build();

    let (session, mut events) = ClientSession::new(Arc::new(WsConnector), heartbeat);
    session.connect(&uri).await.context("Failed to connect")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Opened) => info!("connected"),
                Some(SessionEvent::Message(payload)) => println!("{}", render(&payload)),
                Some(SessionEvent::Closed) | None => {
                    info!("connection closed");
                    break;
                }
                Some(SessionEvent::Error(e)) => {
                    return Err(e).context("Session failed");
                }
            },
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    session
                        .send_message(encode_line(&args.kind, &line)?)
                        .await
                        .context("Failed to send")?;
                    debug!(len = line.len(), "sent");
                }
                None => {
                    session.close().await.context("Failed to close")?;
                    break;
                }
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_application_messages() {
        assert_eq!(render(r#"{"Type":"chat","Content":"hi"}"#), "[chat] hi");
    }

    #[test]
    fn renders_other_payloads_verbatim() {
        assert_eq!(render(r#"{"message":"hi"}"#), r#"{"message":"hi"}"#);
        assert_eq!(render("plain"), "plain");
    }

    #[test]
    fn encodes_with_capitalized_fields() {
        let json = encode_line("move", "e2e4").unwrap();
        assert_eq!(json, r#"{"Type":"move","Content":"e2e4"}"#);
    }
}
