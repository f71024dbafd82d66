//! `tokio-tungstenite` transport.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::errors::ClientError;
use crate::transport::{Connector, Fragment, FrameSink, FrameStream, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects over `ws://` or `wss://`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, uri: &str) -> Result<Transport, ClientError> {
        let (ws, response) = connect_async(uri).await.map_err(upgrade_error)?;
        debug!(status = %response.status(), "upgrade accepted");
        let (sink, stream) = ws.split();
        Ok((Box::new(WsSink(sink)), Box::new(WsReader(stream))))
    }
}

fn upgrade_error(e: tungstenite::Error) -> ClientError {
    match e {
        tungstenite::Error::Http(resp) => {
            ClientError::TransportUpgrade(format!("HTTP {}", resp.status()))
        }
        other => ClientError::TransportUpgrade(other.to_string()),
    }
}

struct WsSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ClientError::TransportFrame(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        match self.0.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(ClientError::TransportFrame(e.to_string())),
        }
    }
}

struct WsReader(SplitStream<WsStream>);

#[async_trait]
impl FrameStream for WsReader {
    async fn next_fragment(&mut self) -> Option<Result<Fragment, ClientError>> {
        loop {
            let fragment = match self.0.next().await? {
                Ok(Message::Text(text)) => Fragment::Data {
                    payload: Bytes::copy_from_slice(text.as_bytes()),
                    fin: true,
                },
                Ok(Message::Binary(payload)) => Fragment::Data { payload, fin: true },
                Ok(Message::Ping(_)) => Fragment::Ping,
                Ok(Message::Pong(_)) => Fragment::Pong,
                Ok(Message::Close(_)) => Fragment::Close,
                // Raw frames are only produced when writing.
                Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(ClientError::TransportFrame(e.to_string()))),
            };
            return Some(Ok(fragment));
        }
    }
}
