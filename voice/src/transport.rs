use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use newhealth_core::{AssistantConfig, AssistantError, AssistantResult};

use crate::wire::{ClientMessage, ServerMessage, SessionSetup};

/// Endpoint of the bidirectional live websocket. The API key travels as a
/// query parameter.
pub const LIVE_WS_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Write half of a live connection.
#[async_trait]
pub trait VoiceSink: Send {
    async fn send(&mut self, message: ClientMessage) -> AssistantResult<()>;
    async fn close(&mut self) -> AssistantResult<()>;
}

/// Read half of a live connection. `Ok(None)` means the server closed the
/// socket normally.
#[async_trait]
pub trait VoiceStream: Send {
    async fn next_message(&mut self) -> AssistantResult<Option<ServerMessage>>;
}

pub type VoiceDuplex = (Box<dyn VoiceSink>, Box<dyn VoiceStream>);

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsVoiceSink {
    inner: SplitSink<WsConnection, Message>,
}

pub struct WsVoiceStream {
    inner: SplitStream<WsConnection>,
}

/// Opens the live websocket, sends the setup frame, and waits for the
/// server's acknowledgement before handing the halves back.
pub async fn connect_live(
    config: &AssistantConfig,
    setup: SessionSetup,
) -> AssistantResult<VoiceDuplex> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AssistantError::Config("voice session requires an API key".to_string()))?;

    let url = format!("{LIVE_WS_URL}?key={api_key}");
    let (socket, _) = connect_async(url)
        .await
        .map_err(|e| AssistantError::Transport(format!("websocket connect failed: {e}")))?;
    let (write, read) = socket.split();

    let mut sink = WsVoiceSink { inner: write };
    let mut stream = WsVoiceStream { inner: read };

    sink.send(ClientMessage::Setup(setup)).await?;
    match stream.next_message().await? {
        Some(message) if message.setup_complete.is_some() => {
            tracing::debug!("live session setup acknowledged");
        }
        Some(_) => {
            return Err(AssistantError::MalformedResponse(
                "expected setupComplete as the first live frame".to_string(),
            ))
        }
        None => {
            return Err(AssistantError::Transport(
                "server closed the socket during setup".to_string(),
            ))
        }
    }

    Ok((Box::new(sink), Box::new(stream)))
}

#[async_trait]
impl VoiceSink for WsVoiceSink {
    async fn send(&mut self, message: ClientMessage) -> AssistantResult<()> {
        let payload = serde_json::to_string(&message)?;
        self.inner
            .send(Message::Text(payload))
            .await
            .map_err(|e| AssistantError::Transport(format!("websocket send failed: {e}")))
    }

    async fn close(&mut self) -> AssistantResult<()> {
        self.inner
            .send(Message::Close(None))
            .await
            .map_err(|e| AssistantError::Transport(format!("websocket close failed: {e}")))
    }
}

#[async_trait]
impl VoiceStream for WsVoiceStream {
    async fn next_message(&mut self) -> AssistantResult<Option<ServerMessage>> {
        while let Some(frame) = self.inner.next().await {
            let frame =
                frame.map_err(|e| AssistantError::Transport(format!("websocket read failed: {e}")))?;
            match frame {
                Message::Text(text) => {
                    let message: ServerMessage = serde_json::from_str(&text)?;
                    return Ok(Some(message));
                }
                Message::Binary(bytes) => {
                    let message: ServerMessage = serde_json::from_slice(&bytes)?;
                    return Ok(Some(message));
                }
                Message::Close(_) => return Ok(None),
                // Control frames are handled by the library.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
        Ok(None)
    }
}
