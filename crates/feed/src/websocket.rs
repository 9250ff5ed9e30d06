//! WebSocket transport for L2 order book streams
//!
//! The endpoint pushes full snapshots as JSON text frames; no subscription
//! handshake or authentication is needed.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::CloseFrame,
    tungstenite::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{info, trace};
use url::Url;

use crate::error::FeedError;
use crate::traits::{FeedStream, Transport};

/// Opens tokio-tungstenite client connections
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    type Stream = WsStream;

    async fn open(&self, url: &str) -> Result<WsStream, FeedError> {
        let url = Url::parse(url).map_err(|e| FeedError::Connection(e.to_string()))?;
        info!(url = %url, "Connecting to order book WebSocket");

        let (ws, response) = connect_async(url.as_str()).await?;

        info!(status = ?response.status(), "Order book WebSocket connected");
        Ok(WsStream { ws })
    }
}

pub struct WsStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedStream for WsStream {
    async fn recv(&mut self) -> Result<Option<String>, FeedError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                // invalid UTF-8 surfaces as a decode failure downstream
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(String::from_utf8_lossy(&data).into_owned()))
                }
                Some(Ok(Message::Ping(data))) => {
                    trace!("Received WS ping, sending pong");
                    self.ws.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(reason = %describe_close(frame.as_ref()), "Order book WebSocket closed by server");
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Human-readable meaning of a WebSocket close code (RFC 6455 §7.4).
pub fn close_reason(code: u16) -> &'static str {
    match code {
        1000 => "Normal closure",
        1001 => "Going away",
        1002 => "Protocol error",
        1003 => "Unsupported data",
        1004 => "Reserved",
        1005 => "No status received",
        1006 => "Abnormal closure",
        1007 => "Invalid frame payload data",
        1008 => "Policy violation",
        1009 => "Message too big",
        1010 => "Mandatory extension",
        1011 => "Internal server error",
        1012 => "Service restart",
        1013 => "Try again later",
        1014 => "Bad gateway",
        1015 => "TLS handshake",
        _ => "Unknown reason",
    }
}

fn describe_close(frame: Option<&CloseFrame<'_>>) -> String {
    match frame {
        Some(frame) => {
            let code = u16::from(frame.code);
            if frame.reason.is_empty() {
                format!("{} - {}", code, close_reason(code))
            } else {
                format!("{} - {}", code, frame.reason)
            }
        }
        None => format!("1005 - {}", close_reason(1005)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws/l2-orderbook", listener.local_addr().unwrap());
        (listener, url)
    }

    #[test]
    fn test_close_reason_table() {
        assert_eq!(close_reason(1000), "Normal closure");
        assert_eq!(close_reason(1006), "Abnormal closure");
        assert_eq!(close_reason(1015), "TLS handshake");
        assert_eq!(close_reason(4000), "Unknown reason");
    }

    #[test]
    fn test_describe_close_prefers_server_reason() {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "maintenance".into(),
        };
        assert_eq!(describe_close(Some(&frame)), "1001 - maintenance");

        let silent = CloseFrame {
            code: CloseCode::Error,
            reason: "".into(),
        };
        assert_eq!(describe_close(Some(&silent)), "1011 - Internal server error");
        assert_eq!(describe_close(None), "1005 - No status received");
    }

    #[tokio::test]
    async fn test_open_rejects_malformed_url() {
        let err = WsTransport.open("not a url").await.err().unwrap();
        assert!(matches!(err, FeedError::Connection(_)));
    }

    #[tokio::test]
    async fn test_stream_answers_ping_and_ends_on_close() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Ping(b"hb".to_vec())).await.unwrap();
            ws.send(Message::Binary(b"{\"timestamp\":\"t1\"}".to_vec()))
                .await
                .unwrap();
            ws.send(Message::Text("{\"timestamp\":\"t2\"}".to_string()))
                .await
                .unwrap();

            let pong = loop {
                match ws.next().await {
                    Some(Ok(Message::Pong(data))) => break data,
                    Some(Ok(_)) => continue,
                    other => panic!("expected pong, got {:?}", other),
                }
            };
            ws.close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "maintenance".into(),
            }))
            .await
            .unwrap();
            // drain until the client goes away
            while let Some(Ok(_)) = ws.next().await {}
            pong
        });

        let mut stream = WsTransport.open(&url).await.unwrap();
        assert_eq!(
            stream.recv().await.unwrap().as_deref(),
            Some("{\"timestamp\":\"t1\"}")
        );
        assert_eq!(
            stream.recv().await.unwrap().as_deref(),
            Some("{\"timestamp\":\"t2\"}")
        );
        assert_eq!(stream.recv().await.unwrap(), None);

        drop(stream);
        assert_eq!(server.await.unwrap(), b"hb".to_vec());
    }

    #[tokio::test]
    async fn test_binary_frame_with_invalid_utf8_is_lossy() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Binary(vec![b'{', 0xff, b'}'])).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut stream = WsTransport.open(&url).await.unwrap();
        let text = stream.recv().await.unwrap().unwrap();
        assert_eq!(text, "{\u{fffd}}");

        stream.close().await.unwrap();
        drop(stream);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_sends_close_frame() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.next().await
        });

        let mut stream = WsTransport.open(&url).await.unwrap();
        stream.close().await.unwrap();

        let received = server.await.unwrap();
        assert!(
            matches!(received, Some(Ok(Message::Close(None)))),
            "server saw {:?}",
            received
        );
    }
}
