//! Integration tests for the WebSocket channel.
//!
//! These spin up a bare tokio-tungstenite server on a random port and
//! connect a [`WebSocketChannel`] to it, so real frames cross a real
//! socket.

#[cfg(feature = "websocket")]
mod websocket {
    use cowatch_transport::{MessageChannel, WebSocketChannel};
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Binds a listener on an OS-assigned port and returns it with its
    /// `ws://` URL.
    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("should have addr");
        (listener, format!("ws://{addr}"))
    }

    async fn accept(listener: TcpListener) -> ServerWs {
        let (stream, _) = listener.accept().await.expect("should accept");
        tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake should succeed")
    }

    #[tokio::test]
    async fn test_websocket_send_and_receive() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(accept(listener));

        let channel = WebSocketChannel::connect(&url)
            .await
            .expect("should connect");
        let mut server_ws = server.await.expect("task should complete");

        assert!(channel.id().into_inner() > 0);

        // --- Client sends, server receives a text frame ---
        channel
            .send(br#"{"List":null}"#)
            .await
            .expect("send should succeed");
        let msg = server_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "JSON should travel as a text frame");
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"List":null}"#);

        // --- Server sends, client receives ---
        server_ws
            .send(Message::Text(
                r#"{"Chat":{"username":"bob","message":"hi"}}"#.to_string().into(),
            ))
            .await
            .unwrap();
        let received = channel
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(
            received,
            br#"{"Chat":{"username":"bob","message":"hi"}}"#.to_vec()
        );

        channel.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_server_close() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(accept(listener));

        let channel = WebSocketChannel::connect(&url).await.unwrap();
        let mut server_ws = server.await.unwrap();

        server_ws.send(Message::Close(None)).await.unwrap();

        let result = channel.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on server close");
    }

    #[tokio::test]
    async fn test_websocket_connect_refused() {
        // Bind then drop so the port is (almost certainly) closed.
        let (listener, url) = listen().await;
        drop(listener);

        let result = WebSocketChannel::connect(&url).await;
        assert!(result.is_err());
    }
}
