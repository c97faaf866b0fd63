//! End-to-end test: the builder opens a real WebSocket to a scripted
//! server and completes a handshake.

use cowatch::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_builder_handshake_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // Hello, Set.ready, List.
        let mut received: Vec<Value> = Vec::new();
        for _ in 0..3 {
            let msg = ws.next().await.unwrap().unwrap();
            received.push(serde_json::from_str(msg.into_text().unwrap().as_str()).unwrap());
        }

        ws.send(Message::Text(
            r#"{"Hello": {"username": "alice", "version": "1.2.255", "motd": ""}}"#
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

        let report = ws.next().await.unwrap().unwrap();
        received.push(serde_json::from_str(report.into_text().unwrap().as_str()).unwrap());

        ws.close(None).await.unwrap();
        // Keep the socket open until the client answers the close.
        while let Some(Ok(_)) = ws.next().await {}
        received
    });

    let mut client = SessionClientBuilder::new()
        .url(&url)
        .username(" alice ")
        .room("movie")
        .password("secret")
        .connect(Vec::<SessionEvent>::new())
        .await
        .expect("should connect");
    assert_eq!(client.identity(), &SessionIdentity::new("alice", "movie"));

    client.run().await.expect("server close is clean");
    assert!(!client.is_connected());
    assert_eq!(
        client.sink().as_slice(),
        [SessionEvent::Connected("Connected to server, version 1.2.255.".into())]
    );

    let received = server.await.expect("server task should finish");
    assert_eq!(received[0]["Hello"]["username"], "alice");
    assert_eq!(received[0]["Hello"]["password"], "secret");
    assert_eq!(received[0]["Hello"]["room"], json!({"name": "movie"}));
    assert_eq!(received[2], json!({"List": null}));
    assert!(received[3]["State"]["ping"].is_object());
}

#[tokio::test]
async fn test_builder_rejects_blank_username() {
    let result = SessionClientBuilder::new()
        .username("  ")
        .connect(Vec::<SessionEvent>::new())
        .await;
    assert!(matches!(result, Err(CowatchError::Roster(_))));
}
