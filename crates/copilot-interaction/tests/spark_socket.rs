use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use copilot_core::render::RecordingRenderer;
use copilot_core::{LlmResult, QueryMode};
use copilot_interaction::{Exchange, LlmService, PromptContext, Query, SparkService};

/// Serves one websocket connection, replying to the request with `frames`.
///
/// Returns the URL to connect to and a handle yielding the request frame.
async fn spark_server(frames: Vec<String>) -> (String, tokio::task::JoinHandle<serde_json::Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let request = match ws.next().await {
            Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected request frame: {other:?}"),
        };
        for frame in frames {
            ws.send(Message::Text(frame)).await.unwrap();
        }
        let _ = ws.close(None).await;
        request
    });
    (format!("ws://{addr}/v3.5/chat"), handle)
}

fn service(url: &str) -> SparkService {
    SparkService::new("app-1", "key", "secret", url, PromptContext::new("openEuler", false))
}

async fn ask(svc: &mut SparkService, text: &str) -> (LlmResult, RecordingRenderer) {
    let mut out = RecordingRenderer::new();
    let cancel = CancellationToken::new();
    let result = svc
        .get_llm_result(
            &Query::new(text, QueryMode::Chat),
            Exchange::new(&mut out, &cancel),
        )
        .await;
    (result, out)
}

fn frame(status: i64, content: &str) -> String {
    serde_json::json!({
        "header": {"code": 0, "message": "Success", "sid": "cht0001", "status": status},
        "payload": {"choices": {"status": status, "seq": 0, "text": [{"content": content, "role": "assistant", "index": 0}]}}
    })
    .to_string()
}

#[tokio::test]
async fn test_frames_accumulate_until_final_status() {
    let (url, server) = spark_server(vec![
        frame(0, "Use:\n```bash\n"),
        frame(1, "ip addr\n```"),
        frame(2, ""),
    ])
    .await;

    let mut svc = service(&url);
    let (result, out) = ask(&mut svc, "show my ip").await;

    assert_eq!(result.commands.len(), 1);
    assert_eq!(result.commands[0].as_str(), "ip addr");
    assert_eq!(out.last_content(), Some("Use:\n```bash\nip addr\n```"));
    assert_eq!(svc.session().history.len(), 2);

    let request = server.await.unwrap();
    assert_eq!(request["header"]["app_id"], "app-1");
    assert_eq!(request["parameter"]["chat"]["auditing"], "default");
    assert_eq!(request["payload"]["message"]["text"][0]["role"], "system");
}

#[tokio::test]
async fn test_error_code_is_a_protocol_error() {
    let error = serde_json::json!({
        "header": {"code": 11200, "message": "authorization error", "sid": "cht0002", "status": 2}
    })
    .to_string();
    let (url, _server) = spark_server(vec![error]).await;

    let mut svc = service(&url);
    let (result, out) = ask(&mut svc, "hi").await;

    assert!(result.is_empty());
    assert_eq!(
        out.last_content(),
        Some("Request error: 11200\nauthorization error")
    );
    assert!(svc.session().history.is_empty());
}

#[tokio::test]
async fn test_rejected_handshake_mentions_spark_url() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let _ = tokio::io::AsyncReadExt::read(&mut stream, &mut buf).await;
        let _ = stream
            .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
    });

    let url = format!("ws://{addr}/v3.5/chat");
    let mut svc = service(&url);
    let (result, out) = ask(&mut svc, "hi").await;

    assert!(result.is_empty());
    let message = out.last_content().unwrap();
    assert!(message.contains(&format!("or try ping {url}")));
}

#[tokio::test]
async fn test_cancel_closes_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // read the request and every frame until the client closes
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut svc = service(&format!("ws://{addr}/v3.5/chat"));
    let mut out = RecordingRenderer::new();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let result = svc
        .get_llm_result(
            &Query::new("hi", QueryMode::Chat),
            Exchange::new(&mut out, &cancel),
        )
        .await;

    assert!(result.is_empty());
    assert!(out.frames.is_empty());
    assert!(svc.session().history.is_empty());
}

const SPARK_FAILURE: &str = "Failed to access the model, please check your network connection.";

#[tokio::test]
async fn test_silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _request = ws.next().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let mut svc = service(&format!("ws://{addr}/v3.5/chat")).with_timeout(Duration::from_millis(100));
    let (result, out) = ask(&mut svc, "hi").await;

    assert!(result.is_empty());
    assert_eq!(out.last_content(), Some(SPARK_FAILURE));
    assert!(svc.session().history.is_empty());
}

#[tokio::test]
async fn test_stalled_handshake_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let mut svc = service(&format!("ws://{addr}/v3.5/chat"))
        .with_connect_timeout(Duration::from_millis(100));
    let (result, out) = ask(&mut svc, "hi").await;

    assert!(result.is_empty());
    assert_eq!(out.last_content(), Some(SPARK_FAILURE));
}
