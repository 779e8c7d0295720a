use std::sync::Arc;
use std::time::Duration;

use copilot_core::render::RecordingRenderer;
use copilot_core::{Backend, QueryMode, Result, ScriptWriter, TransportError, messages};
use copilot_interaction::{Exchange, FrameworkService, LlmService, PromptContext, Query};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FixedScriptWriter;

impl ScriptWriter for FixedScriptWriter {
    fn write_script(&self, _body: &str) -> Result<std::path::PathBuf> {
        Ok("/tmp/plugin_gen_script_12345678.sh".into())
    }
}

async fn mount_bootstrap(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/client/session"))
        .and(header("authorization", "Bearer fw-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200, "message": "", "result": {"session_id": "s1"}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/client/conversation"))
        .and(header("cookie", "ECSESSION=s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200, "message": "", "result": {"conversation_id": "c1"}
        })))
        .mount(server)
        .await;
}

async fn bootstrapped(server: &MockServer) -> FrameworkService {
    mount_bootstrap(server).await;
    let mut svc = FrameworkService::new(server.uri(), "fw-key", PromptContext::new("openEuler", true))
        .unwrap()
        .with_script_writer(Arc::new(FixedScriptWriter));
    let mut out = RecordingRenderer::new();
    assert!(svc.bootstrap(&mut out).await);
    svc
}

async fn ask(svc: &mut FrameworkService, query: Query) -> (copilot_core::LlmResult, RecordingRenderer) {
    let mut out = RecordingRenderer::new();
    let cancel = CancellationToken::new();
    let result = svc
        .get_llm_result(&query, Exchange::new(&mut out, &cancel))
        .await;
    (result, out)
}

#[tokio::test]
async fn test_chat_stream_with_suggestion_and_cookie_refresh() {
    let server = MockServer::start().await;
    let mut svc = bootstrapped(&server).await;
    assert_eq!(svc.session().conversation_id.as_deref(), Some("c1"));

    let body = concat!(
        "data: {\"content\":\"Run:\\n```bash\\nuptime\\n```\"}\n\n",
        "data: {\"content\":\"\",\"search_suggestions\":[{\"question\":\"What is load average?\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/client/chat"))
        .and(header("cookie", "ECSESSION=s1"))
        .and(body_partial_json(serde_json::json!({"conversation_id": "c1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "ECSESSION=s2; Path=/; HttpOnly")
                .set_body_raw(body, "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (result, out) = ask(&mut svc, Query::new("system load?", QueryMode::Chat)).await;
    assert_eq!(result.commands.len(), 1);
    assert_eq!(out.last_suggestion(), Some("What is load average?"));
    assert_eq!(svc.session().session_id.as_deref(), Some("s2"));
}

#[tokio::test]
async fn test_unauthorized_chat_reports_expired_session() {
    let server = MockServer::start().await;
    let mut svc = bootstrapped(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/client/chat"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (result, out) = ask(&mut svc, Query::new("hi", QueryMode::Chat)).await;
    assert!(result.is_empty());
    assert_eq!(out.last_content(), Some(messages::SESSION_EXPIRED));
}

#[tokio::test]
async fn test_too_many_requests() {
    let server = MockServer::start().await;
    let mut svc = bootstrapped(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/client/chat"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let (_, out) = ask(&mut svc, Query::new("hi", QueryMode::Chat)).await;
    assert_eq!(out.last_content(), Some(messages::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_slow_chat_reports_timeout() {
    let server = MockServer::start().await;
    let mut svc = bootstrapped(&server)
        .await
        .with_timeout(Duration::from_millis(100));
    Mock::given(method("POST"))
        .and(path("/api/client/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_raw("data: {\"content\":\"late\"}\n\n", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (result, out) = ask(&mut svc, Query::new("hi", QueryMode::Chat)).await;
    assert!(result.is_empty());
    assert_eq!(
        out.last_content(),
        Some(messages::transport_failure(Backend::Framework, &TransportError::Timeout).as_str())
    );
    assert!(svc.session().history.is_empty());
}

#[tokio::test]
async fn test_sensitive_marker_discards_answer() {
    let server = MockServer::start().await;
    let mut svc = bootstrapped(&server).await;
    let body = "data: {\"content\":\"partial\"}\n\ndata: [SENSITIVE]\n\n";
    Mock::given(method("POST"))
        .and(path("/api/client/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let (result, out) = ask(&mut svc, Query::new("hi", QueryMode::Chat)).await;
    assert!(result.is_empty());
    assert_eq!(out.last_content(), Some(messages::SENSITIVE_NOTICE));
}

#[tokio::test]
async fn test_diagnose_extract_payload_bypasses_markdown() {
    let server = MockServer::start().await;
    let mut svc = bootstrapped(&server).await.with_host_ip("10.1.1.1");
    let body = concat!(
        "data: {\"content\":\"analysing...\"}\n\n",
        "data: {\"type\":\"extract\",\"data\":{\"output\":\"# Report\\nDisk is full\",\"script\":\"df -h\"}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/client/chat"))
        .and(body_partial_json(serde_json::json!({
            "user_selected_plugins": [{"plugin_name": "euler-copilot-rca"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let (result, out) = ask(&mut svc, Query::new("why is the disk full", QueryMode::Diagnose)).await;
    assert_eq!(out.last_content(), Some("# Report\nDisk is full"));
    assert_eq!(result.commands.len(), 1);
    assert_eq!(
        result.commands[0].as_str(),
        "bash /tmp/plugin_gen_script_12345678.sh"
    );
}

#[tokio::test]
async fn test_cancel_sends_stop_and_returns_nothing() {
    let server = MockServer::start().await;
    let mut svc = bootstrapped(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/client/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: [DONE]\n\n", "text/event-stream")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/client/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

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
}

#[tokio::test]
async fn test_invalid_api_key_is_rendered_at_bootstrap() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/client/session"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut svc =
        FrameworkService::new(server.uri(), "bad", PromptContext::new("openEuler", false)).unwrap();
    let mut out = RecordingRenderer::new();
    assert!(!svc.bootstrap(&mut out).await);
    assert_eq!(out.last_content(), Some(messages::INVALID_API_KEY));
}

#[tokio::test]
async fn test_plugin_list() {
    let server = MockServer::start().await;
    let mut svc = bootstrapped(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/client/plugin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "message": "",
            "result": [
                {"id": "1", "plugin_name": "deploy", "plugin_description": "Deploy apps", "plugin_auth": null}
            ]
        })))
        .mount(&server)
        .await;

    let plugins = svc.list_plugins().await;
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].name, "deploy");
    assert_eq!(svc.session().plugins, plugins);
}
