//! HTTP behaviour of the Luma client against a mock server.

use std::sync::Arc;
use std::time::Duration;

use quiz_genclient::{
    GenerationApi, GenerationError, GenerationPolicy, JobRunner, JobStatus, LumaClient,
    LumaClientConfig,
};
use quiz_models::{GenerationRequest, JobState};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> LumaClient {
    LumaClient::new(LumaClientConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        request_timeout: Duration::from_secs(5),
        download_timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn submit_returns_remote_id_on_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generations"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "prompt": "a glowing forest",
            "aspect_ratio": "9:16",
            "duration": "8s"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "gen-42"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let id = client
        .submit(&GenerationRequest::new(1, "a glowing forest", 8), "9:16")
        .await
        .unwrap();

    assert_eq!(id, "gen-42");
}

#[tokio::test]
async fn submit_rejects_non_created_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "gen-1"})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .submit(&GenerationRequest::new(1, "x", 8), "9:16")
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::SubmitFailed { status: 200, .. }));
}

#[tokio::test]
async fn poll_maps_completed_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/generations/gen-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gen-7",
            "state": "completed",
            "assets": {"video": "https://cdn.example/gen-7.mp4"}
        })))
        .mount(&server)
        .await;

    let status = client_for(&server).poll("gen-7").await.unwrap();
    assert_eq!(
        status,
        JobStatus::Completed {
            clip_url: "https://cdn.example/gen-7.mp4".to_string()
        }
    );
}

#[tokio::test]
async fn failed_download_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/clip.mp4"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("choice_2.mp4");
    let url = format!("{}/files/clip.mp4", server.uri());

    let err = client_for(&server).download(&url, &dest).await.unwrap_err();

    assert!(matches!(err, GenerationError::DownloadFailed(_)));
    assert!(!dest.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn empty_download_body_removes_partial_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::<u8>::new()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("choice_3.mp4");
    let url = format!("{}/files/clip.mp4", server.uri());

    let err = client_for(&server).download(&url, &dest).await.unwrap_err();

    assert!(matches!(err, GenerationError::DownloadFailed(_)));
    assert!(!dest.exists());
    assert!(!dir.path().join("choice_3.mp4.part").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn download_writes_body_to_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("staging").join("choice_1.mp4");
    let url = format!("{}/files/clip.mp4", server.uri());

    client_for(&server).download(&url, &dest).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap().len(), 4096);
    assert!(!dest.with_file_name("choice_1.mp4.part").exists());
}

#[tokio::test]
async fn runner_completes_full_cycle_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "gen-9"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/generations/gen-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gen-9",
            "state": "completed",
            "assets": {"video": format!("{}/files/gen-9.mp4", server.uri())}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/gen-9.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4data".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("choice_3.mp4");
    let policy = GenerationPolicy {
        retry_delay: Duration::from_millis(10),
        poll_interval: Duration::from_millis(10),
        generation_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let runner = JobRunner::new(Arc::new(client_for(&server)), policy);

    let report = runner
        .run_to_completion(GenerationRequest::new(3, "city at dusk", 8), &dest)
        .await;

    assert_eq!(report.attempts, 1);
    assert_eq!(report.final_state, JobState::Completed);
    assert_eq!(std::fs::read(&dest).unwrap(), b"mp4data");
}

#[tokio::test]
async fn runner_gives_up_after_remote_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "gen-bad"})))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/generations/gen-bad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gen-bad",
            "state": "failed",
            "failure_reason": "blocked"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("choice_4.mp4");
    let policy = GenerationPolicy {
        retry_delay: Duration::from_millis(10),
        poll_interval: Duration::from_millis(10),
        generation_timeout: Duration::from_secs(5),
        ..Default::default()
    };

    let report = JobRunner::new(Arc::new(client_for(&server)), policy)
        .run_to_completion(GenerationRequest::new(4, "storm", 8), &dest)
        .await;

    assert!(report.clip.is_none());
    assert_eq!(report.attempts, 3);
    assert!(!dest.exists());
}
