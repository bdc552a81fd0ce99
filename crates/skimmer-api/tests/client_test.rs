#![allow(clippy::unwrap_used)]
// Integration tests for `SotamatClient` using wiremock.

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skimmer_api::{Error, SotamatClient, SpotReport};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, SotamatClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let password: SecretString = "hunter2".to_string().into();
    let client = SotamatClient::with_client(
        reqwest::Client::new(),
        base_url,
        "AB6D".into(),
        password,
    );
    (server, client)
}

fn sample_report() -> SpotReport {
    SpotReport {
        snr: -11,
        delta_time: 0.3,
        mode: "FT8".into(),
        message: "SOTAMAT AB6D".into(),
        gridsquare: "CM97".into(),
        frequency: 14_075_250,
        software: "SOTAmatSkimmer V0.1.0".into(),
    }
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/wp-json/sotawp/v1/authenticate"))
        .and(body_string_contains("username=AB6D"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    client.authenticate().await.unwrap();
}

#[tokio::test]
async fn test_authenticate_failure_keeps_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/wp-json/sotawp/v1/authenticate"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid username or password"))
        .mount(&server)
        .await;

    let result = client.authenticate().await;
    match result {
        Err(Error::Authentication { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "Invalid username or password");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

// ── Submission tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_post_message_sends_form() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/wp-json/sotawp/v1/postmessage"))
        .and(body_string_contains("username=AB6D"))
        .and(body_string_contains("snr=-11"))
        .and(body_string_contains("deltatime=0.30"))
        .and(body_string_contains("mode=FT8"))
        .and(body_string_contains("message=SOTAMAT+AB6D"))
        .and(body_string_contains("gridsquare=CM97"))
        .and(body_string_contains("frequency=14075250"))
        .and(body_string_contains("software=SOTAmatSkimmer+V0.1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;

    client.post_message(&sample_report()).await.unwrap();
}

#[tokio::test]
async fn test_post_message_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/wp-json/sotawp/v1/postmessage"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let result = client.post_message(&sample_report()).await;
    let err = result.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("database unavailable"));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Port 9 on localhost: nothing listens there in CI.
    let base_url = Url::parse("http://127.0.0.1:9").unwrap();
    let password: SecretString = "x".to_string().into();
    let client = SotamatClient::with_client(reqwest::Client::new(), base_url, "AB6D".into(), password);

    let result = client.authenticate().await;
    assert!(
        matches!(result, Err(Error::Transport(_))),
        "expected Transport error, got: {result:?}"
    );
}
