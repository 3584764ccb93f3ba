//! The evaluation relay endpoint.
//!
//! `OPTIONS` is answered with an empty 200, `POST` runs an evaluation, and every
//! other method gets a 405. All responses carry permissive CORS headers.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::{
    error::Error,
    models::{
        evaluate::{EvaluationRequest, EvaluationResponse},
        message::{Message, Role},
    },
    rubric, Client,
};

/// Shared, read-only state handed to every request.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    client: Option<Result<Client, String>>,
}

impl AppState {
    /// `None` means no API key is configured; evaluations then fail with a 500.
    pub fn new(client: Option<Client>) -> Self {
        Self {
            client: client.map(Ok),
        }
    }

    /// Keeps a failed client construction around so that each evaluation reports it
    /// instead of the process refusing to start.
    pub fn from_build(client: Option<Result<Client, Error>>) -> Self {
        Self {
            client: client.map(|result| result.map_err(|err| err.to_string())),
        }
    }
}

/// Builds the router serving the evaluation endpoint at `path`.
///
/// `path` must start with `/`.
pub fn router(path: &str, state: AppState) -> Router {
    Router::new()
        .route(
            path,
            post(analyze)
                .options(preflight)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::disable()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(state)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}

/// POST handler: validates the submission, asks the model for an evaluation and
/// returns its text untouched.
async fn analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<EvaluationResponse>, Error> {
    let request: EvaluationRequest = serde_json::from_slice(&body)?;
    let submission = request.validate()?;

    tracing::debug!(
        api_key_present = state.client.is_some(),
        api_key_prefix = %state
            .client
            .as_ref()
            .and_then(|client| client.as_ref().ok())
            .map(Client::key_prefix)
            .unwrap_or_default(),
        "checking API key"
    );
    let client = match state.client.as_ref() {
        None => return Err(Error::MissingApiKey),
        Some(Err(reason)) => return Err(Error::ClientUnavailable(reason.clone())),
        Some(Ok(client)) => client,
    };

    let media_type = submission.media_type();
    let message = Message::builder()
        .role(Role::User)
        .add_image(media_type, submission.image_data())
        .add_text(&rubric::prompt_for(&submission.fixture_type))
        .build()?;

    tracing::info!(
        fixture_type = %submission.fixture_type,
        media_type,
        "requesting evaluation"
    );
    let response = client.create_message(vec![message]).await?;

    let evaluation = response
        .first_text()
        .ok_or_else(|| Error::ResponseFormatError("no text block in model response".to_owned()))?
        .to_owned();

    Ok(Json(EvaluationResponse { evaluation }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderMap, Method, Request},
    };
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const PATH: &str = "/api/analyze";

    // Helper function to build the router against a mock upstream
    fn setup_app(base_url: Option<&str>) -> Router {
        let client = base_url.map(|url| {
            Client::builder("test_api_key".into())
                .base_url(url.to_string())
                .build()
                .expect("Failed to build client")
        });
        router(PATH, AppState::new(client))
    }

    async fn send(app: Router, method: Method, body: &str) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::builder()
            .method(method)
            .uri(PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes)
    }

    fn json_of(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).expect("Expected a JSON body")
    }

    fn assert_cors(headers: &HeaderMap) {
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    fn success_body(text: &str) -> Value {
        json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "text", "text": text }]
        })
    }

    #[tokio::test]
    async fn test_preflight_returns_empty_ok() {
        let (status, headers, body) = send(setup_app(None), Method::OPTIONS, "not json").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn test_other_methods_are_rejected() {
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
            let (status, headers, body) = send(setup_app(None), method, "").await;

            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(json_of(&body), json!({ "error": "Method not allowed" }));
            assert_cors(&headers);
        }
    }

    #[tokio::test]
    async fn test_missing_fields_are_bad_request() {
        for body in [
            r#"{}"#,
            r#"{"image": "AAAA"}"#,
            r#"{"fixtureType": "bags"}"#,
            r#"{"image": "", "fixtureType": "bags"}"#,
        ] {
            let (status, headers, body) = send(setup_app(None), Method::POST, body).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json_of(&body), json!({ "error": "Missing image or fixture type" }));
            assert_cors(&headers);
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_server_error() {
        let (status, _, body) = send(setup_app(None), Method::POST, "{not json").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_of(&body)["error"]
            .as_str()
            .unwrap()
            .starts_with("Serialization error"));
    }

    #[tokio::test]
    async fn test_missing_api_key_skips_upstream() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(success_body("unused"));
            })
            .await;

        let (status, _, body) = send(
            setup_app(None),
            Method::POST,
            r#"{"image": "AAAA", "fixtureType": "shoes"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_of(&body), json!({ "error": "API key not configured" }));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_data_uri_media_type_and_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "test_api_key")
                    .header("anthropic-version", "2023-06-01")
                    .body_contains(r#""media_type":"image/png""#)
                    .body_contains(r#""data":"AAAA""#)
                    .body_contains(r#""text":"Evaluate this bags display.\n\n\nYou are a visual"#);
                then.status(200).json_body(success_body("SCORE: 80/100..."));
            })
            .await;

        let (status, headers, body) = send(
            setup_app(Some(&server.base_url())),
            Method::POST,
            r#"{"image": "data:image/png;base64,AAAA", "fixtureType": "bags"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body), json!({ "evaluation": "SCORE: 80/100..." }));
        assert_cors(&headers);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_raw_base64_defaults_to_jpeg() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .body_contains(r#""media_type":"image/jpeg""#)
                    .body_contains(r#""data":"AAAA""#);
                then.status(200).json_body(success_body("ok"));
            })
            .await;

        let (status, _, _) = send(
            setup_app(Some(&server.base_url())),
            Method::POST,
            r#"{"image": "AAAA", "fixtureType": "men's wall"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_explicit_image_type_wins() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .body_contains(r#""media_type":"image/webp""#)
                    .body_contains(r#""data":"AAAA""#);
                then.status(200).json_body(success_body("ok"));
            })
            .await;

        let (status, _, _) = send(
            setup_app(Some(&server.base_url())),
            Method::POST,
            r#"{"image": "data:image/png;base64,AAAA", "imageType": "image/webp", "fixtureType": "bags"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_evaluation_text_is_passed_through() {
        let text = "SCORE: 64/100\n\nBREAKDOWN:\n✓ Quantity: 20/25 pts - fine\n✗ Color Story: 5/25 pts - random";
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(success_body(text));
            })
            .await;

        let (status, _, body) = send(
            setup_app(Some(&server.base_url())),
            Method::POST,
            r#"{"image": "AAAA", "fixtureType": "bags"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["evaluation"], text);
    }

    #[tokio::test]
    async fn test_upstream_error_message_is_relayed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(429)
                    .json_body(json!({ "error": { "message": "rate limited" } }));
            })
            .await;

        let (status, headers, body) = send(
            setup_app(Some(&server.base_url())),
            Method::POST,
            r#"{"image": "AAAA", "fixtureType": "bags"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_of(&body), json!({ "error": "rate limited" }));
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn test_upstream_error_without_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(503).json_body(json!({}));
            })
            .await;

        let (status, _, body) = send(
            setup_app(Some(&server.base_url())),
            Method::POST,
            r#"{"image": "AAAA", "fixtureType": "bags"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_of(&body), json!({ "error": "API error: 503" }));
    }

    #[tokio::test]
    async fn test_response_without_text_is_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(json!({ "content": [] }));
            })
            .await;

        let (status, _, body) = send(
            setup_app(Some(&server.base_url())),
            Method::POST,
            r#"{"image": "AAAA", "fixtureType": "bags"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_of(&body)["error"]
            .as_str()
            .unwrap()
            .starts_with("Unexpected response format"));
    }

    #[tokio::test]
    async fn test_invalid_api_key_fails_per_request() {
        let app = router(
            PATH,
            AppState::from_build(Some(Client::builder("sk-ant-bad\x7fkey".into()).build())),
        );

        for _ in 0..2 {
            let (status, headers, body) = send(
                app.clone(),
                Method::POST,
                r#"{"image": "AAAA", "fixtureType": "bags"}"#,
            )
            .await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(json_of(&body)["error"]
                .as_str()
                .unwrap()
                .contains("Invalid API key"));
            assert_cors(&headers);
        }

        let (status, _, _) = send(app, Method::OPTIONS, "").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_numeric_fixture_type_is_interpolated() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .body_contains(r#""text":"Evaluate this 5 display."#);
                then.status(200).json_body(success_body("ok"));
            })
            .await;

        let (status, _, body) = send(
            setup_app(Some(&server.base_url())),
            Method::POST,
            r#"{"image": "AAAA", "fixtureType": 5}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body), json!({ "evaluation": "ok" }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_request_does_not_affect_the_next() {
        let server = MockServer::start_async().await;
        let app = setup_app(Some(&server.base_url()));
        let body = r#"{"image": "AAAA", "fixtureType": "bags"}"#;

        let failing = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(429)
                    .json_body(json!({ "error": { "message": "rate limited" } }));
            })
            .await;
        let (status, _, first) = send(app.clone(), Method::POST, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_of(&first), json!({ "error": "rate limited" }));
        failing.assert_hits_async(1).await;
        failing.delete_async().await;

        let passing = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(success_body("SCORE: 75/100"));
            })
            .await;
        let (status, _, second) = send(app, Method::POST, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&second), json!({ "evaluation": "SCORE: 75/100" }));
        passing.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_each_request_calls_upstream() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(success_body("SCORE: 90/100"));
            })
            .await;
        let app = setup_app(Some(&server.base_url()));
        let body = r#"{"image": "AAAA", "fixtureType": "shoes"}"#;

        let (first, _, _) = send(app.clone(), Method::POST, body).await;
        let (second, _, _) = send(app, Method::POST, body).await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_server_error() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let (status, _, body) = send(
            setup_app(Some("http://127.0.0.1:9")),
            Method::POST,
            r#"{"image": "AAAA", "fixtureType": "bags"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_of(&body)["error"]
            .as_str()
            .unwrap()
            .starts_with("HTTP error"));
    }
}
