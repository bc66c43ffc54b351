use courier::http::{Cancellation, RETRY_DELAY};
use courier::{ClientConfig, Error, ErrorKind, HttpClient, InternalError, RequestOptions};
use mockito::Matcher;
use std::time::Duration;

fn config(server: &str) -> ClientConfig {
    ClientConfig {
        retry_delay: 0.0,
        ..ClientConfig::new(server)
    }
}

#[tokio::test]
async fn test_get_returns_body_text() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/hello")
        .with_status(200)
        .with_body("Hello world")
        .create_async()
        .await;

    let client = HttpClient::new(config(&server.url())).unwrap();
    assert_eq!(client.get("/hello").await.unwrap(), "Hello world");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_raw_reply_keeps_status_and_headers() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/items")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .match_body("name=demo")
        .with_status(201)
        .with_header("x-request-id", "abc")
        .with_body("created")
        .create_async()
        .await;

    let client = HttpClient::new(config(&server.url())).unwrap();
    let reply = client
        .do_request(
            "post",
            "/items",
            RequestOptions::new()
                .param("page", "2")
                .form("name", "demo")
                .parse_output(false),
        )
        .await
        .unwrap();

    let response = reply.into_response().unwrap();
    assert_eq!(response.status(), 201);
    assert_eq!(response.header("X-Request-Id"), Some("abc"));
    assert_eq!(response.text().await.unwrap(), "created");
}

#[tokio::test]
async fn test_redirect_is_classified_with_response_context() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/moved")
        .with_status(301)
        .with_header("x-request-id", "req-1")
        .with_body("gone")
        .expect(1)
        .create_async()
        .await;

    let mut cfg = config(&server.url());
    cfg.no_retry_on = vec!["301".to_string()];
    let client = HttpClient::new(cfg).unwrap();

    let err = client.get("/moved").await.unwrap_err();
    assert_eq!(err.code(), 301);
    assert_eq!(err.kind(), Some(ErrorKind::MOVED_PERMANENTLY));
    assert_eq!(err.extra()["request_id"], "req-1");
    assert_eq!(err.extra()["response"], "gone");
    assert_eq!(err.extra()["method"], "GET");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_are_retried_until_exhausted() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/flaky")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let mut cfg = config(&server.url());
    cfg.retry_number = 3;
    let client = HttpClient::new(cfg).unwrap();

    let err = client.get("/flaky").await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::SERVICE_UNAVAILABLE));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_per_call_exclusion_stops_after_one_attempt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let client = HttpClient::new(config(&server.url())).unwrap();
    let err = client
        .do_request(
            "GET",
            "/missing",
            RequestOptions::new().no_retry_on(ErrorKind::NOT_FOUND),
        )
        .await
        .unwrap_err();

    assert_eq!(err.message_id(), "HTTP-28140");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_failure() {
    let mut cfg = config("http://127.0.0.1:1");
    cfg.retry_number = 2;
    let client = HttpClient::new(cfg).unwrap();

    let err = client.get("/").await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::INTERNAL_SERVER_ERROR));
    assert_eq!(err.extra()["url"], "http://127.0.0.1:1/");
}

#[tokio::test]
async fn test_non_positive_budget_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/hello")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let mut cfg = config(&server.url());
    cfg.retry_number = 0;
    let client = HttpClient::new(cfg).unwrap();

    let err = client.get("/hello").await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    assert_eq!(err.message_id(), InternalError::MISCONFIGURED_ID);
    assert!(err.message().ends_with("after 0 retries"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cancel_interrupts_retry_delay() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/down")
        .with_status(502)
        .create_async()
        .await;

    let cfg = ClientConfig::new(server.url());
    assert_eq!(cfg.retry_policy().unwrap().delay, RETRY_DELAY);
    let client = HttpClient::new(cfg).unwrap();

    let cancel = Cancellation::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        })
    };

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        client.do_request("GET", "/down", RequestOptions::new().cancel(cancel)),
    )
    .await
    .expect("cancellation should end the call well before the retry delay")
    .unwrap_err();
    handle.await.unwrap();

    assert_eq!(err.message_id(), InternalError::CANCELLED_ID);
}
