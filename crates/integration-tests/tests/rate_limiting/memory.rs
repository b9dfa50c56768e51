use indoc::indoc;
use integration_tests::TestServer;
use serde_json::json;

#[tokio::test]
async fn per_minute_cap_rejects_with_retry_after() {
    let config = indoc! {r#"
        [rate_limit]
        max_per_minute = 3
        max_per_hour = 100
    "#};

    let server = TestServer::start(config).await;

    let mut statuses = Vec::new();
    let mut retry_after = None;

    for _ in 0..5 {
        let response = server.client.check("alice").await;
        statuses.push(response.status().as_u16());

        if response.status() == 429 {
            retry_after = response
                .headers()
                .get("retry-after")
                .map(|h| h.to_str().unwrap().parse::<u64>().unwrap());
        }
    }

    insta::assert_json_snapshot!(statuses, @r#"
    [
      200,
      200,
      200,
      429,
      429
    ]
    "#);

    let retry_after = retry_after.unwrap();
    assert!((1..=60).contains(&retry_after), "retry after was {retry_after}");
}

#[tokio::test]
async fn limited_response_body() {
    let config = indoc! {r#"
        [rate_limit]
        max_per_minute = 1
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.check("alice").await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    insta::assert_json_snapshot!(body, @r#"
    {
      "allowed": true
    }
    "#);

    let response = server.client.check("alice").await;
    assert_eq!(response.status(), 429);

    let body: serde_json::Value = response.json().await.unwrap();
    insta::assert_json_snapshot!(body, {
        ".retry_after" => "[retry_after]"
    }, @r#"
    {
      "allowed": false,
      "error": "Too Many Requests",
      "message": "Rate limit exceeded. Please try again later.",
      "retry_after": "[retry_after]"
    }
    "#);
}

#[tokio::test]
async fn hourly_cap_wins_over_minute_cap() {
    let config = indoc! {r#"
        [rate_limit]
        max_per_minute = 2
        max_per_hour = 2
    "#};

    let server = TestServer::start(config).await;

    assert_eq!(server.client.check("alice").await.status(), 200);
    assert_eq!(server.client.check("alice").await.status(), 200);

    let response = server.client.check("alice").await;
    assert_eq!(response.status(), 429);

    // Both windows are full; the hour window decides the wait.
    let retry_after: u64 = response.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after > 3500, "retry after was {retry_after}");
}

#[tokio::test]
async fn identities_are_limited_independently() {
    let config = indoc! {r#"
        [rate_limit]
        max_per_minute = 1
    "#};

    let server = TestServer::start(config).await;

    assert_eq!(server.client.check("alice").await.status(), 200);
    assert_eq!(server.client.check("alice").await.status(), 429);
    assert_eq!(server.client.check("bob").await.status(), 200);
}

#[tokio::test]
async fn empty_identity_is_a_bad_request() {
    let server = TestServer::start("").await;

    let response = server.client.check("").await;
    assert_eq!(response.status(), 400);

    let body: serde_json::Value = response.json().await.unwrap();
    insta::assert_json_snapshot!(body, @r#"
    {
      "error": "Bad Request",
      "message": "identity must not be empty"
    }
    "#);
}

#[tokio::test]
async fn malformed_request_is_rejected() {
    let server = TestServer::start("").await;

    let response = server.client.post("/v1/check", &json!({ "user": "alice" })).await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn custom_check_path() {
    let config = indoc! {r#"
        [rate_limit]
        path = "/limits/check"
        max_per_minute = 1
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.post("/limits/check", &json!({ "identity": "alice" })).await;
    assert_eq!(response.status(), 200);

    let response = server.client.post("/limits/check", &json!({ "identity": "alice" })).await;
    assert_eq!(response.status(), 429);

    let response = server.client.check("alice").await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn unreachable_redis_fails_open() {
    let config = indoc! {r#"
        [rate_limit]
        max_per_minute = 1

        [rate_limit.storage]
        type = "redis"
        url = "redis://127.0.0.1:1"
        response_timeout = "200ms"

        [rate_limit.storage.pool]
        timeout_create = "200ms"
        timeout_wait = "200ms"
    "#};

    let server = TestServer::start(config).await;

    for _ in 0..3 {
        let response = server.client.check("alice").await;
        assert_eq!(response.status(), 200);
    }
}
