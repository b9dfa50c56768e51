//! Tests against a live Redis, enabled by setting `REDIS_URL`.

use config::RateLimitConfig;
use indoc::formatdoc;
use integration_tests::{TestServer, redis_url, unique_key_prefix};
use jiff::{SignedDuration, Timestamp};
use rate_limit::{Backend, InMemoryStorage, RateLimitResult, RateLimiter};

fn redis_config(url: &str, key_prefix: &str, per_minute: u32, per_hour: u32) -> String {
    formatdoc! {r#"
        [rate_limit]
        max_per_minute = {per_minute}
        max_per_hour = {per_hour}

        [rate_limit.storage]
        type = "redis"
        url = "{url}"
        key_prefix = "{key_prefix}"
    "#}
}

#[tokio::test]
async fn redis_per_minute_cap() {
    let Some(url) = redis_url() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };

    let config = redis_config(&url, &unique_key_prefix("per_minute"), 3, 100);
    let server = TestServer::start(&config).await;

    let mut statuses = Vec::new();

    for _ in 0..5 {
        statuses.push(server.client.check("alice").await.status().as_u16());
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

    assert_eq!(server.client.check("bob").await.status(), 200);
}

#[tokio::test]
async fn redis_and_memory_decide_alike() {
    let Some(url) = redis_url() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };

    let config: RateLimitConfig = toml::from_str::<config::Config>(&redis_config(
        &url,
        &unique_key_prefix("equivalence"),
        2,
        3,
    ))
    .unwrap()
    .rate_limit;

    let redis = RateLimiter::new(&config).await.unwrap();
    let memory = RateLimiter::with_storage(Backend::Memory(InMemoryStorage::new()), redis.limits());

    let start: Timestamp = "2026-01-01T12:00:00Z".parse().unwrap();
    let at = |seconds: i64| start + SignedDuration::from_secs(seconds);

    // Minute cap, recovery after the minute, hour cap, recovery after the hour.
    let script = [
        ("alice", at(0)),
        ("alice", at(1)),
        ("alice", at(2)),
        ("bob", at(2)),
        ("alice", at(61)),
        ("alice", at(62)),
        ("alice", at(130)),
        ("alice", at(3601)),
        ("alice", at(3602)),
        ("bob", at(3700)),
    ];

    let mut redis_results = Vec::new();
    let mut memory_results = Vec::new();

    for (identity, now) in script {
        redis_results.push(redis.check_at(identity, now).await.unwrap());
        memory_results.push(memory.check_at(identity, now).await.unwrap());
    }

    assert_eq!(redis_results, memory_results);

    let allowed: Vec<bool> = memory_results.iter().map(RateLimitResult::is_allowed).collect();
    assert_eq!(
        allowed,
        [true, true, false, true, true, false, false, true, true, true]
    );
}
