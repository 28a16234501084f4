mod common;

use std::time::Duration;

use common::*;
use http_cache_client::{CacheConfig, CacheResponseStatus, ExchangeContext};

#[tokio::test]
async fn stale_if_error_salvages_server_errors() {
    let (client, backend) = make_client(CacheConfig::default());
    backend.push_response(response(
        200,
        &[
            ("date", &http_date(-30)),
            ("cache-control", "max-age=0, stale-if-error=60"),
            ("etag", "\"c1\""),
        ],
        "C",
    ));
    backend.push_response(response(503, &[("date", &http_date(0))], "boom"));

    let mut context = ExchangeContext::new();
    client.execute(get("http://example.com/c"), &mut context).await.unwrap();

    let mut context = ExchangeContext::new();
    let salvaged =
        client.execute(get("http://example.com/c"), &mut context).await.unwrap();
    assert_eq!(salvaged.status(), 200);
    assert_eq!(body_text(&salvaged), "C");
    assert!(warning_codes(&salvaged).contains(&110));
    assert_eq!(
        context.cache_response_status(),
        Some(CacheResponseStatus::CacheHit)
    );
}

#[tokio::test]
async fn stale_if_error_expires_with_its_window() {
    let (client, backend) = make_client(CacheConfig::default());
    backend.push_response(response(
        200,
        &[
            ("date", &http_date(-120)),
            ("cache-control", "max-age=0, stale-if-error=60"),
            ("etag", "\"c1\""),
        ],
        "C",
    ));
    backend.push_response(response(503, &[("date", &http_date(0))], "boom"));

    let mut context = ExchangeContext::new();
    client.execute(get("http://example.com/c"), &mut context).await.unwrap();

    // 120s stale exceeds the 60s window, so the error passes through
    let mut context = ExchangeContext::new();
    let result =
        client.execute(get("http://example.com/c"), &mut context).await.unwrap();
    assert_eq!(result.status(), 503);
}

#[tokio::test]
async fn must_revalidate_forbids_error_salvage() {
    let (client, backend) = make_client(CacheConfig::default());
    backend.push_response(response(
        200,
        &[
            ("date", &http_date(-30)),
            (
                "cache-control",
                "max-age=0, must-revalidate, stale-if-error=60",
            ),
            ("etag", "\"c1\""),
        ],
        "C",
    ));
    backend.push_response(response(503, &[("date", &http_date(0))], "boom"));

    let mut context = ExchangeContext::new();
    client.execute(get("http://example.com/c"), &mut context).await.unwrap();

    let mut context = ExchangeContext::new();
    let result =
        client.execute(get("http://example.com/c"), &mut context).await.unwrap();
    assert_eq!(result.status(), 503);
}

#[tokio::test]
async fn failed_revalidation_serves_stale_with_warning() {
    let (client, backend) = make_client(CacheConfig::default());
    backend.push_response(response(
        200,
        &[
            ("date", &http_date(-120)),
            ("cache-control", "max-age=60"),
            ("etag", "\"a1\""),
        ],
        "A",
    ));
    // no scripted response: the revalidation attempt fails

    let mut context = ExchangeContext::new();
    client.execute(get("http://example.com/a"), &mut context).await.unwrap();

    let mut context = ExchangeContext::new();
    let stale =
        client.execute(get("http://example.com/a"), &mut context).await.unwrap();
    assert_eq!(body_text(&stale), "A");
    assert!(warning_codes(&stale).contains(&111));
    assert_eq!(
        context.cache_response_status(),
        Some(CacheResponseStatus::CacheHit)
    );
}

#[tokio::test]
async fn failed_revalidation_of_must_revalidate_entries_times_out() {
    let (client, backend) = make_client(CacheConfig::default());
    backend.push_response(response(
        200,
        &[
            ("date", &http_date(-120)),
            ("cache-control", "max-age=60, must-revalidate"),
            ("etag", "\"a1\""),
        ],
        "A",
    ));

    let mut context = ExchangeContext::new();
    client.execute(get("http://example.com/a"), &mut context).await.unwrap();

    let mut context = ExchangeContext::new();
    let result =
        client.execute(get("http://example.com/a"), &mut context).await.unwrap();
    assert_eq!(result.status(), 504);
    assert_eq!(
        context.cache_response_status(),
        Some(CacheResponseStatus::CacheModuleResponse)
    );
}

#[tokio::test]
async fn stale_while_revalidate_serves_immediately_and_refreshes_behind() {
    let (client, backend) = make_client(CacheConfig::default());
    backend.push_response(response(
        200,
        &[
            ("date", &http_date(-120)),
            (
                "cache-control",
                "max-age=60, stale-while-revalidate=600",
            ),
            ("etag", "\"a1\""),
        ],
        "A",
    ));
    backend.push_response(response(
        304,
        &[("date", &http_date(0)), ("cache-control", "max-age=60")],
        "",
    ));

    let mut context = ExchangeContext::new();
    client.execute(get("http://example.com/a"), &mut context).await.unwrap();

    // the stale body comes back at once, annotated as stale
    let mut context = ExchangeContext::new();
    let stale =
        client.execute(get("http://example.com/a"), &mut context).await.unwrap();
    assert_eq!(body_text(&stale), "A");
    assert!(warning_codes(&stale).contains(&110));
    assert_eq!(
        context.cache_response_status(),
        Some(CacheResponseStatus::CacheHit)
    );

    // the background task revalidates with the stored validator
    for _ in 0..200 {
        if backend.request_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(backend.request_count(), 2);
    assert_eq!(
        backend.request_header(1, "if-none-match").as_deref(),
        Some("\"a1\"")
    );

    // once the entry is refreshed, hits are fresh again
    let mut fresh_seen = false;
    for _ in 0..200 {
        let mut context = ExchangeContext::new();
        let result = client
            .execute(get("http://example.com/a"), &mut context)
            .await
            .unwrap();
        if context.cache_response_status()
            == Some(CacheResponseStatus::CacheHit)
            && !warning_codes(&result).contains(&110)
        {
            assert_eq!(body_text(&result), "A");
            fresh_seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(fresh_seen, "entry was never refreshed in the background");
}

#[tokio::test]
async fn disabled_workers_fall_back_to_synchronous_revalidation() {
    let config =
        CacheConfig { asynchronous_workers_max: 0, ..Default::default() };
    let (client, backend) = make_client(config);
    backend.push_response(response(
        200,
        &[
            ("date", &http_date(-120)),
            (
                "cache-control",
                "max-age=60, stale-while-revalidate=600",
            ),
            ("etag", "\"a1\""),
        ],
        "A",
    ));
    backend.push_response(response(
        304,
        &[("date", &http_date(0)), ("cache-control", "max-age=60")],
        "",
    ));

    let mut context = ExchangeContext::new();
    client.execute(get("http://example.com/a"), &mut context).await.unwrap();

    let mut context = ExchangeContext::new();
    let result =
        client.execute(get("http://example.com/a"), &mut context).await.unwrap();
    assert_eq!(
        context.cache_response_status(),
        Some(CacheResponseStatus::Validated)
    );
    assert_eq!(body_text(&result), "A");
    assert!(!warning_codes(&result).contains(&110));
    assert_eq!(backend.request_count(), 2);
}
