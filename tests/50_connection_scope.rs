mod common;

use std::time::Duration;

use serde_json::json;

use directory_repo::error::ResourceError;
use directory_repo::filter::QueryFilter;
use directory_repo::resource::{Context, CreateRequest, QueryRequest, ReadRequest, ResourceResponse};

use common::Harness;

async fn explode(_ctx: Context) -> Result<(), ResourceError> {
    panic!("handler failed")
}

async fn stall(_ctx: Context) -> Result<(), ResourceError> {
    std::future::pending().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_release_every_connection() {
    let h = Harness::new();
    let mut tasks = Vec::new();

    for i in 0..60 {
        let service = h.service.clone();
        let ctx = h.context().with_trace_id(format!("req-{}", i));
        tasks.push(tokio::spawn(async move {
            match i % 3 {
                0 => service
                    .handle_create(&ctx, CreateRequest::new("managed/user", json!({"n": i})).with_id(format!("u{}", i)))
                    .await
                    .map(|_| ()),
                1 => service
                    .handle_read(&ctx, ReadRequest::new(format!("managed/user/missing{}", i)))
                    .await
                    .map(|_| ()),
                _ => {
                    let request = QueryRequest::new("managed/user")
                        .with_query_id("query-all-ids")
                        .with_filter(QueryFilter::always_true());
                    service
                        .handle_query(&ctx, request, &mut |_: ResourceResponse| true)
                        .await
                        .map(|_| ())
                }
            }
        }));
    }

    let mut succeeded = 0;
    let mut not_found = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(e) if e.is_not_found() => not_found += 1,
            Err(e) => {
                assert_eq!(e.status_code(), 400);
                rejected += 1;
            }
        }
    }
    assert_eq!((succeeded, not_found, rejected), (20, 20, 20));

    let stats = h.stats();
    assert_eq!(stats.acquired(), 60);
    assert_eq!(stats.released(), 60);
    assert_eq!(stats.double_releases(), 0);
    assert_eq!(stats.open(), 0);
}

#[tokio::test]
async fn operations_see_a_bound_connection() {
    let h = Harness::new();
    let ctx = h.context().with_trace_id("trace-1");

    let (connection_id, trace_id) = h
        .service
        .with_connection_context(&ctx, |scoped| async move {
            let connection = scoped.connection().expect("connection bound");
            assert!(!connection.is_closed());
            Ok((connection.id().to_string(), scoped.trace_id().to_string()))
        })
        .await
        .unwrap();
    assert!(connection_id.starts_with("local-"));
    assert_eq!(trace_id, "trace-1");
    assert!(ctx.connection().is_none(), "caller context is left untouched");
    h.assert_connections_balanced();
}

#[tokio::test]
async fn acquisition_failure_stops_the_request() {
    let h = Harness::new();
    h.connections.fail_acquisitions(true);

    let err = h
        .service
        .handle_create(&h.context(), CreateRequest::new("managed/user", json!({})))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.stats().acquired(), 0);
    assert_eq!(h.stats().failed(), 1);

    h.connections.fail_acquisitions(false);
    h.service
        .handle_create(&h.context(), CreateRequest::new("managed/user", json!({})))
        .await
        .unwrap();
    h.assert_connections_balanced();
}

#[tokio::test]
async fn abandoned_requests_release_their_connection() {
    let h = Harness::new();
    let ctx = h.context();

    let outcome = tokio::time::timeout(Duration::from_millis(20), h.service.with_connection_context(&ctx, stall)).await;
    assert!(outcome.is_err(), "operation never completes");

    let stats = h.stats();
    assert_eq!(stats.acquired(), 1);
    assert_eq!(stats.released(), 1);
    assert_eq!(stats.double_releases(), 0);
}

#[tokio::test]
async fn panicking_handlers_release_their_connection() {
    let h = Harness::new();
    let service = h.service.clone();
    let ctx = h.context();

    let joined = tokio::spawn(async move { service.with_connection_context(&ctx, explode).await }).await;
    assert!(joined.unwrap_err().is_panic());

    h.assert_connections_balanced();
    assert_eq!(h.stats().acquired(), 1);
}
