use std::time::Duration;

use n0_future::{StreamExt, pin};
use serde_json::json;

use super::*;
use crate::remote::{MemorySource, RecordedRequest};

fn creds(database_id: &str) -> Credentials {
    Credentials {
        database_id: database_id.into(),
        token: "secret".into(),
    }
}

fn paginator(source: MemorySource) -> RemotePaginator<MemorySource> {
    RemotePaginator::new(source, RetryPolicy::new(Duration::from_millis(333)))
}

fn paragraph(id: &str) -> Block {
    Block::new(id, "paragraph", json!({ "rich_text": [] }))
}

async fn collect_rows(
    paginator: &RemotePaginator<MemorySource>,
    query: RowQuery,
) -> Result<Vec<Row>, RemoteError> {
    paginator
        .fetch_rows(&creds("db"), &query)
        .try_collect()
        .await
}

#[tokio::test]
async fn test_fetch_all_rows_across_pages() {
    let paginator = paginator(MemorySource::new().with_generated_rows("db", "row", 250));

    let rows = collect_rows(&paginator, RowQuery::default()).await.unwrap();

    assert_eq!(rows.len(), 250);
    assert_eq!(rows[0].id, "row-0");
    assert_eq!(rows[249].id, "row-249");
    let requests = paginator.source().requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests[2],
        RecordedRequest::QueryDatabase {
            database_id: "db".into(),
            page_size: 100,
            cursor: Some("200".into()),
        }
    );
}

#[tokio::test]
async fn test_cap_issues_only_needed_requests() {
    let paginator = paginator(MemorySource::new().with_generated_rows("db", "row", 5));

    let rows = collect_rows(
        &paginator,
        RowQuery {
            take_only: Some(2),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(
        rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        ["row-0", "row-1"]
    );
    assert_eq!(
        paginator.source().requests(),
        [RecordedRequest::QueryDatabase {
            database_id: "db".into(),
            page_size: 2,
            cursor: None,
        }]
    );
}

#[tokio::test]
async fn test_cap_spanning_pages_shrinks_last_page() {
    let paginator = paginator(MemorySource::new().with_generated_rows("db", "row", 300));

    let rows = collect_rows(
        &paginator,
        RowQuery {
            take_only: Some(150),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(rows.len(), 150);
    let sizes: Vec<_> = paginator
        .source()
        .requests()
        .into_iter()
        .map(|r| match r {
            RecordedRequest::QueryDatabase { page_size, .. } => page_size,
            other => panic!("unexpected request {other:?}"),
        })
        .collect();
    assert_eq!(sizes, [100, 50]);
}

#[tokio::test]
async fn test_cap_larger_than_source() {
    let paginator = paginator(MemorySource::new().with_generated_rows("db", "row", 3));

    let rows = collect_rows(
        &paginator,
        RowQuery {
            take_only: Some(10),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(paginator.source().request_count(), 1);
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let paginator = paginator(MemorySource::new().with_generated_rows("db", "row", 250));

    let rows = paginator.fetch_rows(&creds("db"), &RowQuery::default());
    assert_eq!(paginator.source().request_count(), 0);

    pin!(rows);
    let first = rows.next().await.unwrap().unwrap();
    assert_eq!(first.id, "row-0");
    assert_eq!(paginator.source().request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_page_is_retried() {
    let source = MemorySource::new().with_generated_rows("db", "row", 2);
    source.fail_next(RemoteError::RateLimited);
    source.fail_next(RemoteError::RateLimited);
    let paginator = paginator(source);
    let start = tokio::time::Instant::now();

    let rows = collect_rows(&paginator, RowQuery::default()).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(paginator.source().request_count(), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(666), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(999), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_hard_error_aborts_stream() {
    let source = MemorySource::new().with_generated_rows("db", "row", 2);
    source.fail_next(RemoteError::from_response(
        401,
        r#"{"code":"unauthorized","message":"API token is invalid."}"#,
    ));
    let paginator = paginator(source);

    let err = collect_rows(&paginator, RowQuery::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "content source returned 401: API token is invalid.");
    assert_eq!(paginator.source().request_count(), 1);
}

#[tokio::test]
async fn test_unknown_database() {
    let paginator = paginator(MemorySource::new());
    let err = paginator.fetch_database(&creds("nope")).await.unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_block_tree_attaches_children() {
    let toggle = Block {
        has_children: true,
        ..Block::new("toggle", "toggle", json!({ "rich_text": [] }))
    };
    let inner = Block {
        has_children: true,
        ..paragraph("inner")
    };
    let source = MemorySource::new()
        .with_children("page", vec![toggle, paragraph("after")])
        .with_children("toggle", vec![inner])
        .with_children("inner", vec![paragraph("leaf")]);
    let paginator = paginator(source);

    let tree = paginator.fetch_block_tree("page", "secret").await.unwrap();

    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0].children[0].id, "inner");
    assert_eq!(tree[0].children[0].children[0].id, "leaf");
    assert!(tree[1].children.is_empty());
    // leaves are never asked for children
    assert_eq!(paginator.source().request_count(), 3);
}
