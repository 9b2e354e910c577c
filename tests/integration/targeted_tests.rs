//! Integration tests for targeted fetch and repair modes

mod common;

use common::{page_html, stored_post, test_config, CHANNEL};
use event_harvester::crawler::{Coordinator, Mode, StopReason};
use event_harvester::storage::{RunStatus, SqliteStorage, Storage};
use event_harvester::MissingStatus;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_post(mock_server: &MockServer, id: i64, response: ResponseTemplate, calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/{}", CHANNEL, id)))
        .and(query_param("embed", "1"))
        .respond_with(response)
        .expect(calls)
        .mount(mock_server)
        .await;
}

fn post_page(id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(page_html(CHANNEL, &[id]))
}

fn seeded_storage(db_path: &str, ids: &[i64]) -> SqliteStorage {
    let mut storage = SqliteStorage::new(Path::new(db_path)).unwrap();
    for id in ids {
        storage.insert_post_if_absent(&stored_post(*id)).unwrap();
    }
    storage
}

#[tokio::test]
async fn test_failing_id_does_not_abort_batch() {
    let mock_server = MockServer::start().await;
    mount_post(&mock_server, 101, post_page(101), 1).await;
    mount_post(&mock_server, 102, ResponseTemplate::new(500), 3).await;
    mount_post(&mock_server, 103, post_page(103), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    let mut coordinator = Coordinator::new(config).unwrap();
    let outcome = coordinator
        .run(Mode::TargetedFetch {
            ids: vec![101, 102, 103],
        })
        .await
        .unwrap();

    assert_eq!(outcome.reason, StopReason::Completed);
    assert_eq!(outcome.progress.inserted_posts, 2);
    assert_eq!(outcome.progress.missing_recorded, 1);

    let storage = coordinator.storage();
    assert!(storage.get_post(CHANNEL, 101).unwrap().is_some());
    assert!(storage.get_post(CHANNEL, 102).unwrap().is_none());
    assert!(storage.get_post(CHANNEL, 103).unwrap().is_some());

    let missing = storage.get_missing(CHANNEL, 102).unwrap().unwrap();
    assert_eq!(missing.status, MissingStatus::Error);
    assert_eq!(missing.tries, 1);
    assert!(missing
        .note
        .unwrap()
        .contains("gave up after 3 attempts"));
}

#[tokio::test]
async fn test_client_errors_map_to_ledger_statuses() {
    let mock_server = MockServer::start().await;
    mount_post(&mock_server, 201, ResponseTemplate::new(404), 1).await;
    mount_post(&mock_server, 202, ResponseTemplate::new(403), 1).await;
    mount_post(&mock_server, 203, ResponseTemplate::new(410), 1).await;
    // The page comes back but holds a different post
    mount_post(&mock_server, 204, post_page(999), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    let mut coordinator = Coordinator::new(config).unwrap();
    let outcome = coordinator
        .run(Mode::TargetedFetch {
            ids: vec![201, 202, 203, 204],
        })
        .await
        .unwrap();

    assert_eq!(outcome.reason, StopReason::Completed);
    assert_eq!(outcome.progress.missing_recorded, 4);

    let storage = coordinator.storage();
    let record = |id| storage.get_missing(CHANNEL, id).unwrap().unwrap();

    assert_eq!(record(201).status, MissingStatus::NotFound);
    assert_eq!(record(201).note.as_deref(), Some("HTTP 404"));
    assert_eq!(record(202).status, MissingStatus::Forbidden);
    assert_eq!(record(203).status, MissingStatus::HttpError);
    assert_eq!(record(203).note.as_deref(), Some("HTTP 410"));
    assert_eq!(record(204).status, MissingStatus::NotFound);
    assert_eq!(
        record(204).note.as_deref(),
        Some("no message markup for this id")
    );
    assert_eq!(storage.count_posts(CHANNEL).unwrap(), 0);
}

#[tokio::test]
async fn test_stored_and_duplicate_ids_are_skipped() {
    let mock_server = MockServer::start().await;
    mount_post(&mock_server, 301, post_page(301), 0).await;
    mount_post(&mock_server, 302, post_page(302), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());
    let storage = seeded_storage(&config.output.database_path, &[301]);

    let mut coordinator = Coordinator::with_storage(config, Box::new(storage)).unwrap();
    let outcome = coordinator
        .run(Mode::TargetedFetch {
            ids: vec![301, 302, 301, 302],
        })
        .await
        .unwrap();

    assert_eq!(outcome.progress.processed_posts, 1);
    assert_eq!(outcome.progress.inserted_posts, 1);
    assert_eq!(coordinator.storage().count_posts(CHANNEL).unwrap(), 2);
}

#[tokio::test]
async fn test_repeated_failure_increments_tries() {
    let mock_server = MockServer::start().await;
    mount_post(&mock_server, 401, ResponseTemplate::new(403), 2).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    let mut coordinator = Coordinator::new(config).unwrap();
    for _ in 0..2 {
        coordinator
            .run(Mode::TargetedFetch { ids: vec![401] })
            .await
            .unwrap();
    }

    let missing = coordinator.storage().get_missing(CHANNEL, 401).unwrap().unwrap();
    assert_eq!(missing.status, MissingStatus::Forbidden);
    assert_eq!(missing.tries, 2);
}

#[tokio::test]
async fn test_cancellation_during_backoff_records_nothing() {
    let mock_server = MockServer::start().await;
    mount_post(&mock_server, 501, ResponseTemplate::new(503), 1).await;
    mount_post(&mock_server, 502, post_page(502), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&mock_server.uri(), dir.path());
    config.fetcher.max_tries = 5;
    config.fetcher.base_sleep_ms = 30_000;
    config.fetcher.max_sleep_ms = 30_000;

    let token = CancellationToken::new();
    let mut coordinator = Coordinator::new(config)
        .unwrap()
        .with_cancellation(token.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        coordinator.run(Mode::TargetedFetch {
            ids: vec![501, 502],
        }),
    )
    .await
    .expect("cancellation interrupts the backoff sleep")
    .unwrap();

    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(outcome.progress.missing_recorded, 0);

    let storage = coordinator.storage();
    assert!(storage.get_missing(CHANNEL, 501).unwrap().is_none());
    let run = storage.get_latest_run(CHANNEL).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_events_jsonl_failure_does_not_mark_post_missing() {
    let mock_server = MockServer::start().await;
    mount_post(&mock_server, 10, post_page(10), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&mock_server.uri(), dir.path());
    // Every write to /dev/full fails with ENOSPC
    config.output.events_jsonl_path = Some("/dev/full".to_string());

    let mut coordinator = Coordinator::new(config).unwrap();
    let outcome = coordinator
        .run(Mode::TargetedFetch { ids: vec![10] })
        .await
        .unwrap();

    assert_eq!(outcome.progress.inserted_posts, 1);
    assert_eq!(outcome.progress.inserted_events, 1);
    assert_eq!(outcome.progress.missing_recorded, 0);

    let storage = coordinator.storage();
    assert_eq!(storage.count_events(CHANNEL).unwrap(), 1);
    assert!(storage.get_missing(CHANNEL, 10).unwrap().is_none());
}

#[tokio::test]
async fn test_repair_on_empty_store_is_noop() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());

    let mut coordinator = Coordinator::new(config).unwrap();
    let outcome = coordinator.run(Mode::Repair { limit: 120 }).await.unwrap();

    assert_eq!(outcome.reason, StopReason::NothingToRepair);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repair_without_gaps_is_noop() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());
    let storage = seeded_storage(&config.output.database_path, &[1, 2, 3]);

    let mut coordinator = Coordinator::with_storage(config, Box::new(storage)).unwrap();
    let outcome = coordinator.run(Mode::Repair { limit: 120 }).await.unwrap();

    assert_eq!(outcome.reason, StopReason::NothingToRepair);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repair_fills_gap() {
    let mock_server = MockServer::start().await;
    mount_post(&mock_server, 12, post_page(12), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());
    let storage = seeded_storage(&config.output.database_path, &[10, 11, 13, 14]);

    let mut coordinator = Coordinator::with_storage(config, Box::new(storage)).unwrap();
    let outcome = coordinator.run(Mode::Repair { limit: 120 }).await.unwrap();

    assert_eq!(outcome.reason, StopReason::Completed);
    assert_eq!(outcome.progress.inserted_posts, 1);

    let storage = coordinator.storage();
    assert!(storage.get_post(CHANNEL, 12).unwrap().is_some());
    assert!(storage
        .missing_ids_in_range(CHANNEL, 10, 14, 120)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_repair_skips_ids_known_not_found() {
    let mock_server = MockServer::start().await;
    mount_post(&mock_server, 12, ResponseTemplate::new(404), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());
    let storage = seeded_storage(&config.output.database_path, &[10, 11, 13, 14]);

    let mut coordinator = Coordinator::with_storage(config, Box::new(storage)).unwrap();
    let first = coordinator.run(Mode::Repair { limit: 120 }).await.unwrap();
    assert_eq!(first.reason, StopReason::Completed);
    assert_eq!(first.progress.missing_recorded, 1);

    let second = coordinator.run(Mode::Repair { limit: 120 }).await.unwrap();
    assert_eq!(second.reason, StopReason::NothingToRepair);
}

#[tokio::test]
async fn test_repair_respects_limit() {
    let mock_server = MockServer::start().await;
    mount_post(&mock_server, 2, post_page(2), 1).await;
    mount_post(&mock_server, 3, post_page(3), 1).await;
    mount_post(&mock_server, 4, post_page(4), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), dir.path());
    let storage = seeded_storage(&config.output.database_path, &[1, 5]);

    let mut coordinator = Coordinator::with_storage(config, Box::new(storage)).unwrap();
    let outcome = coordinator.run(Mode::Repair { limit: 2 }).await.unwrap();

    assert_eq!(outcome.progress.inserted_posts, 2);
    assert_eq!(
        coordinator
            .storage()
            .missing_ids_in_range(CHANNEL, 1, 5, 10)
            .unwrap(),
        vec![4]
    );
}
