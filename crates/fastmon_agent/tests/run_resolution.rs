//! Run lookup and creation against the catalog.

use fastmon_agent::runs::get_or_create_run;
use fastmon_agent::{CatalogError, Method};
use fastmon_protocol::RecordId;
use fastmon_test_utils::MockCatalog;

#[tokio::test]
async fn test_existing_run_from_results_wrapper() {
    let catalog = MockCatalog::new().with_run(42, 7);

    let run = get_or_create_run(&catalog, 42).await.unwrap();

    assert_eq!(run.run_id, RecordId::Int(7));
    assert_eq!(run.run_number, Some(42));
    assert_eq!(catalog.count(Method::Post, "/runs/"), 0);
}

#[tokio::test]
async fn test_existing_run_from_bare_list() {
    let catalog = MockCatalog::new()
        .with_run(42, "run-uuid")
        .with_bare_list();

    let run = get_or_create_run(&catalog, 42).await.unwrap();

    assert_eq!(run.run_id, RecordId::from("run-uuid"));
    assert_eq!(catalog.count(Method::Post, "/runs/"), 0);
}

#[tokio::test]
async fn test_first_of_many_runs() {
    let catalog = MockCatalog::new().with_run(42, 7).with_run(42, 8);

    let run = get_or_create_run(&catalog, 42).await.unwrap();

    assert_eq!(run.run_id, RecordId::Int(7));
}

#[tokio::test]
async fn test_missing_run_is_created_once() {
    let catalog = MockCatalog::new();

    let created = get_or_create_run(&catalog, 100).await.unwrap();
    let again = get_or_create_run(&catalog, 100).await.unwrap();

    assert_eq!(created.run_id, again.run_id);
    assert_eq!(catalog.count(Method::Post, "/runs/"), 1);

    let post = &catalog.calls_to(Method::Post, "/runs/")[0];
    let body = post.body.as_ref().unwrap();
    assert_eq!(body["run_number"], 100);
    assert_eq!(body["run_conditions"]["auto_created"], true);
    assert!(body["start_time"].is_string());
}

#[tokio::test]
async fn test_lookup_failure_propagates() {
    let catalog = MockCatalog::new().fail_on(Method::Get, "/runs/");

    let err = get_or_create_run(&catalog, 1).await.unwrap_err();

    assert!(matches!(err, CatalogError::Status { status: 500, .. }));
    assert_eq!(catalog.count(Method::Post, "/runs/"), 0, "no retry, no create");
}

#[tokio::test]
async fn test_create_failure_propagates() {
    let catalog = MockCatalog::new().fail_on(Method::Post, "/runs/");

    let result = get_or_create_run(&catalog, 1).await;

    assert!(result.is_err());
    assert_eq!(catalog.count(Method::Get, "/runs/"), 1);
}
