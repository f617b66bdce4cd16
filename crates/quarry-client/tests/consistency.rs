//! Consistency waits and transient-failure retry through the client.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use quarry_client::{CatalogClient, MemoryCatalog, SearchExpectation};
use quarry_core::prelude::*;
use quarry_test_utils::{
    FaultConfig, FlakyBackend, Operation, TestContext, created, fast_config, init_test_logging,
};

fn by_type(type_name: &str) -> SearchRequest {
    SearchRequest::new().with_filter(Filter::TypeName(type_name.into()))
}

#[tokio::test]
async fn search_wait_counts_attempts_against_lag() {
    let ctx = TestContext::with_index_lag(3);
    ctx.client.create(ctx.glossary()).await.unwrap();

    let outcome = ctx
        .client
        .wait_for_search(&by_type("Glossary"), SearchExpectation::at_least(1))
        .await
        .unwrap();
    assert!(outcome.satisfied);
    assert_eq!(outcome.attempts, 4);
    assert_eq!(outcome.response.approximate_count, 1);
}

#[tokio::test]
async fn exhausted_budget_reports_last_observation() {
    init_test_logging();
    let ctx = TestContext::with_index_lag(1_000);
    ctx.client.create(ctx.glossary()).await.unwrap();

    let outcome = ctx
        .client
        .wait_for_search(&by_type("Glossary"), SearchExpectation::at_least(1))
        .await
        .unwrap();
    let budget = ctx.client.config().retry.budget.max_attempts();
    assert!(!outcome.satisfied);
    assert_eq!(outcome.attempts, budget);
    assert_eq!(outcome.observed(), "count 0");
    assert_eq!(outcome.expected(), "count >= 1");

    let err = outcome.ensure_satisfied().unwrap_err();
    assert!(err.to_string().contains("overran retry limit"));
}

#[tokio::test]
async fn audit_wait_sees_each_transition() {
    let ctx = TestContext::new();
    let glossary = created(ctx.client.create(ctx.glossary()).await.unwrap());
    let guid = glossary.guid.unwrap();
    ctx.client.delete(&[guid]).await.unwrap();
    ctx.client
        .restore("Glossary", &glossary.qualified_name)
        .await
        .unwrap();

    let trail = ctx
        .client
        .wait_for_audit(&AuditSearchRequest::for_guid(guid), 3)
        .await
        .unwrap()
        .ensure_satisfied()
        .unwrap();
    assert_eq!(trail.total_count, 3);
    assert_eq!(trail.count_of(AuditAction::EntityDelete), 1);
}

#[tokio::test]
async fn transient_auth_on_create_is_retried() {
    let backend = Arc::new(FlakyBackend::new(
        MemoryCatalog::new(),
        FaultConfig {
            transient_auth_failures: 3,
            ..Default::default()
        },
    ));
    let client = CatalogClient::new(Arc::clone(&backend), fast_config());

    let response = client
        .create(Asset::glossary("retried").unwrap())
        .await
        .unwrap();
    assert_eq!(response.created_assets().len(), 1);
    assert_eq!(backend.count(Operation::Create), 4);
    assert_eq!(backend.injected(Operation::Create), 3);
}

#[tokio::test]
async fn transient_auth_beyond_budget_surfaces() {
    let backend = Arc::new(FlakyBackend::new(
        MemoryCatalog::new(),
        FaultConfig {
            transient_auth_failures: 100,
            ..Default::default()
        },
    ));
    let config = fast_config();
    let budget = config.retry.budget.max_attempts();
    let client = CatalogClient::new(Arc::clone(&backend), config);

    let err = client
        .create(Asset::glossary("never").unwrap())
        .await
        .unwrap_err();
    assert!(err.is_transient_auth());
    assert_eq!(backend.count(Operation::Create), budget as usize);
    assert_eq!(backend.inner().stored_len().unwrap(), 0);
}

#[tokio::test]
async fn other_create_errors_are_not_retried() {
    let backend = Arc::new(FlakyBackend::new(MemoryCatalog::new(), FaultConfig::default()));
    let client = CatalogClient::new(Arc::clone(&backend), fast_config());
    client.create(Asset::glossary("once").unwrap()).await.unwrap();

    let err = client
        .create(Asset::glossary("once").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    assert_eq!(backend.count(Operation::Create), 2);
}

#[tokio::test]
async fn search_failures_propagate_from_wait() {
    let backend = Arc::new(FlakyBackend::new(
        MemoryCatalog::new(),
        FaultConfig {
            search_failure_rate: 1.0,
            ..Default::default()
        },
    ));
    let client = CatalogClient::new(Arc::clone(&backend), fast_config());

    let err = client
        .wait_for_search(&by_type("Glossary"), SearchExpectation::at_least(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    assert_eq!(backend.count(Operation::Search), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_wait() {
    let cancel = CancellationToken::new();
    let catalog = MemoryCatalog::new().with_index_lag(1_000);
    let config = fast_config().with_retry(
        RetryConfig::default()
            .with_budget(RetryBudget::new(50))
            .with_backoff(BackoffPolicy::new(
                Duration::from_secs(1),
                Duration::from_secs(1),
            )),
    );
    let client = CatalogClient::new(catalog, config).with_cancellation(cancel.clone());
    client.create(Asset::glossary("slow").unwrap()).await.unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        trigger.cancel();
    });

    let err = client
        .wait_for_search(&by_type("Glossary"), SearchExpectation::at_least(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled { attempts: 3 }));
}

#[tokio::test]
async fn concurrent_clients_keep_independent_budgets() {
    let small = fast_config()
        .with_retry(fast_config().retry.with_budget(RetryBudget::new(2)));
    let large = fast_config();

    let lagging = MemoryCatalog::new().with_index_lag(1_000);
    let a = CatalogClient::new(lagging.clone(), small);
    let b = CatalogClient::new(lagging, large);
    a.create(Asset::glossary("shared").unwrap()).await.unwrap();

    let request = by_type("Glossary");
    let (left, right) = tokio::join!(
        a.wait_for_search(&request, SearchExpectation::at_least(1)),
        b.wait_for_search(&request, SearchExpectation::at_least(1)),
    );
    assert_eq!(left.unwrap().attempts, 2);
    assert_eq!(right.unwrap().attempts, 10);
}

#[tokio::test]
async fn aggregations_are_read_from_a_satisfied_poll() {
    let ctx = TestContext::with_index_lag(2);
    let schema = ctx.schema_scope().await;
    let tables: Vec<Asset> = ["a", "b", "c"]
        .iter()
        .map(|name| quarry_test_utils::AssetFactory::table(&schema.to_ref(), name))
        .collect();
    ctx.client.create_all(tables).await.unwrap();

    let request = SearchRequest::new()
        .with_filter(Filter::WithinScope(schema.qualified_name.to_string()))
        .with_aggregation("types", AggregationField::TypeName);
    let response = ctx
        .client
        .wait_for_search(&request, SearchExpectation::at_least(4))
        .await
        .unwrap()
        .ensure_satisfied()
        .unwrap();

    let types = response.aggregation("types").unwrap();
    assert_eq!(types.count_of("Table"), 3);
    assert_eq!(types.count_of("Schema"), 1);
}

#[tokio::test]
async fn delete_wait_sees_active_matches_beyond_the_page() {
    let ctx = TestContext::new();
    let first = created(
        ctx.client
            .create(Asset::glossary(ctx.name("a")).unwrap())
            .await
            .unwrap(),
    );
    let second = created(
        ctx.client
            .create(Asset::glossary(ctx.name("b")).unwrap())
            .await
            .unwrap(),
    );
    ctx.client.delete(&[first.guid.unwrap()]).await.unwrap();
    ctx.catalog.refresh().unwrap();

    // The deleted glossary sorts first and fills the only slot on the page.
    let request = by_type("Glossary")
        .with_sort(SortField::Name, SortOrder::Asc)
        .with_page(0, 1);
    let outcome = ctx
        .client
        .wait_for_search(&request, SearchExpectation::none_active())
        .await
        .unwrap();
    assert!(!outcome.satisfied);
    assert_eq!(outcome.observed(), "count 2 with 1 active");
    assert_eq!(outcome.response.assets[0].guid, first.guid);

    ctx.client.delete(&[second.guid.unwrap()]).await.unwrap();
    let outcome = ctx
        .client
        .wait_for_search(&request, SearchExpectation::none_active())
        .await
        .unwrap();
    assert!(outcome.satisfied, "observed {}", outcome.observed());
}
