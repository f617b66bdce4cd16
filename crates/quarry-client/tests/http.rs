//! HTTP backend against a loopback catalog server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use quarry_client::{CatalogClient, HttpBackend, MemoryCatalog, SearchExpectation};
use quarry_core::prelude::*;
use quarry_test_utils::{
    AssetFactory, CatalogServer, FaultConfig, FlakyBackend, Operation, assert_deleted_with,
    assert_partition, created,
};

async fn serve(catalog: MemoryCatalog) -> (CatalogServer, CatalogClient<HttpBackend>) {
    let server = CatalogServer::start(Arc::new(catalog)).await.unwrap();
    let client = CatalogClient::connect(server.client_config()).unwrap();
    (server, client)
}

#[tokio::test]
async fn lifecycle_over_http() {
    let (_server, client) = serve(MemoryCatalog::new()).await;

    let connection = created(
        client
            .create(Asset::connection("warehouse", "snowflake").unwrap())
            .await
            .unwrap(),
    );
    let database = created(
        client
            .create(Asset::child(AssetKind::Database, "sales", &connection.to_ref()).unwrap())
            .await
            .unwrap(),
    );
    let schema = created(
        client
            .create(Asset::child(AssetKind::Schema, "raw", &database.to_ref()).unwrap())
            .await
            .unwrap(),
    );

    let orders = AssetFactory::table(&schema.to_ref(), "orders");
    let customers =
        AssetFactory::table(&schema.to_ref(), "customers").with_related(orders.to_ref());
    let response = client
        .create_all(vec![orders.clone(), customers.clone()])
        .await
        .unwrap();
    assert_partition(&response, 2, 1, 0);
    let guid = response.assigned_guid(&customers.qualified_name).unwrap();

    let deleted = client.delete(&[guid]).await.unwrap();
    assert_deleted_with(&deleted, DeleteHandler::Soft);

    let request =
        SearchRequest::new().with_filter(Filter::QualifiedName(customers.qualified_name.clone()));
    client
        .wait_for_search(&request, SearchExpectation::all_deleted(1))
        .await
        .unwrap()
        .ensure_satisfied()
        .unwrap();

    assert!(client.restore("Table", &customers.qualified_name).await.unwrap());
    client.delete(&[guid]).await.unwrap();

    let purged = client.purge(&[guid]).await.unwrap();
    assert_deleted_with(&purged, DeleteHandler::Purge);
    assert!(client.get(guid, true).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn errors_map_back_to_the_taxonomy() {
    let (_server, client) = serve(MemoryCatalog::new()).await;
    client
        .create(Asset::glossary("terms").unwrap())
        .await
        .unwrap();

    let err = client
        .create(Asset::glossary("terms").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }), "{err:?}");

    let err = client.get(Guid::generate(), false).await.unwrap_err();
    assert!(err.is_not_found());

    let missing = QualifiedName::new("glossary/none").unwrap();
    let err = client
        .update("Glossary", &missing, AssetUpdate::new().custom_attribute("k", "v"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    assert!(!client.restore("Glossary", &missing).await.unwrap());
}

#[tokio::test]
async fn get_honors_complete_flag() {
    let (_server, client) = serve(MemoryCatalog::new()).await;
    let connection = created(
        client
            .create(Asset::connection("lake", "s3").unwrap())
            .await
            .unwrap(),
    );
    let database = created(
        client
            .create(Asset::child(AssetKind::Database, "bronze", &connection.to_ref()).unwrap())
            .await
            .unwrap(),
    );

    let stub = client
        .get_by_qualified_name("Database", &database.qualified_name, false)
        .await
        .unwrap();
    assert!(stub.parent.is_none());
    let full = client
        .get_by_qualified_name("Database", &database.qualified_name, true)
        .await
        .unwrap();
    assert_eq!(full.parent.and_then(|p| p.guid), connection.guid);
}

#[tokio::test]
async fn transient_auth_code_survives_the_wire() {
    let flaky = Arc::new(FlakyBackend::new(
        MemoryCatalog::new(),
        FaultConfig {
            transient_auth_failures: 2,
            ..Default::default()
        },
    ));
    let server = CatalogServer::start(flaky.clone()).await.unwrap();
    let client = CatalogClient::connect(server.client_config()).unwrap();

    let response = client
        .create(Asset::glossary("eventually").unwrap())
        .await
        .unwrap();
    assert_eq!(response.created_assets().len(), 1);
    assert_eq!(flaky.count(Operation::Create), 3);
}

#[tokio::test]
async fn unconfigured_code_is_a_permission_error() {
    let flaky = Arc::new(FlakyBackend::new(
        MemoryCatalog::new(),
        FaultConfig {
            transient_auth_failures: 1,
            transient_auth_code: Some("ATLAS-403-99-999".into()),
            ..Default::default()
        },
    ));
    let server = CatalogServer::start(flaky.clone()).await.unwrap();
    let client = CatalogClient::connect(server.client_config()).unwrap();

    let err = client
        .create(Asset::glossary("denied").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Permission { .. }), "{err:?}");
    assert_eq!(flaky.count(Operation::Create), 1);
}

#[tokio::test]
async fn audit_search_over_http() {
    let (_server, client) = serve(MemoryCatalog::new().with_index_lag(2)).await;
    let glossary = created(
        client
            .create(Asset::glossary("audited").unwrap())
            .await
            .unwrap(),
    );
    let guid = glossary.guid.unwrap();
    client.delete(&[guid]).await.unwrap();

    let trail = client
        .wait_for_audit(
            &AuditSearchRequest::for_guid(guid).with_action(AuditAction::EntityDelete),
            1,
        )
        .await
        .unwrap();
    assert!(trail.satisfied);
    assert!(trail.attempts >= 2);
    assert_eq!(trail.response.entries[0].guid, guid);
}

#[tokio::test]
async fn unreadable_error_body_still_maps_by_status() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await.unwrap();
        // Promises more body than it sends, then hangs up.
        socket
            .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 64\r\n\r\n{\"err")
            .await
            .unwrap();
    });

    let config = quarry_test_utils::fast_config().with_base_url(format!("http://{addr}"));
    let client = CatalogClient::connect(config).unwrap();
    let err = client.get(Guid::generate(), false).await.unwrap_err();
    assert!(
        matches!(&err, Error::Transport { message, .. } if message == "unexpected status 503: "),
        "got {err:?}"
    );
}
