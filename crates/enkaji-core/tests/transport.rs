//! Session-aware transport: refresh, replay and coalescing against a mock
//! backend.

mod common;

use std::time::Duration;

use common::Harness;
use enkaji_core::{
    ApiError, ApiRequest, AuthError, Credential, PaginationParams, Resource, SessionStatus,
    SnapshotStorage, REDIRECT_KEY,
};
use futures::future::join_all;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

async fn mount_orders(harness: &Harness) {
    Mock::given(method("GET"))
        .and(path("/admin/orders"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/orders"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "total": 0})))
        .mount(&harness.server)
        .await;
}

#[tokio::test]
async fn test_expired_session_is_refreshed_and_call_replayed() {
    let harness = Harness::signed_in("T1").await;

    Mock::given(method("GET"))
        .and(path("/admin/dashboard/stats"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/dashboard/stats"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"totalUsers": 12, "totalOrders": 40})),
        )
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T2"})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let stats = harness.console.admin().dashboard_stats().await.unwrap();

    assert_eq!(stats.total_users, 12);
    assert_eq!(stats.total_orders, 40);
    assert_eq!(
        harness.console.session().credential(),
        Some(&Credential::bearer("T2"))
    );
    assert_eq!(harness.persisted_credential(), Some(Credential::bearer("T2")));
}

#[tokio::test]
async fn test_request_is_sent_at_most_twice() {
    let harness = Harness::signed_in("T1").await;

    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T2"})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let err = harness
        .console
        .transport()
        .get::<Value>("/admin/users")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized));
    // The refresh itself worked, so the session stays
    assert_eq!(harness.console.session().status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn test_failed_refresh_signs_out_and_records_intended_path() {
    let harness = Harness::signed_in("T1").await;
    harness.console.guard().visit("/orders?page=2");

    Mock::given(method("GET"))
        .and(path("/admin/orders"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&harness.server)
        .await;

    let err = harness
        .console
        .admin()
        .list(Resource::Orders, &PaginationParams::default())
        .await
        .unwrap_err();

    match err {
        ApiError::SessionExpired(AuthError::RefreshFailed(_)) => {}
        other => panic!("Expected SessionExpired(RefreshFailed), got: {:?}", other),
    }
    assert_eq!(harness.console.session().status(), SessionStatus::Unauthenticated);
    assert_eq!(harness.console.navigator().current(), "/login");
    assert_eq!(
        harness.storage.read(REDIRECT_KEY).unwrap().as_deref(),
        Some("/orders?page=2")
    );
    assert!(harness.persisted_credential().is_none());
}

#[tokio::test]
async fn test_concurrent_auth_failures_share_one_refresh() {
    let harness = Harness::signed_in("T1").await;
    mount_orders(&harness).await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "T2"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let transport = harness.console.transport();
    let calls = (0..5).map(|_| transport.get::<Value>("/admin/orders"));
    let results = join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()), "results: {:?}", results);
    assert_eq!(
        harness.console.session().credential(),
        Some(&Credential::bearer("T2"))
    );
}

#[tokio::test]
async fn test_concurrent_auth_failures_fail_together() {
    let harness = Harness::signed_in("T1").await;
    Mock::given(method("GET"))
        .and(path("/admin/orders"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(403).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&harness.server)
        .await;

    let transport = harness.console.transport();
    let calls = (0..3).map(|_| transport.get::<Value>("/admin/orders"));
    let results = join_all(calls).await;

    assert!(results
        .iter()
        .all(|r| matches!(r, Err(ApiError::SessionExpired(_)))));
    assert_eq!(harness.console.session().status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_late_auth_failure_reports_refresh_error() {
    let harness = Harness::signed_in("T1").await;
    Mock::given(method("GET"))
        .and(path("/admin/orders"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&harness.server)
        .await;
    // Arrives well after the refresh below has failed and signed out
    Mock::given(method("GET"))
        .and(path("/admin/products"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(500)))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&harness.server)
        .await;

    let transport = harness.console.transport();
    let (early, late) = tokio::join!(
        transport.get::<Value>("/admin/orders"),
        transport.get::<Value>("/admin/products"),
    );

    for result in [early, late] {
        match result {
            Err(ApiError::SessionExpired(AuthError::RefreshFailed(_))) => {}
            other => panic!("Expected SessionExpired(RefreshFailed), got: {:?}", other),
        }
    }
    assert_eq!(harness.console.session().status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn test_spawned_requests_share_one_refresh() {
    let harness = Harness::signed_in("T1").await;
    mount_orders(&harness).await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "T2"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let transport = harness.console.transport().clone();
        handles.push(tokio::spawn(async move {
            transport.get::<Value>("/admin/orders").await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}

#[tokio::test]
async fn test_non_auth_failures_pass_through() {
    let harness = Harness::signed_in("T1").await;

    Mock::given(method("GET"))
        .and(path("/admin/products"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/reviews/r1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    let admin = harness.console.admin();
    let err = admin
        .list(Resource::Products, &PaginationParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ServerError(ref body) if body == "database down"));

    let err = admin.get(Resource::Reviews, "r1").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    assert_eq!(harness.console.session().status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn test_replay_sends_identical_body_and_headers() {
    let harness = Harness::signed_in("T1").await;
    let body = json!({"status": "shipped"});

    Mock::given(method("PUT"))
        .and(path("/admin/orders/o-7/status"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/admin/orders/o-7/status"))
        .and(header("authorization", "Bearer T2"))
        .and(header("x-request-source", "console"))
        .and(query_param("notify", "true"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "o-7", "status": "shipped"})))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T2"})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let request = ApiRequest::put("/admin/orders/o-7/status", &body)
        .unwrap()
        .with_query(vec![("notify".to_string(), "true".to_string())])
        .with_header("x-request-source", "console");
    let order: Value = harness.console.transport().send(request).await.unwrap();

    assert_eq!(order["status"], "shipped");
}

#[tokio::test]
async fn test_cookie_refresh_keeps_session() {
    let harness = Harness::signed_in("T1").await;

    Mock::given(method("DELETE"))
        .and(path("/admin/products/p-1"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(1)
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/admin/products/p-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.server)
        .await;

    harness
        .console
        .admin()
        .delete(Resource::Products, "p-1")
        .await
        .unwrap();

    assert_eq!(harness.console.session().credential(), Some(&Credential::Cookie));
    assert_eq!(harness.persisted_credential(), Some(Credential::Cookie));
}

#[tokio::test]
async fn test_list_sends_pagination_query() {
    let harness = Harness::signed_in("T1").await;

    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .and(query_param("page", "2"))
        .and(query_param("search", "wanjiru"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "u-1"}],
            "total": 11,
            "page": 2,
            "limit": 10,
            "totalPages": 2
        })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let params = PaginationParams {
        page: Some(2),
        search: Some("wanjiru".to_string()),
        ..Default::default()
    };
    let page = harness
        .console
        .admin()
        .list(Resource::Users, &params)
        .await
        .unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.total, 11);
}

#[tokio::test]
async fn test_update_order_status_puts_new_status() {
    let harness = Harness::signed_in("T1").await;

    Mock::given(method("PUT"))
        .and(path("/admin/orders/o-7/status"))
        .and(header("authorization", "Bearer T1"))
        .and(body_json(json!({"status": "shipped"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "o-7", "status": "shipped"})),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let order = harness
        .console
        .admin()
        .update_order_status("o-7", "shipped")
        .await
        .unwrap();

    assert_eq!(order["status"], "shipped");
}

#[tokio::test]
async fn test_create_and_update_send_partial_records() {
    let harness = Harness::signed_in("T1").await;

    Mock::given(method("POST"))
        .and(path("/admin/products"))
        .and(body_json(json!({"name": "Kiondo basket", "price": 45})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"_id": "p-9", "name": "Kiondo basket"})),
        )
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/admin/users/u-3"))
        .and(body_json(json!({"isAdmin": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u-3", "isAdmin": true})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let admin = harness.console.admin();
    let created = admin
        .create(Resource::Products, &json!({"name": "Kiondo basket", "price": 45}))
        .await
        .unwrap();
    let updated = admin
        .update(Resource::Users, "u-3", &json!({"isAdmin": true}))
        .await
        .unwrap();

    assert_eq!(created["_id"], "p-9");
    assert_eq!(updated["isAdmin"], true);
}

#[tokio::test]
async fn test_analytics_calls_send_their_query() {
    let harness = Harness::signed_in("T1").await;

    Mock::given(method("GET"))
        .and(path("/admin/analytics/sales"))
        .and(query_param("period", "month"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"date": "2026-09", "total": 1200}])))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/analytics/top-products"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&harness.server)
        .await;

    let admin = harness.console.admin();
    let sales = admin.sales_data("month").await.unwrap();
    let top = admin.top_products(5).await.unwrap();

    assert_eq!(sales[0]["total"], 1200);
    assert_eq!(top, json!([]));
}
