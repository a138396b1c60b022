//! End-to-end tests for the purchase-order lifecycle: creation through
//! offer selection, dispatch, reception, and the accept/discrepancy fork,
//! including orchestrator retry semantics and audit coupling.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use common::{response_json, seed_order_with_offer, TestApp};
use gas_procurement_api::{
    commands::orders::ReportDiscrepancyCommand,
    errors::ServiceError,
    services::notifications::SupplierNotifier,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use serde_json::json;

#[tokio::test]
async fn full_happy_path_reaches_accepted() {
    let app = TestApp::new().await;
    let order_id = seed_order_with_offer(&app).await;

    let send = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/send", order_id),
            Some(json!({ "actor": "maria.lopez" })),
        )
        .await;
    assert_eq!(send.status(), 200);
    let body = response_json(send).await;
    assert_eq!(body["state"], "ORDEN_ENVIADA");
    assert_eq!(body["supplier"], "GasAndes S.A.");

    let receipt = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/receipt", order_id),
            Some(json!({ "actor": "pedro.silva", "received_quantity": 500 })),
        )
        .await;
    assert_eq!(receipt.status(), 200);
    let body = response_json(receipt).await;
    assert_eq!(body["state"], "PEDIDO_RECIBIDO");
    assert!(body["receipt_id"].as_str().unwrap().starts_with("REC-"));

    let accept = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/accept", order_id),
            Some(json!({ "actor": "ana.torres" })),
        )
        .await;
    assert_eq!(accept.status(), 200);
    let body = response_json(accept).await;
    assert_eq!(body["state"], "ACEPTADA");
    assert_eq!(body["ready_for_billing"], true);

    // Snapshot reflects the terminal state and the approver.
    let snapshot = app
        .request(
            Method::GET,
            &format!("/api/v1/purchase-orders/{}", order_id),
            None,
        )
        .await;
    let body = response_json(snapshot).await;
    assert_eq!(body["state"], "ACEPTADA");
    assert_eq!(body["approving_user"], "ana.torres");
    assert_eq!(body["received_quantity_kg"], 500);

    // Five lifecycle actions, newest first.
    let history = app
        .request(
            Method::GET,
            &format!("/api/v1/purchase-orders/{}/history", order_id),
            None,
        )
        .await;
    let entries = response_json(history).await;
    let actions: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        vec!["ACCEPTED", "RECEIVED", "SENT", "OFFER_SELECTED", "CREATED"]
    );
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(json!({
                "quantity_kg": 0,
                "justification": "",
                "actor": "maria.lopez"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn offer_with_non_positive_cost_is_rejected() {
    let app = TestApp::new().await;
    let create = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(json!({
                "quantity_kg": 100,
                "justification": "Test need",
                "actor": "maria.lopez"
            })),
        )
        .await;
    let order_id = response_json(create).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();

    let offer = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/offer", order_id),
            Some(json!({
                "supplier": "GasAndes S.A.",
                "quantity_kg": 100,
                "unit_cost": "0",
                "total_cost": "0",
                "delivery_days": 7,
                "actor": "maria.lopez"
            })),
        )
        .await;
    assert_eq!(offer.status(), 400);
}

#[tokio::test]
async fn send_without_offer_is_a_conflict() {
    let app = TestApp::new().await;
    let create = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(json!({
                "quantity_kg": 100,
                "justification": "Test need",
                "actor": "maria.lopez"
            })),
        )
        .await;
    let order_id = response_json(create).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();

    let send = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/send", order_id),
            Some(json!({ "actor": "maria.lopez" })),
        )
        .await;
    assert_eq!(send.status(), 409);
}

#[tokio::test]
async fn skipping_ahead_is_a_conflict() {
    let app = TestApp::new().await;
    let order_id = seed_order_with_offer(&app).await;

    // Receipt before dispatch.
    let receipt = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/receipt", order_id),
            Some(json!({ "actor": "pedro.silva" })),
        )
        .await;
    assert_eq!(receipt.status(), 409);

    // Acceptance straight from offer selection.
    let accept = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/accept", order_id),
            Some(json!({ "actor": "ana.torres" })),
        )
        .await;
    assert_eq!(accept.status(), 409);
}

#[tokio::test]
async fn retrying_a_step_is_idempotent() {
    let app = TestApp::new().await;
    let order_id = seed_order_with_offer(&app).await;

    for _ in 0..2 {
        let send = app
            .request(
                Method::POST,
                &format!("/api/v1/purchase-orders/{}/send", order_id),
                Some(json!({ "actor": "maria.lopez" })),
            )
            .await;
        assert_eq!(send.status(), 200);
    }

    let first = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/receipt", order_id),
            Some(json!({ "actor": "pedro.silva", "received_quantity": 500 })),
        )
        .await;
    assert_eq!(first.status(), 200);
    assert_eq!(response_json(first).await["already_received"], false);

    let retry = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/receipt", order_id),
            Some(json!({ "actor": "pedro.silva", "received_quantity": 500 })),
        )
        .await;
    assert_eq!(retry.status(), 200);
    assert_eq!(response_json(retry).await["already_received"], true);

    // Retries never duplicate audit entries: one SENT, one RECEIVED.
    let history = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/purchase-orders/{}/history", order_id),
            None,
        )
        .await,
    )
    .await;
    let sent = history
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["action"] == "SENT")
        .count();
    let received = history
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["action"] == "RECEIVED")
        .count();
    assert_eq!(sent, 1);
    assert_eq!(received, 1);
}

#[tokio::test]
async fn unknown_order_receipt_is_not_found_by_default() {
    let app = TestApp::new().await;
    let receipt = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders/OC-2026-DEADBEEF/receipt",
            Some(json!({ "actor": "pedro.silva" })),
        )
        .await;
    assert_eq!(receipt.status(), 404);
}

#[tokio::test]
async fn unknown_order_receipt_is_audited_under_synthetic_id_when_enabled() {
    let app = TestApp::with_synthetic_ids().await;
    let receipt = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders/OC-2026-DEADBEEF/receipt",
            Some(json!({ "actor": "pedro.silva", "received_quantity": 42 })),
        )
        .await;
    assert_eq!(receipt.status(), 200);
    let body = response_json(receipt).await;
    assert_eq!(body["synthetic"], true);
    let synthetic_id = body["order_id"].as_str().unwrap().to_string();
    assert!(synthetic_id.starts_with("ORD_"));

    // The trail exists under the synthetic id and is reachable through
    // the history endpoint; no order row was created.
    let history = app
        .request(
            Method::GET,
            &format!("/api/v1/purchase-orders/{}/history", synthetic_id),
            None,
        )
        .await;
    assert_eq!(history.status(), 200);
    let entries = response_json(history).await;
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["action"], "RECEIVED");

    let order = app
        .state
        .orders
        .store()
        .find_by_order_id(&synthetic_id)
        .await
        .unwrap();
    assert!(order.is_none());
}

#[tokio::test]
async fn discrepancy_branch_excludes_acceptance() {
    let app = TestApp::new().await;
    let order_id = seed_order_with_offer(&app).await;
    app.request(
        Method::POST,
        &format!("/api/v1/purchase-orders/{}/send", order_id),
        Some(json!({ "actor": "maria.lopez" })),
    )
    .await;
    app.request(
        Method::POST,
        &format!("/api/v1/purchase-orders/{}/receipt", order_id),
        Some(json!({ "actor": "pedro.silva", "received_quantity": 450 })),
    )
    .await;

    let report = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/discrepancy", order_id),
            Some(json!({
                "actor": "pedro.silva",
                "details": "Shipment 50 kg short",
                "kind": "QUANTITY"
            })),
        )
        .await;
    assert_eq!(report.status(), 200);
    let outcome = response_json(report).await;
    assert_eq!(outcome["success"], true);
    let ticket = outcome["ticket_id"].as_str().unwrap().to_string();
    assert!(ticket.starts_with("DISC-"));

    // The persisted state stays PEDIDO_RECIBIDO; the ticket lives in the
    // side attributes.
    let snapshot = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/purchase-orders/{}", order_id),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(snapshot["state"], "PEDIDO_RECIBIDO");
    assert_eq!(snapshot["discrepancy_status"], "NOTIFIED");
    assert_eq!(snapshot["discrepancy_ticket"].as_str().unwrap(), ticket);

    // Acceptance is now refused.
    let accept = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/accept", order_id),
            Some(json!({ "actor": "ana.torres" })),
        )
        .await;
    assert_eq!(accept.status(), 409);
}

#[tokio::test]
async fn discrepancy_report_never_fails_the_step() {
    let app = TestApp::new().await;

    // Unknown order: HTTP 200, failure carried in the payload.
    let report = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders/OC-2026-DEADBEEF/discrepancy",
            Some(json!({ "actor": "pedro.silva", "details": "missing" })),
        )
        .await;
    assert_eq!(report.status(), 200);
    let outcome = response_json(report).await;
    assert_eq!(outcome["success"], false);
    assert!(outcome["ticket_id"].is_null());
    assert!(outcome["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn discrepancy_on_an_accepted_order_does_not_mutate_it() {
    let app = TestApp::new().await;
    let order_id = seed_order_with_offer(&app).await;
    for (step, actor) in [
        ("send", "maria.lopez"),
        ("receipt", "pedro.silva"),
        ("accept", "ana.torres"),
    ] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/purchase-orders/{}/{}", order_id, step),
                Some(json!({ "actor": actor })),
            )
            .await;
        assert_eq!(response.status(), 200);
    }

    let report = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/discrepancy", order_id),
            Some(json!({ "actor": "pedro.silva", "details": "too late" })),
        )
        .await;
    assert_eq!(report.status(), 200);
    let outcome = response_json(report).await;
    assert_eq!(outcome["success"], false);
    assert!(outcome["ticket_id"].is_null());
    assert!(outcome["error"].as_str().unwrap().contains("already accepted"));

    // The accepted row is untouched: no ticket, no status, still billable.
    let snapshot = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/purchase-orders/{}", order_id),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(snapshot["state"], "ACEPTADA");
    assert!(snapshot["discrepancy_status"].is_null());
    assert!(snapshot["discrepancy_ticket"].is_null());
    assert_eq!(snapshot["ready_for_billing"], true);

    let notified = app
        .state
        .ledger
        .history_for_order_and_action(&order_id, "DISCREPANCY_NOTIFIED")
        .await
        .unwrap();
    assert!(notified.is_empty());
}

#[tokio::test]
async fn repeated_discrepancy_reuses_the_original_ticket() {
    let app = TestApp::new().await;
    let order_id = seed_order_with_offer(&app).await;
    app.request(
        Method::POST,
        &format!("/api/v1/purchase-orders/{}/send", order_id),
        Some(json!({ "actor": "maria.lopez" })),
    )
    .await;
    app.request(
        Method::POST,
        &format!("/api/v1/purchase-orders/{}/receipt", order_id),
        Some(json!({ "actor": "pedro.silva" })),
    )
    .await;

    let first = app
        .state
        .orders
        .report_discrepancy(ReportDiscrepancyCommand {
            order_id: order_id.clone(),
            actor: "pedro.silva".to_string(),
            details: "Damaged cylinders".to_string(),
            kind: Some("QUALITY".to_string()),
        })
        .await;
    let second = app
        .state
        .orders
        .report_discrepancy(ReportDiscrepancyCommand {
            order_id: order_id.clone(),
            actor: "pedro.silva".to_string(),
            details: "Damaged cylinders".to_string(),
            kind: Some("QUALITY".to_string()),
        })
        .await;

    assert!(first.success && second.success);
    assert_eq!(first.ticket_id, second.ticket_id);

    let notified = app
        .state
        .ledger
        .history_for_order_and_action(&order_id, "DISCREPANCY_NOTIFIED")
        .await
        .unwrap();
    assert_eq!(notified.len(), 1);
}

#[tokio::test]
async fn order_mutation_and_audit_commit_together() {
    let app = TestApp::new().await;
    let create = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(json!({
                "quantity_kg": 100,
                "justification": "Atomicity check",
                "actor": "maria.lopez"
            })),
        )
        .await;
    let order_id = response_json(create).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Break the ledger so the audit append inside the next transaction
    // fails after the order row was updated.
    app.state
        .db
        .execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "DROP TABLE audit_entries;".to_string(),
        ))
        .await
        .unwrap();

    let offer = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/offer", order_id),
            Some(json!({
                "supplier": "GasAndes S.A.",
                "quantity_kg": 100,
                "unit_cost": "120.50",
                "total_cost": "12050.00",
                "delivery_days": 7,
                "actor": "maria.lopez"
            })),
        )
        .await;
    assert_eq!(offer.status(), 500);

    // The whole transaction rolled back: state and supplier unchanged.
    let order = app
        .state
        .orders
        .store()
        .find_by_order_id(&order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.state.to_string(), "NECESIDAD_EVALUADA");
    assert!(order.supplier.is_none());
    assert_eq!(order.version, 0);
}

mockall::mock! {
    pub Notifier {}

    #[async_trait]
    impl SupplierNotifier for Notifier {
        async fn notify(
            &self,
            recipient: &str,
            subject: &str,
            body: &str,
        ) -> Result<(), ServiceError>;
    }
}

#[tokio::test]
async fn notification_failure_does_not_block_the_transition() {
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().returning(|_, _, _| {
        Err(ServiceError::NotificationError(
            "smtp connection refused".to_string(),
        ))
    });

    let app = TestApp::with_notifier(Arc::new(notifier)).await;
    let order_id = seed_order_with_offer(&app).await;

    let send = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/send", order_id),
            Some(json!({ "actor": "maria.lopez" })),
        )
        .await;
    assert_eq!(send.status(), 200);

    let order = app.state.orders.get_order(&order_id).await.unwrap();
    assert_eq!(order.state.to_string(), "ORDEN_ENVIADA");
}
