mod common;

use assert_matches::assert_matches;
use common::{order_request, TestApp};
use rust_decimal_macros::dec;
use scrapx_api::{
    errors::ServiceError,
    models::{OrderStatus, ScrapCategory},
    services::{
        order_status::AdvanceStatusRequest,
        orders::{OrderFilter, UpdateLogisticsRequest},
    },
};

fn advance(status: &str) -> AdvanceStatusRequest {
    AdvanceStatusRequest {
        status: status.to_string(),
        settled_amount: None,
    }
}

#[tokio::test]
async fn new_order_is_pending_without_vendor() {
    let app = TestApp::new().await;
    let order = app.create_order("user-1").await;

    assert_eq!(order.status, "pending");
    assert!(order.vendor_id.is_none());
    assert_eq!(order.requester_id, "user-1");
    assert_eq!(order.items.len(), 1);
    assert!(order.settled_amount.is_none());
}

#[tokio::test]
async fn creation_rejects_incomplete_requests() {
    let app = TestApp::new().await;
    let orders = &app.state.services.orders;
    let customer = app.customer("user-1");

    let mut no_items = order_request();
    no_items.items.clear();
    let err = orders.create_order(&customer, no_items).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let mut blank_address = order_request();
    blank_address.address = "   ".to_string();
    let err = orders.create_order(&customer, blank_address).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let mut bad_date = order_request();
    bad_date.scheduled_date = "02/11/2026".to_string();
    let err = orders.create_order(&customer, bad_date).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let listed = orders
        .list_orders(&customer, OrderFilter::All, 1, 20)
        .await
        .unwrap();
    assert_eq!(listed.total, 0);
}

#[tokio::test]
async fn vendors_cannot_request_pickups() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Solo", 0, true, true, 30).await;

    let err = app
        .state
        .services
        .orders
        .create_order(&app.vendor_caller(vendor.id), order_request())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::AuthError(_));
}

#[tokio::test]
async fn full_lifecycle_credits_wallet_once() {
    let app = TestApp::new().await;
    app.seed_material("Iron/Steel", ScrapCategory::Metal, dec!(40)).await;
    let vendor = app.seed_vendor("Solo", 0, true, true, 30).await;
    let customer = app.customer("user-1");
    let vendor_caller = app.vendor_caller(vendor.id);
    let services = &app.state.services;

    let order = app.create_order("user-1").await;
    assert_eq!(order.estimated_value, Some(dec!(100)));

    let assigned = services.matching.assign_vendor(&customer, order.id).await.unwrap();
    assert_eq!(assigned.order.status, "assigned");

    let tracking = services.order_status.tracking(&customer, order.id).await.unwrap();
    assert_eq!(tracking.status, OrderStatus::Assigned);
    assert_eq!(tracking.furthest_checkpoint, 1);
    assert_eq!(tracking.vendor.map(|v| v.id), Some(vendor.id));

    let in_transit = services
        .order_status
        .advance_status(&vendor_caller, order.id, advance("in_transit"))
        .await
        .unwrap();
    assert_eq!(in_transit.order.status, "in_transit");
    assert!(in_transit.completion.is_none());

    let completed = services
        .order_status
        .advance_status(&vendor_caller, order.id, advance("completed"))
        .await
        .unwrap();
    assert_eq!(completed.order.status, "completed");
    assert_eq!(completed.order.vendor_id, Some(vendor.id));
    assert_eq!(completed.order.settled_amount, Some(dec!(100)));

    let completion = completed.completion.expect("completion event");
    assert_eq!(completion.order_id, order.id);
    assert_eq!(completion.requester_id, "user-1");
    assert_eq!(completion.settled_amount, dec!(100));

    assert_eq!(app.wait_for_balance("user-1").await, dec!(100));
    assert!(!app.ledger.credit_completion(&completion).await.unwrap());
    assert_eq!(app.ledger.transactions("user-1").await.unwrap().len(), 1);
    assert_eq!(app.ledger.balance("user-1").await.unwrap(), dec!(100));
    assert_eq!(services.wallet.balance("user-1").await.unwrap(), dec!(100));

    let tracking = services.order_status.tracking(&customer, order.id).await.unwrap();
    assert_eq!(tracking.furthest_checkpoint, 3);
    assert!(tracking.checkpoints.iter().all(|c| c.reached));
}

#[tokio::test]
async fn explicit_settled_amount_overrides_estimate() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Solo", 0, true, true, 30).await;
    let vendor_caller = app.vendor_caller(vendor.id);
    let services = &app.state.services;

    let order = app.create_order("user-1").await;
    assert!(order.estimated_value.is_none());
    services
        .matching
        .assign_vendor(&app.customer("user-1"), order.id)
        .await
        .unwrap();
    services
        .order_status
        .advance_status(&vendor_caller, order.id, advance("in_transit"))
        .await
        .unwrap();

    let err = services
        .order_status
        .advance_status(&vendor_caller, order.id, advance("completed"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let outcome = services
        .order_status
        .advance_status(
            &vendor_caller,
            order.id,
            AdvanceStatusRequest {
                status: "completed".to_string(),
                settled_amount: Some(dec!(75.5)),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.order.settled_amount, Some(dec!(75.5)));
}

#[tokio::test]
async fn status_only_moves_forward_one_step() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Solo", 0, true, true, 30).await;
    let vendor_caller = app.vendor_caller(vendor.id);
    let statuses = &app.state.services.order_status;

    let order = app.create_order("user-1").await;

    // nothing to advance before a vendor is bound
    let err = statuses
        .advance_status(&app.service(), order.id, advance("assigned"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));

    app.state
        .services
        .matching
        .assign_vendor(&app.customer("user-1"), order.id)
        .await
        .unwrap();

    let err = statuses
        .advance_status(&vendor_caller, order.id, advance("completed"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));

    let err = statuses
        .advance_status(&vendor_caller, order.id, advance("pending"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));

    let err = statuses
        .advance_status(&vendor_caller, order.id, advance("cancelled"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));

    let err = statuses
        .advance_status(&vendor_caller, order.id, advance("teleported"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    statuses
        .advance_status(&vendor_caller, order.id, advance("in_transit"))
        .await
        .unwrap();
    let err = statuses
        .advance_status(&vendor_caller, order.id, advance("assigned"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));
}

#[tokio::test]
async fn only_bound_vendor_advances_status() {
    let app = TestApp::new().await;
    let bound = app.seed_vendor("Bound", 0, true, true, 30).await;
    let other = app.seed_vendor("Other", 7, true, true, 30).await;
    let order = app.create_order("user-1").await;
    app.state
        .services
        .matching
        .assign_vendor(&app.customer("user-1"), order.id)
        .await
        .unwrap();
    let statuses = &app.state.services.order_status;

    let err = statuses
        .advance_status(&app.vendor_caller(other.id), order.id, advance("in_transit"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let err = statuses
        .advance_status(&app.customer("user-1"), order.id, advance("in_transit"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let outcome = statuses
        .advance_status(&app.vendor_caller(bound.id), order.id, advance("in_transit"))
        .await
        .unwrap();
    assert_eq!(outcome.order.status, "in_transit");
}

#[tokio::test]
async fn cancel_only_while_pending() {
    let app = TestApp::new().await;
    app.seed_vendor("Solo", 0, true, true, 30).await;
    let customer = app.customer("user-1");
    let orders = &app.state.services.orders;

    let pending = app.create_order("user-1").await;
    let cancelled = orders.cancel_order(&customer, pending.id).await.unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert!(cancelled.vendor_id.is_none());

    let err = orders.cancel_order(&customer, pending.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));

    let tracking = app
        .state
        .services
        .order_status
        .tracking(&customer, pending.id)
        .await
        .unwrap();
    assert_eq!(tracking.status, OrderStatus::Cancelled);
    assert_eq!(tracking.furthest_checkpoint, 0);

    let assigned = app.create_order("user-1").await;
    app.state
        .services
        .matching
        .assign_vendor(&customer, assigned.id)
        .await
        .unwrap();
    let err = orders.cancel_order(&customer, assigned.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));

    let reloaded = orders.get_order(&customer, assigned.id).await.unwrap();
    assert_eq!(reloaded.status, "assigned");
}

#[tokio::test]
async fn logistics_edits_only_before_assignment() {
    let app = TestApp::new().await;
    app.seed_vendor("Solo", 0, true, true, 30).await;
    let customer = app.customer("user-1");
    let orders = &app.state.services.orders;
    let order = app.create_order("user-1").await;

    let updated = orders
        .update_logistics(
            &customer,
            order.id,
            UpdateLogisticsRequest {
                scheduled_time: Some("2:00 PM - 4:00 PM".to_string()),
                notes: Some("Ring twice".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.scheduled_time, "2:00 PM - 4:00 PM");
    assert_eq!(updated.notes.as_deref(), Some("Ring twice"));
    assert_eq!(updated.address, order.address);

    let err = orders
        .update_logistics(&customer, order.id, UpdateLogisticsRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    app.state
        .services
        .matching
        .assign_vendor(&customer, order.id)
        .await
        .unwrap();
    let err = orders
        .update_logistics(
            &customer,
            order.id,
            UpdateLogisticsRequest {
                address: Some("99 Residency Road".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));
}

#[tokio::test]
async fn orders_are_scoped_to_their_requester() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Solo", 0, true, true, 30).await;
    let orders = &app.state.services.orders;

    let mine = app.create_order("user-1").await;
    app.create_order("user-1").await;
    app.create_order("user-2").await;

    let err = orders
        .get_order(&app.customer("user-2"), mine.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let listed = orders
        .list_orders(&app.customer("user-1"), OrderFilter::All, 1, 20)
        .await
        .unwrap();
    assert_eq!(listed.total, 2);
    assert!(listed.orders.iter().all(|o| o.requester_id == "user-1"));

    let everything = orders
        .list_orders(&app.service(), OrderFilter::All, 1, 20)
        .await
        .unwrap();
    assert_eq!(everything.total, 3);

    app.state
        .services
        .matching
        .assign_vendor(&app.customer("user-1"), mine.id)
        .await
        .unwrap();
    let vendor_view = orders
        .list_orders(&app.vendor_caller(vendor.id), OrderFilter::Active, 1, 20)
        .await
        .unwrap();
    assert_eq!(vendor_view.total, 1);
    assert_eq!(vendor_view.orders[0].id, mine.id);
    assert!(orders.get_order(&app.vendor_caller(vendor.id), mine.id).await.is_ok());

    let completed = orders
        .list_orders(&app.customer("user-1"), OrderFilter::Completed, 1, 20)
        .await
        .unwrap();
    assert_eq!(completed.total, 0);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = TestApp::new().await;
    let err = app
        .state
        .services
        .orders
        .get_order(&app.service(), uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
