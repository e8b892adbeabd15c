// Freight lifecycle integration tests
// Creation gates, moderation, driver assignment and terminal states

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

use chamafrete_backend_core::db::DieselPool;
use chamafrete_backend_core::models::user::UserRole;
use chamafrete_backend_core::models::{NewReview, ReviewStatus};

mod common;
use common::{
    create_user, freight_status, notification_titles, setup_test_app, token_for, TestApp,
};

async fn freight_column(pool: &DieselPool, id: Uuid) -> (DateTime<Utc>, String, i32) {
    use chamafrete_backend_core::schema::freights::dsl;

    let mut conn = pool.get().await.unwrap();
    dsl::freights
        .filter(dsl::id.eq(id))
        .select((dsl::expires_at, dsl::payment_status, dsl::clicks_count))
        .first(&mut conn)
        .await
        .unwrap()
}

/// Publish a freight and return (id, slug). The owner must be verified so
/// the listing goes straight to OPEN.
async fn publish_freight(app: &TestApp, token: &str, product: &str) -> (Uuid, String) {
    let response = app
        .post("/v1/freights")
        .bearer(token)
        .json(&json!({
            "origin_city": "Sorriso",
            "origin_state": "MT",
            "dest_city": "Paranaguá",
            "dest_state": "PR",
            "product": product,
            "weight": 32000.0,
            "price": 12500.0,
            "vehicle_type": "carreta",
            "body_type": "graneleiro",
            "description": "Carga completa, lona obrigatória"
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "OPEN");

    (
        body["id"].as_str().unwrap().parse().unwrap(),
        body["slug"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn unverified_owner_lands_in_pending() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, false, 0).await;
    let token = token_for(owner, UserRole::Company, "Transportes Ipê");

    let response = app
        .post("/v1/freights")
        .bearer(&token)
        .json(&json!({
            "origin_city": "São Paulo",
            "origin_state": "SP",
            "dest_city": "Campinas",
            "dest_state": "SP",
            "product": "Soja"
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "PENDING");

    // Slug is the slugified route plus a random 6-hex suffix
    let slug = body["slug"].as_str().unwrap();
    let base = "soja-de-sao-paulo-para-campinas-";
    assert!(slug.starts_with(base), "unexpected slug: {}", slug);
    let suffix = &slug[base.len()..];
    assert_eq!(suffix.len(), 6);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

    // Ordinary listings expire after a week
    let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();
    let (expires_at, _, _) = freight_column(&app.diesel_pool, id).await;
    let days = (expires_at - Utc::now()).num_days();
    assert!((6..=7).contains(&days), "expiry {} days out", days);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn featured_listing_gets_extended_expiry() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let token = token_for(owner, UserRole::Company, "Transportes Ipê");

    let response = app
        .post("/v1/freights")
        .bearer(&token)
        .json(&json!({
            "origin_city": "Cascavel",
            "dest_city": "Itajaí",
            "product": "Milho",
            "is_featured": true
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await;
    let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();

    let (expires_at, _, _) = freight_column(&app.diesel_pool, id).await;
    let days = (expires_at - Utc::now()).num_days();
    assert!((29..=30).contains(&days), "expiry {} days out", days);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn verified_owner_publishes_straight_to_open() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let token = token_for(owner, UserRole::Company, "Transportes Ipê");

    let (id, _slug) = publish_freight(&app, &token, "Fertilizante").await;
    assert_eq!(freight_status(&app.diesel_pool, id).await, "OPEN");
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn creation_blocked_until_document_approval() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, false, false, 0).await;
    let token = token_for(owner, UserRole::Company, "Transportes Ipê");

    let response = app
        .post("/v1/freights")
        .bearer(&token)
        .json(&json!({
            "origin_city": "Curitiba",
            "dest_city": "Joinville",
            "product": "Bobinas de aço"
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn driver_cannot_publish_freight() {
    let app = setup_test_app().await;
    let driver = create_user(&app.diesel_pool, UserRole::Driver, true, true, 0).await;
    let token = token_for(driver, UserRole::Driver, "João Motorista");

    let response = app
        .post("/v1/freights")
        .bearer(&token)
        .json(&json!({
            "origin_city": "Curitiba",
            "dest_city": "Joinville",
            "product": "Bobinas de aço"
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn identical_routes_get_distinct_slugs() {
    let app = setup_test_app().await;

    // Two owners so the per-account creation limit does not interfere
    let first = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let second = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;

    let (_, slug_a) = publish_freight(
        &app,
        &token_for(first, UserRole::Company, "Cerealista Oeste"),
        "Soja",
    )
    .await;
    let (_, slug_b) = publish_freight(
        &app,
        &token_for(second, UserRole::Company, "Cerealista Leste"),
        "Soja",
    )
    .await;

    assert_ne!(slug_a, slug_b);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn assignment_is_first_writer_wins() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let owner_token = token_for(owner, UserRole::Company, "Transportes Ipê");
    let driver_a = create_user(&app.diesel_pool, UserRole::Driver, true, false, 0).await;
    let driver_b = create_user(&app.diesel_pool, UserRole::Driver, true, false, 0).await;

    let (id, _slug) = publish_freight(&app, &owner_token, "Soja").await;

    // First assignment wins
    let response = app
        .post(&format!("/v1/freights/{}/assign", id))
        .bearer(&owner_token)
        .json(&json!({ "driver_id": driver_a }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(freight_status(&app.diesel_pool, id).await, "IN_PROGRESS");

    // The confirmed driver got the outbox notification
    let titles = notification_titles(&app.diesel_pool, driver_a).await;
    assert!(titles.iter().any(|t| t.starts_with("Carga Confirmada!")));

    // Late writer gets a conflict, the winner keeps the load
    let response = app
        .post(&format!("/v1/freights/{}/assign", id))
        .bearer(&owner_token)
        .json(&json!({ "driver_id": driver_b }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(freight_status(&app.diesel_pool, id).await, "IN_PROGRESS");
    assert!(notification_titles(&app.diesel_pool, driver_b)
        .await
        .is_empty());
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn finished_freight_is_terminal() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let owner_token = token_for(owner, UserRole::Company, "Transportes Ipê");
    let driver = create_user(&app.diesel_pool, UserRole::Driver, true, false, 0).await;
    let driver_token = token_for(driver, UserRole::Driver, "João Motorista");

    let (id, _slug) = publish_freight(&app, &owner_token, "Soja").await;

    app.post(&format!("/v1/freights/{}/assign", id))
        .bearer(&owner_token)
        .json(&json!({ "driver_id": driver }))
        .send()
        .await;

    // The assigned driver closes out the delivery
    let response = app
        .post(&format!("/v1/freights/{}/finish", id))
        .bearer(&driver_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(freight_status(&app.diesel_pool, id).await, "FINISHED");

    // FINISHED accepts no further transition
    let response = app
        .post(&format!("/v1/freights/{}/finish", id))
        .bearer(&driver_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(freight_status(&app.diesel_pool, id).await, "FINISHED");
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn soft_deleted_freight_leaves_the_catalog() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let token = token_for(owner, UserRole::Company, "Transportes Ipê");

    // A unique product name lets the catalog search single out this listing
    let tag = Uuid::new_v4().simple().to_string();
    let (id, slug) = publish_freight(&app, &token, &format!("Adubo {}", tag)).await;

    // Visible while OPEN
    let response = app
        .get(&format!("/v1/freights?search={}", tag))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|item| item["slug"] == slug.as_str()));

    let response = app
        .delete(&format!("/v1/freights/{}", id))
        .bearer(&token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(freight_status(&app.diesel_pool, id).await, "CLOSED");

    // Gone from the public catalog and the detail page
    let response = app
        .get(&format!("/v1/freights?search={}", tag))
        .send()
        .await;
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
    assert_eq!(body["total"], 0);

    let response = app
        .get(&format!("/v1/freights/details/{}", slug))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn slug_follows_listing_identity() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let token = token_for(owner, UserRole::Company, "Transportes Ipê");

    let (id, slug) = publish_freight(&app, &token, "Soja").await;

    // Price-only edits keep the public slug stable
    let response = app
        .put(&format!("/v1/freights/{}", id))
        .bearer(&token)
        .json(&json!({ "price": 13900.0 }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["data"]["slug"], slug.as_str());

    // Changing the product changes the listing identity
    let response = app
        .put(&format!("/v1/freights/{}", id))
        .bearer(&token)
        .json(&json!({ "product": "Milho" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    let new_slug = body["data"]["slug"].as_str().unwrap();
    assert_ne!(new_slug, slug);
    assert!(new_slug.starts_with("milho-de-"));
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn payment_confirmation_settles_and_finishes() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let owner_token = token_for(owner, UserRole::Company, "Transportes Ipê");
    let driver = create_user(&app.diesel_pool, UserRole::Driver, true, false, 0).await;

    let (id, _slug) = publish_freight(&app, &owner_token, "Soja").await;

    app.post(&format!("/v1/freights/{}/assign", id))
        .bearer(&owner_token)
        .json(&json!({ "driver_id": driver }))
        .send()
        .await;

    let response = app
        .post(&format!("/v1/freights/{}/confirm-payment", id))
        .bearer(&owner_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let (_, payment_status, _) = freight_column(&app.diesel_pool, id).await;
    assert_eq!(payment_status, "PAID");
    assert_eq!(freight_status(&app.diesel_pool, id).await, "FINISHED");

    // Settled payments cannot be confirmed twice
    let response = app
        .post(&format!("/v1/freights/{}/confirm-payment", id))
        .bearer(&owner_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn finished_delivery_refreshes_driver_reputation() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let owner_token = token_for(owner, UserRole::Company, "Transportes Ipê");
    let driver = create_user(&app.diesel_pool, UserRole::Driver, true, false, 0).await;
    let driver_token = token_for(driver, UserRole::Driver, "João Motorista");

    let (id, _slug) = publish_freight(&app, &owner_token, "Soja").await;
    app.post(&format!("/v1/freights/{}/assign", id))
        .bearer(&owner_token)
        .json(&json!({ "driver_id": driver }))
        .send()
        .await;

    // Five five-star reviews plus a hidden one-star that must not count
    {
        use chamafrete_backend_core::schema::reviews::dsl;

        let mut rows: Vec<NewReview> = (0..5)
            .map(|_| NewReview::published(None, owner, driver, 5, "Entrega impecável"))
            .collect();
        rows.push(NewReview {
            status: ReviewStatus::Hidden.as_str().to_string(),
            ..NewReview::published(None, owner, driver, 1, "Spam")
        });

        let mut conn = app.diesel_pool.get().await.unwrap();
        diesel::insert_into(dsl::reviews)
            .values(&rows)
            .execute(&mut conn)
            .await
            .unwrap();
    }

    let response = app
        .post(&format!("/v1/freights/{}/finish", id))
        .bearer(&driver_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Published ratings recached on the driver row; five at 4.5+ also
    // earn the verification badge
    let (avg, count, is_verified) = {
        use chamafrete_backend_core::schema::users::dsl;

        let mut conn = app.diesel_pool.get().await.unwrap();
        dsl::users
            .filter(dsl::id.eq(driver))
            .select((dsl::rating_avg, dsl::rating_count, dsl::is_verified))
            .first::<(f64, i32, bool)>(&mut conn)
            .await
            .unwrap()
    };
    assert_eq!(count, 5);
    assert!((avg - 5.0).abs() < 1e-9, "avg was {}", avg);
    assert!(is_verified);

    let titles = notification_titles(&app.diesel_pool, driver).await;
    assert!(titles.iter().any(|t| t == "Perfil Verificado!"));
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn approval_opens_pending_listing() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, false, 0).await;
    let owner_token = token_for(owner, UserRole::Company, "Transportes Ipê");
    let admin = create_user(&app.diesel_pool, UserRole::Admin, true, true, 0).await;
    let admin_token = token_for(admin, UserRole::Admin, "Moderação");

    let response = app
        .post("/v1/freights")
        .bearer(&owner_token)
        .json(&json!({
            "origin_city": "Londrina",
            "dest_city": "Santos",
            "product": "Café"
        }))
        .send()
        .await;
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["status"], "PENDING");
    let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();

    // Moderation is admin-only
    let response = app
        .post(&format!("/v1/admin/freights/{}/approve", id))
        .bearer(&owner_token)
        .json(&json!({}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post(&format!("/v1/admin/freights/{}/approve", id))
        .bearer(&admin_token)
        .json(&json!({}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(freight_status(&app.diesel_pool, id).await, "OPEN");

    let titles = notification_titles(&app.diesel_pool, owner).await;
    assert!(titles.iter().any(|t| t == "Frete Online!"));

    // Approval is a PENDING-only transition
    let response = app
        .post(&format!("/v1/admin/freights/{}/approve", id))
        .bearer(&admin_token)
        .json(&json!({}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn rejection_returns_listing_to_moderation() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let owner_token = token_for(owner, UserRole::Company, "Transportes Ipê");
    let admin = create_user(&app.diesel_pool, UserRole::Admin, true, true, 0).await;
    let admin_token = token_for(admin, UserRole::Admin, "Moderação");

    let (id, _slug) = publish_freight(&app, &owner_token, "Soja").await;

    let response = app
        .post(&format!("/v1/admin/freights/{}/reject", id))
        .bearer(&admin_token)
        .json(&json!({ "reason": "Dados de contato no título" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(freight_status(&app.diesel_pool, id).await, "PENDING");

    let titles = notification_titles(&app.diesel_pool, owner).await;
    assert!(titles.iter().any(|t| t == "Frete não aprovado"));
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn whatsapp_click_becomes_a_lead() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Company, true, true, 0).await;
    let owner_token = token_for(owner, UserRole::Company, "Transportes Ipê");
    let driver = create_user(&app.diesel_pool, UserRole::Driver, true, false, 0).await;
    let driver_token = token_for(driver, UserRole::Driver, "João Motorista");

    let (id, _slug) = publish_freight(&app, &owner_token, "Soja").await;

    // The events endpoint is public but picks up the caller when present
    let response = app
        .post(&format!("/v1/freights/{}/events", id))
        .bearer(&driver_token)
        .json(&json!({ "event_type": "WHATSAPP_CLICK" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let (_, _, clicks) = freight_column(&app.diesel_pool, id).await;
    assert_eq!(clicks, 1);

    let response = app
        .get("/v1/freights/leads")
        .bearer(&owner_token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|lead| lead["user"]["id"] == driver.to_string().as_str()));

    // Unknown targets fail without a server error
    let response = app
        .post(&format!("/v1/freights/{}/events", Uuid::new_v4()))
        .json(&json!({ "event_type": "VIEW" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
