// Ad serving and billing integration tests
// Guarded debits, auto-pause on depleted balance and ranking boosts

use axum::http::StatusCode;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

use chamafrete_backend_core::db::DieselPool;
use chamafrete_backend_core::models::user::UserRole;

mod common;
use common::{ad_status, create_user, ledger_count, setup_test_app, token_for, user_balance, TestApp};

async fn ad_counters(pool: &DieselPool, ad_id: Uuid) -> (i32, i32) {
    use chamafrete_backend_core::schema::ads::dsl;

    let mut conn = pool.get().await.unwrap();
    dsl::ads
        .filter(dsl::id.eq(ad_id))
        .select((dsl::views_count, dsl::clicks_count))
        .first(&mut conn)
        .await
        .unwrap()
}

/// Unique placement slot so serve queries only see this test's ads
fn unique_position() -> String {
    format!("slot-{}", Uuid::new_v4().simple())
}

async fn create_ad(app: &TestApp, token: &str, city: &str, state: &str, position: &str) -> Uuid {
    let response = app
        .post("/v1/ads")
        .bearer(token)
        .json(&json!({
            "title": "Pneus recapados com garantia",
            "category": "pecas",
            "description": "Entrega em todo o Sul",
            "destination_url": "https://loja.example.com.br/pneus",
            "location_city": city,
            "location_state": state,
            "position": position
        }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["success"], true);
    body["data"]["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn impressions_debit_until_the_balance_runs_dry() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Advertiser, true, false, 5).await;
    let token = token_for(owner, UserRole::Advertiser, "Auto Peças Sul");
    let position = unique_position();
    let ad = create_ad(&app, &token, "Curitiba", "PR", &position).await;

    // Five impressions at the default view cost of 1 drain the balance
    for _ in 0..5 {
        let response = app
            .post("/v1/ads/impressions")
            .json(&json!({ "ids": [ad] }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await;
        assert_eq!(body["success"], true);
    }

    assert_eq!(user_balance(&app.diesel_pool, owner).await, 0);
    assert_eq!(ad_status(&app.diesel_pool, ad).await, "active");
    assert_eq!(ledger_count(&app.diesel_pool, owner).await, 5);

    // The sixth impression finds nothing to charge and pauses the ad.
    // The balance never goes negative and no ledger row is written.
    let response = app
        .post("/v1/ads/impressions")
        .json(&json!({ "ids": [ad] }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(user_balance(&app.diesel_pool, owner).await, 0);
    assert_eq!(ad_status(&app.diesel_pool, ad).await, "paused");
    assert_eq!(ledger_count(&app.diesel_pool, owner).await, 5);

    // Paused ads fall out of the serving pool
    let response = app
        .get(&format!("/v1/ads?position={}", position))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert!(body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["show_fallback"], true);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn whatsapp_event_costs_five_credits() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Advertiser, true, false, 20).await;
    let token = token_for(owner, UserRole::Advertiser, "Auto Peças Sul");
    let ad = create_ad(&app, &token, "Curitiba", "PR", &unique_position()).await;

    let response = app
        .post("/v1/ads/event")
        .json(&json!({ "id": ad, "event_type": "WHATSAPP_CLICK" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["success"], true);

    assert_eq!(user_balance(&app.diesel_pool, owner).await, 15);
    assert_eq!(ledger_count(&app.diesel_pool, owner).await, 1);

    let (views, clicks) = ad_counters(&app.diesel_pool, ad).await;
    assert_eq!(views, 0);
    assert_eq!(clicks, 1);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn event_without_id_is_refused_gently() {
    let app = setup_test_app().await;

    // Metric endpoints answer 200 with success=false, never an error page
    let response = app.post("/v1/ads/event").json(&json!({})).send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "ID ausente");

    let response = app
        .post("/v1/ads/event")
        .json(&json!({ "id": Uuid::new_v4() }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn depleted_owner_keeps_counters_but_no_ledger_row() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Advertiser, true, false, 0).await;
    let token = token_for(owner, UserRole::Advertiser, "Auto Peças Sul");
    let ad = create_ad(&app, &token, "Curitiba", "PR", &unique_position()).await;

    let response = app
        .post("/v1/ads/event")
        .json(&json!({ "id": ad, "event_type": "CLICK" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The interaction is recorded for reporting even though nothing was
    // charged; only the consumption row is suppressed.
    let (_, clicks) = ad_counters(&app.diesel_pool, ad).await;
    assert_eq!(clicks, 1);
    assert_eq!(user_balance(&app.diesel_pool, owner).await, 0);
    assert_eq!(ledger_count(&app.diesel_pool, owner).await, 0);
    assert_eq!(ad_status(&app.diesel_pool, ad).await, "paused");
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn credit_boost_dominates_geography() {
    let app = setup_test_app().await;
    let position = unique_position();

    // A matches the city but has no credits; B only matches the state and
    // carries a positive balance
    let broke = create_user(&app.diesel_pool, UserRole::Advertiser, true, false, 0).await;
    let funded = create_user(&app.diesel_pool, UserRole::Advertiser, true, false, 100).await;

    let ad_city = create_ad(
        &app,
        &token_for(broke, UserRole::Advertiser, "Anunciante A"),
        "Curitiba",
        "PR",
        &position,
    )
    .await;
    let ad_state = create_ad(
        &app,
        &token_for(funded, UserRole::Advertiser, "Anunciante B"),
        "Londrina",
        "PR",
        &position,
    )
    .await;

    let response = app
        .get(&format!(
            "/v1/ads?position={}&city=Curitiba&state=PR&limit=10",
            position
        ))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;

    let served: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(served.len(), 2);
    assert_eq!(body["show_fallback"], false);

    // The funded advertiser outranks the better geographic match
    assert_eq!(served[0], ad_state.to_string().as_str());
    assert_eq!(served[1], ad_city.to_string().as_str());
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn performance_report_buckets_by_day() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Advertiser, true, false, 50).await;
    let token = token_for(owner, UserRole::Advertiser, "Auto Peças Sul");
    let ad = create_ad(&app, &token, "Curitiba", "PR", &unique_position()).await;

    for _ in 0..2 {
        app.post("/v1/ads/impressions")
            .json(&json!({ "ids": [ad] }))
            .send()
            .await;
    }
    app.post("/v1/ads/event")
        .json(&json!({ "id": ad, "event_type": "CLICK" }))
        .send()
        .await;

    let response = app
        .get(&format!("/v1/ads/{}/report", ad))
        .bearer(&token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["success"], true);

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["views"], 2);
    assert_eq!(data[0]["clicks"], 1);

    // Reports are owner-only
    let stranger = create_user(&app.diesel_pool, UserRole::Advertiser, true, false, 0).await;
    let response = app
        .get(&format!("/v1/ads/{}/report", ad))
        .bearer(&token_for(stranger, UserRole::Advertiser, "Outro"))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
#[ignore] // Requires database
async fn only_the_owner_deletes_an_ad() {
    let app = setup_test_app().await;
    let owner = create_user(&app.diesel_pool, UserRole::Advertiser, true, false, 10).await;
    let token = token_for(owner, UserRole::Advertiser, "Auto Peças Sul");
    let position = unique_position();
    let ad = create_ad(&app, &token, "Curitiba", "PR", &position).await;

    let stranger = create_user(&app.diesel_pool, UserRole::Advertiser, true, false, 0).await;
    let response = app
        .delete(&format!("/v1/ads/{}", ad))
        .bearer(&token_for(stranger, UserRole::Advertiser, "Outro"))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .delete(&format!("/v1/ads/{}", ad))
        .bearer(&token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Deleted ads vanish from serving and cannot be deleted twice
    let response = app
        .get(&format!("/v1/ads?position={}", position))
        .send()
        .await;
    let body: serde_json::Value = response.json().await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let response = app
        .delete(&format!("/v1/ads/{}", ad))
        .bearer(&token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
