//! HTTP tests against the in-memory record store.

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use restaurant_service::application::billing::PaymentDuePolicy;
use restaurant_service::infrastructure::MemoryStore;
use restaurant_service::{configure, AppState};

fn state() -> AppState {
    AppState {
        store: Arc::new(MemoryStore::new()),
        store_timeout: Duration::from_secs(5),
        payment_due_policy: PaymentDuePolicy::UnitPrice,
    }
}

/// Send `req` to `app` and return the status with the parsed JSON body.
macro_rules! call {
    ($app:expr, $req:expr $(,)?) => {{
        let resp = test::call_service($app, $req.to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        let json: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("response is not JSON")
        };
        (status, json)
    }};
}

fn id(body: &Value, field: &str) -> String {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing {field} in {body}"))
        .to_string()
}

#[actix_web::test]
async fn order_with_items_produces_billing_view() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure),
    )
    .await;

    let (status, table) = call!(
        &app,
        test::TestRequest::post()
            .uri("/tables")
            .set_json(json!({"table_number": 12, "number_of_guests": 4})),
    );
    assert_eq!(status, StatusCode::CREATED);
    let table_id = id(&table, "table_id");

    let (_, menu) = call!(
        &app,
        test::TestRequest::post()
            .uri("/menus")
            .set_json(json!({"name": "Lunch", "category": "Noon"})),
    );
    let menu_id = id(&menu, "menu_id");

    let mut food_ids = Vec::new();
    for (name, price) in [("Ramen", "8.50"), ("Gyoza", "5.00")] {
        let (status, food) = call!(
            &app,
            test::TestRequest::post().uri("/foods").set_json(json!({
                "name": name,
                "price": price,
                "food_image": format!("{name}.png"),
                "menu_id": menu_id,
            })),
        );
        assert_eq!(status, StatusCode::CREATED, "{food}");
        food_ids.push(id(&food, "food_id"));
    }

    let (status, created) = call!(
        &app,
        test::TestRequest::post().uri("/order-items").set_json(json!({
            "table_id": table_id,
            "order_items": [
                {"food_id": food_ids[0], "quantity": 2, "unit_price": 3.995},
                {"food_id": food_ids[1], "quantity": 1, "unit_price": "5.00"},
            ]
        })),
    );
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let order_id = id(&created, "order_id");
    assert_eq!(created["order_item_ids"].as_array().map(Vec::len), Some(2));

    let (status, views) = call!(
        &app,
        test::TestRequest::get().uri(&format!("/orders/{order_id}/items")),
    );
    assert_eq!(status, StatusCode::OK);
    let view = &views[0];
    assert_eq!(view["total_count"], json!(2));
    assert_eq!(view["payment_due"], json!("9.00"));
    assert_eq!(view["table_number"], json!(12));
    assert_eq!(view["order_items"][0]["food_name"], json!("Ramen"));
    assert_eq!(view["order_items"][0]["unit_price"], json!("4.00"));

    let (status, order) = call!(
        &app,
        test::TestRequest::get().uri(&format!("/orders/{order_id}")),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["table_id"], json!(table_id));
}

#[actix_web::test]
async fn invoice_view_merges_billing() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure),
    )
    .await;

    let (_, menu) = call!(
        &app,
        test::TestRequest::post()
            .uri("/menus")
            .set_json(json!({"name": "Dinner", "category": "Evening"})),
    );
    let (_, food) = call!(
        &app,
        test::TestRequest::post().uri("/foods").set_json(json!({
            "name": "Curry",
            "price": 12.5,
            "food_image": "curry.png",
            "menu_id": id(&menu, "menu_id"),
        })),
    );
    let (_, created) = call!(
        &app,
        test::TestRequest::post().uri("/order-items").set_json(json!({
            "order_items": [{"food_id": id(&food, "food_id"), "quantity": 1, "unit_price": 12.5}]
        })),
    );
    let order_id = id(&created, "order_id");

    let (status, invoice) = call!(
        &app,
        test::TestRequest::post()
            .uri("/invoices")
            .set_json(json!({"order_id": order_id})),
    );
    assert_eq!(status, StatusCode::CREATED, "{invoice}");
    assert_eq!(invoice["payment_status"], json!("PENDING"));
    assert_eq!(invoice["order_id"], json!(order_id));
    let invoice_id = id(&invoice, "invoice_id");

    let (status, view) = call!(
        &app,
        test::TestRequest::get().uri(&format!("/invoices/{invoice_id}")),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["payment_method"], json!("null"));
    assert_eq!(view["payment_due"], json!("12.50"));
    assert_eq!(view["table_number"], Value::Null);
    assert_eq!(view["order_details"].as_array().map(Vec::len), Some(1));

    let (status, outcome) = call!(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/invoices/{invoice_id}"))
            .set_json(json!({"payment_method": "CARD", "payment_status": "PAID"})),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["matched_count"], json!(1));

    let (_, view) = call!(
        &app,
        test::TestRequest::get().uri(&format!("/invoices/{invoice_id}")),
    );
    assert_eq!(view["payment_method"], json!("CARD"));
    assert_eq!(view["payment_status"], json!("PAID"));
}

#[actix_web::test]
async fn errors_map_to_status_codes() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure),
    )
    .await;

    let (status, body) = call!(
        &app,
        test::TestRequest::get().uri(&format!("/orders/{}", Uuid::new_v4())),
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], json!("NotFound"));

    let (status, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/orders")
            .set_json(json!({"table_id": Uuid::new_v4()})),
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("ReferenceNotFound"));

    let (status, body) = call!(
        &app,
        test::TestRequest::post().uri("/order-items").set_json(json!({
            "order_items": [{"food_id": Uuid::new_v4(), "quantity": 1}]
        })),
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("ValidationError"));

    let (status, body) = call!(
        &app,
        test::TestRequest::post()
            .uri("/tables")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json"),
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("ValidationError"));

    let (status, body) = call!(&app, test::TestRequest::get().uri("/foods"));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], json!("EmptyCatalog"));

    let (_, menu) = call!(
        &app,
        test::TestRequest::post()
            .uri("/menus")
            .set_json(json!({"name": "Brunch", "category": "Weekend"})),
    );
    let now = Utc::now();
    let (status, body) = call!(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/menus/{}", id(&menu, "menu_id")))
            .set_json(json!({
                "start_date": now - chrono::Duration::hours(1),
                "end_date": now + chrono::Duration::hours(1),
            })),
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("InvalidWindow"));
}

#[actix_web::test]
async fn tables_are_paginated() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure),
    )
    .await;

    for n in 0..25 {
        let (status, _) = call!(
            &app,
            test::TestRequest::post()
                .uri("/tables")
                .set_json(json!({"table_number": n, "number_of_guests": 2})),
        );
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = call!(
        &app,
        test::TestRequest::get().uri("/tables?page=2&recordPerPage=10"),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_count"], json!(25));
    let numbers: Vec<i64> = page["table_items"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|t| t["table_number"].as_i64())
        .collect();
    assert_eq!(numbers, (10..20).collect::<Vec<_>>());

    let (_, page) = call!(
        &app,
        test::TestRequest::get().uri("/tables?page=oops&recordPerPage=5&startIndex=22"),
    );
    let numbers: Vec<i64> = page["table_items"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|t| t["table_number"].as_i64())
        .collect();
    assert_eq!(numbers, vec![22, 23, 24]);
}

#[actix_web::test]
async fn listings_survive_upserted_partial_records() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure),
    )
    .await;

    for n in [1, 2] {
        call!(
            &app,
            test::TestRequest::post()
                .uri("/tables")
                .set_json(json!({"table_number": n, "number_of_guests": 2})),
        );
    }
    let (status, outcome) = call!(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/tables/{}", Uuid::new_v4()))
            .set_json(json!({"number_of_guests": 3})),
    );
    assert_eq!(status, StatusCode::OK);
    assert!(outcome["upserted_id"].is_string());

    let (status, page) = call!(&app, test::TestRequest::get().uri("/tables"));
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["total_count"], json!(3));
    let numbers: Vec<i64> = page["table_items"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|t| t["table_number"].as_i64())
        .collect();
    assert_eq!(numbers, vec![1, 2]);

    let (status, _) = call!(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/invoices/{}", Uuid::new_v4()))
            .set_json(json!({"payment_method": "CARD"})),
    );
    assert_eq!(status, StatusCode::OK);
    let (status, invoices) = call!(&app, test::TestRequest::get().uri("/invoices"));
    assert_eq!(status, StatusCode::OK, "{invoices}");
    assert_eq!(invoices, json!([]));
}
