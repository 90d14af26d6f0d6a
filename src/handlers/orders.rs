use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::billing::{BillingLine, BillingView};
use crate::application::order_service::OrderItemInput;
use crate::domain::money;
use crate::domain::ports::UpdateOutcome;
use crate::domain::records::{Order, OrderItem};
use crate::errors::AppError;
use crate::AppState;

use super::money_text;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub table_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub table_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub table_id: Option<Uuid>,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            order_id: o.order_id,
            table_id: o.table_id,
            order_date: o.order_date,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub food_id: Option<Uuid>,
    pub quantity: Option<i64>,
    /// Decimal price as a number or a string, e.g. "9.99"
    #[serde(default, with = "money::option_amount")]
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<BigDecimal>,
}

impl From<OrderItemRequest> for OrderItemInput {
    fn from(r: OrderItemRequest) -> Self {
        Self {
            food_id: r.food_id,
            quantity: r.quantity,
            unit_price: r.unit_price,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemsRequest {
    pub table_id: Option<Uuid>,
    pub order_items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderItemsResponse {
    pub order_id: Uuid,
    pub order_item_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub food_id: Uuid,
    pub quantity: i64,
    pub unit_price: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(i: OrderItem) -> Self {
        Self {
            order_item_id: i.order_item_id,
            order_id: i.order_id,
            food_id: i.food_id,
            quantity: i.quantity,
            unit_price: money_text(&i.unit_price),
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BillingLineResponse {
    pub order_id: Uuid,
    pub food_name: Option<String>,
    pub food_image: Option<String>,
    pub table_id: Option<Uuid>,
    pub table_number: Option<i64>,
    pub quantity: Option<i64>,
    pub unit_price: Option<String>,
    /// This line's contribution to `payment_due`
    pub amount: Option<String>,
}

impl From<BillingLine> for BillingLineResponse {
    fn from(l: BillingLine) -> Self {
        Self {
            order_id: l.order_id,
            food_name: l.food_name,
            food_image: l.food_image,
            table_id: l.table_id,
            table_number: l.table_number,
            quantity: l.quantity,
            unit_price: l.unit_price.as_ref().map(money_text),
            amount: l.amount.as_ref().map(money_text),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BillingViewResponse {
    pub payment_due: String,
    pub total_count: i64,
    pub table_number: Option<i64>,
    pub order_items: Vec<BillingLineResponse>,
}

impl From<BillingView> for BillingViewResponse {
    fn from(v: BillingView) -> Self {
        Self {
            payment_due: money_text(&v.payment_due),
            total_count: v.total_count,
            table_number: v.table_number,
            order_items: v.order_items.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Orders ───────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Creates an order without line items. A given table must exist.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Unknown table"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let deadline = state.deadline();
    let orders = state.orders();

    let order = web::block(move || orders.create_order(body.table_id, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// GET /orders
#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "All orders", body = Vec<OrderResponse>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let deadline = state.deadline();
    let orders = state.orders();

    let result = web::block(move || orders.list_orders(deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<OrderResponse> = result.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /orders/{order_id}
#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let deadline = state.deadline();
    let orders = state.orders();

    let order = web::block(move || orders.get_order(order_id, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PATCH /orders/{order_id}
///
/// Moves the order to another table; the table must exist.
#[utoipa::path(
    patch,
    path = "/orders/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order UUID"),
    ),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Update applied", body = UpdateOutcome),
        (status = 400, description = "Unknown table"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn update_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let body = body.into_inner();
    let deadline = state.deadline();
    let orders = state.orders();

    let outcome = web::block(move || orders.update_order(order_id, body.table_id, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(outcome))
}

/// GET /orders/{order_id}/items
///
/// The billing view of the order, recomputed from its line items. An order
/// without items yields an empty list.
#[utoipa::path(
    get,
    path = "/orders/{order_id}/items",
    params(
        ("order_id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Billing views", body = Vec<BillingViewResponse>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn order_billing(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let deadline = state.deadline();
    let billing = state.billing();

    let views = web::block(move || billing.items_by_order(order_id, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<BillingViewResponse> = views.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

// ── Order items ──────────────────────────────────────────────────────────────

/// POST /order-items
///
/// Creates an order and all of its line items. Every item is validated and
/// every reference resolved before anything is written; if the items cannot
/// be stored the order is removed again.
#[utoipa::path(
    post,
    path = "/order-items",
    request_body = CreateOrderItemsRequest,
    responses(
        (status = 201, description = "Order and items created", body = CreateOrderItemsResponse),
        (status = 400, description = "Invalid item or unknown reference"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order_items(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderItemsRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let items: Vec<OrderItemInput> = body.order_items.into_iter().map(Into::into).collect();
    let deadline = state.deadline();
    let orders = state.orders();

    let created = web::block(move || orders.create_order_with_items(body.table_id, items, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(CreateOrderItemsResponse {
        order_id: created.order_id,
        order_item_ids: created.order_item_ids,
    }))
}

/// GET /order-items
#[utoipa::path(
    get,
    path = "/order-items",
    responses(
        (status = 200, description = "All line items", body = Vec<OrderItemResponse>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_order_items(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let deadline = state.deadline();
    let orders = state.orders();

    let items = web::block(move || orders.list_order_items(deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<OrderItemResponse> = items.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /order-items/{order_item_id}
#[utoipa::path(
    get,
    path = "/order-items/{order_item_id}",
    params(
        ("order_item_id" = Uuid, Path, description = "Line item UUID"),
    ),
    responses(
        (status = 200, description = "Line item found", body = OrderItemResponse),
        (status = 404, description = "Line item not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order_item(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_item_id = path.into_inner();
    let deadline = state.deadline();
    let orders = state.orders();

    let item = web::block(move || orders.get_order_item(order_item_id, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderItemResponse::from(item)))
}

/// PATCH /order-items/{order_item_id}
#[utoipa::path(
    patch,
    path = "/order-items/{order_item_id}",
    params(
        ("order_item_id" = Uuid, Path, description = "Line item UUID"),
    ),
    request_body = OrderItemRequest,
    responses(
        (status = 200, description = "Update applied", body = UpdateOutcome),
        (status = 400, description = "Invalid field or unknown food"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn update_order_item(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<OrderItemRequest>,
) -> Result<HttpResponse, AppError> {
    let order_item_id = path.into_inner();
    let patch = OrderItemInput::from(body.into_inner());
    let deadline = state.deadline();
    let orders = state.orders();

    let outcome = web::block(move || orders.update_order_item(order_item_id, patch, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(outcome))
}
