use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::catalog::{FoodInput, MenuInput, PageRequest, TableInput};
use crate::domain::money;
use crate::domain::ports::UpdateOutcome;
use crate::domain::records::{Food, Menu, Table};
use crate::errors::AppError;
use crate::AppState;

use super::money_text;

// ── Pagination ───────────────────────────────────────────────────────────────

/// Raw paging values. Anything that is not a valid number falls back to the
/// defaults instead of failing the request.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number (1-based). Defaults to 1.
    pub page: Option<String>,
    /// Records per page. Defaults to 10.
    #[serde(rename = "recordPerPage")]
    pub record_per_page: Option<String>,
    /// Absolute offset; replaces the page-derived offset when valid.
    #[serde(rename = "startIndex")]
    pub start_index: Option<String>,
}

impl PageQuery {
    fn page_request(&self) -> PageRequest {
        PageRequest::from_query(
            self.page.as_deref(),
            self.record_per_page.as_deref(),
            self.start_index.as_deref(),
        )
    }
}

// ── Menus ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MenuRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl From<MenuRequest> for MenuInput {
    fn from(r: MenuRequest) -> Self {
        Self {
            name: r.name,
            category: r.category,
            start_date: r.start_date,
            end_date: r.end_date,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MenuResponse {
    pub menu_id: Uuid,
    pub name: String,
    pub category: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Menu> for MenuResponse {
    fn from(m: Menu) -> Self {
        Self {
            menu_id: m.menu_id,
            name: m.name,
            category: m.category,
            start_date: m.start_date,
            end_date: m.end_date,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/menus",
    request_body = MenuRequest,
    responses(
        (status = 201, description = "Menu created", body = MenuResponse),
        (status = 400, description = "Missing field or invalid window"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn create_menu(
    state: web::Data<AppState>,
    body: web::Json<MenuRequest>,
) -> Result<HttpResponse, AppError> {
    let input = MenuInput::from(body.into_inner());
    let deadline = state.deadline();
    let catalog = state.catalog();

    let menu = web::block(move || catalog.create_menu(input, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(MenuResponse::from(menu)))
}

#[utoipa::path(
    get,
    path = "/menus",
    responses(
        (status = 200, description = "All menus", body = Vec<MenuResponse>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn list_menus(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let deadline = state.deadline();
    let catalog = state.catalog();

    let menus = web::block(move || catalog.list_menus(deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<MenuResponse> = menus.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/menus/{menu_id}",
    params(
        ("menu_id" = Uuid, Path, description = "Menu UUID"),
    ),
    responses(
        (status = 200, description = "Menu found", body = MenuResponse),
        (status = 404, description = "Menu not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn get_menu(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let menu_id = path.into_inner();
    let deadline = state.deadline();
    let catalog = state.catalog();

    let menu = web::block(move || catalog.get_menu(menu_id, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(MenuResponse::from(menu)))
}

/// PATCH /menus/{menu_id}
///
/// A new active window needs both bounds, opening in the future.
#[utoipa::path(
    patch,
    path = "/menus/{menu_id}",
    params(
        ("menu_id" = Uuid, Path, description = "Menu UUID"),
    ),
    request_body = MenuRequest,
    responses(
        (status = 200, description = "Update applied", body = UpdateOutcome),
        (status = 400, description = "Invalid window"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn update_menu(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<MenuRequest>,
) -> Result<HttpResponse, AppError> {
    let menu_id = path.into_inner();
    let patch = MenuInput::from(body.into_inner());
    let deadline = state.deadline();
    let catalog = state.catalog();

    let outcome = web::block(move || catalog.update_menu(menu_id, patch, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(outcome))
}

// ── Foods ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FoodRequest {
    pub name: Option<String>,
    /// Decimal price as a number or a string, e.g. "9.99"
    #[serde(default, with = "money::option_amount")]
    #[schema(value_type = Option<String>)]
    pub price: Option<BigDecimal>,
    pub food_image: Option<String>,
    pub menu_id: Option<Uuid>,
}

impl From<FoodRequest> for FoodInput {
    fn from(r: FoodRequest) -> Self {
        Self {
            name: r.name,
            price: r.price,
            food_image: r.food_image,
            menu_id: r.menu_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FoodResponse {
    pub food_id: Uuid,
    pub name: String,
    pub price: String,
    pub food_image: String,
    pub menu_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Food> for FoodResponse {
    fn from(f: Food) -> Self {
        Self {
            food_id: f.food_id,
            name: f.name,
            price: money_text(&f.price),
            food_image: f.food_image,
            menu_id: f.menu_id,
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FoodPageResponse {
    pub total_count: i64,
    pub food_items: Vec<FoodResponse>,
}

#[utoipa::path(
    post,
    path = "/foods",
    request_body = FoodRequest,
    responses(
        (status = 201, description = "Food created", body = FoodResponse),
        (status = 400, description = "Missing field or unknown menu"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn create_food(
    state: web::Data<AppState>,
    body: web::Json<FoodRequest>,
) -> Result<HttpResponse, AppError> {
    let input = FoodInput::from(body.into_inner());
    let deadline = state.deadline();
    let catalog = state.catalog();

    let food = web::block(move || catalog.create_food(input, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(FoodResponse::from(food)))
}

/// GET /foods
///
/// One page of foods plus the total number stored.
#[utoipa::path(
    get,
    path = "/foods",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of foods", body = FoodPageResponse),
        (status = 404, description = "No foods stored"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn list_foods(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page_request();
    let deadline = state.deadline();
    let catalog = state.catalog();

    let result = web::block(move || catalog.list_foods(page, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(FoodPageResponse {
        total_count: result.total_count,
        food_items: result.items.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/foods/{food_id}",
    params(
        ("food_id" = Uuid, Path, description = "Food UUID"),
    ),
    responses(
        (status = 200, description = "Food found", body = FoodResponse),
        (status = 404, description = "Food not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn get_food(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let food_id = path.into_inner();
    let deadline = state.deadline();
    let catalog = state.catalog();

    let food = web::block(move || catalog.get_food(food_id, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(FoodResponse::from(food)))
}

#[utoipa::path(
    patch,
    path = "/foods/{food_id}",
    params(
        ("food_id" = Uuid, Path, description = "Food UUID"),
    ),
    request_body = FoodRequest,
    responses(
        (status = 200, description = "Update applied", body = UpdateOutcome),
        (status = 400, description = "Invalid price or unknown menu"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn update_food(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<FoodRequest>,
) -> Result<HttpResponse, AppError> {
    let food_id = path.into_inner();
    let patch = FoodInput::from(body.into_inner());
    let deadline = state.deadline();
    let catalog = state.catalog();

    let outcome = web::block(move || catalog.update_food(food_id, patch, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(outcome))
}

// ── Tables ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TableRequest {
    pub table_number: Option<i64>,
    pub number_of_guests: Option<i64>,
}

impl From<TableRequest> for TableInput {
    fn from(r: TableRequest) -> Self {
        Self {
            table_number: r.table_number,
            number_of_guests: r.number_of_guests,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TableResponse {
    pub table_id: Uuid,
    pub table_number: i64,
    pub number_of_guests: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Table> for TableResponse {
    fn from(t: Table) -> Self {
        Self {
            table_id: t.table_id,
            table_number: t.table_number,
            number_of_guests: t.number_of_guests,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TablePageResponse {
    pub total_count: i64,
    pub table_items: Vec<TableResponse>,
}

#[utoipa::path(
    post,
    path = "/tables",
    request_body = TableRequest,
    responses(
        (status = 201, description = "Table created", body = TableResponse),
        (status = 400, description = "Missing field"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn create_table(
    state: web::Data<AppState>,
    body: web::Json<TableRequest>,
) -> Result<HttpResponse, AppError> {
    let input = TableInput::from(body.into_inner());
    let deadline = state.deadline();
    let catalog = state.catalog();

    let table = web::block(move || catalog.create_table(input, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(TableResponse::from(table)))
}

#[utoipa::path(
    get,
    path = "/tables",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of tables", body = TablePageResponse),
        (status = 404, description = "No tables stored"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn list_tables(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page_request();
    let deadline = state.deadline();
    let catalog = state.catalog();

    let result = web::block(move || catalog.list_tables(page, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(TablePageResponse {
        total_count: result.total_count,
        table_items: result.items.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/tables/{table_id}",
    params(
        ("table_id" = Uuid, Path, description = "Table UUID"),
    ),
    responses(
        (status = 200, description = "Table found", body = TableResponse),
        (status = 404, description = "Table not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn get_table(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let table_id = path.into_inner();
    let deadline = state.deadline();
    let catalog = state.catalog();

    let table = web::block(move || catalog.get_table(table_id, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(TableResponse::from(table)))
}

#[utoipa::path(
    patch,
    path = "/tables/{table_id}",
    params(
        ("table_id" = Uuid, Path, description = "Table UUID"),
    ),
    request_body = TableRequest,
    responses(
        (status = 200, description = "Update applied", body = UpdateOutcome),
        (status = 400, description = "Invalid guest count"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "catalog"
)]
pub async fn update_table(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<TableRequest>,
) -> Result<HttpResponse, AppError> {
    let table_id = path.into_inner();
    let patch = TableInput::from(body.into_inner());
    let deadline = state.deadline();
    let catalog = state.catalog();

    let outcome = web::block(move || catalog.update_table(table_id, patch, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(outcome))
}
