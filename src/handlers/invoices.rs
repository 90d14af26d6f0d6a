use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::invoice_service::{InvoiceInput, InvoicePatch, InvoiceView};
use crate::domain::ports::UpdateOutcome;
use crate::domain::records::{Invoice, PaymentMethod, PaymentStatus};
use crate::errors::AppError;
use crate::AppState;

use super::money_text;
use super::orders::BillingLineResponse;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    pub order_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    /// Defaults to PENDING
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateInvoiceRequest {
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub invoice_id: Uuid,
    pub order_id: Uuid,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub payment_due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(i: Invoice) -> Self {
        Self {
            invoice_id: i.invoice_id,
            order_id: i.order_id,
            payment_method: i.payment_method,
            payment_status: i.payment_status,
            payment_due_date: i.payment_due_date,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceViewResponse {
    pub invoice_id: Uuid,
    pub order_id: Uuid,
    /// "CARD", "CASH", or "null" while unset
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub payment_due: String,
    pub table_number: Option<i64>,
    pub payment_due_date: DateTime<Utc>,
    pub order_details: Vec<BillingLineResponse>,
}

impl From<InvoiceView> for InvoiceViewResponse {
    fn from(v: InvoiceView) -> Self {
        Self {
            invoice_id: v.invoice_id,
            order_id: v.order_id,
            payment_method: v.payment_method,
            payment_status: v.payment_status,
            payment_due: money_text(&v.payment_due),
            table_number: v.table_number,
            payment_due_date: v.payment_due_date,
            order_details: v.order_details.into_iter().map(Into::into).collect(),
        }
    }
}

/// POST /invoices
#[utoipa::path(
    post,
    path = "/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = InvoiceResponse),
        (status = 400, description = "Missing or unknown order"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "invoices"
)]
pub async fn create_invoice(
    state: web::Data<AppState>,
    body: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let input = InvoiceInput {
        order_id: body.order_id,
        payment_method: body.payment_method,
        payment_status: body.payment_status,
    };
    let deadline = state.deadline();
    let invoices = state.invoices();

    let invoice = web::block(move || invoices.create_invoice(input, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(InvoiceResponse::from(invoice)))
}

/// GET /invoices
#[utoipa::path(
    get,
    path = "/invoices",
    responses(
        (status = 200, description = "All invoices", body = Vec<InvoiceResponse>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "invoices"
)]
pub async fn list_invoices(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let deadline = state.deadline();
    let invoices = state.invoices();

    let result = web::block(move || invoices.list_invoices(deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let body: Vec<InvoiceResponse> = result.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /invoices/{invoice_id}
///
/// The invoice merged with its order's current billing view.
#[utoipa::path(
    get,
    path = "/invoices/{invoice_id}",
    params(
        ("invoice_id" = Uuid, Path, description = "Invoice UUID"),
    ),
    responses(
        (status = 200, description = "Invoice view", body = InvoiceViewResponse),
        (status = 404, description = "Invoice not found or order has no items"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "invoices"
)]
pub async fn get_invoice(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let invoice_id = path.into_inner();
    let deadline = state.deadline();
    let invoices = state.invoices();

    let view = web::block(move || invoices.get_invoice_view(invoice_id, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(InvoiceViewResponse::from(view)))
}

/// PATCH /invoices/{invoice_id}
#[utoipa::path(
    patch,
    path = "/invoices/{invoice_id}",
    params(
        ("invoice_id" = Uuid, Path, description = "Invoice UUID"),
    ),
    request_body = UpdateInvoiceRequest,
    responses(
        (status = 200, description = "Update applied", body = UpdateOutcome),
        (status = 400, description = "Invalid payment method or status"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "invoices"
)]
pub async fn update_invoice(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    let invoice_id = path.into_inner();
    let body = body.into_inner();
    let patch = InvoicePatch {
        payment_method: body.payment_method,
        payment_status: body.payment_status,
    };
    let deadline = state.deadline();
    let invoices = state.invoices();

    let outcome = web::block(move || invoices.update_invoice(invoice_id, patch, deadline))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(outcome))
}
