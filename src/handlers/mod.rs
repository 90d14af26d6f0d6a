pub mod catalog;
pub mod invoices;
pub mod orders;

use actix_web::web;
use bigdecimal::BigDecimal;
use utoipa::OpenApi;

use crate::domain::money::round2;
use crate::domain::ports::UpdateOutcome;
use crate::domain::records::{PaymentMethod, PaymentStatus};
use crate::errors::AppError;

/// Amounts leave the service as two-decimal strings, e.g. "9.00".
pub(crate) fn money_text(value: &BigDecimal) -> String {
    round2(value).to_string()
}

/// Malformed JSON bodies are reported like every other validation failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::bad_request(err.to_string()).into())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order,
        orders::order_billing,
        orders::create_order_items,
        orders::list_order_items,
        orders::get_order_item,
        orders::update_order_item,
        invoices::create_invoice,
        invoices::list_invoices,
        invoices::get_invoice,
        invoices::update_invoice,
        catalog::create_menu,
        catalog::list_menus,
        catalog::get_menu,
        catalog::update_menu,
        catalog::create_food,
        catalog::list_foods,
        catalog::get_food,
        catalog::update_food,
        catalog::create_table,
        catalog::list_tables,
        catalog::get_table,
        catalog::update_table,
    ),
    components(schemas(
        UpdateOutcome,
        PaymentMethod,
        PaymentStatus,
        orders::CreateOrderRequest,
        orders::UpdateOrderRequest,
        orders::OrderResponse,
        orders::OrderItemRequest,
        orders::CreateOrderItemsRequest,
        orders::CreateOrderItemsResponse,
        orders::OrderItemResponse,
        orders::BillingLineResponse,
        orders::BillingViewResponse,
        invoices::CreateInvoiceRequest,
        invoices::UpdateInvoiceRequest,
        invoices::InvoiceResponse,
        invoices::InvoiceViewResponse,
        catalog::MenuRequest,
        catalog::MenuResponse,
        catalog::FoodRequest,
        catalog::FoodResponse,
        catalog::FoodPageResponse,
        catalog::TableRequest,
        catalog::TableResponse,
        catalog::TablePageResponse,
    )),
    tags(
        (name = "orders", description = "Orders, line items and billing views"),
        (name = "invoices", description = "Invoices composed with their order's billing view"),
        (name = "catalog", description = "Menus, foods and tables"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn money_text_keeps_two_decimals() {
        let nine = BigDecimal::from_str("9").expect("decimal");
        assert_eq!(money_text(&nine), "9.00");
        let half = BigDecimal::from_str("3.995").expect("decimal");
        assert_eq!(money_text(&half), "4.00");
    }

    #[test]
    fn openapi_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        for path in ["/orders", "/orders/{order_id}/items", "/invoices/{invoice_id}", "/foods"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
