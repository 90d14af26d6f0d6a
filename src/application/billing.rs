use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::deadline::Deadline;
use crate::domain::errors::DomainError;
use crate::domain::money;
use crate::domain::pipeline::{Accumulator, Document, Expr, Filter, Pipeline};
use crate::domain::ports::RecordStore;
use crate::domain::records::Collection;

/// How a line item contributes to the amount due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaymentDuePolicy {
    /// Each line counts its unit price once, whatever the quantity.
    #[default]
    UnitPrice,
    PriceTimesQuantity,
}

impl FromStr for PaymentDuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit_price" => Ok(PaymentDuePolicy::UnitPrice),
            "price_times_quantity" => Ok(PaymentDuePolicy::PriceTimesQuantity),
            other => Err(format!("unknown payment due policy '{other}'")),
        }
    }
}

/// One denormalized line of a billing view.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingLine {
    pub order_id: Uuid,
    #[serde(default, with = "money::option_amount")]
    pub amount: Option<BigDecimal>,
    #[serde(default)]
    pub food_name: Option<String>,
    #[serde(default)]
    pub food_image: Option<String>,
    #[serde(default)]
    pub table_id: Option<Uuid>,
    #[serde(default)]
    pub table_number: Option<i64>,
    #[serde(default, with = "money::option_amount")]
    pub unit_price: Option<BigDecimal>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// Charges of one order, recomputed from its line items on every read.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingView {
    #[serde(with = "money::amount")]
    pub payment_due: BigDecimal,
    pub total_count: i64,
    #[serde(default)]
    pub table_number: Option<i64>,
    pub order_items: Vec<BillingLine>,
}

/// match -> join food -> join order -> join table -> project -> group -> project.
///
/// The table join reads `order.table_id`, which only exists after the order
/// join, and the group key reads fields named by the first projection.
pub fn billing_pipeline(order_id: Uuid, policy: PaymentDuePolicy) -> Pipeline {
    let amount = match policy {
        PaymentDuePolicy::UnitPrice => Expr::field("unit_price"),
        PaymentDuePolicy::PriceTimesQuantity => {
            Expr::multiply(Expr::field("unit_price"), Expr::field("quantity"))
        }
    };

    Pipeline::new()
        .matching(Filter::eq("order_id", order_id.to_string()))
        .join_one(Collection::Food, "food_id", "food_id", "food")
        .join_one(Collection::Order, "order_id", "order_id", "order")
        .join_one(Collection::Table, "order.table_id", "table_id", "table")
        .project(vec![
            ("amount", amount),
            ("total_count", Expr::literal(1)),
            ("food_name", Expr::field("food.name")),
            ("food_image", Expr::field("food.food_image")),
            ("table_number", Expr::field("table.table_number")),
            ("table_id", Expr::field("table.table_id")),
            ("order_id", Expr::field("order_id")),
            ("unit_price", Expr::field("unit_price")),
            ("quantity", Expr::field("quantity")),
        ])
        .group(
            vec![
                ("order_id", Expr::field("order_id")),
                ("table_id", Expr::field("table_id")),
                ("table_number", Expr::field("table_number")),
            ],
            vec![
                ("payment_due", Accumulator::Sum(Expr::field("amount"))),
                ("total_count", Accumulator::Count),
                ("order_items", Accumulator::PushRoot),
            ],
        )
        .project(vec![
            ("payment_due", Expr::field("payment_due")),
            ("total_count", Expr::field("total_count")),
            ("table_number", Expr::field("_id.table_number")),
            ("order_items", Expr::field("order_items")),
        ])
}

fn decode_view(doc: Document) -> Result<BillingView, DomainError> {
    serde_json::from_value(serde_json::Value::Object(doc))
        .map_err(|e| DomainError::StoreUnavailable(format!("malformed billing view: {e}")))
}

pub struct BillingService<S: ?Sized> {
    store: Arc<S>,
    policy: PaymentDuePolicy,
}

impl<S: RecordStore + ?Sized> BillingService<S> {
    pub fn new(store: Arc<S>, policy: PaymentDuePolicy) -> Self {
        Self { store, policy }
    }

    /// Every aggregate the pipeline yields for `order_id`; empty when the
    /// order has no line items.
    pub fn items_by_order(
        &self,
        order_id: Uuid,
        deadline: Deadline,
    ) -> Result<Vec<BillingView>, DomainError> {
        self.store
            .aggregate(
                Collection::OrderItem,
                &billing_pipeline(order_id, self.policy),
                deadline,
            )?
            .into_iter()
            .map(decode_view)
            .collect()
    }

    /// The single billing view of an order, `NotFound` when it has no items.
    pub fn billing_view(&self, order_id: Uuid, deadline: Deadline) -> Result<BillingView, DomainError> {
        self.items_by_order(order_id, deadline)?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::NotFound(format!("line items of order '{order_id}'")))
    }
}
