use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money;

/// The six document collections held by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Food,
    Menu,
    Table,
    Order,
    OrderItem,
    Invoice,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Food => "food",
            Collection::Menu => "menu",
            Collection::Table => "table",
            Collection::Order => "order",
            Collection::OrderItem => "orderItem",
            Collection::Invoice => "invoice",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed record persisted as one document of a collection. The public
/// identifier lives in `ID_FIELD` and doubles as the document `_id`.
pub trait Record: Serialize + DeserializeOwned + Send + 'static {
    const COLLECTION: Collection;
    const ID_FIELD: &'static str;

    fn id(&self) -> Uuid;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub food_id: Uuid,
    pub name: String,
    #[serde(with = "money::amount")]
    pub price: BigDecimal,
    pub food_image: String,
    pub menu_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Food {
    const COLLECTION: Collection = Collection::Food;
    const ID_FIELD: &'static str = "food_id";

    fn id(&self) -> Uuid {
        self.food_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Menu {
    pub menu_id: Uuid,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Menu {
    const COLLECTION: Collection = Collection::Menu;
    const ID_FIELD: &'static str = "menu_id";

    fn id(&self) -> Uuid {
        self.menu_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub table_id: Uuid,
    pub table_number: i64,
    pub number_of_guests: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Table {
    const COLLECTION: Collection = Collection::Table;
    const ID_FIELD: &'static str = "table_id";

    fn id(&self) -> Uuid {
        self.table_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    #[serde(default)]
    pub table_id: Option<Uuid>,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Order {
    const COLLECTION: Collection = Collection::Order;
    const ID_FIELD: &'static str = "order_id";

    fn id(&self) -> Uuid {
        self.order_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub food_id: Uuid,
    pub quantity: i64,
    #[serde(with = "money::amount")]
    pub unit_price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for OrderItem {
    const COLLECTION: Collection = Collection::OrderItem;
    const ID_FIELD: &'static str = "order_item_id";

    fn id(&self) -> Uuid {
        self.order_item_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Card,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::Cash => "CASH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub order_id: Uuid,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub payment_due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Invoice {
    const COLLECTION: Collection = Collection::Invoice;
    const ID_FIELD: &'static str = "invoice_id";

    fn id(&self) -> Uuid {
        self.invoice_id
    }
}
