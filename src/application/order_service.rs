use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::deadline::Deadline;
use crate::domain::errors::DomainError;
use crate::domain::money::round2;
use crate::domain::pipeline::Filter;
use crate::domain::ports::{RecordStore, TypedStore, Update, UpdateOutcome};
use crate::domain::records::{Collection, Food, Order, OrderItem, Table};

use super::{amount_value, id_value, required, timestamp_value};

/// Budget for undoing a half-written order once the request's own deadline
/// may already be spent.
const COMPENSATION_TIMEOUT: Duration = Duration::from_secs(5);

/// A requested line item as received; every field is checked before any
/// record is written.
#[derive(Debug, Clone, Default)]
pub struct OrderItemInput {
    pub food_id: Option<Uuid>,
    pub quantity: Option<i64>,
    pub unit_price: Option<BigDecimal>,
}

#[derive(Debug, Clone)]
struct ValidItem {
    food_id: Uuid,
    quantity: i64,
    unit_price: BigDecimal,
}

fn validate_quantity(quantity: i64, field: &str) -> Result<i64, DomainError> {
    if quantity < 1 {
        return Err(DomainError::Validation(format!(
            "{field} must be at least 1, got {quantity}"
        )));
    }
    Ok(quantity)
}

fn validate_price(price: BigDecimal, field: &str) -> Result<BigDecimal, DomainError> {
    if price < BigDecimal::from(0) {
        return Err(DomainError::Validation(format!(
            "{field} must not be negative, got {price}"
        )));
    }
    Ok(round2(&price))
}

fn validate_item(index: usize, item: OrderItemInput) -> Result<ValidItem, DomainError> {
    let field = |name: &str| format!("order_items[{index}].{name}");
    Ok(ValidItem {
        food_id: required(item.food_id, &field("food_id"))?,
        quantity: validate_quantity(required(item.quantity, &field("quantity"))?, &field("quantity"))?,
        unit_price: validate_price(
            required(item.unit_price, &field("unit_price"))?,
            &field("unit_price"),
        )?,
    })
}

#[derive(Debug, Clone)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub order_item_ids: Vec<Uuid>,
}

pub struct OrderService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: RecordStore + ?Sized> OrderService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn check_table(&self, table_id: Option<Uuid>, deadline: Deadline) -> Result<(), DomainError> {
        if let Some(table_id) = table_id {
            self.store.resolve::<Table>(table_id, deadline)?;
        }
        Ok(())
    }

    /// Create an order without line items.
    pub fn create_order(
        &self,
        table_id: Option<Uuid>,
        deadline: Deadline,
    ) -> Result<Order, DomainError> {
        self.check_table(table_id, deadline)?;
        let now = Utc::now();
        let order = Order {
            order_id: Uuid::new_v4(),
            table_id,
            order_date: now,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&order, deadline)?;
        Ok(order)
    }

    /// Create an order and its line items as one logical unit.
    ///
    /// All validation and reference checks happen before the order is
    /// written. If the bulk item insert then fails, the order and any items
    /// that did land are removed again before the error is returned.
    pub fn create_order_with_items(
        &self,
        table_id: Option<Uuid>,
        items: Vec<OrderItemInput>,
        deadline: Deadline,
    ) -> Result<OrderCreated, DomainError> {
        let items = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| validate_item(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        self.check_table(table_id, deadline)?;
        let food_ids: HashSet<Uuid> = items.iter().map(|item| item.food_id).collect();
        for food_id in food_ids {
            self.store.resolve::<Food>(food_id, deadline)?;
        }

        let now = Utc::now();
        let order = Order {
            order_id: Uuid::new_v4(),
            table_id,
            order_date: now,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&order, deadline)?;

        let records: Vec<OrderItem> = items
            .into_iter()
            .map(|item| OrderItem {
                order_item_id: Uuid::new_v4(),
                order_id: order.order_id,
                food_id: item.food_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                created_at: now,
                updated_at: now,
            })
            .collect();

        match self.store.insert_records(&records, deadline) {
            Ok(order_item_ids) => {
                log::info!(
                    "Created order {} with {} line items",
                    order.order_id,
                    order_item_ids.len()
                );
                Ok(OrderCreated {
                    order_id: order.order_id,
                    order_item_ids,
                })
            }
            Err(e) => {
                self.compensate(order.order_id);
                Err(e)
            }
        }
    }

    fn compensate(&self, order_id: Uuid) {
        log::warn!("Line item insert failed, removing order {}", order_id);
        let deadline = Deadline::after(COMPENSATION_TIMEOUT);
        let by_order = Filter::eq("order_id", order_id.to_string());
        let undo = self
            .store
            .delete(Collection::OrderItem, &by_order, deadline)
            .and_then(|_| self.store.delete(Collection::Order, &by_order, deadline));
        if let Err(e) = undo {
            log::error!("Could not remove incomplete order {}: {}", order_id, e);
        }
    }

    pub fn get_order(&self, order_id: Uuid, deadline: Deadline) -> Result<Order, DomainError> {
        self.store.get_record(order_id, deadline)
    }

    pub fn list_orders(&self, deadline: Deadline) -> Result<Vec<Order>, DomainError> {
        self.store.find_records(&Filter::all(), deadline)
    }

    /// Point an order at another table. The table must exist.
    pub fn update_order(
        &self,
        order_id: Uuid,
        table_id: Option<Uuid>,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError> {
        self.check_table(table_id, deadline)?;
        let now = Utc::now();
        let mut update = Update::upsert()
            .set("updated_at", timestamp_value(now))
            .set_on_insert("created_at", timestamp_value(now))
            .set_on_insert("order_date", timestamp_value(now));
        if let Some(table_id) = table_id {
            update = update.set("table_id", id_value(table_id));
        }
        self.store.update_record::<Order>(order_id, &update, deadline)
    }

    pub fn list_order_items(&self, deadline: Deadline) -> Result<Vec<OrderItem>, DomainError> {
        self.store.find_records(&Filter::all(), deadline)
    }

    pub fn get_order_item(
        &self,
        order_item_id: Uuid,
        deadline: Deadline,
    ) -> Result<OrderItem, DomainError> {
        self.store.get_record(order_item_id, deadline)
    }

    /// Partial update of one line item; a new unit price is normalized and a
    /// new food reference must resolve.
    pub fn update_order_item(
        &self,
        order_item_id: Uuid,
        patch: OrderItemInput,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError> {
        let now = Utc::now();
        let mut update = Update::upsert()
            .set("updated_at", timestamp_value(now))
            .set_on_insert("created_at", timestamp_value(now));
        if let Some(quantity) = patch.quantity {
            update = update.set("quantity", validate_quantity(quantity, "quantity")?);
        }
        if let Some(price) = patch.unit_price {
            update = update.set(
                "unit_price",
                amount_value(&validate_price(price, "unit_price")?)?,
            );
        }
        if let Some(food_id) = patch.food_id {
            self.store.resolve::<Food>(food_id, deadline)?;
            update = update.set("food_id", id_value(food_id));
        }
        self.store
            .update_record::<OrderItem>(order_item_id, &update, deadline)
    }

    /// Items currently stored for `order_id`, in insertion order.
    pub fn items_of(&self, order_id: Uuid, deadline: Deadline) -> Result<Vec<OrderItem>, DomainError> {
        self.store.find_records(
            &Filter::eq("order_id", order_id.to_string()),
            deadline,
        )
    }
}
