use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::deadline::Deadline;
use crate::domain::errors::DomainError;
use crate::domain::money::round2;
use crate::domain::pipeline::{Accumulator, Document, Expr, Filter, Pipeline};
use crate::domain::ports::{from_listed, RecordStore, TypedStore, Update, UpdateOutcome};
use crate::domain::records::{Food, Menu, Record, Table};

use super::{amount_value, id_value, required, required_text, timestamp_value};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_RECORDS_PER_PAGE: usize = 10;

/// Slice of a collection requested by a listing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub start_index: usize,
    pub records_per_page: usize,
}

fn positive(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok()).filter(|n| *n >= 1)
}

impl PageRequest {
    /// Build from raw query values. Invalid or missing values fall back to
    /// page 1 of 10; a valid `start_index` replaces the page-derived offset.
    pub fn from_query(
        page: Option<&str>,
        records_per_page: Option<&str>,
        start_index: Option<&str>,
    ) -> Self {
        let records_per_page = positive(records_per_page).unwrap_or(DEFAULT_RECORDS_PER_PAGE);
        let page = positive(page).unwrap_or(DEFAULT_PAGE);
        let mut start = (page - 1).saturating_mul(records_per_page);
        if let Some(explicit) = start_index.and_then(|s| s.trim().parse::<usize>().ok()) {
            start = explicit;
        }
        Self {
            start_index: start,
            records_per_page,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::from_query(None, None, None)
    }
}

/// match-all -> group everything into one bucket -> project the page slice.
pub fn page_pipeline(page: PageRequest) -> Pipeline {
    Pipeline::new()
        .matching(Filter::all())
        .group(
            vec![],
            vec![
                ("total_count", Accumulator::Count),
                ("data", Accumulator::PushRoot),
            ],
        )
        .project(vec![
            ("total_count", Expr::field("total_count")),
            (
                "items",
                Expr::slice("data", page.start_index, page.records_per_page),
            ),
        ])
}

#[derive(Debug, Clone)]
pub struct CatalogPage<R> {
    pub total_count: i64,
    pub items: Vec<R>,
}

#[derive(Deserialize)]
struct RawPage {
    total_count: i64,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

fn decode_page<R: Record>(doc: Document) -> Result<CatalogPage<R>, DomainError> {
    let malformed = |e: serde_json::Error| {
        DomainError::StoreUnavailable(format!("malformed {} page: {e}", R::COLLECTION))
    };
    let raw: RawPage = serde_json::from_value(serde_json::Value::Object(doc)).map_err(malformed)?;
    Ok(CatalogPage {
        total_count: raw.total_count,
        items: from_listed(raw.items),
    })
}

/// Accept an active window only if it opens strictly after `now` and closes
/// strictly after it opens.
pub fn validate_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if start <= now {
        return Err(DomainError::InvalidWindow(format!(
            "start_date {start} is not in the future"
        )));
    }
    if end <= start {
        return Err(DomainError::InvalidWindow(format!(
            "end_date {end} is not after start_date {start}"
        )));
    }
    Ok(())
}

fn window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, DomainError> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => validate_window(start, end, now).map(|_| Some((start, end))),
        _ => Err(DomainError::Validation(
            "start_date and end_date must be given together".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MenuInput {
    pub name: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct FoodInput {
    pub name: Option<String>,
    pub price: Option<BigDecimal>,
    pub food_image: Option<String>,
    pub menu_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TableInput {
    pub table_number: Option<i64>,
    pub number_of_guests: Option<i64>,
}

fn non_negative_price(price: BigDecimal) -> Result<BigDecimal, DomainError> {
    if price < BigDecimal::from(0) {
        return Err(DomainError::Validation(format!(
            "price must not be negative, got {price}"
        )));
    }
    Ok(round2(&price))
}

fn guests(count: i64) -> Result<i64, DomainError> {
    if count < 1 {
        return Err(DomainError::Validation(format!(
            "number_of_guests must be at least 1, got {count}"
        )));
    }
    Ok(count)
}

/// Single-record menu, food and table operations plus paginated listings.
pub struct CatalogService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: RecordStore + ?Sized> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn page<R: Record>(
        &self,
        page: PageRequest,
        deadline: Deadline,
    ) -> Result<CatalogPage<R>, DomainError> {
        let doc = self
            .store
            .aggregate(R::COLLECTION, &page_pipeline(page), deadline)?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::EmptyCatalog(R::COLLECTION.to_string()))?;
        decode_page(doc)
    }

    fn stamped_update(&self) -> Update {
        let now = Utc::now();
        Update::upsert()
            .set("updated_at", timestamp_value(now))
            .set_on_insert("created_at", timestamp_value(now))
    }

    pub fn create_menu(&self, input: MenuInput, deadline: Deadline) -> Result<Menu, DomainError> {
        let now = Utc::now();
        let bounds = window(input.start_date, input.end_date, now)?;
        let menu = Menu {
            menu_id: Uuid::new_v4(),
            name: required_text(input.name, "name")?,
            category: required_text(input.category, "category")?,
            start_date: bounds.map(|(start, _)| start),
            end_date: bounds.map(|(_, end)| end),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&menu, deadline)?;
        Ok(menu)
    }

    pub fn get_menu(&self, menu_id: Uuid, deadline: Deadline) -> Result<Menu, DomainError> {
        self.store.get_record(menu_id, deadline)
    }

    pub fn list_menus(&self, deadline: Deadline) -> Result<Vec<Menu>, DomainError> {
        self.store.find_records(&Filter::all(), deadline)
    }

    pub fn update_menu(
        &self,
        menu_id: Uuid,
        patch: MenuInput,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError> {
        let mut update = self.stamped_update();
        if let Some((start, end)) = window(patch.start_date, patch.end_date, Utc::now())? {
            update = update
                .set("start_date", timestamp_value(start))
                .set("end_date", timestamp_value(end));
        }
        if let Some(name) = patch.name {
            update = update.set("name", required_text(Some(name), "name")?);
        }
        if let Some(category) = patch.category {
            update = update.set("category", required_text(Some(category), "category")?);
        }
        self.store.update_record::<Menu>(menu_id, &update, deadline)
    }

    pub fn create_food(&self, input: FoodInput, deadline: Deadline) -> Result<Food, DomainError> {
        let name = required_text(input.name, "name")?;
        let price = non_negative_price(required(input.price, "price")?)?;
        let food_image = required_text(input.food_image, "food_image")?;
        let menu_id = required(input.menu_id, "menu_id")?;
        self.store.resolve::<Menu>(menu_id, deadline)?;

        let now = Utc::now();
        let food = Food {
            food_id: Uuid::new_v4(),
            name,
            price,
            food_image,
            menu_id,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&food, deadline)?;
        Ok(food)
    }

    pub fn get_food(&self, food_id: Uuid, deadline: Deadline) -> Result<Food, DomainError> {
        self.store.get_record(food_id, deadline)
    }

    pub fn list_foods(
        &self,
        page: PageRequest,
        deadline: Deadline,
    ) -> Result<CatalogPage<Food>, DomainError> {
        self.page(page, deadline)
    }

    pub fn update_food(
        &self,
        food_id: Uuid,
        patch: FoodInput,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError> {
        let mut update = self.stamped_update();
        if let Some(name) = patch.name {
            update = update.set("name", required_text(Some(name), "name")?);
        }
        if let Some(price) = patch.price {
            update = update.set("price", amount_value(&non_negative_price(price)?)?);
        }
        if let Some(image) = patch.food_image {
            update = update.set("food_image", image);
        }
        if let Some(menu_id) = patch.menu_id {
            self.store.resolve::<Menu>(menu_id, deadline)?;
            update = update.set("menu_id", id_value(menu_id));
        }
        self.store.update_record::<Food>(food_id, &update, deadline)
    }

    pub fn create_table(&self, input: TableInput, deadline: Deadline) -> Result<Table, DomainError> {
        let now = Utc::now();
        let table = Table {
            table_id: Uuid::new_v4(),
            table_number: required(input.table_number, "table_number")?,
            number_of_guests: guests(required(input.number_of_guests, "number_of_guests")?)?,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&table, deadline)?;
        Ok(table)
    }

    pub fn get_table(&self, table_id: Uuid, deadline: Deadline) -> Result<Table, DomainError> {
        self.store.get_record(table_id, deadline)
    }

    pub fn list_tables(
        &self,
        page: PageRequest,
        deadline: Deadline,
    ) -> Result<CatalogPage<Table>, DomainError> {
        self.page(page, deadline)
    }

    pub fn update_table(
        &self,
        table_id: Uuid,
        patch: TableInput,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError> {
        let mut update = self.stamped_update();
        if let Some(number) = patch.table_number {
            update = update.set("table_number", number);
        }
        if let Some(count) = patch.number_of_guests {
            update = update.set("number_of_guests", guests(count)?);
        }
        self.store.update_record::<Table>(table_id, &update, deadline)
    }
}
