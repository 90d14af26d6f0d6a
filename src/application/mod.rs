pub mod billing;
pub mod catalog;
pub mod invoice_service;
pub mod order_service;

use bigdecimal::BigDecimal;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::money::decimal_to_number;

pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, DomainError> {
    value.ok_or_else(|| DomainError::Validation(format!("{field} is required")))
}

pub(crate) fn required_text(value: Option<String>, field: &str) -> Result<String, DomainError> {
    required(value, field).and_then(|text| {
        if text.trim().is_empty() {
            Err(DomainError::Validation(format!("{field} must not be empty")))
        } else {
            Ok(text)
        }
    })
}

pub(crate) fn amount_value(amount: &BigDecimal) -> Result<Value, DomainError> {
    decimal_to_number(amount)
        .map(Value::Number)
        .ok_or_else(|| DomainError::Validation(format!("amount {amount} is out of range")))
}

pub(crate) fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

pub(crate) fn id_value(id: Uuid) -> Value {
    Value::String(id.to_string())
}
