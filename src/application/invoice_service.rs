use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::deadline::Deadline;
use crate::domain::errors::DomainError;
use crate::domain::pipeline::Filter;
use crate::domain::ports::{RecordStore, TypedStore, Update, UpdateOutcome};
use crate::domain::records::{Invoice, Order, PaymentMethod, PaymentStatus};

use super::billing::{BillingLine, BillingService, PaymentDuePolicy};
use super::{required, timestamp_value};

/// Shown for `payment_method` when the invoice has none yet.
pub const UNSET_PAYMENT_METHOD: &str = "null";

#[derive(Debug, Clone, Default)]
pub struct InvoiceInput {
    pub order_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoicePatch {
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
}

/// An invoice merged with the billing view of its order.
#[derive(Debug, Clone)]
pub struct InvoiceView {
    pub invoice_id: Uuid,
    pub order_id: Uuid,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub payment_due: BigDecimal,
    pub table_number: Option<i64>,
    pub payment_due_date: DateTime<Utc>,
    pub order_details: Vec<BillingLine>,
}

pub struct InvoiceService<S: ?Sized> {
    store: Arc<S>,
    billing: BillingService<S>,
}

impl<S: RecordStore + ?Sized> InvoiceService<S> {
    pub fn new(store: Arc<S>, policy: PaymentDuePolicy) -> Self {
        Self {
            billing: BillingService::new(store.clone(), policy),
            store,
        }
    }

    /// Issue an invoice for an existing order, due one day from now.
    pub fn create_invoice(
        &self,
        input: InvoiceInput,
        deadline: Deadline,
    ) -> Result<Invoice, DomainError> {
        let order_id = required(input.order_id, "order_id")?;
        self.store.resolve::<Order>(order_id, deadline)?;

        let now = Utc::now();
        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            order_id,
            payment_method: input.payment_method,
            payment_status: input.payment_status.unwrap_or_default(),
            payment_due_date: now + Duration::days(1),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&invoice, deadline)?;
        log::info!("Created invoice {} for order {}", invoice.invoice_id, order_id);
        Ok(invoice)
    }

    pub fn list_invoices(&self, deadline: Deadline) -> Result<Vec<Invoice>, DomainError> {
        self.store.find_records(&Filter::all(), deadline)
    }

    pub fn get_invoice(&self, invoice_id: Uuid, deadline: Deadline) -> Result<Invoice, DomainError> {
        self.store.get_record(invoice_id, deadline)
    }

    /// Compose the client-facing view. The due date is the stored one, never
    /// recomputed; charges come from the order's current line items.
    pub fn get_invoice_view(
        &self,
        invoice_id: Uuid,
        deadline: Deadline,
    ) -> Result<InvoiceView, DomainError> {
        let invoice = self.get_invoice(invoice_id, deadline)?;
        let billing = self.billing.billing_view(invoice.order_id, deadline)?;
        Ok(InvoiceView {
            invoice_id: invoice.invoice_id,
            order_id: invoice.order_id,
            payment_method: invoice
                .payment_method
                .map_or(UNSET_PAYMENT_METHOD, |m| m.as_str())
                .to_string(),
            payment_status: invoice.payment_status,
            payment_due: billing.payment_due,
            table_number: billing.table_number,
            payment_due_date: invoice.payment_due_date,
            order_details: billing.order_items,
        })
    }

    /// Change payment method or status. An upsert that creates the invoice
    /// starts it as `PENDING` unless a status is given.
    pub fn update_invoice(
        &self,
        invoice_id: Uuid,
        patch: InvoicePatch,
        deadline: Deadline,
    ) -> Result<UpdateOutcome, DomainError> {
        let now = Utc::now();
        let mut update = Update::upsert()
            .set("updated_at", timestamp_value(now))
            .set_on_insert("created_at", timestamp_value(now))
            .set_on_insert("payment_status", PaymentStatus::Pending.as_str());
        if let Some(method) = patch.payment_method {
            update = update.set("payment_method", method.as_str());
        }
        if let Some(status) = patch.payment_status {
            update = update.set("payment_status", status.as_str());
        }
        self.store
            .update_record::<Invoice>(invoice_id, &update, deadline)
    }
}
