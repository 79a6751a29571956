use crate::dtos::PageParams;
use crate::models::{
    CreateInvoice, Invoice, InvoiceLineInput, InvoiceStatus, ListInvoicesFilter, UpdateInvoice,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

/// Body for POST /api/invoices.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[validate(length(min = 1, message = "at least one line item is required"), nested)]
    pub items: Vec<InvoiceLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceLineRequest {
    pub item_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be a positive integer"))]
    pub quantity: i32,
}

impl From<CreateInvoiceRequest> for CreateInvoice {
    fn from(req: CreateInvoiceRequest) -> Self {
        Self {
            customer_id: req.customer_id,
            issue_date: req.issue_date,
            due_date: req.due_date,
            items: req
                .items
                .into_iter()
                .map(|line| InvoiceLineInput {
                    item_id: line.item_id,
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

/// Body for PUT /api/invoices/{id}. Absent fields keep their prior
/// values; `status` only accepts the `unpaid`/`paid` tokens.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<InvoiceStatus>,
}

impl From<UpdateInvoiceRequest> for UpdateInvoice {
    fn from(req: UpdateInvoiceRequest) -> Self {
        Self {
            issue_date: req.issue_date,
            due_date: req.due_date,
            status: req.status,
        }
    }
}

/// Query parameters for GET /api/invoices.
#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

impl ListInvoicesQuery {
    /// Convert raw query strings into a typed filter. Empty strings are
    /// treated as absent, matching form-style queries like `?status=`.
    pub fn into_filter(self) -> Result<ListInvoicesFilter, AppError> {
        let status = match self.status.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<InvoiceStatus>()
                    .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?,
            ),
        };

        Ok(ListInvoicesFilter {
            status,
            start_date: parse_date(self.start_date.as_deref(), "start_date")?,
            end_date: parse_date(self.end_date.as_deref(), "end_date")?,
            page: self.page.page(),
            limit: self.page.limit(),
        })
    }
}

fn parse_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, AppError> {
    match raw {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid {}: {}", field, s))),
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(inv: Invoice) -> Self {
        Self {
            id: inv.invoice_id,
            invoice_number: inv.invoice_number,
            customer_id: inv.customer_id,
            issue_date: inv.issue_date,
            due_date: inv.due_date,
            total_amount: inv.total_amount,
            status: inv.status,
            created_at: inv.created_at,
            updated_at: inv.updated_at,
        }
    }
}
