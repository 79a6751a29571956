//! HTTP request/response types.

pub mod customers;
pub mod invoices;
pub mod items;

pub use customers::{CustomerRequest, CustomerResponse};
pub use invoices::{
    CreateInvoiceRequest, InvoiceLineRequest, InvoiceResponse, ListInvoicesQuery,
    UpdateInvoiceRequest,
};
pub use items::{ItemRequest, ItemResponse};

use serde::Deserialize;

/// Lenient page/limit query parameters shared by every list endpoint.
///
/// Values arrive as raw strings so that unparsable input falls back to
/// the defaults (page=1, limit=10) instead of rejecting the request;
/// non-positive values fall back the same way.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        parse_clamped(&self.page, 1)
    }

    pub fn limit(&self) -> i64 {
        parse_clamped(&self.limit, 10)
    }

    pub fn offset(&self) -> i64 {
        // Saturate so an absurd page number cannot overflow into a
        // negative OFFSET.
        self.page().saturating_sub(1).saturating_mul(self.limit())
    }
}

fn parse_clamped(raw: &Option<String>, default: i64) -> i64 {
    match raw.as_deref().and_then(|s| s.parse::<i64>().ok()) {
        Some(v) if v >= 1 => v,
        _ => default,
    }
}
