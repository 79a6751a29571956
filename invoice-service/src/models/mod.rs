//! Domain models for invoice-service.

pub mod customer;
pub mod invoice;
pub mod invoice_item;
pub mod item;

pub use customer::{Customer, CustomerInput};
pub use invoice::{
    generate_invoice_number, CreateInvoice, Invoice, InvoiceLineInput, InvoiceStatus,
    ListInvoicesFilter, UpdateInvoice,
};
pub use invoice_item::InvoiceItem;
pub use item::{Item, ItemInput};
