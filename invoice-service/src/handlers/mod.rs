pub mod customers;
pub mod health;
pub mod invoices;
pub mod items;

pub use customers::*;
pub use health::*;
pub use invoices::*;
pub use items::*;
