pub mod models;
pub mod manager;
pub mod fulfillment;

pub use models::{AllocatedCode, LineProduct, Sale, SaleItem, SaleItemDraft, SaleStatus};
pub use manager::SaleError;
pub use fulfillment::{attach_codes, demands_match, expand_demands, CodeDemand};
