pub mod app;
pub mod codes;
pub mod inventory;

pub use app::{App, AppDraft, CatalogError, Combo, ComboApp, ComboDraft};
pub use codes::{clean_code, format_code, is_valid_code, validate_codes, Code, CodeImportReport};
pub use inventory::{CodePool, InventoryError, PooledCode};
