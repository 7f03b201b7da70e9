pub mod account_service;
pub mod catalog_service;
pub mod customer;
pub mod events;
pub mod memory;
pub mod password;
pub mod repository;
pub mod sale_service;
pub mod user;

use resale_catalog::{CatalogError, InventoryError};
use resale_order::{SaleError, SaleStatus};
use uuid::Uuid;

pub use account_service::AccountService;
pub use catalog_service::CatalogService;
pub use customer::{Customer, CustomerDraft};
pub use events::EventBus;
pub use memory::MemoryStore;
pub use repository::Repositories;
pub use sale_service::{Dashboard, NewSale, SaleFilter, SaleService, SaleUpdate};
pub use user::{NewUser, ProfileUpdate, User};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Insufficient codes for app {app_id}: requested {requested}, available {available}")]
    InsufficientCodes {
        app_id: Uuid,
        requested: usize,
        available: usize,
    },
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: SaleStatus, to: SaleStatus },
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<CatalogError> for CoreError {
    fn from(err: CatalogError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

impl From<InventoryError> for CoreError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientCodes {
                app_id,
                requested,
                available,
            } => CoreError::InsufficientCodes {
                app_id,
                requested,
                available,
            },
        }
    }
}

impl From<SaleError> for CoreError {
    fn from(err: SaleError) -> Self {
        match err {
            SaleError::InvalidTransition { from, to } => CoreError::InvalidTransition { from, to },
            SaleError::NotEditable(_) => CoreError::Conflict(err.to_string()),
            SaleError::UnknownCombo(id) => CoreError::NotFound(format!("combo {}", id)),
            SaleError::EmptySale | SaleError::InvalidItem(_) | SaleError::UnknownStatus(_) => {
                CoreError::Validation(err.to_string())
            }
        }
    }
}
