use async_trait::async_trait;
use resale_catalog::{App, Code, Combo};
use resale_order::{CodeDemand, Sale, SaleStatus};
use std::sync::Arc;
use uuid::Uuid;

use crate::customer::Customer;
use crate::memory::MemoryStore;
use crate::sale_service::SaleFilter;
use crate::user::User;
use crate::CoreResult;

/// Repository trait for reseller accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: &User) -> CoreResult<()>;

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>>;

    /// All accounts, sorted by name.
    async fn list_users(&self) -> CoreResult<Vec<User>>;

    async fn update_user(&self, user: &User) -> CoreResult<()>;

    /// Removes the account together with everything it owns.
    async fn delete_user(&self, id: Uuid) -> CoreResult<()>;
}

/// Repository trait for customer data access. Every call is owner scoped.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn create_customer(&self, customer: &Customer) -> CoreResult<()>;

    async fn get_customer(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<Customer>>;

    async fn list_customers(&self, owner_id: Uuid) -> CoreResult<Vec<Customer>>;

    async fn update_customer(&self, customer: &Customer) -> CoreResult<()>;

    /// `Conflict` while any sale references the customer.
    async fn delete_customer(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()>;
}

/// Repository trait for apps and their code inventory
#[async_trait]
pub trait AppRepository: Send + Sync {
    async fn create_app(&self, app: &App) -> CoreResult<()>;

    /// Returned apps carry their current `codes_available`.
    async fn get_app(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<App>>;

    async fn list_apps(&self, owner_id: Uuid) -> CoreResult<Vec<App>>;

    async fn update_app(&self, app: &App) -> CoreResult<()>;

    /// `Conflict` while a combo or sale item references the app.
    /// Its codes go with it.
    async fn delete_app(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()>;

    /// Every code value the owner holds, used or not.
    async fn list_code_values(&self, owner_id: Uuid) -> CoreResult<Vec<String>>;

    async fn insert_codes(&self, owner_id: Uuid, codes: &[Code]) -> CoreResult<usize>;

    /// Codes of one app in import order, optionally filtered by `used`.
    async fn list_codes(&self, owner_id: Uuid, app_id: Uuid, used: Option<bool>) -> CoreResult<Vec<Code>>;

    /// `Conflict` for codes already handed out.
    async fn delete_code(&self, owner_id: Uuid, code_id: Uuid) -> CoreResult<()>;
}

/// Repository trait for app bundles
#[async_trait]
pub trait ComboRepository: Send + Sync {
    async fn create_combo(&self, combo: &Combo) -> CoreResult<()>;

    async fn get_combo(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<Combo>>;

    async fn list_combos(&self, owner_id: Uuid) -> CoreResult<Vec<Combo>>;

    /// `Conflict` while a sale item references the combo.
    async fn delete_combo(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()>;
}

/// Repository trait for sales
#[async_trait]
pub trait SaleRepository: Send + Sync {
    async fn create_sale(&self, sale: &Sale) -> CoreResult<()>;

    async fn get_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<Sale>>;

    /// Newest first.
    async fn list_sales(&self, owner_id: Uuid, filter: &SaleFilter) -> CoreResult<Vec<Sale>>;

    /// Persists customer, items, total and status of `sale`, provided the
    /// stored status still equals `expected`. `Conflict` otherwise.
    async fn update_sale(&self, sale: &Sale, expected: SaleStatus) -> CoreResult<()>;

    /// Confirms a pending sale in one atomic step: reserves the earliest
    /// unused codes for every demand, flags them used, links them to their
    /// sale items and marks the sale confirmed. On any shortage nothing is
    /// written and `InsufficientCodes` is returned.
    async fn confirm_sale(&self, owner_id: Uuid, sale_id: Uuid, demands: &[CodeDemand]) -> CoreResult<Sale>;

    /// Codes handed out by a confirmed sale stay used.
    async fn delete_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()>;
}

/// The repositories a service layer needs, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub apps: Arc<dyn AppRepository>,
    pub combos: Arc<dyn ComboRepository>,
    pub sales: Arc<dyn SaleRepository>,
}

impl Repositories {
    /// Every repository backed by one shared in-memory store.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            users: store.clone(),
            customers: store.clone(),
            apps: store.clone(),
            combos: store.clone(),
            sales: store,
        }
    }
}
