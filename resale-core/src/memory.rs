use async_trait::async_trait;
use resale_catalog::{App, Code, CodePool, Combo, ComboApp, PooledCode};
use resale_order::{attach_codes, demands_match, AllocatedCode, CodeDemand, LineProduct, Sale, SaleStatus};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::customer::Customer;
use crate::repository::{AppRepository, ComboRepository, CustomerRepository, SaleRepository, UserRepository};
use crate::sale_service::SaleFilter;
use crate::user::User;
use crate::{CoreError, CoreResult};

struct StoredCode {
    owner_id: Uuid,
    code: Code,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    customers: HashMap<Uuid, Customer>,
    apps: HashMap<Uuid, App>,
    combos: HashMap<Uuid, Combo>,
    /// Import order is allocation order.
    codes: Vec<StoredCode>,
    sales: HashMap<Uuid, Sale>,
}

impl MemoryState {
    fn codes_available(&self, app_id: Uuid) -> i64 {
        self.codes
            .iter()
            .filter(|c| c.code.app_id == app_id && !c.code.used)
            .count() as i64
    }

    fn with_stock(&self, app: &App) -> App {
        App {
            codes_available: self.codes_available(app.id),
            ..app.clone()
        }
    }

    /// Combos are stored with a snapshot of their apps; names and prices
    /// are refreshed from the current catalog on read.
    fn refreshed(&self, combo: &Combo) -> Combo {
        let apps = combo
            .apps
            .iter()
            .map(|entry| {
                self.apps
                    .get(&entry.id)
                    .map(ComboApp::from)
                    .unwrap_or_else(|| entry.clone())
            })
            .collect();
        Combo {
            apps,
            ..combo.clone()
        }
    }

    fn owned_sale(&self, owner_id: Uuid, id: Uuid) -> Option<&Sale> {
        self.sales.get(&id).filter(|s| s.owner_id == owner_id)
    }

    fn sale_references(&self, product: impl Fn(&LineProduct) -> bool) -> bool {
        self.sales
            .values()
            .any(|s| s.items.iter().any(|i| product(&i.product)))
    }
}

/// Repository backend kept entirely in process memory. A single lock
/// guards all tables, so every call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(CoreError::Conflict(format!("email {} is already registered", user.email)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> CoreResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email && u.id != user.id) {
            return Err(CoreError::Conflict(format!("email {} is already registered", user.email)));
        }
        match state.users.get_mut(&user.id) {
            Some(stored) => {
                *stored = user.clone();
                Ok(())
            }
            None => Err(CoreError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn delete_user(&self, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Err(CoreError::NotFound(format!("user {}", id)));
        }
        state.customers.retain(|_, c| c.owner_id != id);
        state.apps.retain(|_, a| a.owner_id != id);
        state.combos.retain(|_, c| c.owner_id != id);
        state.codes.retain(|c| c.owner_id != id);
        state.sales.retain(|_, s| s.owner_id != id);
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn create_customer(&self, customer: &Customer) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get_customer(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<Customer>> {
        let state = self.state.read().await;
        Ok(state.customers.get(&id).filter(|c| c.owner_id == owner_id).cloned())
    }

    async fn list_customers(&self, owner_id: Uuid) -> CoreResult<Vec<Customer>> {
        let state = self.state.read().await;
        let mut customers: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn update_customer(&self, customer: &Customer) -> CoreResult<()> {
        let mut state = self.state.write().await;
        match state.customers.get_mut(&customer.id) {
            Some(stored) if stored.owner_id == customer.owner_id => {
                *stored = customer.clone();
                Ok(())
            }
            _ => Err(CoreError::NotFound(format!("customer {}", customer.id))),
        }
    }

    async fn delete_customer(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if !state.customers.get(&id).is_some_and(|c| c.owner_id == owner_id) {
            return Err(CoreError::NotFound(format!("customer {}", id)));
        }
        if state.sales.values().any(|s| s.customer_id == id) {
            return Err(CoreError::Conflict("customer still has sales".into()));
        }
        state.customers.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl AppRepository for MemoryStore {
    async fn create_app(&self, app: &App) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.apps.insert(app.id, app.clone());
        Ok(())
    }

    async fn get_app(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<App>> {
        let state = self.state.read().await;
        Ok(state
            .apps
            .get(&id)
            .filter(|a| a.owner_id == owner_id)
            .map(|a| state.with_stock(a)))
    }

    async fn list_apps(&self, owner_id: Uuid) -> CoreResult<Vec<App>> {
        let state = self.state.read().await;
        let mut apps: Vec<App> = state
            .apps
            .values()
            .filter(|a| a.owner_id == owner_id)
            .map(|a| state.with_stock(a))
            .collect();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    async fn update_app(&self, app: &App) -> CoreResult<()> {
        let mut state = self.state.write().await;
        match state.apps.get_mut(&app.id) {
            Some(stored) if stored.owner_id == app.owner_id => {
                stored.name = app.name.clone();
                stored.price_cents = app.price_cents;
                Ok(())
            }
            _ => Err(CoreError::NotFound(format!("app {}", app.id))),
        }
    }

    async fn delete_app(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if !state.apps.get(&id).is_some_and(|a| a.owner_id == owner_id) {
            return Err(CoreError::NotFound(format!("app {}", id)));
        }
        if state.combos.values().any(|c| c.contains_app(id)) {
            return Err(CoreError::Conflict("app is part of a combo".into()));
        }
        if state.sale_references(|p| *p == LineProduct::App { app_id: id }) {
            return Err(CoreError::Conflict("app is referenced by sales".into()));
        }
        state.apps.remove(&id);
        state.codes.retain(|c| c.code.app_id != id);
        Ok(())
    }

    async fn list_code_values(&self, owner_id: Uuid) -> CoreResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .codes
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .map(|c| c.code.code.clone())
            .collect())
    }

    async fn insert_codes(&self, owner_id: Uuid, codes: &[Code]) -> CoreResult<usize> {
        let mut state = self.state.write().await;
        let existing: HashSet<&str> = state
            .codes
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .map(|c| c.code.code.as_str())
            .collect();
        if let Some(dup) = codes.iter().find(|c| existing.contains(c.code.as_str())) {
            return Err(CoreError::Conflict(format!("code {} already exists", dup.code)));
        }
        state
            .codes
            .extend(codes.iter().cloned().map(|code| StoredCode { owner_id, code }));
        Ok(codes.len())
    }

    async fn list_codes(&self, owner_id: Uuid, app_id: Uuid, used: Option<bool>) -> CoreResult<Vec<Code>> {
        let state = self.state.read().await;
        Ok(state
            .codes
            .iter()
            .filter(|c| c.owner_id == owner_id && c.code.app_id == app_id)
            .filter(|c| used.map_or(true, |u| c.code.used == u))
            .map(|c| c.code.clone())
            .collect())
    }

    async fn delete_code(&self, owner_id: Uuid, code_id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let position = state
            .codes
            .iter()
            .position(|c| c.owner_id == owner_id && c.code.id == code_id)
            .ok_or_else(|| CoreError::NotFound(format!("code {}", code_id)))?;
        if state.codes[position].code.used {
            return Err(CoreError::Conflict("code was already sold".into()));
        }
        state.codes.remove(position);
        Ok(())
    }
}

#[async_trait]
impl ComboRepository for MemoryStore {
    async fn create_combo(&self, combo: &Combo) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.combos.insert(combo.id, combo.clone());
        Ok(())
    }

    async fn get_combo(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<Combo>> {
        let state = self.state.read().await;
        Ok(state
            .combos
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .map(|c| state.refreshed(c)))
    }

    async fn list_combos(&self, owner_id: Uuid) -> CoreResult<Vec<Combo>> {
        let state = self.state.read().await;
        let mut combos: Vec<Combo> = state
            .combos
            .values()
            .filter(|c| c.owner_id == owner_id)
            .map(|c| state.refreshed(c))
            .collect();
        combos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(combos)
    }

    async fn delete_combo(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if !state.combos.get(&id).is_some_and(|c| c.owner_id == owner_id) {
            return Err(CoreError::NotFound(format!("combo {}", id)));
        }
        if state.sale_references(|p| *p == LineProduct::Combo { combo_id: id }) {
            return Err(CoreError::Conflict("combo is referenced by sales".into()));
        }
        state.combos.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl SaleRepository for MemoryStore {
    async fn create_sale(&self, sale: &Sale) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn get_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<Sale>> {
        Ok(self.state.read().await.owned_sale(owner_id, id).cloned())
    }

    async fn list_sales(&self, owner_id: Uuid, filter: &SaleFilter) -> CoreResult<Vec<Sale>> {
        let state = self.state.read().await;
        let mut sales: Vec<Sale> = state
            .sales
            .values()
            .filter(|s| s.owner_id == owner_id && filter.matches(s))
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sales)
    }

    async fn update_sale(&self, sale: &Sale, expected: SaleStatus) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .sales
            .get_mut(&sale.id)
            .filter(|s| s.owner_id == sale.owner_id)
            .ok_or_else(|| CoreError::NotFound(format!("sale {}", sale.id)))?;
        if stored.status != expected {
            return Err(CoreError::Conflict(format!("sale {} changed concurrently", sale.id)));
        }
        *stored = sale.clone();
        Ok(())
    }

    async fn confirm_sale(&self, owner_id: Uuid, sale_id: Uuid, demands: &[CodeDemand]) -> CoreResult<Sale> {
        let mut state = self.state.write().await;
        let mut sale = state
            .owned_sale(owner_id, sale_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("sale {}", sale_id)))?;
        if sale.status != SaleStatus::Pending {
            return Err(CoreError::InvalidTransition {
                from: sale.status,
                to: SaleStatus::Confirmed,
            });
        }
        if !demands_match(&sale.items, demands) {
            return Err(CoreError::Conflict(format!("sale {} changed concurrently", sale_id)));
        }

        let mut pool = CodePool::new(
            state
                .codes
                .iter()
                .filter(|c| c.owner_id == owner_id)
                .map(|c| PooledCode {
                    id: c.code.id,
                    app_id: c.code.app_id,
                    code: c.code.code.clone(),
                    used: c.code.used,
                })
                .collect(),
        );
        let wanted: Vec<(Uuid, u32)> = demands.iter().map(|d| (d.app_id, d.quantity)).collect();
        let allocations = pool.allocate(&wanted)?;
        sale.confirm()?;

        let taken: HashSet<Uuid> = allocations.iter().flatten().map(|c| c.id).collect();
        for stored in state.codes.iter_mut().filter(|c| taken.contains(&c.code.id)) {
            stored.code.used = true;
        }

        let allocated = allocations
            .into_iter()
            .map(|codes| {
                codes
                    .into_iter()
                    .map(|c| AllocatedCode {
                        code_id: c.id,
                        app_id: c.app_id,
                        code: c.code,
                    })
                    .collect()
            })
            .collect();
        attach_codes(&mut sale, demands, allocated);

        state.sales.insert(sale.id, sale.clone());
        Ok(sale)
    }

    async fn delete_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.owned_sale(owner_id, id).is_none() {
            return Err(CoreError::NotFound(format!("sale {}", id)));
        }
        state.sales.remove(&id);
        Ok(())
    }
}
