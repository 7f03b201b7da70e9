use chrono::Utc;
use resale_catalog::Combo;
use resale_order::{expand_demands, LineProduct, Sale, SaleItem, SaleItemDraft, SaleStatus};
use resale_shared::models::events::{SaleCancelledEvent, SaleConfirmedEvent, SaleCreatedEvent, SaleEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::events::EventBus;
use crate::repository::Repositories;
use crate::{CoreError, CoreResult};

/// Number of sales shown on the dashboard.
const RECENT_SALES: usize = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub customer_id: Option<Uuid>,
}

impl SaleFilter {
    pub fn matches(&self, sale: &Sale) -> bool {
        self.status.map_or(true, |status| status == sale.status)
            && self.customer_id.map_or(true, |customer_id| customer_id == sale.customer_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSale {
    pub customer_id: Uuid,
    pub items: Vec<SaleItemDraft>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleUpdate {
    pub customer_id: Option<Uuid>,
    pub items: Option<Vec<SaleItemDraft>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub customers: usize,
    pub apps: usize,
    pub codes_available: i64,
    pub pending_sales: usize,
    pub confirmed_revenue_cents: i64,
    pub recent_sales: Vec<Sale>,
}

/// Sale lifecycle on behalf of one reseller.
#[derive(Clone)]
pub struct SaleService {
    repos: Repositories,
    events: EventBus,
}

impl SaleService {
    pub fn new(repos: Repositories, events: EventBus) -> Self {
        Self { repos, events }
    }

    pub async fn create_sale(&self, owner_id: Uuid, new_sale: NewSale) -> CoreResult<Sale> {
        self.require_customer(owner_id, new_sale.customer_id).await?;
        let items = self.resolve_items(owner_id, new_sale.items).await?;
        let sale = Sale::new(owner_id, new_sale.customer_id, items)?;

        self.repos.sales.create_sale(&sale).await?;
        tracing::info!("Sale {} created: {} item(s), total {}", sale.id, sale.items.len(), sale.total_cents);

        self.events.publish(SaleEvent::Created(SaleCreatedEvent {
            sale_id: sale.id,
            owner_id,
            customer_id: sale.customer_id,
            total_cents: sale.total_cents,
            item_count: sale.items.len(),
            timestamp: Utc::now(),
        }));
        Ok(sale)
    }

    pub async fn list_sales(&self, owner_id: Uuid, filter: &SaleFilter) -> CoreResult<Vec<Sale>> {
        self.repos.sales.list_sales(owner_id, filter).await
    }

    pub async fn get_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Sale> {
        self.repos
            .sales
            .get_sale(owner_id, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("sale {}", id)))
    }

    /// Changes customer and/or items of a pending sale.
    pub async fn update_sale(&self, owner_id: Uuid, id: Uuid, update: SaleUpdate) -> CoreResult<Sale> {
        let mut sale = self.get_sale(owner_id, id).await?;
        sale.ensure_editable()?;

        if let Some(customer_id) = update.customer_id {
            self.require_customer(owner_id, customer_id).await?;
            sale.set_customer(customer_id)?;
        }
        if let Some(drafts) = update.items {
            let items = self.resolve_items(owner_id, drafts).await?;
            sale.replace_items(items)?;
        }

        self.repos.sales.update_sale(&sale, SaleStatus::Pending).await?;
        tracing::debug!("Sale {} updated, total {}", sale.id, sale.total_cents);
        Ok(sale)
    }

    /// Delivers codes for every line item and marks the sale confirmed.
    pub async fn confirm_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Sale> {
        // 1. Only pending sales can be confirmed
        let sale = self.get_sale(owner_id, id).await?;
        if sale.status != SaleStatus::Pending {
            return Err(CoreError::InvalidTransition {
                from: sale.status,
                to: SaleStatus::Confirmed,
            });
        }

        // 2. Combo lines need one code per app in the bundle
        let combos = self.combos_for(owner_id, &sale.items).await?;
        let demands = expand_demands(&sale.items, &combos)?;

        // 3. Reserve and attach codes atomically
        let confirmed = self
            .repos
            .sales
            .confirm_sale(owner_id, id, &demands)
            .await
            .inspect_err(|e| {
                if let CoreError::InsufficientCodes { app_id, requested, available } = e {
                    tracing::warn!(
                        "Sale {} not confirmed: app {} needs {} code(s), {} available",
                        id,
                        app_id,
                        requested,
                        available
                    );
                }
            })?;

        let codes_allocated = confirmed.code_count();
        tracing::info!("Sale {} confirmed with {} code(s)", id, codes_allocated);

        self.events.publish(SaleEvent::Confirmed(SaleConfirmedEvent {
            sale_id: confirmed.id,
            owner_id,
            customer_id: confirmed.customer_id,
            total_cents: confirmed.total_cents,
            codes_allocated,
            timestamp: Utc::now(),
        }));
        Ok(confirmed)
    }

    pub async fn cancel_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Sale> {
        let mut sale = self.get_sale(owner_id, id).await?;
        sale.cancel()?;
        self.repos.sales.update_sale(&sale, SaleStatus::Pending).await?;
        tracing::info!("Sale {} cancelled", id);

        self.events.publish(SaleEvent::Cancelled(SaleCancelledEvent {
            sale_id: id,
            owner_id,
            timestamp: Utc::now(),
        }));
        Ok(sale)
    }

    pub async fn delete_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        self.repos.sales.delete_sale(owner_id, id).await?;
        tracing::info!("Sale {} deleted", id);
        Ok(())
    }

    pub async fn dashboard(&self, owner_id: Uuid) -> CoreResult<Dashboard> {
        let customers = self.repos.customers.list_customers(owner_id).await?;
        let apps = self.repos.apps.list_apps(owner_id).await?;
        let sales = self.repos.sales.list_sales(owner_id, &SaleFilter::default()).await?;

        Ok(Dashboard {
            customers: customers.len(),
            apps: apps.len(),
            codes_available: apps.iter().map(|a| a.codes_available).sum(),
            pending_sales: sales.iter().filter(|s| s.status == SaleStatus::Pending).count(),
            confirmed_revenue_cents: sales
                .iter()
                .filter(|s| s.status == SaleStatus::Confirmed)
                .fold(0i64, |revenue, s| revenue.saturating_add(s.total_cents)),
            recent_sales: sales.into_iter().take(RECENT_SALES).collect(),
        })
    }

    async fn require_customer(&self, owner_id: Uuid, customer_id: Uuid) -> CoreResult<()> {
        self.repos
            .customers
            .get_customer(owner_id, customer_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| CoreError::NotFound(format!("customer {}", customer_id)))
    }

    /// Looks up each product, captures its name and falls back to the
    /// catalog price when the draft carries none.
    async fn resolve_items(&self, owner_id: Uuid, drafts: Vec<SaleItemDraft>) -> CoreResult<Vec<SaleItem>> {
        let mut items = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let (name, catalog_price) = match draft.product {
                LineProduct::App { app_id } => {
                    let app = self
                        .repos
                        .apps
                        .get_app(owner_id, app_id)
                        .await?
                        .ok_or_else(|| CoreError::NotFound(format!("app {}", app_id)))?;
                    (app.name, app.price_cents)
                }
                LineProduct::Combo { combo_id } => {
                    let combo = self
                        .repos
                        .combos
                        .get_combo(owner_id, combo_id)
                        .await?
                        .ok_or_else(|| CoreError::NotFound(format!("combo {}", combo_id)))?;
                    (combo.name, combo.price_cents)
                }
            };
            let price = draft.price_cents.unwrap_or(catalog_price);
            items.push(SaleItem::new(draft.product, name, draft.quantity, price));
        }
        Ok(items)
    }

    async fn combos_for(&self, owner_id: Uuid, items: &[SaleItem]) -> CoreResult<HashMap<Uuid, Combo>> {
        let mut combos = HashMap::new();
        for item in items {
            if let LineProduct::Combo { combo_id } = item.product {
                if combos.contains_key(&combo_id) {
                    continue;
                }
                if let Some(combo) = self.repos.combos.get_combo(owner_id, combo_id).await? {
                    combos.insert(combo_id, combo);
                }
            }
        }
        Ok(combos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let customer = Uuid::new_v4();
        let item = SaleItem::new(LineProduct::App { app_id: Uuid::new_v4() }, "A".into(), 1, 100);
        let sale = Sale::new(Uuid::new_v4(), customer, vec![item]).unwrap();

        assert!(SaleFilter::default().matches(&sale));
        assert!(SaleFilter { status: Some(SaleStatus::Pending), customer_id: Some(customer) }.matches(&sale));
        assert!(!SaleFilter { status: Some(SaleStatus::Confirmed), customer_id: None }.matches(&sale));
        assert!(!SaleFilter { status: None, customer_id: Some(Uuid::new_v4()) }.matches(&sale));
    }
}
