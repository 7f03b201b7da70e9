use chrono::Utc;
use resale_catalog::{validate_codes, App, AppDraft, Code, CodeImportReport, Combo, ComboApp, ComboDraft};
use resale_shared::models::events::{CodesImportedEvent, SaleEvent};
use resale_shared::Masked;
use uuid::Uuid;

use crate::customer::{Customer, CustomerDraft};
use crate::events::EventBus;
use crate::repository::Repositories;
use crate::{CoreError, CoreResult};

/// Customers, apps, combos and code inventory of one reseller.
#[derive(Clone)]
pub struct CatalogService {
    repos: Repositories,
    events: EventBus,
}

impl CatalogService {
    pub fn new(repos: Repositories, events: EventBus) -> Self {
        Self { repos, events }
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn create_customer(&self, owner_id: Uuid, draft: CustomerDraft) -> CoreResult<Customer> {
        let customer = Customer::new(owner_id, draft.validated()?);
        self.repos.customers.create_customer(&customer).await?;
        tracing::info!(
            "Customer {} created (email: {}, phone: {})",
            customer.id,
            Masked(&customer.email),
            Masked(&customer.phone)
        );
        Ok(customer)
    }

    pub async fn list_customers(&self, owner_id: Uuid) -> CoreResult<Vec<Customer>> {
        self.repos.customers.list_customers(owner_id).await
    }

    pub async fn get_customer(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Customer> {
        self.repos
            .customers
            .get_customer(owner_id, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("customer {}", id)))
    }

    pub async fn update_customer(&self, owner_id: Uuid, id: Uuid, draft: CustomerDraft) -> CoreResult<Customer> {
        let mut customer = self.get_customer(owner_id, id).await?;
        let draft = draft.validated()?;
        customer.name = draft.name;
        customer.email = draft.email;
        customer.phone = draft.phone;
        self.repos.customers.update_customer(&customer).await?;
        Ok(customer)
    }

    pub async fn delete_customer(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        self.repos.customers.delete_customer(owner_id, id).await?;
        tracing::info!("Customer {} deleted", id);
        Ok(())
    }

    // ========================================================================
    // Apps
    // ========================================================================

    pub async fn create_app(&self, owner_id: Uuid, draft: AppDraft) -> CoreResult<App> {
        let app = App::new(owner_id, draft.validated()?);
        self.repos.apps.create_app(&app).await?;
        tracing::info!("App {} '{}' created at {}", app.id, app.name, app.price_cents);
        Ok(app)
    }

    pub async fn list_apps(&self, owner_id: Uuid) -> CoreResult<Vec<App>> {
        self.repos.apps.list_apps(owner_id).await
    }

    pub async fn get_app(&self, owner_id: Uuid, id: Uuid) -> CoreResult<App> {
        self.repos
            .apps
            .get_app(owner_id, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("app {}", id)))
    }

    pub async fn update_app(&self, owner_id: Uuid, id: Uuid, draft: AppDraft) -> CoreResult<App> {
        let mut app = self.get_app(owner_id, id).await?;
        let draft = draft.validated()?;
        app.name = draft.name;
        app.price_cents = draft.price_cents;
        self.repos.apps.update_app(&app).await?;
        Ok(app)
    }

    pub async fn delete_app(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        self.repos.apps.delete_app(owner_id, id).await?;
        tracing::info!("App {} deleted with its codes", id);
        Ok(())
    }

    // ========================================================================
    // Codes
    // ========================================================================

    /// Validates a raw batch against the owner's whole inventory and stores
    /// the accepted codes as unused.
    pub async fn import_codes(&self, owner_id: Uuid, app_id: Uuid, raw: &[String]) -> CoreResult<CodeImportReport> {
        self.get_app(owner_id, app_id).await?;

        let existing = self.repos.apps.list_code_values(owner_id).await?;
        let report = validate_codes(raw.iter().map(String::as_str), existing.iter().map(String::as_str));

        let codes: Vec<Code> = report
            .imported
            .iter()
            .map(|value| Code::new(app_id, value.clone()))
            .collect();
        if !codes.is_empty() {
            self.repos.apps.insert_codes(owner_id, &codes).await?;
        }

        tracing::info!(
            "Imported {} code(s) into app {} ({} duplicate, {} already stored, {} invalid)",
            report.imported.len(),
            app_id,
            report.duplicates.len(),
            report.system_duplicates.len(),
            report.invalid.len()
        );

        self.events.publish(SaleEvent::CodesImported(CodesImportedEvent {
            app_id,
            owner_id,
            imported: report.imported.len(),
            rejected: report.rejected(),
            timestamp: Utc::now(),
        }));
        Ok(report)
    }

    pub async fn list_codes(&self, owner_id: Uuid, app_id: Uuid, used: Option<bool>) -> CoreResult<Vec<Code>> {
        self.get_app(owner_id, app_id).await?;
        self.repos.apps.list_codes(owner_id, app_id, used).await
    }

    pub async fn delete_code(&self, owner_id: Uuid, code_id: Uuid) -> CoreResult<()> {
        self.repos.apps.delete_code(owner_id, code_id).await
    }

    // ========================================================================
    // Combos
    // ========================================================================

    pub async fn create_combo(&self, owner_id: Uuid, draft: ComboDraft) -> CoreResult<Combo> {
        let draft = draft.validated()?;

        let mut apps = Vec::with_capacity(draft.app_ids.len());
        for app_id in &draft.app_ids {
            let app = self.get_app(owner_id, *app_id).await?;
            apps.push(ComboApp::from(&app));
        }

        let combo = Combo {
            id: Uuid::new_v4(),
            owner_id,
            name: draft.name,
            price_cents: draft.price_cents,
            apps,
            created_at: Utc::now(),
        };
        self.repos.combos.create_combo(&combo).await?;
        tracing::info!("Combo {} '{}' created with {} apps", combo.id, combo.name, combo.apps.len());
        Ok(combo)
    }

    pub async fn list_combos(&self, owner_id: Uuid) -> CoreResult<Vec<Combo>> {
        self.repos.combos.list_combos(owner_id).await
    }

    pub async fn get_combo(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Combo> {
        self.repos
            .combos
            .get_combo(owner_id, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("combo {}", id)))
    }

    pub async fn delete_combo(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        self.repos.combos.delete_combo(owner_id, id).await?;
        tracing::info!("Combo {} deleted", id);
        Ok(())
    }
}
