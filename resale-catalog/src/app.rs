use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A sellable listing backed by a pool of redemption codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct App {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    /// Unused codes currently in the pool. Derived, never stored.
    pub codes_available: i64,
    pub created_at: DateTime<Utc>,
}

impl App {
    pub fn new(owner_id: Uuid, draft: AppDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: draft.name,
            price_cents: draft.price_cents,
            codes_available: 0,
            created_at: Utc::now(),
        }
    }
}

/// Caller-supplied fields of an app, validated before persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppDraft {
    pub name: String,
    pub price_cents: i64,
}

impl AppDraft {
    /// Trims the name and checks the price. Returns the normalised draft.
    pub fn validated(self) -> Result<Self, CatalogError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::InvalidField("app name is required".into()));
        }
        if self.price_cents < 0 {
            return Err(CatalogError::InvalidField("price must not be negative".into()));
        }
        Ok(Self {
            name,
            price_cents: self.price_cents,
        })
    }
}

/// Condensed app view embedded in a combo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComboApp {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
}

impl From<&App> for ComboApp {
    fn from(app: &App) -> Self {
        Self {
            id: app.id,
            name: app.name.clone(),
            price_cents: app.price_cents,
        }
    }
}

/// A bundle of apps sold together at a fixed price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Combo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub apps: Vec<ComboApp>,
    pub created_at: DateTime<Utc>,
}

impl Combo {
    pub fn app_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.apps.iter().map(|a| a.id)
    }

    pub fn contains_app(&self, app_id: Uuid) -> bool {
        self.apps.iter().any(|a| a.id == app_id)
    }

    /// Sum of the individual app prices, handy to show the bundle discount.
    pub fn list_price_cents(&self) -> i64 {
        self.apps.iter().map(|a| a.price_cents).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComboDraft {
    pub name: String,
    pub price_cents: i64,
    pub app_ids: Vec<Uuid>,
}

impl ComboDraft {
    /// Trims the name, drops repeated app ids (keeping first occurrence)
    /// and requires at least two distinct apps.
    pub fn validated(self) -> Result<Self, CatalogError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::InvalidField("combo name is required".into()));
        }
        if self.price_cents < 0 {
            return Err(CatalogError::InvalidField("price must not be negative".into()));
        }

        let mut seen = HashSet::new();
        let app_ids: Vec<Uuid> = self
            .app_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        if app_ids.len() < 2 {
            return Err(CatalogError::ComboTooSmall(app_ids.len()));
        }

        Ok(Self {
            name,
            price_cents: self.price_cents,
            app_ids,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CatalogError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("A combo needs at least two distinct apps, got {0}")]
    ComboTooSmall(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_draft_trims_name() {
        let draft = AppDraft {
            name: "  Netflix Gift  ".to_string(),
            price_cents: 3500,
        }
        .validated()
        .unwrap();
        assert_eq!(draft.name, "Netflix Gift");
    }

    #[test]
    fn test_app_draft_rejects_blank_and_negative() {
        let blank = AppDraft { name: "   ".into(), price_cents: 10 }.validated();
        assert!(matches!(blank, Err(CatalogError::InvalidField(_))));

        let negative = AppDraft { name: "Spotify".into(), price_cents: -1 }.validated();
        assert!(matches!(negative, Err(CatalogError::InvalidField(_))));
    }

    #[test]
    fn test_combo_draft_dedups_apps() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let draft = ComboDraft {
            name: "Streaming pack".into(),
            price_cents: 5000,
            app_ids: vec![a, b, a],
        }
        .validated()
        .unwrap();
        assert_eq!(draft.app_ids, vec![a, b]);
    }

    #[test]
    fn test_combo_draft_needs_two_apps() {
        let a = Uuid::new_v4();
        let result = ComboDraft {
            name: "Solo".into(),
            price_cents: 100,
            app_ids: vec![a, a],
        }
        .validated();
        assert_eq!(result, Err(CatalogError::ComboTooSmall(1)));
    }

    #[test]
    fn test_combo_list_price() {
        let combo = Combo {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Pack".into(),
            price_cents: 5000,
            apps: vec![
                ComboApp { id: Uuid::new_v4(), name: "A".into(), price_cents: 3000 },
                ComboApp { id: Uuid::new_v4(), name: "B".into(), price_cents: 2500 },
            ],
            created_at: Utc::now(),
        };
        assert_eq!(combo.list_price_cents(), 5500);
    }
}
