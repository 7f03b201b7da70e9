use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::manager::SaleError;

/// Sale status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Confirmed => "confirmed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SaleStatus {
    type Err = SaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SaleStatus::Pending),
            "confirmed" => Ok(SaleStatus::Confirmed),
            "cancelled" => Ok(SaleStatus::Cancelled),
            other => Err(SaleError::UnknownStatus(other.to_string())),
        }
    }
}

/// What a line item sells.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineProduct {
    App { app_id: Uuid },
    Combo { combo_id: Uuid },
}

impl LineProduct {
    pub fn kind(&self) -> &'static str {
        match self {
            LineProduct::App { .. } => "app",
            LineProduct::Combo { .. } => "combo",
        }
    }

    pub fn product_id(&self) -> Uuid {
        match self {
            LineProduct::App { app_id } => *app_id,
            LineProduct::Combo { combo_id } => *combo_id,
        }
    }
}

/// A code handed to the customer for one line item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocatedCode {
    pub code_id: Uuid,
    pub app_id: Uuid,
    pub code: String,
}

/// Line item as submitted by the caller. A missing price means
/// "use the current catalog price".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleItemDraft {
    pub product: LineProduct,
    pub quantity: u32,
    pub price_cents: Option<i64>,
}

/// An individual product line within a sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleItem {
    pub id: Uuid,
    pub product: LineProduct,
    /// Product name captured when the sale was written.
    pub name: String,
    pub quantity: u32,
    /// Unit price.
    pub price_cents: i64,
    #[serde(default)]
    pub codes: Vec<AllocatedCode>,
}

impl SaleItem {
    pub fn new(product: LineProduct, name: String, quantity: u32, price_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            product,
            name,
            quantity,
            price_cents,
            codes: Vec::new(),
        }
    }

    /// `None` when the line total does not fit in an `i64`.
    pub fn line_total_cents(&self) -> Option<i64> {
        self.price_cents.checked_mul(i64::from(self.quantity))
    }
}

/// A customer order and the single source of truth for what was sold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<SaleItem>,
    pub total_cents: i64,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Sale {
    /// Builds a pending sale. Fails on an empty item list, zero quantities
    /// or negative prices.
    pub fn new(owner_id: Uuid, customer_id: Uuid, items: Vec<SaleItem>) -> Result<Self, SaleError> {
        validate_items(&items)?;
        let now = Utc::now();
        let mut sale = Self {
            id: Uuid::new_v4(),
            owner_id,
            customer_id,
            items,
            total_cents: 0,
            status: SaleStatus::Pending,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
        };
        sale.recalculate_total();
        Ok(sale)
    }

    /// Items are validated before they land on a sale, so the checked
    /// total always exists here.
    pub fn recalculate_total(&mut self) {
        self.total_cents = checked_total(&self.items).unwrap_or(i64::MAX);
    }

    pub fn code_count(&self) -> usize {
        self.items.iter().map(|i| i.codes.len()).sum()
    }

    pub fn has_codes(&self) -> bool {
        self.items.iter().any(|i| !i.codes.is_empty())
    }

    /// Swaps the item list of a pending sale and recomputes the total.
    pub fn replace_items(&mut self, items: Vec<SaleItem>) -> Result<(), SaleError> {
        self.ensure_editable()?;
        validate_items(&items)?;
        self.items = items;
        self.recalculate_total();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_customer(&mut self, customer_id: Uuid) -> Result<(), SaleError> {
        self.ensure_editable()?;
        self.customer_id = customer_id;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_items(items: &[SaleItem]) -> Result<(), SaleError> {
    if items.is_empty() {
        return Err(SaleError::EmptySale);
    }
    for item in items {
        if item.quantity == 0 {
            return Err(SaleError::InvalidItem(format!("quantity of '{}' must be at least 1", item.name)));
        }
        if item.price_cents < 0 {
            return Err(SaleError::InvalidItem(format!("price of '{}' must not be negative", item.name)));
        }
    }
    if checked_total(items).is_none() {
        return Err(SaleError::InvalidItem("total out of range".into()));
    }
    Ok(())
}

fn checked_total(items: &[SaleItem]) -> Option<i64> {
    items
        .iter()
        .try_fold(0i64, |total, item| total.checked_add(item.line_total_cents()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_item(qty: u32, price: i64) -> SaleItem {
        SaleItem::new(LineProduct::App { app_id: Uuid::new_v4() }, "Gift card".into(), qty, price)
    }

    #[test]
    fn test_total_is_sum_of_lines() {
        let sale = Sale::new(Uuid::new_v4(), Uuid::new_v4(), vec![app_item(2, 1500), app_item(1, 999)]).unwrap();
        assert_eq!(sale.total_cents, 3999);
        assert_eq!(sale.status, SaleStatus::Pending);
    }

    #[test]
    fn test_rejects_empty_and_zero_quantity() {
        let empty = Sale::new(Uuid::new_v4(), Uuid::new_v4(), vec![]);
        assert_eq!(empty, Err(SaleError::EmptySale));

        let zero = Sale::new(Uuid::new_v4(), Uuid::new_v4(), vec![app_item(0, 100)]);
        assert!(matches!(zero, Err(SaleError::InvalidItem(_))));
    }

    #[test]
    fn test_rejects_totals_that_overflow() {
        let line = Sale::new(Uuid::new_v4(), Uuid::new_v4(), vec![app_item(2, i64::MAX)]);
        assert_eq!(line, Err(SaleError::InvalidItem("total out of range".into())));

        let sum = Sale::new(Uuid::new_v4(), Uuid::new_v4(), vec![app_item(1, i64::MAX), app_item(1, 1)]);
        assert!(matches!(sum, Err(SaleError::InvalidItem(_))));

        let mut sale = Sale::new(Uuid::new_v4(), Uuid::new_v4(), vec![app_item(1, 100)]).unwrap();
        assert!(sale.replace_items(vec![app_item(u32::MAX, i64::MAX / 2)]).is_err());
        assert_eq!(sale.total_cents, 100);
    }

    #[test]
    fn test_line_product_wire_format() {
        let id = Uuid::nil();
        let json = serde_json::to_value(LineProduct::Combo { combo_id: id }).unwrap();
        assert_eq!(json["kind"], "combo");
        assert_eq!(json["combo_id"], id.to_string());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("confirmed".parse::<SaleStatus>().unwrap(), SaleStatus::Confirmed);
        assert!("shipped".parse::<SaleStatus>().is_err());
    }
}
