use resale_catalog::Combo;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::manager::SaleError;
use crate::models::{AllocatedCode, LineProduct, Sale, SaleItem};

/// Codes one line item needs from one app's pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeDemand {
    pub item_id: Uuid,
    pub app_id: Uuid,
    pub quantity: u32,
}

/// Turns line items into per-app code demands.
///
/// An app line asks for `quantity` codes of its app. A combo line asks for
/// `quantity` codes of every app in the combo.
pub fn expand_demands(
    items: &[SaleItem],
    combos: &HashMap<Uuid, Combo>,
) -> Result<Vec<CodeDemand>, SaleError> {
    let mut demands = Vec::new();
    for item in items {
        match item.product {
            LineProduct::App { app_id } => demands.push(CodeDemand {
                item_id: item.id,
                app_id,
                quantity: item.quantity,
            }),
            LineProduct::Combo { combo_id } => {
                let combo = combos
                    .get(&combo_id)
                    .ok_or(SaleError::UnknownCombo(combo_id))?;
                demands.extend(combo.app_ids().map(|app_id| CodeDemand {
                    item_id: item.id,
                    app_id,
                    quantity: item.quantity,
                }));
            }
        }
    }
    Ok(demands)
}

/// True when `demands` were expanded from exactly these items. Guards a
/// confirmation against items edited after the demands were computed.
pub fn demands_match(items: &[SaleItem], demands: &[CodeDemand]) -> bool {
    let wanted: HashSet<Uuid> = items.iter().map(|i| i.id).collect();
    let got: HashSet<Uuid> = demands.iter().map(|d| d.item_id).collect();
    wanted == got
}

/// Hands allocated codes to their line items. `allocations` is parallel
/// to `demands`.
pub fn attach_codes(sale: &mut Sale, demands: &[CodeDemand], allocations: Vec<Vec<AllocatedCode>>) {
    for (demand, codes) in demands.iter().zip(allocations) {
        if let Some(item) = sale.items.iter_mut().find(|i| i.id == demand.item_id) {
            item.codes.extend(codes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use resale_catalog::ComboApp;

    fn combo_of(apps: &[Uuid]) -> Combo {
        Combo {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Bundle".into(),
            price_cents: 4000,
            apps: apps
                .iter()
                .map(|id| ComboApp { id: *id, name: "App".into(), price_cents: 2500 })
                .collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_combo_line_expands_per_app() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let combo = combo_of(&[a, b]);
        let combos = HashMap::from([(combo.id, combo.clone())]);

        let items = vec![
            SaleItem::new(LineProduct::App { app_id: a }, "A".into(), 1, 2500),
            SaleItem::new(LineProduct::Combo { combo_id: combo.id }, "Bundle".into(), 3, 4000),
        ];
        let demands = expand_demands(&items, &combos).unwrap();

        assert_eq!(demands.len(), 3);
        assert_eq!(demands[0], CodeDemand { item_id: items[0].id, app_id: a, quantity: 1 });
        assert_eq!(demands[1], CodeDemand { item_id: items[1].id, app_id: a, quantity: 3 });
        assert_eq!(demands[2], CodeDemand { item_id: items[1].id, app_id: b, quantity: 3 });
    }

    #[test]
    fn test_missing_combo_is_an_error() {
        let ghost = Uuid::new_v4();
        let items = vec![SaleItem::new(LineProduct::Combo { combo_id: ghost }, "Gone".into(), 1, 100)];
        assert_eq!(expand_demands(&items, &HashMap::new()), Err(SaleError::UnknownCombo(ghost)));
    }

    #[test]
    fn test_demands_match_detects_edits() {
        let a = Uuid::new_v4();
        let items = vec![SaleItem::new(LineProduct::App { app_id: a }, "A".into(), 1, 100)];
        let demands = expand_demands(&items, &HashMap::new()).unwrap();
        assert!(demands_match(&items, &demands));

        let edited = vec![SaleItem::new(LineProduct::App { app_id: a }, "A".into(), 2, 100)];
        assert!(!demands_match(&edited, &demands));
    }

    #[test]
    fn test_attach_codes_to_items() {
        let a = Uuid::new_v4();
        let item = SaleItem::new(LineProduct::App { app_id: a }, "A".into(), 2, 100);
        let mut sale = Sale::new(Uuid::new_v4(), Uuid::new_v4(), vec![item]).unwrap();
        let demands = expand_demands(&sale.items, &HashMap::new()).unwrap();

        let codes = vec![
            AllocatedCode { code_id: Uuid::new_v4(), app_id: a, code: "1".repeat(16) },
            AllocatedCode { code_id: Uuid::new_v4(), app_id: a, code: "2".repeat(16) },
        ];
        attach_codes(&mut sale, &demands, vec![codes]);

        assert_eq!(sale.code_count(), 2);
        assert!(sale.has_codes());
    }
}
