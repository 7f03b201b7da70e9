use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A code as seen by the allocator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PooledCode {
    pub id: Uuid,
    pub app_id: Uuid,
    pub code: String,
    pub used: bool,
}

/// Ordered code inventory. Allocation always takes the earliest unused
/// codes of an app, so callers must load the pool in import order.
#[derive(Debug, Default)]
pub struct CodePool {
    codes: Vec<PooledCode>,
}

impl CodePool {
    pub fn new(codes: Vec<PooledCode>) -> Self {
        Self { codes }
    }

    pub fn available(&self, app_id: Uuid) -> usize {
        self.codes
            .iter()
            .filter(|c| c.app_id == app_id && !c.used)
            .count()
    }

    /// Reserves codes for every `(app_id, quantity)` demand.
    ///
    /// Demands on the same app add up. Either every demand is satisfied and
    /// the chosen codes are flagged used, or nothing changes and the first
    /// short app is reported. The result holds one vector per demand, in
    /// demand order.
    pub fn allocate(&mut self, demands: &[(Uuid, u32)]) -> Result<Vec<Vec<PooledCode>>, InventoryError> {
        let mut requested: HashMap<Uuid, usize> = HashMap::new();
        let mut order: Vec<Uuid> = Vec::new();
        for (app_id, quantity) in demands {
            let entry = requested.entry(*app_id).or_insert_with(|| {
                order.push(*app_id);
                0
            });
            *entry += *quantity as usize;
        }

        for app_id in &order {
            let want = requested[app_id];
            let have = self.available(*app_id);
            if have < want {
                return Err(InventoryError::InsufficientCodes {
                    app_id: *app_id,
                    requested: want,
                    available: have,
                });
            }
        }

        let mut allocations = Vec::with_capacity(demands.len());
        for (app_id, quantity) in demands {
            let mut taken = Vec::with_capacity(*quantity as usize);
            for code in self
                .codes
                .iter_mut()
                .filter(|c| c.app_id == *app_id && !c.used)
                .take(*quantity as usize)
            {
                code.used = true;
                taken.push(code.clone());
            }
            allocations.push(taken);
        }

        Ok(allocations)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InventoryError {
    #[error("Insufficient codes for app {app_id}: requested {requested}, available {available}")]
    InsufficientCodes {
        app_id: Uuid,
        requested: usize,
        available: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(app_id: Uuid, n: usize) -> Vec<PooledCode> {
        (0..n)
            .map(|i| PooledCode {
                id: Uuid::new_v4(),
                app_id,
                code: format!("{:016}", i),
                used: false,
            })
            .collect()
    }

    #[test]
    fn test_allocates_earliest_codes() {
        let app = Uuid::new_v4();
        let mut pool = CodePool::new(pool_with(app, 5));

        let got = pool.allocate(&[(app, 2)]).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0][0].code, "0000000000000000");
        assert_eq!(got[0][1].code, "0000000000000001");
        assert_eq!(pool.available(app), 3);
    }

    #[test]
    fn test_shortage_leaves_pool_untouched() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut codes = pool_with(a, 3);
        codes.extend(pool_with(b, 1));
        let mut pool = CodePool::new(codes);

        let err = pool.allocate(&[(a, 2), (b, 2)]).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientCodes { app_id: b, requested: 2, available: 1 }
        );
        assert_eq!(pool.available(a), 3);
        assert_eq!(pool.available(b), 1);
    }

    #[test]
    fn test_demands_on_same_app_accumulate() {
        let a = Uuid::new_v4();
        let mut pool = CodePool::new(pool_with(a, 3));

        let err = pool.allocate(&[(a, 2), (a, 2)]).unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientCodes { requested: 4, available: 3, .. }));

        let got = pool.allocate(&[(a, 1), (a, 2)]).unwrap();
        assert_eq!(got[0].len(), 1);
        assert_eq!(got[1].len(), 2);
        assert_ne!(got[0][0].id, got[1][0].id);
        assert_eq!(pool.available(a), 0);
    }
}
