use chrono::Utc;

use crate::models::{Sale, SaleStatus};

/// Lifecycle transitions. A sale leaves `Pending` exactly once.
impl Sale {
    /// Transition: Pending → Confirmed (codes delivered)
    pub fn confirm(&mut self) -> Result<(), SaleError> {
        self.transition(SaleStatus::Confirmed)?;
        self.confirmed_at = Some(self.updated_at);
        Ok(())
    }

    /// Transition: Pending → Cancelled
    pub fn cancel(&mut self) -> Result<(), SaleError> {
        self.transition(SaleStatus::Cancelled)
    }

    pub fn ensure_editable(&self) -> Result<(), SaleError> {
        if self.status != SaleStatus::Pending {
            return Err(SaleError::NotEditable(self.status));
        }
        Ok(())
    }

    fn transition(&mut self, to: SaleStatus) -> Result<(), SaleError> {
        if self.status != SaleStatus::Pending {
            return Err(SaleError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SaleError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: SaleStatus, to: SaleStatus },

    #[error("Sale is {0} and can no longer be edited")]
    NotEditable(SaleStatus),

    #[error("A sale needs at least one item")]
    EmptySale,

    #[error("Invalid sale item: {0}")]
    InvalidItem(String),

    #[error("Unknown sale status: {0}")]
    UnknownStatus(String),

    #[error("Combo not found: {0}")]
    UnknownCombo(uuid::Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineProduct, SaleItem};
    use uuid::Uuid;

    fn pending_sale() -> Sale {
        let item = SaleItem::new(LineProduct::App { app_id: Uuid::new_v4() }, "Xbox 3M".into(), 1, 9900);
        Sale::new(Uuid::new_v4(), Uuid::new_v4(), vec![item]).unwrap()
    }

    #[test]
    fn test_confirm_lifecycle() {
        let mut sale = pending_sale();
        sale.confirm().unwrap();
        assert_eq!(sale.status, SaleStatus::Confirmed);
        assert!(sale.confirmed_at.is_some());

        // Confirmed is terminal
        let err = sale.confirm().unwrap_err();
        assert_eq!(
            err,
            SaleError::InvalidTransition { from: SaleStatus::Confirmed, to: SaleStatus::Confirmed }
        );
        assert!(sale.cancel().is_err());
    }

    #[test]
    fn test_cancelled_sale_is_frozen() {
        let mut sale = pending_sale();
        sale.cancel().unwrap();
        assert_eq!(sale.status, SaleStatus::Cancelled);
        assert!(sale.confirm().is_err());
        assert_eq!(
            sale.set_customer(Uuid::new_v4()),
            Err(SaleError::NotEditable(SaleStatus::Cancelled))
        );
    }
}
