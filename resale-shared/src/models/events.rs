use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SaleCreatedEvent {
    pub sale_id: Uuid,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub total_cents: i64,
    pub item_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SaleConfirmedEvent {
    pub sale_id: Uuid,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub total_cents: i64,
    /// Number of codes consumed by the confirmation.
    pub codes_allocated: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SaleCancelledEvent {
    pub sale_id: Uuid,
    pub owner_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CodesImportedEvent {
    pub app_id: Uuid,
    pub owner_id: Uuid,
    pub imported: usize,
    pub rejected: usize,
    pub timestamp: DateTime<Utc>,
}

/// Everything the backoffice announces on its event bus.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaleEvent {
    Created(SaleCreatedEvent),
    Confirmed(SaleConfirmedEvent),
    Cancelled(SaleCancelledEvent),
    CodesImported(CodesImportedEvent),
}

impl SaleEvent {
    pub fn owner_id(&self) -> Uuid {
        match self {
            SaleEvent::Created(e) => e.owner_id,
            SaleEvent::Confirmed(e) => e.owner_id,
            SaleEvent::Cancelled(e) => e.owner_id,
            SaleEvent::CodesImported(e) => e.owner_id,
        }
    }

    /// Short name used for SSE event types and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SaleEvent::Created(_) => "sale_created",
            SaleEvent::Confirmed(_) => "sale_confirmed",
            SaleEvent::Cancelled(_) => "sale_cancelled",
            SaleEvent::CodesImported(_) => "codes_imported",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged() {
        let event = SaleEvent::Cancelled(SaleCancelledEvent {
            sale_id: Uuid::nil(),
            owner_id: Uuid::nil(),
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cancelled");
        assert_eq!(event.kind(), "sale_cancelled");
    }
}
