use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use resale_shared::models::events::SaleEvent;

use crate::state::AppState;

/// Counters fed from the sale event bus.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    sales_total: IntCounterVec,
    codes_imported: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sales_total = IntCounterVec::new(
            Opts::new("resale_sales_total", "Sale lifecycle events by type"),
            &["event"],
        )?;
        let codes_imported = IntCounter::new("resale_codes_imported_total", "Codes accepted by bulk imports")?;

        registry.register(Box::new(sales_total.clone()))?;
        registry.register(Box::new(codes_imported.clone()))?;

        Ok(Self {
            registry,
            sales_total,
            codes_imported,
        })
    }

    pub fn record(&self, event: &SaleEvent) {
        match event {
            SaleEvent::CodesImported(e) => self.codes_imported.inc_by(e.imported as u64),
            other => self.sales_total.with_label_values(&[other.kind()]).inc(),
        }
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use resale_shared::models::events::{CodesImportedEvent, SaleCancelledEvent};
    use uuid::Uuid;

    #[test]
    fn test_record_and_render() {
        let metrics = Metrics::new().unwrap();
        metrics.record(&SaleEvent::Cancelled(SaleCancelledEvent {
            sale_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }));
        metrics.record(&SaleEvent::CodesImported(CodesImportedEvent {
            app_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            imported: 7,
            rejected: 1,
            timestamp: Utc::now(),
        }));

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"resale_sales_total{event="sale_cancelled"} 1"#));
        assert!(text.contains("resale_codes_imported_total 7"));
    }
}
