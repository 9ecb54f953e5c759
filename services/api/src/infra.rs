use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use move_broker::workflows::marketplace::{
    ChargeOutcome, ChargeRequest, GatewayError, MarketplaceEvent, NotificationError,
    NotificationSink, PaymentGateway, Settlement,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

static TRANSACTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Acquirer stand-in that approves every charge and records settlements.
#[derive(Default)]
pub(crate) struct SimulatedGateway {
    settlements: Mutex<Vec<Settlement>>,
}

impl SimulatedGateway {
    pub(crate) fn settlements(&self) -> Vec<Settlement> {
        self.settlements
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl PaymentGateway for SimulatedGateway {
    fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        let sequence = TRANSACTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let transaction_id = format!("sim-{sequence:08}");
        info!(
            payment_id = %request.payment_id.0,
            amount = request.amount,
            %transaction_id,
            "simulated deposit charge approved"
        );
        Ok(ChargeOutcome::Succeeded { transaction_id })
    }

    fn settle(&self, settlement: Settlement) -> Result<(), GatewayError> {
        info!(?settlement, "simulated settlement recorded");
        self.settlements
            .lock()
            .map_err(|_| GatewayError::Unavailable("settlement ledger poisoned".to_string()))?
            .push(settlement);
        Ok(())
    }
}

/// Writes every marketplace event to the log stream.
#[derive(Default, Clone)]
pub(crate) struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn emit(&self, event: MarketplaceEvent) -> Result<(), NotificationError> {
        info!(
            event = event.kind.label(),
            reference = %event.reference,
            details = ?event.details,
            "marketplace event"
        );
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
