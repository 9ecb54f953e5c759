use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::workflows::marketplace::domain::{
    BidSubmission, MoveRequestId, MoveRequestRecord, MoverId, PaymentId, PaymentRecord, QuoteId,
    QuoteRecord,
};
use crate::workflows::marketplace::lifecycle::{ChargeOutcome, MissionState};
use crate::workflows::marketplace::repository::{
    ChargeRequest, GatewayError, MarketplaceEvent, NotificationError, NotificationSink,
    PaymentGateway, PaymentRepository, QuoteRepository, RepositoryError, Settlement,
};
use crate::workflows::marketplace::{
    marketplace_router, EventKind, InMemoryMarketplaceStore, MarketplaceService,
};
use crate::workflows::pricing::MoveRequest;

pub(super) type TestService =
    MarketplaceService<InMemoryMarketplaceStore, RecordingGateway, RecordingSink>;

/// 25 m3 over 80 km with one floor of stairs: market price 1348.
pub(super) fn move_request() -> MoveRequest {
    MoveRequest {
        volume_m3: Some(25.0),
        distance_km: Some(80.0),
        floor_from: 1,
        from_city: Some("Paris".to_string()),
        to_city: Some("Chartres".to_string()),
        from_postal_code: "75011".to_string(),
        to_postal_code: "28000".to_string(),
        ..MoveRequest::default()
    }
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 1).expect("valid date")
}

pub(super) fn moving_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 15).expect("valid date")
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 15, 18, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn bid(request_id: &MoveRequestId, mover: &str, price: f64) -> BidSubmission {
    BidSubmission {
        request_id: request_id.clone(),
        mover_id: MoverId(mover.to_string()),
        proposed_price: price,
        validity_date: moving_day(),
        notes: Some("Camion 20m3, deux déménageurs".to_string()),
    }
}

pub(super) fn config() -> MarketplaceConfig {
    MarketplaceConfig {
        review_window: Duration::hours(48),
    }
}

pub(super) fn build_service() -> (
    TestService,
    Arc<InMemoryMarketplaceStore>,
    Arc<RecordingGateway>,
    Arc<RecordingSink>,
) {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let gateway = Arc::new(RecordingGateway::approving());
    let sink = Arc::new(RecordingSink::default());
    let service = MarketplaceService::new(store.clone(), gateway.clone(), sink.clone(), config());
    (service, store, gateway, sink)
}

/// Request with one accepted 1350 bid; the deposit has not been charged yet.
pub(super) fn accepted_payment(service: &TestService) -> PaymentRecord {
    let request = service
        .create_move_request(move_request())
        .expect("request stored");
    let quote = service
        .submit_bid(bid(&request.request_id, "mover-1", 1350.0))
        .expect("bid accepted");
    service
        .accept_quote(&quote.quote_id, today())
        .expect("quote accepted")
        .payment
}

/// Accepted quote whose deposit has been charged.
pub(super) fn in_progress_payment(service: &TestService) -> PaymentRecord {
    let payment = accepted_payment(service);
    service
        .collect_deposit(&payment.payment_id, now())
        .expect("deposit collected")
}

/// Mission marked complete by the mover.
pub(super) fn pending_review_payment(service: &TestService) -> PaymentRecord {
    let payment = in_progress_payment(service);
    service
        .mark_mission_complete(&payment.payment_id, now())
        .expect("mission completed")
}

pub(super) struct RecordingGateway {
    outcome: ChargeOutcome,
    charges: Mutex<Vec<ChargeRequest>>,
    settlements: Mutex<Vec<Settlement>>,
}

impl RecordingGateway {
    pub(super) fn approving() -> Self {
        Self::with_outcome(ChargeOutcome::Succeeded {
            transaction_id: "txn-test".to_string(),
        })
    }

    pub(super) fn declining(reason: &str) -> Self {
        Self::with_outcome(ChargeOutcome::Failed {
            reason: reason.to_string(),
        })
    }

    fn with_outcome(outcome: ChargeOutcome) -> Self {
        Self {
            outcome,
            charges: Mutex::new(Vec::new()),
            settlements: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().expect("gateway mutex poisoned").clone()
    }

    pub(super) fn settlements(&self) -> Vec<Settlement> {
        self.settlements
            .lock()
            .expect("gateway mutex poisoned")
            .clone()
    }
}

impl PaymentGateway for RecordingGateway {
    fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        self.charges
            .lock()
            .expect("gateway mutex poisoned")
            .push(request);
        Ok(self.outcome.clone())
    }

    fn settle(&self, settlement: Settlement) -> Result<(), GatewayError> {
        self.settlements
            .lock()
            .expect("gateway mutex poisoned")
            .push(settlement);
        Ok(())
    }
}

pub(super) struct OfflineGateway;

impl PaymentGateway for OfflineGateway {
    fn charge(&self, _request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        Err(GatewayError::Unavailable("acquirer timeout".to_string()))
    }

    fn settle(&self, _settlement: Settlement) -> Result<(), GatewayError> {
        Err(GatewayError::Unavailable("acquirer timeout".to_string()))
    }
}

#[derive(Default)]
pub(super) struct RecordingSink {
    events: Mutex<Vec<MarketplaceEvent>>,
}

impl RecordingSink {
    pub(super) fn events(&self) -> Vec<MarketplaceEvent> {
        self.events.lock().expect("sink mutex poisoned").clone()
    }

    pub(super) fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, event: MarketplaceEvent) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) struct BrokenSink;

impl NotificationSink for BrokenSink {
    fn emit(&self, _event: MarketplaceEvent) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp down".to_string()))
    }
}

/// Store whose conditional payment writes lose the race a fixed number of times.
pub(super) struct ContendedStore {
    inner: InMemoryMarketplaceStore,
    conflicts_left: Mutex<u32>,
}

impl ContendedStore {
    pub(super) fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryMarketplaceStore::new(),
            conflicts_left: Mutex::new(conflicts),
        }
    }

    pub(super) fn inner(&self) -> &InMemoryMarketplaceStore {
        &self.inner
    }
}

impl QuoteRepository for ContendedStore {
    fn save_request(&self, record: MoveRequestRecord) -> Result<(), RepositoryError> {
        self.inner.save_request(record)
    }

    fn fetch_request(
        &self,
        id: &MoveRequestId,
    ) -> Result<Option<MoveRequestRecord>, RepositoryError> {
        self.inner.fetch_request(id)
    }

    fn insert_quote(&self, record: QuoteRecord) -> Result<QuoteRecord, RepositoryError> {
        self.inner.insert_quote(record)
    }

    fn fetch_quote(&self, id: &QuoteId) -> Result<Option<QuoteRecord>, RepositoryError> {
        self.inner.fetch_quote(id)
    }

    fn quotes_for_request(&self, id: &MoveRequestId) -> Result<Vec<QuoteRecord>, RepositoryError> {
        self.inner.quotes_for_request(id)
    }

    fn accept_exclusive(
        &self,
        quote_id: &QuoteId,
        payment: PaymentRecord,
    ) -> Result<QuoteRecord, RepositoryError> {
        self.inner.accept_exclusive(quote_id, payment)
    }

    fn revise_request(&self, record: MoveRequestRecord) -> Result<Vec<QuoteId>, RepositoryError> {
        self.inner.revise_request(record)
    }
}

impl PaymentRepository for ContendedStore {
    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        self.inner.fetch_payment(id)
    }

    fn update_if(
        &self,
        record: PaymentRecord,
        expected: MissionState,
    ) -> Result<(), RepositoryError> {
        let mut left = self.conflicts_left.lock().expect("store mutex poisoned");
        if *left > 0 {
            *left -= 1;
            return Err(RepositoryError::Conflict);
        }
        drop(left);
        self.inner.update_if(record, expected)
    }

    fn awaiting_review(&self) -> Result<Vec<PaymentRecord>, RepositoryError> {
        self.inner.awaiting_review()
    }
}

pub(super) struct UnavailableStore;

impl QuoteRepository for UnavailableStore {
    fn save_request(&self, _record: MoveRequestRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_request(
        &self,
        _id: &MoveRequestId,
    ) -> Result<Option<MoveRequestRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_quote(&self, _record: QuoteRecord) -> Result<QuoteRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_quote(&self, _id: &QuoteId) -> Result<Option<QuoteRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn quotes_for_request(
        &self,
        _id: &MoveRequestId,
    ) -> Result<Vec<QuoteRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn accept_exclusive(
        &self,
        _quote_id: &QuoteId,
        _payment: PaymentRecord,
    ) -> Result<QuoteRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn revise_request(&self, _record: MoveRequestRecord) -> Result<Vec<QuoteId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl PaymentRepository for UnavailableStore {
    fn fetch_payment(&self, _id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_if(
        &self,
        _record: PaymentRecord,
        _expected: MissionState,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn awaiting_review(&self) -> Result<Vec<PaymentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    marketplace_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
