use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    MoveRequestId, MoveRequestRecord, PaymentId, PaymentRecord, QuoteId, QuoteRecord,
};
use super::lifecycle::{ChargeOutcome, MissionState};

/// Storage for move requests and the quotes posted against them.
pub trait QuoteRepository: Send + Sync {
    /// Store a newly created request.
    fn save_request(&self, record: MoveRequestRecord) -> Result<(), RepositoryError>;
    fn fetch_request(
        &self,
        id: &MoveRequestId,
    ) -> Result<Option<MoveRequestRecord>, RepositoryError>;
    /// Insert a pending quote. Returns `Conflict` when the request has moved past
    /// `record.request_revision` or already has an accepted quote.
    fn insert_quote(&self, record: QuoteRecord) -> Result<QuoteRecord, RepositoryError>;
    fn fetch_quote(&self, id: &QuoteId) -> Result<Option<QuoteRecord>, RepositoryError>;
    fn quotes_for_request(&self, id: &MoveRequestId) -> Result<Vec<QuoteRecord>, RepositoryError>;

    /// In one transaction: accept `quote_id` if it is still pending, priced on the
    /// current request revision and no sibling is accepted; reject its pending
    /// siblings and insert `payment`. Returns `Conflict` without changing anything
    /// when the guard fails.
    fn accept_exclusive(
        &self,
        quote_id: &QuoteId,
        payment: PaymentRecord,
    ) -> Result<QuoteRecord, RepositoryError>;

    /// In one transaction: store `record` if the stored revision is the one just
    /// before it and no quote on the request is accepted, then expire every pending
    /// quote and return their ids. Returns `Conflict` without changing anything
    /// when the guard fails.
    fn revise_request(&self, record: MoveRequestRecord) -> Result<Vec<QuoteId>, RepositoryError>;
}

/// Storage for payment records.
pub trait PaymentRepository: Send + Sync {
    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, RepositoryError>;

    /// Replace the stored record only if its current state is still `expected`.
    fn update_if(
        &self,
        record: PaymentRecord,
        expected: MissionState,
    ) -> Result<(), RepositoryError>;

    /// Records currently sitting in the damage-claim window.
    fn awaiting_review(&self) -> Result<Vec<PaymentRecord>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("conditional write rejected: stored state changed")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Deposit charge request sent to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub payment_id: PaymentId,
    pub amount: i64,
}

/// Guarantee movement instructed after an arbitration decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Settlement {
    ReleaseToMover { payment_id: PaymentId, amount: i64 },
    RefundToClient { payment_id: PaymentId, amount: i64 },
}

/// Outbound payment gateway. Only the outcome of a charge matters to the marketplace.
pub trait PaymentGateway: Send + Sync {
    fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError>;
    fn settle(&self, settlement: Settlement) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    QuoteSubmitted,
    QuoteBlockedForContactInfo,
    QuoteAccepted,
    QuotesExpired,
    DepositConfirmed,
    DepositFailed,
    MissionCompleted,
    GuaranteeReleased,
    GuaranteeRefunded,
}

impl EventKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::QuoteSubmitted => "quote_submitted",
            Self::QuoteBlockedForContactInfo => "quote_blocked_for_contact_info",
            Self::QuoteAccepted => "quote_accepted",
            Self::QuotesExpired => "quotes_expired",
            Self::DepositConfirmed => "deposit_confirmed",
            Self::DepositFailed => "deposit_failed",
            Self::MissionCompleted => "mission_completed",
            Self::GuaranteeReleased => "guarantee_released",
            Self::GuaranteeRefunded => "guarantee_refunded",
        }
    }
}

/// Event descriptor; delivery is up to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceEvent {
    pub kind: EventKind,
    pub reference: String,
    pub details: BTreeMap<String, String>,
}

impl MarketplaceEvent {
    pub fn new(kind: EventKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

/// Fire-and-forget notification hook (email, push, back-office feed).
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: MarketplaceEvent) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
