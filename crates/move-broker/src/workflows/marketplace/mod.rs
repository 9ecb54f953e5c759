//! Quote desk and mission lifecycle.
//!
//! Bids are screened and priced when they arrive, acceptance is a single conditional
//! write that also opens the payment record, and every later change to that record
//! goes through the state machine in [`lifecycle`] and a compare-and-swap write.

pub mod domain;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    BidSubmission, GuaranteeStatus, MissionCompletionStatus, MoveRequestId, MoveRequestRecord,
    MoverId, PaymentId, PaymentRecord, PaymentStatus, PaymentView, QuoteId, QuoteRecord,
    QuoteStatus,
};
pub use lifecycle::{
    ArbitrationDecision, ArbitrationVerdict, ChargeOutcome, LifecycleError, MissionAction,
    MissionState, SideEffect, Transition,
};
pub use memory::InMemoryMarketplaceStore;
pub use repository::{
    ChargeRequest, EventKind, GatewayError, MarketplaceEvent, NotificationError,
    NotificationSink, PaymentGateway, PaymentRepository, QuoteRepository, RepositoryError,
    Settlement,
};
pub use router::marketplace_router;
pub use service::{AcceptedQuote, MarketplaceError, MarketplaceService, RequestEdit};
