use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::domain::{
    BidSubmission, MoveRequestId, MoveRequestRecord, PaymentId, PaymentRecord, QuoteId,
    QuoteRecord, QuoteStatus,
};
use super::lifecycle::{
    self, ArbitrationDecision, ChargeOutcome, LifecycleError, MissionAction, SideEffect,
    Transition,
};
use super::repository::{
    ChargeRequest, EventKind, GatewayError, MarketplaceEvent, NotificationSink, PaymentGateway,
    PaymentRepository, QuoteRepository, RepositoryError, Settlement,
};
use crate::config::MarketplaceConfig;
use crate::workflows::pricing::{
    assess_bid, split, EscrowError, MarketPriceEstimator, MoveRequest, PricingError,
};
use crate::workflows::screening::ContactInfoScanner;

/// One write plus one automatic retry after a lost conditional write.
const MAX_WRITE_ATTEMPTS: u32 = 2;

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static QUOTE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> MoveRequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    MoveRequestId(format!("req-{id:06}"))
}

fn next_quote_id() -> QuoteId {
    let id = QUOTE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    QuoteId(format!("quote-{id:06}"))
}

/// Quote desk and mission service composing the pricing engines, the contact scanner
/// and the storage, gateway and notification collaborators.
pub struct MarketplaceService<S, G, N> {
    store: Arc<S>,
    gateway: Arc<G>,
    notifications: Arc<N>,
    estimator: Arc<MarketPriceEstimator>,
    scanner: Arc<ContactInfoScanner>,
    config: MarketplaceConfig,
}

/// Quote accepted together with the payment record created for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedQuote {
    pub quote: QuoteRecord,
    pub payment: PaymentRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEdit {
    pub request: MoveRequestRecord,
    pub expired_quotes: Vec<QuoteId>,
}

impl<S, G, N> MarketplaceService<S, G, N>
where
    S: QuoteRepository + PaymentRepository + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, notifications: Arc<N>, config: MarketplaceConfig) -> Self {
        Self::with_engines(
            store,
            gateway,
            notifications,
            MarketPriceEstimator::standard(),
            ContactInfoScanner::standard(),
            config,
        )
    }

    pub fn with_engines(
        store: Arc<S>,
        gateway: Arc<G>,
        notifications: Arc<N>,
        estimator: MarketPriceEstimator,
        scanner: ContactInfoScanner,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifications,
            estimator: Arc::new(estimator),
            scanner: Arc::new(scanner),
            config,
        }
    }

    pub fn estimator(&self) -> &MarketPriceEstimator {
        &self.estimator
    }

    pub fn scanner(&self) -> &ContactInfoScanner {
        &self.scanner
    }

    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    /// Register a new client move request.
    pub fn create_move_request(
        &self,
        details: MoveRequest,
    ) -> Result<MoveRequestRecord, MarketplaceError> {
        let record = MoveRequestRecord {
            request_id: next_request_id(),
            revision: 1,
            details,
        };
        self.store.save_request(record.clone())?;
        info!(request_id = %record.request_id.0, "move request created");
        Ok(record)
    }

    /// Store the client's edit and expire every pending quote priced on the old details.
    pub fn edit_move_request(
        &self,
        request_id: &MoveRequestId,
        details: MoveRequest,
    ) -> Result<RequestEdit, MarketplaceError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.load_request(request_id)?;
            self.ensure_open(request_id)?;

            let record = MoveRequestRecord {
                request_id: request_id.clone(),
                revision: current.revision + 1,
                details: details.clone(),
            };
            let expired_quotes = match self.store.revise_request(record.clone()) {
                Ok(expired) => expired,
                Err(RepositoryError::Conflict) => {
                    warn!(request_id = %request_id.0, attempt, "move request changed during edit");
                    continue;
                }
                Err(other) => return Err(other.into()),
            };

            info!(
                request_id = %request_id.0,
                revision = record.revision,
                expired = expired_quotes.len(),
                "move request edited"
            );
            if !expired_quotes.is_empty() {
                self.notify(
                    MarketplaceEvent::new(EventKind::QuotesExpired, &request_id.0)
                        .with_detail("count", expired_quotes.len()),
                );
            }

            return Ok(RequestEdit {
                request: record,
                expired_quotes,
            });
        }

        Err(MarketplaceError::StateTransitionConflict {
            reference: request_id.0.clone(),
        })
    }

    /// Screen, price and persist a mover's bid as a pending quote.
    pub fn submit_bid(&self, submission: BidSubmission) -> Result<QuoteRecord, MarketplaceError> {
        let mut request = self.load_request(&submission.request_id)?;
        self.ensure_open(&submission.request_id)?;

        if let Some(notes) = submission.notes.as_deref() {
            let scan = self.scanner.scan(notes);
            if !scan.is_valid {
                let codes = scan.reason_codes();
                info!(
                    request_id = %submission.request_id.0,
                    mover_id = %submission.mover_id.0,
                    reasons = ?codes,
                    "bid blocked for contact information"
                );
                self.notify(
                    MarketplaceEvent::new(
                        EventKind::QuoteBlockedForContactInfo,
                        &submission.request_id.0,
                    )
                    .with_detail("mover_id", &submission.mover_id.0)
                    .with_detail("reasons", codes.join(",")),
                );
                return Err(MarketplaceError::BlockedContent {
                    reasons: scan.blocked_reasons,
                });
            }
        }

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            if attempt > 1 {
                request = self.load_request(&submission.request_id)?;
                self.ensure_open(&submission.request_id)?;
            }

            let assessment =
                assess_bid(&self.estimator, &request.details, submission.proposed_price)?;
            let quote = QuoteRecord {
                quote_id: next_quote_id(),
                request_id: submission.request_id.clone(),
                mover_id: submission.mover_id.clone(),
                proposed_price: assessment.proposed_price,
                market_price_estimate: assessment.market_price_estimate,
                price_indicator: assessment.price_indicator,
                client_display_price: assessment.client_display_price,
                status: QuoteStatus::Pending,
                validity_date: submission.validity_date,
                notes: submission.notes.clone(),
                request_revision: request.revision,
            };

            let stored = match self.store.insert_quote(quote) {
                Ok(stored) => stored,
                Err(RepositoryError::Conflict) => {
                    warn!(
                        request_id = %submission.request_id.0,
                        attempt,
                        "move request changed while pricing a bid"
                    );
                    continue;
                }
                Err(other) => return Err(other.into()),
            };
            info!(
                quote_id = %stored.quote_id.0,
                indicator = stored.price_indicator.label(),
                market_price = stored.market_price_estimate,
                "quote submitted"
            );
            self.notify(
                MarketplaceEvent::new(EventKind::QuoteSubmitted, &stored.quote_id.0)
                    .with_detail("request_id", &stored.request_id.0)
                    .with_detail("price_indicator", stored.price_indicator.label()),
            );

            return Ok(stored);
        }

        Err(MarketplaceError::StateTransitionConflict {
            reference: submission.request_id.0.clone(),
        })
    }

    /// Accept one quote, reject its pending siblings and open the payment record.
    pub fn accept_quote(
        &self,
        quote_id: &QuoteId,
        today: NaiveDate,
    ) -> Result<AcceptedQuote, MarketplaceError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let quote = self.quote(quote_id)?;
            if quote.status != QuoteStatus::Pending {
                return Err(MarketplaceError::QuoteNotPending {
                    quote_id: quote_id.0.clone(),
                    status: quote.status,
                });
            }
            if quote.validity_date < today {
                return Err(MarketplaceError::QuoteValidityElapsed {
                    quote_id: quote_id.0.clone(),
                    validity_date: quote.validity_date,
                });
            }

            let split = split(quote.client_display_price)?;
            let payment = PaymentRecord::from_split(&quote, &split);

            match self.store.accept_exclusive(quote_id, payment.clone()) {
                Ok(accepted) => {
                    info!(
                        quote_id = %quote_id.0,
                        payment_id = %payment.payment_id.0,
                        deposit = payment.deposit_amount,
                        guarantee = payment.guarantee_amount,
                        "quote accepted"
                    );
                    self.notify(
                        MarketplaceEvent::new(EventKind::QuoteAccepted, &quote_id.0)
                            .with_detail("payment_id", &payment.payment_id.0)
                            .with_detail("deposit_amount", payment.deposit_amount),
                    );
                    return Ok(AcceptedQuote {
                        quote: accepted,
                        payment,
                    });
                }
                Err(RepositoryError::Conflict) => {
                    warn!(quote_id = %quote_id.0, attempt, "quote acceptance lost a race");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(MarketplaceError::StateTransitionConflict {
            reference: quote_id.0.clone(),
        })
    }

    /// Charge the deposit through the gateway and record the outcome.
    pub fn collect_deposit(
        &self,
        payment_id: &PaymentId,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, MarketplaceError> {
        let record = self.payment(payment_id)?;
        lifecycle::guard(&record, MissionAction::ConfirmDeposit)?;

        let outcome = self.gateway.charge(ChargeRequest {
            payment_id: payment_id.clone(),
            amount: record.deposit_amount,
        })?;
        self.confirm_deposit(payment_id, outcome, now)
    }

    /// Apply a gateway outcome pushed by the payment provider.
    pub fn confirm_deposit(
        &self,
        payment_id: &PaymentId,
        outcome: ChargeOutcome,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, MarketplaceError> {
        self.transition(payment_id, |record| {
            lifecycle::confirm_deposit(record, outcome.clone(), now)
        })
    }

    pub fn mark_mission_complete(
        &self,
        payment_id: &PaymentId,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, MarketplaceError> {
        let window = self.config.review_window;
        self.transition(payment_id, |record| {
            lifecycle::mark_complete(record, now, window)
        })
    }

    /// Entry point for the arbitration collaborator.
    pub fn record_arbitration(
        &self,
        payment_id: &PaymentId,
        decision: ArbitrationDecision,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, MarketplaceError> {
        self.transition(payment_id, |record| {
            lifecycle::arbitrate(record, &decision, now)
        })
    }

    /// Records whose damage-claim window has elapsed and await an arbitration decision.
    pub fn reviews_due(&self, now: DateTime<Utc>) -> Result<Vec<PaymentRecord>, MarketplaceError> {
        let window = self.config.review_window;
        let due = self
            .store
            .awaiting_review()?
            .into_iter()
            .filter(|record| {
                record
                    .review_deadline(window)
                    .is_some_and(|deadline| deadline <= now)
            })
            .collect();
        Ok(due)
    }

    pub fn quote(&self, quote_id: &QuoteId) -> Result<QuoteRecord, MarketplaceError> {
        self.store
            .fetch_quote(quote_id)?
            .ok_or_else(|| MarketplaceError::QuoteNotFound {
                quote_id: quote_id.0.clone(),
            })
    }

    pub fn quotes_for_request(
        &self,
        request_id: &MoveRequestId,
    ) -> Result<Vec<QuoteRecord>, MarketplaceError> {
        self.load_request(request_id)?;
        Ok(self.store.quotes_for_request(request_id)?)
    }

    pub fn payment(&self, payment_id: &PaymentId) -> Result<PaymentRecord, MarketplaceError> {
        self.store
            .fetch_payment(payment_id)?
            .ok_or_else(|| MarketplaceError::PaymentNotFound {
                payment_id: payment_id.0.clone(),
            })
    }

    fn load_request(
        &self,
        request_id: &MoveRequestId,
    ) -> Result<MoveRequestRecord, MarketplaceError> {
        self.store
            .fetch_request(request_id)?
            .ok_or_else(|| MarketplaceError::RequestNotFound {
                request_id: request_id.0.clone(),
            })
    }

    /// A request with an accepted quote no longer takes bids or edits.
    fn ensure_open(&self, request_id: &MoveRequestId) -> Result<(), MarketplaceError> {
        let locked = self
            .store
            .quotes_for_request(request_id)?
            .iter()
            .any(|quote| quote.status == QuoteStatus::Accepted);
        if locked {
            return Err(MarketplaceError::RequestLocked {
                request_id: request_id.0.clone(),
            });
        }
        Ok(())
    }

    /// Read, transition, conditionally write; re-read once if the write loses a race.
    fn transition<F>(&self, payment_id: &PaymentId, step: F) -> Result<PaymentRecord, MarketplaceError>
    where
        F: Fn(&PaymentRecord) -> Result<Transition, LifecycleError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.payment(payment_id)?;
            let transition = step(&current)?;

            match self.store.update_if(transition.record.clone(), transition.from) {
                Ok(()) => {
                    info!(
                        payment_id = %payment_id.0,
                        from = transition.from.label(),
                        to = transition.to.label(),
                        "mission transition recorded"
                    );
                    self.dispatch(&transition);
                    return Ok(transition.record);
                }
                Err(RepositoryError::Conflict) => {
                    warn!(
                        payment_id = %payment_id.0,
                        expected = transition.from.label(),
                        attempt,
                        "payment record changed during transition"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(MarketplaceError::StateTransitionConflict {
            reference: payment_id.0.clone(),
        })
    }

    fn dispatch(&self, transition: &Transition) {
        let payment_id = &transition.record.payment_id;
        for effect in &transition.effects {
            match effect {
                SideEffect::DepositConfirmed {
                    amount,
                    transaction_id,
                } => self.notify(
                    MarketplaceEvent::new(EventKind::DepositConfirmed, &payment_id.0)
                        .with_detail("amount", amount)
                        .with_detail("transaction_id", transaction_id),
                ),
                SideEffect::DepositFailed { amount, reason } => self.notify(
                    MarketplaceEvent::new(EventKind::DepositFailed, &payment_id.0)
                        .with_detail("amount", amount)
                        .with_detail("reason", reason),
                ),
                SideEffect::ReviewWindowOpened { deadline } => self.notify(
                    MarketplaceEvent::new(EventKind::MissionCompleted, &payment_id.0)
                        .with_detail("review_deadline", deadline.to_rfc3339()),
                ),
                SideEffect::ReleaseToMover { amount } => {
                    self.settle(Settlement::ReleaseToMover {
                        payment_id: payment_id.clone(),
                        amount: *amount,
                    });
                    self.notify(
                        MarketplaceEvent::new(EventKind::GuaranteeReleased, &payment_id.0)
                            .with_detail("amount", amount),
                    );
                }
                SideEffect::RefundToClient { amount } => {
                    self.settle(Settlement::RefundToClient {
                        payment_id: payment_id.clone(),
                        amount: *amount,
                    });
                    self.notify(
                        MarketplaceEvent::new(EventKind::GuaranteeRefunded, &payment_id.0)
                            .with_detail("amount", amount),
                    );
                }
            }
        }
    }

    /// The decision is already stored; a failed settlement is left for reconciliation.
    fn settle(&self, settlement: Settlement) {
        if let Err(error) = self.gateway.settle(settlement.clone()) {
            error!(?settlement, %error, "guarantee settlement failed");
        }
    }

    fn notify(&self, event: MarketplaceEvent) {
        let kind = event.kind;
        if let Err(error) = self.notifications.emit(event) {
            warn!(event = kind.label(), %error, "notification delivery failed");
        }
    }
}

/// Error raised by the marketplace service.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("move request {request_id} not found")]
    RequestNotFound { request_id: String },
    #[error("quote {quote_id} not found")]
    QuoteNotFound { quote_id: String },
    #[error("payment {payment_id} not found")]
    PaymentNotFound { payment_id: String },
    #[error("submission blocked: {}", reasons.join(", "))]
    BlockedContent { reasons: Vec<String> },
    #[error("quote {quote_id} is {} and cannot be accepted", status.label())]
    QuoteNotPending { quote_id: String, status: QuoteStatus },
    #[error("quote {quote_id} was valid until {validity_date}")]
    QuoteValidityElapsed {
        quote_id: String,
        validity_date: NaiveDate,
    },
    #[error("move request {request_id} already has an accepted quote")]
    RequestLocked { request_id: String },
    #[error("{reference} was modified concurrently, please retry")]
    StateTransitionConflict { reference: String },
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Escrow(#[from] EscrowError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
