use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::pricing::{EscrowSplit, MoveRequest, PriceIndicator};

/// Identifier wrapper for client move requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MoveRequestId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MoverId(pub String);

impl PaymentId {
    /// One payment record exists per accepted quote.
    pub fn for_quote(quote_id: &QuoteId) -> Self {
        Self(format!("pay-{}", quote_id.0))
    }
}

/// Stored move request. `revision` increases on every client edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRequestRecord {
    pub request_id: MoveRequestId,
    pub revision: u32,
    pub details: MoveRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

/// Bid posted by a mover against a move request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidSubmission {
    pub request_id: MoveRequestId,
    pub mover_id: MoverId,
    pub proposed_price: f64,
    /// Moving date the mover commits to; the quote cannot be accepted after it.
    #[serde(alias = "proposed_moving_date")]
    pub validity_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub quote_id: QuoteId,
    pub request_id: MoveRequestId,
    pub mover_id: MoverId,
    pub proposed_price: f64,
    pub market_price_estimate: i64,
    pub price_indicator: PriceIndicator,
    pub client_display_price: i64,
    pub status: QuoteStatus,
    pub validity_date: NaiveDate,
    pub notes: Option<String>,
    /// Request revision the market estimate was computed against.
    pub request_revision: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionCompletionStatus {
    InProgress,
    CompletedPendingReview,
    Approved,
    Rejected,
}

impl MissionCompletionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::CompletedPendingReview => "completed_pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuaranteeStatus {
    Held,
    ReleasedToMover,
    Refunded,
}

impl GuaranteeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::ReleasedToMover => "released_to_mover",
            Self::Refunded => "refunded",
        }
    }
}

/// Money movements attached to an accepted quote, from deposit to guarantee release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub quote_id: QuoteId,
    pub request_id: MoveRequestId,
    pub mover_id: MoverId,
    pub total_amount: i64,
    pub mover_price: i64,
    pub platform_fee: i64,
    pub deposit_amount: i64,
    pub remaining_amount: i64,
    pub guarantee_amount: i64,
    pub payment_status: PaymentStatus,
    pub mission_completion_status: MissionCompletionStatus,
    pub guarantee_status: GuaranteeStatus,
    pub gateway_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub release_requested_at: Option<DateTime<Utc>>,
    pub guarantee_decision_at: Option<DateTime<Utc>>,
    pub guarantee_released_amount: Option<i64>,
    pub guarantee_refunded_amount: Option<i64>,
    pub guarantee_notes: Option<String>,
}

impl PaymentRecord {
    /// Fresh record for an accepted quote; nothing has been charged yet.
    pub fn from_split(quote: &QuoteRecord, split: &EscrowSplit) -> Self {
        Self {
            payment_id: PaymentId::for_quote(&quote.quote_id),
            quote_id: quote.quote_id.clone(),
            request_id: quote.request_id.clone(),
            mover_id: quote.mover_id.clone(),
            total_amount: split.client_display_price,
            mover_price: split.mover_price,
            platform_fee: split.platform_fee,
            deposit_amount: split.deposit_amount,
            remaining_amount: split.remaining_amount,
            guarantee_amount: split.guarantee_amount,
            payment_status: PaymentStatus::Pending,
            mission_completion_status: MissionCompletionStatus::InProgress,
            guarantee_status: GuaranteeStatus::Held,
            gateway_transaction_id: None,
            failure_reason: None,
            paid_at: None,
            release_requested_at: None,
            guarantee_decision_at: None,
            guarantee_released_amount: None,
            guarantee_refunded_amount: None,
            guarantee_notes: None,
        }
    }

    /// End of the client's damage-claim window, once the mover has asked for release.
    pub fn review_deadline(&self, window: Duration) -> Option<DateTime<Utc>> {
        self.release_requested_at.map(|requested| requested + window)
    }

    pub fn view(&self) -> PaymentView {
        PaymentView {
            payment_id: self.payment_id.clone(),
            quote_id: self.quote_id.clone(),
            state: super::lifecycle::MissionState::of(self).label(),
            payment_status: self.payment_status.label(),
            mission_completion_status: self.mission_completion_status.label(),
            guarantee_status: self.guarantee_status.label(),
            total_amount: self.total_amount,
            deposit_amount: self.deposit_amount,
            remaining_amount: self.remaining_amount,
            guarantee_amount: self.guarantee_amount,
            release_requested_at: self.release_requested_at,
            guarantee_released_amount: self.guarantee_released_amount,
            guarantee_refunded_amount: self.guarantee_refunded_amount,
        }
    }
}

/// Client-facing summary of a payment record.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    pub payment_id: PaymentId,
    pub quote_id: QuoteId,
    pub state: &'static str,
    pub payment_status: &'static str,
    pub mission_completion_status: &'static str,
    pub guarantee_status: &'static str,
    pub total_amount: i64,
    pub deposit_amount: i64,
    pub remaining_amount: i64,
    pub guarantee_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_requested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guarantee_released_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guarantee_refunded_amount: Option<i64>,
}
