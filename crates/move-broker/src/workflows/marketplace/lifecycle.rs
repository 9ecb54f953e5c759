//! Mission and guarantee state machine.
//!
//! Functions here never touch storage or collaborators. Each one checks the current
//! state of a payment record and, when the move is allowed, returns the updated record
//! with the side effects the caller must hand to the gateway and notification sink.
//! Persisting the result is the caller's job and must be a conditional write keyed on
//! [`Transition::from`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{GuaranteeStatus, MissionCompletionStatus, PaymentRecord, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionState {
    AwaitingPayment,
    InProgress,
    CompletedPendingReview,
    Approved,
    Rejected,
}

impl MissionState {
    /// Joint reading of payment and mission status.
    pub fn of(record: &PaymentRecord) -> Self {
        if record.payment_status != PaymentStatus::Completed {
            return Self::AwaitingPayment;
        }
        match record.mission_completion_status {
            MissionCompletionStatus::InProgress => Self::InProgress,
            MissionCompletionStatus::CompletedPendingReview => Self::CompletedPendingReview,
            MissionCompletionStatus::Approved => Self::Approved,
            MissionCompletionStatus::Rejected => Self::Rejected,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::AwaitingPayment => "awaiting_payment",
            Self::InProgress => "in_progress",
            Self::CompletedPendingReview => "completed_pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionAction {
    ConfirmDeposit,
    MarkComplete,
    Arbitrate,
}

impl MissionAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ConfirmDeposit => "confirm_deposit",
            Self::MarkComplete => "mark_complete",
            Self::Arbitrate => "arbitrate",
        }
    }

    /// The only state from which the action is allowed.
    pub const fn required_state(self) -> MissionState {
        match self {
            Self::ConfirmDeposit => MissionState::AwaitingPayment,
            Self::MarkComplete => MissionState::InProgress,
            Self::Arbitrate => MissionState::CompletedPendingReview,
        }
    }
}

/// Result reported by the payment gateway for a deposit charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChargeOutcome {
    Succeeded { transaction_id: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationVerdict {
    /// No claim, or a claim settled in the mover's favour.
    Approve,
    /// Claim upheld.
    Reject,
}

/// Admin decision on a held guarantee.
///
/// `released_amount` goes to the mover and the rest of the guarantee is refunded to
/// the client. When omitted, approval releases everything and rejection releases
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationDecision {
    pub verdict: ArbitrationVerdict,
    #[serde(default)]
    pub released_amount: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Work handed to external collaborators once a transition has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SideEffect {
    DepositConfirmed { amount: i64, transaction_id: String },
    DepositFailed { amount: i64, reason: String },
    /// Tell the client the damage-claim window is open.
    ReviewWindowOpened { deadline: DateTime<Utc> },
    ReleaseToMover { amount: i64 },
    RefundToClient { amount: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: MissionState,
    pub to: MissionState,
    pub record: PaymentRecord,
    pub effects: Vec<SideEffect>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {} while the mission is {}", action.label(), from.label())]
    InvalidTransition {
        from: MissionState,
        action: MissionAction,
    },
    #[error("mission is already {} and can no longer change", state.label())]
    Terminal { state: MissionState },
    #[error("released amount {requested} must be between 0 and the guarantee of {guarantee}")]
    ReleaseOutOfRange { requested: i64, guarantee: i64 },
}

/// Check that `action` may run on the record right now, returning the current state.
pub fn guard(record: &PaymentRecord, action: MissionAction) -> Result<MissionState, LifecycleError> {
    let current = MissionState::of(record);
    if current.is_terminal() {
        return Err(LifecycleError::Terminal { state: current });
    }
    if current != action.required_state() {
        return Err(LifecycleError::InvalidTransition {
            from: current,
            action,
        });
    }
    Ok(current)
}

/// Apply the gateway's answer to a deposit charge.
///
/// A failed charge keeps the record awaiting payment so another attempt can follow.
pub fn confirm_deposit(
    record: &PaymentRecord,
    outcome: ChargeOutcome,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    let from = guard(record, MissionAction::ConfirmDeposit)?;
    let mut next = record.clone();

    let effect = match outcome {
        ChargeOutcome::Succeeded { transaction_id } => {
            next.payment_status = PaymentStatus::Completed;
            next.mission_completion_status = MissionCompletionStatus::InProgress;
            next.guarantee_status = GuaranteeStatus::Held;
            next.gateway_transaction_id = Some(transaction_id.clone());
            next.failure_reason = None;
            next.paid_at = Some(now);
            SideEffect::DepositConfirmed {
                amount: next.deposit_amount,
                transaction_id,
            }
        }
        ChargeOutcome::Failed { reason } => {
            next.payment_status = PaymentStatus::Failed;
            next.failure_reason = Some(reason.clone());
            SideEffect::DepositFailed {
                amount: next.deposit_amount,
                reason,
            }
        }
    };

    Ok(Transition {
        from,
        to: MissionState::of(&next),
        record: next,
        effects: vec![effect],
    })
}

/// Mover declares the move done, which opens the client's review window.
pub fn mark_complete(
    record: &PaymentRecord,
    now: DateTime<Utc>,
    review_window: Duration,
) -> Result<Transition, LifecycleError> {
    let from = guard(record, MissionAction::MarkComplete)?;
    let mut next = record.clone();
    next.mission_completion_status = MissionCompletionStatus::CompletedPendingReview;
    next.release_requested_at = Some(now);

    Ok(Transition {
        from,
        to: MissionState::CompletedPendingReview,
        record: next,
        effects: vec![SideEffect::ReviewWindowOpened {
            deadline: now + review_window,
        }],
    })
}

/// Record the arbitration outcome and split the guarantee between mover and client.
pub fn arbitrate(
    record: &PaymentRecord,
    decision: &ArbitrationDecision,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    let from = guard(record, MissionAction::Arbitrate)?;

    let guarantee = record.guarantee_amount;
    let released = decision.released_amount.unwrap_or(match decision.verdict {
        ArbitrationVerdict::Approve => guarantee,
        ArbitrationVerdict::Reject => 0,
    });
    if !(0..=guarantee).contains(&released) {
        return Err(LifecycleError::ReleaseOutOfRange {
            requested: released,
            guarantee,
        });
    }
    let refunded = guarantee - released;

    let mut next = record.clone();
    let to = match decision.verdict {
        ArbitrationVerdict::Approve => {
            next.mission_completion_status = MissionCompletionStatus::Approved;
            next.guarantee_status = GuaranteeStatus::ReleasedToMover;
            MissionState::Approved
        }
        ArbitrationVerdict::Reject => {
            next.mission_completion_status = MissionCompletionStatus::Rejected;
            next.guarantee_status = GuaranteeStatus::Refunded;
            MissionState::Rejected
        }
    };
    next.guarantee_decision_at = Some(now);
    next.guarantee_released_amount = Some(released);
    next.guarantee_refunded_amount = Some(refunded);
    next.guarantee_notes = decision.notes.clone();

    let mut effects = Vec::new();
    if released > 0 {
        effects.push(SideEffect::ReleaseToMover { amount: released });
    }
    if refunded > 0 {
        effects.push(SideEffect::RefundToClient { amount: refunded });
    }

    Ok(Transition {
        from,
        to,
        record: next,
        effects,
    })
}
