use serde::{Deserialize, Serialize};

use super::indicator::PricingError;
use super::round_ratio;

const FULL_REFUND_DAYS: i64 = 7;
const PARTIAL_REFUND_DAYS: i64 = 2;

/// Refund owed to a client who cancels an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRefund {
    pub refund_percentage: u8,
    pub refund_amount: i64,
}

/// Seven days or more before the move refunds everything, two to six days
/// refunds half, anything later refunds nothing.
pub fn refund_for_cancellation(
    amount_paid: i64,
    days_before_move: i64,
) -> Result<CancellationRefund, PricingError> {
    if amount_paid < 0 {
        return Err(PricingError::NegativeAmount {
            amount: amount_paid,
        });
    }

    let refund_percentage: u8 = if days_before_move >= FULL_REFUND_DAYS {
        100
    } else if days_before_move >= PARTIAL_REFUND_DAYS {
        50
    } else {
        0
    };

    let refund_amount = round_ratio(
        i128::from(amount_paid) * i128::from(refund_percentage),
        100,
    ) as i64;

    Ok(CancellationRefund {
        refund_percentage,
        refund_amount,
    })
}
