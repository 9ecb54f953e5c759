use serde::{Deserialize, Serialize};

use super::round_ratio;

/// How an accepted client price is split between gateway deposit, platform
/// commission, escrowed guarantee and the cash balance paid at delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSplit {
    pub client_display_price: i64,
    pub mover_price: i64,
    pub platform_fee: i64,
    pub deposit_amount: i64,
    pub remaining_amount: i64,
    pub guarantee_amount: i64,
    pub mover_total_payout: i64,
    /// `mover_total_payout - mover_price`; stays within ±1 from independent rounding.
    pub rounding_drift: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscrowError {
    #[error("client display price {0} cannot be negative")]
    InvalidPrice(i64),
    #[error("guarantee would be negative (deposit {deposit_amount}, platform fee {platform_fee}); commission and deposit ratios are misconfigured")]
    NegativeGuarantee {
        deposit_amount: i64,
        platform_fee: i64,
    },
}

/// Split an accepted client price.
///
/// mover price = round(client / 1.3), fee = round(mover × 0.3),
/// deposit = round(client × 0.4), remaining = client − deposit,
/// guarantee = deposit − fee. All rounding is half-up on exact integers.
pub fn split(client_display_price: i64) -> Result<EscrowSplit, EscrowError> {
    if client_display_price < 0 {
        return Err(EscrowError::InvalidPrice(client_display_price));
    }

    let client = i128::from(client_display_price);
    let mover_price = round_ratio(client * 10, 13);
    let platform_fee = round_ratio(mover_price * 3, 10);
    let deposit_amount = round_ratio(client * 4, 10);
    let remaining_amount = client - deposit_amount;
    let guarantee_amount = deposit_amount - platform_fee;

    // Every intermediate is bounded by the input, so narrowing back cannot truncate.
    let narrow = |value: i128| value as i64;

    if guarantee_amount < 0 {
        return Err(EscrowError::NegativeGuarantee {
            deposit_amount: narrow(deposit_amount),
            platform_fee: narrow(platform_fee),
        });
    }

    let mover_total_payout = remaining_amount + guarantee_amount;

    Ok(EscrowSplit {
        client_display_price,
        mover_price: narrow(mover_price),
        platform_fee: narrow(platform_fee),
        deposit_amount: narrow(deposit_amount),
        remaining_amount: narrow(remaining_amount),
        guarantee_amount: narrow(guarantee_amount),
        mover_total_payout: narrow(mover_total_payout),
        rounding_drift: narrow(mover_total_payout - mover_price),
    })
}
