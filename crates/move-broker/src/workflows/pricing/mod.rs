//! Reference pricing, bid classification, escrow split and cancellation refunds.
//!
//! Every function in this module is pure: identical inputs always produce identical
//! outputs, so the engines are safe to share across threads without locking.

pub mod domain;
pub mod escrow;
pub mod estimator;
pub mod indicator;
pub mod refund;
pub mod tables;

pub use domain::{MoveRegion, MoveRequest, VolumeSource};
pub use escrow::{split, EscrowError, EscrowSplit};
pub use estimator::{EstimateWarning, MarketPriceBreakdown, MarketPriceEstimator};
pub use indicator::{
    assess_bid, classify, client_display_price, indicator_message, BidAssessment,
    PriceIndicator, PricingError,
};
pub use refund::{refund_for_cancellation, CancellationRefund};
pub use tables::{CountryIndicators, PricingTables};

/// Round to the nearest currency unit, halves going up.
pub(crate) fn round_currency(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    (value + 0.5).floor() as i64
}

/// Exact `round(numerator / denominator)` for non-negative numerators, halves going up.
pub(crate) fn round_ratio(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    (2 * numerator + denominator).div_euclid(2 * denominator)
}
