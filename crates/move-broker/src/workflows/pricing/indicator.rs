use serde::{Deserialize, Serialize};

use super::domain::MoveRequest;
use super::estimator::{MarketPriceBreakdown, MarketPriceEstimator};
use super::round_currency;

/// Platform markup applied to a mover's bid to obtain the client-facing price.
pub const CLIENT_MARKUP: f64 = 1.3;

const SUSPICIOUS_FLOOR_RATIO: f64 = 0.5;
const GREEN_BAND_PERCENT: f64 = 10.0;
const ORANGE_BAND_PERCENT: f64 = 25.0;

/// Trust signal shown next to a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceIndicator {
    Green,
    Orange,
    Red,
}

impl PriceIndicator {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Red => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("proposed price {price} must be a positive, finite amount")]
    InvalidPrice { price: f64 },
    #[error("amount {amount} cannot be negative")]
    NegativeAmount { amount: i64 },
}

/// Compare a bid with the market reference.
///
/// Edges are user visible: exactly ±10% is green, exactly ±25% is orange.
pub fn classify(proposed_price: f64, market_price: i64) -> PriceIndicator {
    let market = market_price as f64;

    if !proposed_price.is_finite()
        || proposed_price <= 0.0
        || proposed_price < market * SUSPICIOUS_FLOOR_RATIO
    {
        return PriceIndicator::Red;
    }
    if market_price <= 0 {
        return PriceIndicator::Red;
    }

    // Compare scaled deltas instead of a divided percentage so integer inputs land
    // exactly on the band edges.
    let scaled_delta = ((proposed_price - market) * 100.0).abs();
    if scaled_delta <= GREEN_BAND_PERCENT * market {
        PriceIndicator::Green
    } else if scaled_delta <= ORANGE_BAND_PERCENT * market {
        PriceIndicator::Orange
    } else {
        PriceIndicator::Red
    }
}

/// Signed percentage gap between a bid and the market reference.
pub fn market_difference_percent(proposed_price: f64, market_price: i64) -> f64 {
    if market_price <= 0 {
        return 0.0;
    }
    let market = market_price as f64;
    (proposed_price - market) / market * 100.0
}

/// Explanation displayed with the indicator badge.
pub fn indicator_message(indicator: PriceIndicator, proposed_price: f64, market_price: i64) -> String {
    let difference = market_difference_percent(proposed_price, market_price);
    let diff_text = if difference > 0.0 {
        format!("+{difference:.0}%")
    } else {
        format!("{difference:.0}%")
    };

    match indicator {
        PriceIndicator::Green => format!("Excellent prix ({diff_text} par rapport au marché)"),
        PriceIndicator::Orange => {
            format!("Prix correct mais légèrement élevé ({diff_text} par rapport au marché)")
        }
        PriceIndicator::Red if proposed_price < market_price as f64 * SUSPICIOUS_FLOOR_RATIO => {
            format!("Prix anormalement bas et suspect ({diff_text} par rapport au marché)")
        }
        PriceIndicator::Red => format!("Prix trop éloigné du marché ({diff_text})"),
    }
}

/// Client-facing price for a mover's bid.
pub fn client_display_price(proposed_price: f64) -> i64 {
    round_currency(proposed_price * CLIENT_MARKUP)
}

/// Everything computed at bid time for a proposed price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidAssessment {
    pub proposed_price: f64,
    pub market_price_estimate: i64,
    pub price_indicator: PriceIndicator,
    pub client_display_price: i64,
    pub message: String,
    pub breakdown: MarketPriceBreakdown,
}

pub fn assess_bid(
    estimator: &MarketPriceEstimator,
    request: &MoveRequest,
    proposed_price: f64,
) -> Result<BidAssessment, PricingError> {
    if !proposed_price.is_finite() || proposed_price <= 0.0 {
        return Err(PricingError::InvalidPrice {
            price: proposed_price,
        });
    }

    let breakdown = estimator.estimate(request);
    let market_price = breakdown.total_market_price;
    let price_indicator = classify(proposed_price, market_price);

    Ok(BidAssessment {
        proposed_price,
        market_price_estimate: market_price,
        price_indicator,
        client_display_price: client_display_price(proposed_price),
        message: indicator_message(price_indicator, proposed_price, market_price),
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_bids_against_1348() {
        assert_eq!(classify(1350.0, 1348), PriceIndicator::Green);
        assert_eq!(classify(1550.0, 1348), PriceIndicator::Orange);
        assert_eq!(classify(2500.0, 1348), PriceIndicator::Red);
        assert_eq!(classify(600.0, 1348), PriceIndicator::Red);
    }

    #[test]
    fn band_edges_are_inclusive() {
        assert_eq!(classify(110.0, 100), PriceIndicator::Green);
        assert_eq!(classify(90.0, 100), PriceIndicator::Green);
        assert_eq!(classify(110.5, 100), PriceIndicator::Orange);
        assert_eq!(classify(125.0, 100), PriceIndicator::Orange);
        assert_eq!(classify(75.0, 100), PriceIndicator::Orange);
        assert_eq!(classify(125.5, 100), PriceIndicator::Red);
        assert_eq!(classify(74.5, 100), PriceIndicator::Red);
    }

    #[test]
    fn invalid_bids_are_red() {
        assert_eq!(classify(0.0, 1000), PriceIndicator::Red);
        assert_eq!(classify(-10.0, 1000), PriceIndicator::Red);
        assert_eq!(classify(f64::NAN, 1000), PriceIndicator::Red);
        assert_eq!(classify(100.0, 0), PriceIndicator::Red);
    }

    #[test]
    fn messages_explain_direction() {
        let low = indicator_message(PriceIndicator::Red, 600.0, 1348);
        assert!(low.starts_with("Prix anormalement bas"));
        assert!(low.contains("-55%"));

        let high = indicator_message(PriceIndicator::Red, 2500.0, 1348);
        assert!(high.starts_with("Prix trop éloigné"));
        assert!(high.contains("+85%"));
    }

    #[test]
    fn client_price_marks_up_by_thirty_percent() {
        assert_eq!(client_display_price(1350.0), 1755);
        assert_eq!(client_display_price(999.0), 1299);
    }

    #[test]
    fn assess_bid_rejects_non_positive_prices() {
        let estimator = MarketPriceEstimator::standard();
        let err = assess_bid(&estimator, &MoveRequest::default(), 0.0)
            .expect_err("zero price rejected");
        assert_eq!(err, PricingError::InvalidPrice { price: 0.0 });
        assert!(assess_bid(&estimator, &MoveRequest::default(), f64::INFINITY).is_err());
    }
}
