use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::domain::{MoveRegion, MoveRequest, VolumeSource};
use super::round_currency;
use super::tables::PricingTables;

const RATE_PER_M2: f64 = 22.0;
const SURFACE_TO_VOLUME: f64 = 1.5;
const DEFAULT_BASE_VOLUME_M3: f64 = 30.0;

const INTERNATIONAL_RATE_PER_KM: f64 = 2.0;
const INTERNATIONAL_ADMIN_SURCHARGE: f64 = 400.0;
const NATIONAL_FLAT_FEE: f64 = 90.0;
const NATIONAL_RATE_PER_KM: f64 = 0.45;
const NATIONAL_THRESHOLD_KM: f64 = 200.0;
const INCLUDED_DISTANCE_KM: f64 = 50.0;
const DOMESTIC_RATE_PER_KM: f64 = 0.60;
const DEPARTMENT_STEP_COST: i64 = 25;

const FLOOR_COST_WITHOUT_ELEVATOR: i64 = 80;
const FURNITURE_LIFT_COST: i64 = 400;

const GROUPAGE_DISCOUNT_RATE: f64 = 0.25;

/// Non-fatal conditions the caller may surface next to an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateWarning {
    /// Neither volume, surface nor a known home size was usable.
    UnresolvableVolume,
    /// No distance and postal codes without a readable department prefix.
    UnknownDistance,
}

/// Market reference price with each rounded component and an audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPriceBreakdown {
    pub region: MoveRegion,
    pub volume_source: VolumeSource,
    pub estimated_volume_m3: f64,
    pub base_price: i64,
    pub distance_cost: i64,
    pub floor_cost: i64,
    pub services_cost: i64,
    pub groupage_discount: i64,
    pub total_market_price: i64,
    pub details: Vec<String>,
    pub warnings: Vec<EstimateWarning>,
}

/// Computes the platform's reference price for a move.
#[derive(Debug, Clone, Default)]
pub struct MarketPriceEstimator {
    tables: PricingTables,
}

impl MarketPriceEstimator {
    pub fn new(tables: PricingTables) -> Self {
        Self { tables }
    }

    pub fn standard() -> Self {
        Self::new(PricingTables::standard())
    }

    pub fn tables(&self) -> &PricingTables {
        &self.tables
    }

    pub fn estimate(&self, request: &MoveRequest) -> MarketPriceBreakdown {
        let mut details = Vec::new();
        let mut warnings = Vec::new();

        let region = self.tables.classify_region(request);
        let rate = region.rate_per_m3();

        let (volume_source, estimated_volume_m3, base) =
            self.base_price(request, rate, &mut details, &mut warnings);
        if region == MoveRegion::International {
            details.push("international rate applied".to_string());
        }
        let base_price = round_currency(base);

        let distance_cost = self.distance_cost(request, region, &mut details, &mut warnings);
        let floor_cost = floor_cost(request, &mut details);
        let services_cost = self.services_cost(request, &mut details);

        // Components saturate on absurd measurements; the sum must not wrap.
        let subtotal = base_price
            .saturating_add(distance_cost)
            .saturating_add(floor_cost)
            .saturating_add(services_cost);
        let groupage_discount = if request.accepts_groupage {
            let discount = round_currency(subtotal as f64 * GROUPAGE_DISCOUNT_RATE);
            details.push(format!("groupage (-25%): -{discount}"));
            discount
        } else {
            0
        };

        MarketPriceBreakdown {
            region,
            volume_source,
            estimated_volume_m3,
            base_price,
            distance_cost,
            floor_cost,
            services_cost,
            groupage_discount,
            total_market_price: subtotal.saturating_sub(groupage_discount),
            details,
            warnings,
        }
    }

    fn base_price(
        &self,
        request: &MoveRequest,
        rate: f64,
        details: &mut Vec<String>,
        warnings: &mut Vec<EstimateWarning>,
    ) -> (VolumeSource, f64, f64) {
        if let Some(volume) = request.declared_volume_m3() {
            let base = volume * rate;
            details.push(format!("volume: {volume}m3 x {rate} = {base:.0}"));
            return (VolumeSource::DeclaredVolume, volume, base);
        }

        if let Some(surface) = request.declared_surface_m2() {
            let base = surface * RATE_PER_M2;
            details.push(format!("surface: {surface}m2 x {RATE_PER_M2} = {base:.0}"));
            return (VolumeSource::Surface, surface * SURFACE_TO_VOLUME, base);
        }

        match self.tables.home_size_volume(&request.home_size) {
            Some(volume) => {
                let base = volume * rate;
                details.push(format!(
                    "home size: {} ({volume}m3 estimated) x {rate} = {base:.0}",
                    request.home_size
                ));
                (VolumeSource::HomeSize, volume, base)
            }
            None => {
                let base = DEFAULT_BASE_VOLUME_M3 * rate;
                details.push(format!(
                    "volume unresolvable, default {DEFAULT_BASE_VOLUME_M3}m3 x {rate} = {base:.0}"
                ));
                warnings.push(EstimateWarning::UnresolvableVolume);
                (VolumeSource::Default, DEFAULT_BASE_VOLUME_M3, base)
            }
        }
    }

    fn distance_cost(
        &self,
        request: &MoveRequest,
        region: MoveRegion,
        details: &mut Vec<String>,
        warnings: &mut Vec<EstimateWarning>,
    ) -> i64 {
        let Some(distance) = request.known_distance_km() else {
            return department_distance_cost(request, details, warnings);
        };

        let cost = if region == MoveRegion::International {
            let cost = distance * INTERNATIONAL_RATE_PER_KM + INTERNATIONAL_ADMIN_SURCHARGE;
            details.push(format!(
                "international distance: {distance}km x {INTERNATIONAL_RATE_PER_KM} + {INTERNATIONAL_ADMIN_SURCHARGE} admin = {cost:.0}"
            ));
            cost
        } else if distance > NATIONAL_THRESHOLD_KM {
            let extra = distance - NATIONAL_THRESHOLD_KM;
            let cost = NATIONAL_FLAT_FEE + extra * NATIONAL_RATE_PER_KM;
            details.push(format!(
                "long distance: {NATIONAL_FLAT_FEE} + {extra:.0}km x {NATIONAL_RATE_PER_KM} = {cost:.0}"
            ));
            cost
        } else if distance > INCLUDED_DISTANCE_KM {
            let extra = distance - INCLUDED_DISTANCE_KM;
            let cost = extra * DOMESTIC_RATE_PER_KM;
            details.push(format!(
                "distance: {extra:.0}km x {DOMESTIC_RATE_PER_KM} = {cost:.0}"
            ));
            cost
        } else {
            details.push(format!("distance: {distance}km (included)"));
            0.0
        };

        round_currency(cost)
    }

    fn services_cost(&self, request: &MoveRequest, details: &mut Vec<String>) -> i64 {
        let mut seen = HashSet::new();
        let mut total: i64 = 0;
        for service in &request.services_needed {
            if !seen.insert(service.trim()) {
                continue;
            }
            match self.tables.service_cost(service) {
                Some(cost) if cost > 0 => {
                    total = total.saturating_add(cost);
                    details.push(format!("service: {service} = {cost}"));
                }
                _ => details.push(format!("service: {service} (not priced)")),
            }
        }
        total
    }
}

fn department_distance_cost(
    request: &MoveRequest,
    details: &mut Vec<String>,
    warnings: &mut Vec<EstimateWarning>,
) -> i64 {
    let from = department_prefix(&request.from_postal_code);
    let to = department_prefix(&request.to_postal_code);

    match (from, to) {
        (Some(from), Some(to)) if from == to => {
            details.push("distance: same department (included)".to_string());
            0
        }
        (Some(from), Some(to)) => {
            let diff = from.abs_diff(to) as i64;
            let cost = diff * DEPARTMENT_STEP_COST;
            details.push(format!(
                "estimated distance: {diff} departments x {DEPARTMENT_STEP_COST} = {cost}"
            ));
            cost
        }
        _ => {
            details.push("distance unknown and postal codes unreadable (not priced)".to_string());
            warnings.push(EstimateWarning::UnknownDistance);
            0
        }
    }
}

/// Leading digits of the two-character department prefix (`"2A"` reads as 2).
fn department_prefix(postal_code: &str) -> Option<u32> {
    let digits: String = postal_code
        .trim()
        .chars()
        .take(2)
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn floor_cost(request: &MoveRequest, details: &mut Vec<String>) -> i64 {
    let sides = [
        (
            "departure",
            request.floor_from,
            request.elevator_from,
            request.furniture_lift_needed_departure,
        ),
        (
            "arrival",
            request.floor_to,
            request.elevator_to,
            request.furniture_lift_needed_arrival,
        ),
    ];

    let mut total = 0;
    for (side, floor, elevator, lift) in sides {
        if floor > 0 && !elevator {
            let cost = i64::from(floor) * FLOOR_COST_WITHOUT_ELEVATOR;
            total += cost;
            details.push(format!(
                "{side} floors: {floor} x {FLOOR_COST_WITHOUT_ELEVATOR} (no elevator) = {cost}"
            ));
        } else if floor > 0 {
            details.push(format!("{side} floors: {floor} (elevator, free)"));
        }

        if lift {
            total += FURNITURE_LIFT_COST;
            details.push(format!("{side} furniture lift: {FURNITURE_LIFT_COST}"));
        }
    }
    total
}
