use super::domain::{MoveRegion, MoveRequest};

/// Country assumed when no indicator matches a place.
const HOME_COUNTRY: &str = "FR";

const INTERNATIONAL_DISTANCE_KM: f64 = 500.0;
const NATIONAL_DISTANCE_KM: f64 = 200.0;

const STANDARD_COUNTRY_INDICATORS: &[(&str, &[&str])] = &[
    (
        "BE",
        &[
            "bruxelles", "brussels", "liège", "anvers", "gand", "namur", "mons", "charleroi",
            "woluwe", "ixelles", "schaerbeek", "anderlecht", "uccle", "etterbeek", "molenbeek",
            "forest", "jette", "auderghem", "evere", "oostende", "bruges", "leuven", "mechelen",
            "kortrijk", "aalst", "hasselt", "genk", "turnhout",
        ],
    ),
    (
        "CH",
        &[
            "zurich", "zürich", "bern", "berne", "basel", "bâle", "genève", "geneva", "lausanne",
            "lucerne", "luzern", "winterthur", "lugano", "fribourg", "neuchâtel", "sion",
            "yverdon", "thun",
        ],
    ),
    (
        "DE",
        &[
            "berlin", "münchen", "munich", "hamburg", "köln", "cologne", "frankfurt", "stuttgart",
            "düsseldorf", "dortmund", "essen", "bremen", "dresden", "leipzig", "hannover",
            "nürnberg", "bonn", "aachen", "mannheim", "karlsruhe",
        ],
    ),
    (
        "LU",
        &["luxembourg", "esch-sur-alzette", "differdange", "dudelange"],
    ),
    (
        "NL",
        &[
            "amsterdam", "rotterdam", "den haag", "utrecht", "eindhoven", "groningen",
            "maastricht", "breda", "arnhem",
        ],
    ),
];

const STANDARD_HOME_SIZE_VOLUMES: &[(&str, f64)] = &[
    ("studio", 15.0),
    ("t1", 20.0),
    ("t2", 30.0),
    ("t3", 45.0),
    ("t4", 60.0),
    ("t5", 75.0),
    ("maison", 90.0),
];

const STANDARD_SERVICE_COSTS: &[(&str, i64)] = &[
    ("packing", 250),
    ("furniture_disassembly", 300),
    ("furniture_assembly", 300),
    ("storage", 150),
    ("piano", 350),
    ("fragile_items", 120),
    ("cleaning", 180),
    ("box_supply", 80),
    ("Emballage/Déballage", 250),
    ("Démontage/Remontage meubles", 300),
    ("Fourniture de cartons", 80),
    ("Garde-meubles", 150),
    ("Transport d'objets fragiles", 120),
    ("Nettoyage après déménagement", 180),
];

/// Substrings that place a city (or postal code) in a given country.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryIndicators {
    pub country: String,
    pub indicators: Vec<String>,
}

/// Reference data consumed by the market price estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTables {
    home_country: String,
    countries: Vec<CountryIndicators>,
    home_size_volumes: Vec<(String, f64)>,
    service_costs: Vec<(String, i64)>,
}

impl PricingTables {
    pub fn standard() -> Self {
        Self {
            home_country: HOME_COUNTRY.to_string(),
            countries: STANDARD_COUNTRY_INDICATORS
                .iter()
                .map(|(country, indicators)| CountryIndicators {
                    country: country.to_string(),
                    indicators: indicators.iter().map(|i| i.to_string()).collect(),
                })
                .collect(),
            home_size_volumes: STANDARD_HOME_SIZE_VOLUMES
                .iter()
                .map(|(label, volume)| (label.to_string(), *volume))
                .collect(),
            service_costs: STANDARD_SERVICE_COSTS
                .iter()
                .map(|(tag, cost)| (tag.to_string(), *cost))
                .collect(),
        }
    }

    /// Register an extra place indicator, creating the country entry when needed.
    pub fn with_country_indicator(mut self, country: &str, indicator: &str) -> Self {
        let indicator = indicator.to_lowercase();
        match self.countries.iter_mut().find(|c| c.country == country) {
            Some(entry) => entry.indicators.push(indicator),
            None => self.countries.push(CountryIndicators {
                country: country.to_string(),
                indicators: vec![indicator],
            }),
        }
        self
    }

    pub fn with_service_cost(mut self, tag: &str, cost: i64) -> Self {
        self.service_costs.retain(|(existing, _)| existing != tag);
        self.service_costs.push((tag.to_string(), cost));
        self
    }

    pub fn countries(&self) -> &[CountryIndicators] {
        &self.countries
    }

    /// Country of a free-form place. The last matching indicator wins.
    pub fn country_of(&self, place: &str) -> &str {
        let place = place.to_lowercase();
        let mut country = self.home_country.as_str();
        for entry in &self.countries {
            for indicator in &entry.indicators {
                if place.contains(indicator.as_str()) {
                    country = entry.country.as_str();
                }
            }
        }
        country
    }

    pub fn classify_region(&self, request: &MoveRequest) -> MoveRegion {
        let distance = request.known_distance_km().unwrap_or(0.0);
        let from = self.country_of(request.origin_place());
        let to = self.country_of(request.destination_place());

        if from != to || distance > INTERNATIONAL_DISTANCE_KM {
            MoveRegion::International
        } else if distance > NATIONAL_DISTANCE_KM {
            MoveRegion::National
        } else {
            MoveRegion::Domestic
        }
    }

    pub fn home_size_volume(&self, home_size: &str) -> Option<f64> {
        let key = home_size.trim().to_lowercase();
        self.home_size_volumes
            .iter()
            .find(|(label, _)| *label == key)
            .map(|(_, volume)| *volume)
    }

    pub fn service_cost(&self, tag: &str) -> Option<i64> {
        let tag = tag.trim();
        self.service_costs
            .iter()
            .find(|(known, _)| known == tag)
            .map(|(_, cost)| *cost)
    }
}

impl Default for PricingTables {
    fn default() -> Self {
        Self::standard()
    }
}
