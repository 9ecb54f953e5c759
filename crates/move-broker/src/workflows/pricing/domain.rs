use serde::{Deserialize, Serialize};

/// Physical attributes of a move as captured on the client's quote request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveRequest {
    pub volume_m3: Option<f64>,
    pub surface_m2: Option<f64>,
    /// Dwelling label (`studio`, `t1` .. `t5`, `maison`) used when no measurement exists.
    pub home_size: String,
    pub floor_from: u32,
    pub floor_to: u32,
    pub elevator_from: bool,
    pub elevator_to: bool,
    pub furniture_lift_needed_departure: bool,
    pub furniture_lift_needed_arrival: bool,
    pub services_needed: Vec<String>,
    pub distance_km: Option<f64>,
    pub from_city: Option<String>,
    pub to_city: Option<String>,
    pub from_postal_code: String,
    pub to_postal_code: String,
    pub accepts_groupage: bool,
}

impl MoveRequest {
    /// Distance usable for pricing; zero, negative or non-finite values count as unknown.
    pub fn known_distance_km(&self) -> Option<f64> {
        positive(self.distance_km)
    }

    pub fn declared_volume_m3(&self) -> Option<f64> {
        positive(self.volume_m3)
    }

    pub fn declared_surface_m2(&self) -> Option<f64> {
        positive(self.surface_m2)
    }

    /// City when present, postal code otherwise.
    pub fn origin_place(&self) -> &str {
        place(self.from_city.as_deref(), &self.from_postal_code)
    }

    pub fn destination_place(&self) -> &str {
        place(self.to_city.as_deref(), &self.to_postal_code)
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn place<'a>(city: Option<&'a str>, postal_code: &'a str) -> &'a str {
    match city {
        Some(city) if !city.trim().is_empty() => city,
        _ => postal_code,
    }
}

/// Pricing band of a move, chosen from country detection and distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveRegion {
    Domestic,
    National,
    International,
}

impl MoveRegion {
    pub const fn rate_per_m3(self) -> f64 {
        match self {
            Self::Domestic => 50.0,
            Self::National => 65.0,
            Self::International => 100.0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Domestic => "domestic",
            Self::National => "national long-distance",
            Self::International => "international",
        }
    }
}

/// Which input produced the base volume of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSource {
    DeclaredVolume,
    Surface,
    HomeSize,
    Default,
}
