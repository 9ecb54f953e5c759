//! Pricing, escrow and mission engines for a moving-quote marketplace.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
