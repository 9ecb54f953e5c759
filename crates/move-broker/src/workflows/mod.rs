pub mod marketplace;
pub mod pricing;
pub mod screening;
