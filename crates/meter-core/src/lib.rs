//! Core types for the metering reverse proxy.
//!
//! This crate defines the data model shared between the balance cache, the
//! SSE usage extractor, and the usage reporter: pricing, token-usage
//! counters, and the usage report posted back to the billing service.

pub mod balance;
pub mod pricing;
pub mod principal;
pub mod usage;

pub use balance::BalanceSnapshot;
pub use pricing::{ModelPricing, PricingTable};
pub use principal::Principal;
pub use usage::{UsageReport, UsageTokens};
