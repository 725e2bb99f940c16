//! Gym analytics desk: roster import, monthly metrics, member risk,
//! strategic briefs and the learning loop behind them.

pub mod brief;
pub mod cohort;
pub mod config;
pub mod csv_parser;
pub mod engine;
pub mod error;
pub mod event;
pub mod field_mapper;
pub mod insights;
pub mod interventions;
pub mod learning;
pub mod member;
pub mod metrics;
pub mod normalize;
pub mod predictive;
pub mod reconciler;
pub mod report;
pub mod risk_engine;
pub mod rng;
pub mod scenario;
pub mod scope_rules;
pub mod scores;
pub mod store;
pub mod sync;
pub mod types;
