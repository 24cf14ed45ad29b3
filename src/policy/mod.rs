//! Policy state and the navigation decision engine.

pub mod config;
pub mod engine;
pub mod overrides;
pub mod rules;
pub mod schedule;
