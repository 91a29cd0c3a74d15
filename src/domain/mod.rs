//! Core domain types and logic.

pub mod bar;
pub mod config_validation;
pub mod decision_loop;
pub mod error;
pub mod execution;
pub mod exit_rules;
pub mod feature;
pub mod position;
pub mod strategy;
pub mod timeframe;
pub mod window;
