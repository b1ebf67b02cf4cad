//! Operator commands

pub mod prices;
pub mod setup;
pub mod stats;
pub mod ui;
