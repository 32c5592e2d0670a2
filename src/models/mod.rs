pub mod branch;
pub mod config;
pub mod price;
pub mod schedule;
