pub mod pricing;
pub mod schedule;
