pub mod report;
pub mod risk;
pub mod stats;
