pub mod config;
pub mod report;
pub mod suites;
pub mod types;
