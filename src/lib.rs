pub mod analytics;
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod period;
pub mod prediction;
pub mod report;
pub mod repository;
pub mod risk;
pub mod score;
pub mod trend;
