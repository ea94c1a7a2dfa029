pub mod config;
pub mod incident;
pub mod profile;
pub mod report;
pub mod upload;
