// Library interface for the binary and integration tests

pub mod config;
pub mod constants;
pub mod drafts;
pub mod locations;
pub mod model;
pub mod pages;
pub mod qr;
pub mod queries;
pub mod schema;
pub mod serve;
pub mod service;
pub mod wizard;

pub use config::AppConfig;
pub use service::{DataService, ServiceError};
