pub mod connection;
pub mod context;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod service;

pub use connection::{connect, connect_with_settings, DbPool};
pub use context::{DbEngine, DecisionContext};
pub use fixtures::CampusSeedDataset;
pub use service::{DecisionService, ServiceError};
