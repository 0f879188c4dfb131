pub mod block_codec;
pub mod cache;
pub mod composer;
pub mod engine;
pub mod integration;
pub mod resolver;
pub mod template;

pub use crate::domain::model::{IntegrationRecord, Provider, Rule, RuleCustomizations};
pub use crate::domain::ports::{IntegrationSource, ProviderLookup, RuleGateway};
pub use crate::utils::error::Result;
