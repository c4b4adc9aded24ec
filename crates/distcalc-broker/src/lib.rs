pub mod broker;
pub mod queue;
pub mod expressions;
pub mod config;
pub mod api;
pub mod metrics;

pub use broker::Broker;
pub use config::BrokerConfig;
