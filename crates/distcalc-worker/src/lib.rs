pub mod client;
pub mod config;
pub mod executor;
pub mod worker;

pub use client::{BrokerClient, TaskSource};
pub use config::WorkerConfig;
pub use executor::TaskExecutor;
pub use worker::Worker;
