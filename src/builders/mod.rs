//! Builders to construct executors from configuration.

pub mod executor_builder;

pub use executor_builder::{build_executor, build_intent_executor, build_intent_executor_from_env};
