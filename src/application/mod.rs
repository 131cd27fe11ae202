pub mod account_cache;
pub mod engine;
pub mod monitor;
pub mod queue;
