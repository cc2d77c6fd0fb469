pub mod backends;
pub mod config_loader;
pub mod cursor;
pub mod dialog;
pub mod engine;
pub mod rate_limiter;
pub mod readers;
pub mod registry;
