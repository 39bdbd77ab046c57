pub mod audit;
pub mod config;
pub mod engine;
pub mod logging;
pub mod source;
pub mod status;
pub mod store;
pub mod version;
