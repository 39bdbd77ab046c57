//! Shared integration test utilities

#![allow(dead_code)]

pub mod pages;
pub mod setup;

pub use pages::{kaspersky_page, securitycode_page, usergate_page};
pub use setup::{config_for, create_test_store, source_path};
