pub mod config;
pub mod logging;

pub mod action;
pub mod app;
pub mod checksum;
pub mod control;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod gateway;
pub mod platform;
pub mod platform_policy;
pub mod progress;
pub mod queue;
pub mod render;
pub mod retry;
pub mod session;
pub mod store;
pub mod worker;
