// lib.rs
pub mod codec;
pub mod config;
pub mod logging;
pub mod processor;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod stats;
pub mod token;
pub mod view;
