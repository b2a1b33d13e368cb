//! Synchronizes OpenYurt Device and DeviceProfile objects with an EdgeX
//! Foundry edge platform.

pub mod api;
pub mod config;
pub mod controller;
pub mod edgex;
pub mod predicate;
pub mod reconciler;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod watch;
