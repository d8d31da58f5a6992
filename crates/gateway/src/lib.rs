//! Gateway RPC facade for the crontab scheduler.
//!
//! The transport is external; this crate owns the method registry, parameter
//! validation, and the mapping of core errors onto the RPC error taxonomy.

pub mod cron;
pub mod methods;
pub mod scheduler;
pub mod services;
pub mod state;

pub use {
    methods::{MethodRegistry, MethodResult},
    state::{GatewayState, Services},
};
