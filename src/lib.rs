//! Thermal recording processing worker
//!
//! Leases newly uploaded thermal recordings from the processing API,
//! extracts their metadata, runs the external classifier, reduces its
//! per-track output to a single tag and reports everything back upstream.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;
