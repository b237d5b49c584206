//!
//! src/lib.rs
//!
//! Client library for the music subscription API: typed configuration,
//! the HTTP client, the home page and query section components and the
//! interactive session that drives them
//!
//!

pub mod config;
pub mod errors;
pub mod logging;

pub mod fetch;
pub mod home;
pub mod query;
pub mod session;
pub mod types;
pub mod view;

pub use crate::errors::ClientError;
