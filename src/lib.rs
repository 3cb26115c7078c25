#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

//! ## Architecture
//!
//! - **[`client`]** - Session, request dispatcher, transport and body encoding
//! - **[`error`]** - Error taxonomy and OISP error codes
//! - **[`token`]** / **[`auth`]** - User token metadata and JWT expiry checks
//! - **[`account`]**, **[`device`]**, **[`component`]**, **[`user`]** - Domain objects
//! - **[`sample`]** / **[`data_query`]** - Telemetry submission and search
//! - **[`config`]** - Client settings and the CLI config file
//! - **[`logging`]** - Tracing subscriber setup
//! - **[`cli`]** - Argument parsing for the `oisp` binary

pub mod account;
pub mod auth;
pub mod cli;
pub mod client;
pub mod component;
pub mod config;
pub mod data_query;
pub mod device;
pub mod error;
pub mod logging;
pub mod sample;
pub mod token;
pub mod user;

/// Error type alias for convenience
pub use error::{OispError, Result};

/// Session and request types
pub use client::{Authorization, Body, Client, Response, ServerInfo, Transport};

/// Configuration types
pub use config::{ClientConfig, Config};

pub use account::{Account, DeviceFilter, Role};
pub use component::{Component, ComponentType, ComponentTypeUpdate, NewComponentType};
pub use data_query::{DataQuery, QueryResponse, Sample};
pub use device::{Device, DeviceProperties, NewDevice};
pub use sample::{Datapoint, SampleValue};
pub use token::UserToken;
pub use user::User;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = "oisp";
