//! # Capsule Client
//!
//! Async client for the [Capsule CRM v2 REST API](https://developer.capsulecrm.com/v2/).
//!
//! Authenticates with a personal API token (Capsule → My Preferences → API
//! Authentication) sent as a bearer header. Listing endpoints pass Capsule's
//! JSON through untouched; the opportunity page and detail calls used by the
//! allocation calculator are typed, and the client implements
//! [`capsule_core::OpportunitySource`] so it can drive the calculator
//! directly.
//!
//! ## Example
//!
//! ```no_run
//! use capsule_client::{CapsuleClient, CapsuleConfig};
//!
//! # async fn example() -> Result<(), capsule_client::ClientError> {
//! let config = CapsuleConfig::from_env()?;
//! let client = CapsuleClient::new(config)?;
//! let contacts = client.list_parties(1, 50, false, None).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
mod source;

pub use api::NewPerson;
pub use client::CapsuleClient;
pub use config::{CapsuleConfig, ConfigError, DEFAULT_BASE_URL};
pub use error::{ClientError, Result};
