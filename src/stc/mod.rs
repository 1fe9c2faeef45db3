//! Spirent TestCenter REST automation client
//!
//! The appliance's object model stays opaque; this module only exposes
//! the vendor automation verbs (`get`, `config`, `create`, `perform`,
//! `apply`, sequencer wait, session management) over its REST API.

mod api;
mod client;

#[cfg(test)]
pub mod mock;

pub use api::{StcApi, StcError};
pub use client::StcRestClient;
