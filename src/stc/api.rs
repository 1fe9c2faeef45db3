//! Appliance API boundary
//!
//! Campaign logic is written against [`StcApi`] so it can run against
//! the real REST client or a scripted mock appliance in tests.

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Appliance client errors
#[derive(Debug, Error)]
pub enum StcError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("appliance rejected {operation}: HTTP {status}: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("no active appliance session")]
    NoSession,

    #[error("appliance response is missing field {0}")]
    MissingField(String),

    #[error("sequencer did not complete within {0} seconds")]
    SequencerTimeout(u64),
}

/// The vendor automation verbs.
///
/// Handles are opaque strings; relationship attributes such as
/// `children-port` or `AffiliationPort-Sources` return
/// whitespace-delimited handle lists.
#[allow(async_fn_in_trait)]
pub trait StcApi {
    /// Open or join a named session on the lab server.
    async fn new_session(
        &mut self,
        server: &str,
        session_name: &str,
        user: &str,
    ) -> Result<(), StcError>;

    /// End the current session, optionally terminating the backend
    /// test session.
    async fn end_session(&mut self, terminate: bool) -> Result<(), StcError>;

    /// Read one attribute of an object.
    async fn get(&self, handle: &str, attr: &str) -> Result<String, StcError>;

    /// Read several attributes of an object.
    async fn get_many(
        &self,
        handle: &str,
        attrs: &[&str],
    ) -> Result<BTreeMap<String, String>, StcError>;

    /// Set attributes on an object.
    async fn config(&self, handle: &str, attrs: &[(&str, &str)]) -> Result<(), StcError>;

    /// Create an object under a parent, returning the new handle.
    async fn create(
        &self,
        object_type: &str,
        under: &str,
        attrs: &[(&str, &str)],
    ) -> Result<String, StcError>;

    /// Run an appliance command, returning its result attributes.
    async fn perform(
        &self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<BTreeMap<String, String>, StcError>;

    /// Apply the staged configuration to the hardware.
    async fn apply(&self) -> Result<(), StcError>;

    /// Block until the command sequencer reaches a terminal state.
    async fn wait_until_complete(&self, timeout: Option<Duration>) -> Result<(), StcError>;
}
