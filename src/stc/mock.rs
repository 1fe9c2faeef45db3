//! Scripted mock appliance for campaign tests
//!
//! Answers attribute reads from a scripted table, returns canned
//! command results, and records every call so tests can assert on the
//! exact sequence of appliance operations.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::api::{StcApi, StcError};

/// One recorded appliance call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    NewSession {
        server: String,
        session_name: String,
        user: String,
    },
    EndSession {
        terminate: bool,
    },
    Get {
        handle: String,
        attr: String,
    },
    Config {
        handle: String,
        attrs: Vec<(String, String)>,
    },
    Create {
        object_type: String,
        under: String,
    },
    Perform {
        command: String,
        params: Vec<(String, String)>,
    },
    Apply,
    WaitUntilComplete,
}

#[derive(Default)]
struct MockState {
    attrs: BTreeMap<(String, String), String>,
    perform_results: BTreeMap<String, BTreeMap<String, String>>,
    arp_states: VecDeque<String>,
    fail_on_command: Option<String>,
    calls: Vec<Call>,
}

/// Mock appliance implementing [`StcApi`]
#[derive(Default)]
pub struct MockStc {
    state: Mutex<MockState>,
}

impl MockStc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an attribute value for `get`/`get_many`.
    pub fn with_attr(self, handle: &str, attr: &str, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .attrs
            .insert((handle.to_string(), attr.to_string()), value.to_string());
        self
    }

    /// Script the sequence of `ArpNdState` values reported by
    /// successive `ArpNdStartOnAllDevicesCommand` calls. The last
    /// state repeats once the sequence is exhausted.
    pub fn with_arp_states(self, states: &[&str]) -> Self {
        self.state.lock().unwrap().arp_states = states.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Script the result attributes of a command.
    pub fn with_perform_result(self, command: &str, result: &[(&str, &str)]) -> Self {
        self.state.lock().unwrap().perform_results.insert(
            command.to_string(),
            result
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    /// Make the named command fail with an API error.
    pub fn fail_on(self, command: &str) -> Self {
        self.state.lock().unwrap().fail_on_command = Some(command.to_string());
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Names of performed commands, in order.
    pub fn performed_commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Perform { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    /// How many times a command was performed.
    pub fn perform_count(&self, command: &str) -> usize {
        self.performed_commands()
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    /// How many sessions were opened.
    pub fn session_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::NewSession { .. }))
            .count()
    }

    /// Attribute values pushed by `config` calls onto a handle.
    pub fn configured(&self, handle: &str) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Config { handle: h, attrs } if h == handle => Some(attrs),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl StcApi for MockStc {
    async fn new_session(
        &mut self,
        server: &str,
        session_name: &str,
        user: &str,
    ) -> Result<(), StcError> {
        self.record(Call::NewSession {
            server: server.to_string(),
            session_name: session_name.to_string(),
            user: user.to_string(),
        });
        Ok(())
    }

    async fn end_session(&mut self, terminate: bool) -> Result<(), StcError> {
        self.record(Call::EndSession { terminate });
        Ok(())
    }

    async fn get(&self, handle: &str, attr: &str) -> Result<String, StcError> {
        self.record(Call::Get {
            handle: handle.to_string(),
            attr: attr.to_string(),
        });
        let state = self.state.lock().unwrap();
        Ok(state
            .attrs
            .get(&(handle.to_string(), attr.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_many(
        &self,
        handle: &str,
        attrs: &[&str],
    ) -> Result<BTreeMap<String, String>, StcError> {
        let mut result = BTreeMap::new();
        for attr in attrs {
            result.insert(attr.to_string(), self.get(handle, attr).await?);
        }
        Ok(result)
    }

    async fn config(&self, handle: &str, attrs: &[(&str, &str)]) -> Result<(), StcError> {
        self.record(Call::Config {
            handle: handle.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        Ok(())
    }

    async fn create(
        &self,
        object_type: &str,
        under: &str,
        _attrs: &[(&str, &str)],
    ) -> Result<String, StcError> {
        self.record(Call::Create {
            object_type: object_type.to_string(),
            under: under.to_string(),
        });
        Ok(format!("{object_type}1"))
    }

    async fn perform(
        &self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<BTreeMap<String, String>, StcError> {
        self.record(Call::Perform {
            command: command.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });

        let mut state = self.state.lock().unwrap();

        if state.fail_on_command.as_deref() == Some(command) {
            return Err(StcError::Api {
                operation: command.to_string(),
                status: 500,
                message: "scripted failure".to_string(),
            });
        }

        if command == "ArpNdStartOnAllDevicesCommand" {
            let arp_state = if state.arp_states.len() > 1 {
                state.arp_states.pop_front().unwrap()
            } else {
                state
                    .arp_states
                    .front()
                    .cloned()
                    .unwrap_or_else(|| "SUCCESSFUL".to_string())
            };
            return Ok(BTreeMap::from([("ArpNdState".to_string(), arp_state)]));
        }

        Ok(state.perform_results.get(command).cloned().unwrap_or_default())
    }

    async fn apply(&self) -> Result<(), StcError> {
        self.record(Call::Apply);
        Ok(())
    }

    async fn wait_until_complete(&self, _timeout: Option<Duration>) -> Result<(), StcError> {
        self.record(Call::WaitUntilComplete);
        Ok(())
    }
}
