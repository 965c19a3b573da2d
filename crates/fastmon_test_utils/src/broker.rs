//! Broker fake: scripted inbound frames, recorded outbound messages.

use async_trait::async_trait;
use fastmon_agent::{Broker, BrokerError};
use fastmon_protocol::{AgentMessage, Envelope};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct State {
    inbound: VecDeque<Vec<Vec<u8>>>,
    sent: Vec<(String, AgentMessage)>,
    fail_sends: bool,
    keep_open: bool,
    sequence: u64,
}

/// Clones share state.
///
/// Once the inbound queue is drained `recv` reports the connection closed,
/// unless [`keep_open`](RecordingBroker::keep_open) was set, in which case it
/// keeps timing out.
#[derive(Clone, Default)]
pub struct RecordingBroker {
    state: Arc<Mutex<State>>,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn keep_open(self) -> Self {
        self.lock().keep_open = true;
        self
    }

    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Queue a JSON payload as a well-formed envelope.
    pub fn push_json(&self, payload: &Value) {
        let bytes = serde_json::to_vec(payload).unwrap_or_default();
        self.push_payload(bytes);
    }

    /// Queue raw payload bytes inside a well-formed envelope.
    pub fn push_payload(&self, payload: Vec<u8>) {
        let mut state = self.lock();
        state.sequence += 1;
        let frames = Envelope::new("epictopic", state.sequence, payload)
            .and_then(|envelope| envelope.pack())
            .unwrap_or_default();
        state.inbound.push_back(frames);
    }

    /// Queue arbitrary frames, e.g. a malformed envelope.
    pub fn push_frames(&self, frames: Vec<Vec<u8>>) {
        self.lock().inbound.push_back(frames);
    }

    pub fn sent(&self) -> Vec<(String, AgentMessage)> {
        self.lock().sent.clone()
    }

    pub fn sent_of_type(&self, msg_type: &str) -> Vec<AgentMessage> {
        self.lock()
            .sent
            .iter()
            .filter(|(_, m)| m.msg_type() == msg_type)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn send(&mut self, destination: &str, message: &AgentMessage) -> Result<(), BrokerError> {
        let mut state = self.lock();
        if state.fail_sends {
            return Err(BrokerError::Transport("send disabled".to_string()));
        }
        state.sent.push((destination.to_string(), message.clone()));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Envelope>, BrokerError> {
        let (next, keep_open) = {
            let mut state = self.lock();
            (state.inbound.pop_front(), state.keep_open)
        };

        match next {
            Some(frames) => Ok(Some(Envelope::unpack(&frames)?)),
            None if keep_open => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(None)
            }
            None => Err(BrokerError::Closed),
        }
    }
}
