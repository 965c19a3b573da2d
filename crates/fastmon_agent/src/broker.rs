//! Broker transport
//!
//! Outbound messages go out on a PUB socket; `stf_ready` arrives on a SUB
//! socket filtered by topic. Both carry [`Envelope`] frames.

use crate::config::BrokerConfig;
use async_trait::async_trait;
use fastmon_protocol::error::ProtocolError;
use fastmon_protocol::{AgentMessage, Envelope};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use zeromq::{PubSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("ZMQ error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("Malformed envelope: {0}")]
    Protocol(#[from] ProtocolError),

    /// The inbound stream has ended; no further messages will arrive
    #[error("Broker connection closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Message transport used by the agent.
#[async_trait]
pub trait Broker: Send {
    async fn send(&mut self, destination: &str, message: &AgentMessage) -> Result<(), BrokerError>;

    /// Next inbound envelope, or `None` when the receive wait timed out.
    async fn recv(&mut self) -> Result<Option<Envelope>, BrokerError>;
}

/// ZeroMQ PUB/SUB broker connection.
pub struct ZmqBroker {
    publisher: PubSocket,
    subscriber: SubSocket,
    recv_timeout: Duration,
    sequence: u64,
}

impl ZmqBroker {
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let mut publisher = PubSocket::new();
        publisher.connect(&config.publish_addr).await?;
        info!("Publishing to {}", config.publish_addr);

        let mut subscriber = SubSocket::new();
        subscriber.connect(&config.subscribe_addr).await?;
        subscriber.subscribe(&config.subscription).await?;
        info!(
            "Subscribed to '{}' on {}",
            config.subscription, config.subscribe_addr
        );

        Ok(Self {
            publisher,
            subscriber,
            recv_timeout: Duration::from_millis(config.recv_timeout_ms.max(1)),
            sequence: 0,
        })
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }
}

#[async_trait]
impl Broker for ZmqBroker {
    async fn send(&mut self, destination: &str, message: &AgentMessage) -> Result<(), BrokerError> {
        let sequence = self.next_sequence();
        let envelope = Envelope::from_json(destination, sequence, message)?;
        let mut frames = envelope.pack()?.into_iter();

        let first = frames
            .next()
            .ok_or_else(|| BrokerError::Transport("empty envelope".to_string()))?;
        let mut multipart = ZmqMessage::from(first);
        for frame in frames {
            multipart.push_back(frame.into());
        }

        self.publisher.send(multipart).await?;
        debug!("Sent {} #{} to {}", message.msg_type(), sequence, destination);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Envelope>, BrokerError> {
        match tokio::time::timeout(self.recv_timeout, self.subscriber.recv()).await {
            Ok(Ok(multipart)) => {
                let parts: Vec<Vec<u8>> = multipart
                    .into_vec()
                    .into_iter()
                    .map(|b| b.to_vec())
                    .collect();
                Ok(Some(Envelope::unpack(&parts)?))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }
}
