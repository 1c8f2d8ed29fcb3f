//! Channel-backed transport

use helmet_protocol::{Channel, Transport, TransportError};
use tokio::sync::mpsc::{self, error::TrySendError};

/// [`Transport`] that forwards frames into a bounded tokio channel.
///
/// Never waits: a full channel is backpressure, a closed one means the
/// peer went away.
pub struct ChannelTransport<M> {
    tx: mpsc::Sender<M>,
    wrap: fn(Channel, Vec<u8>) -> M,
}

impl<M> ChannelTransport<M> {
    pub fn new(tx: mpsc::Sender<M>, wrap: fn(Channel, Vec<u8>) -> M) -> Self {
        Self { tx, wrap }
    }
}

impl<M> Transport for ChannelTransport<M> {
    fn send(&mut self, channel: Channel, payload: &[u8]) -> Result<(), TransportError> {
        self.tx
            .try_send((self.wrap)(channel, payload.to_vec()))
            .map_err(|e| match e {
                TrySendError::Full(_) => TransportError::Backpressure,
                TrySendError::Closed(_) => TransportError::Disconnected,
            })
    }
}
