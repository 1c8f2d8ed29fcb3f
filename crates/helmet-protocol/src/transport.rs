//! Transport seam
//!
//! The link layer only needs "send bytes on a channel". Pairing, connection
//! lifecycle and radio details stay behind this trait.

use crate::error::TransportError;
use crate::frame::Channel;
use std::collections::VecDeque;

/// Outbound half of a connected link
pub trait Transport {
    /// Hand one frame payload to the transport. `Ok` means the transport accepted it.
    fn send(&mut self, channel: Channel, payload: &[u8]) -> Result<(), TransportError>;
}

/// In-memory transport with a bounded outbound queue
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    queue: VecDeque<(Channel, Vec<u8>)>,
    capacity: usize,
    connected: bool,
}

impl MemoryTransport {
    /// Create a transport that backpressures once `capacity` frames are pending
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            connected: true,
        }
    }

    /// Simulate the peer connecting or dropping
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Take every pending frame, oldest first
    pub fn drain(&mut self) -> Vec<(Channel, Vec<u8>)> {
        self.queue.drain(..).collect()
    }

    /// Pending frames on one channel, oldest first
    pub fn pending_on(&self, channel: Channel) -> Vec<&[u8]> {
        self.queue
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, p)| p.as_slice())
            .collect()
    }

    /// Number of pending frames
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no frames are pending
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, channel: Channel, payload: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        if self.queue.len() >= self.capacity {
            return Err(TransportError::Backpressure);
        }
        self.queue.push_back((channel, payload.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backpressure_at_capacity() {
        let mut transport = MemoryTransport::new(1);
        assert!(transport.send(Channel::Sensor, &[1]).is_ok());
        assert_eq!(
            transport.send(Channel::Sensor, &[2]),
            Err(TransportError::Backpressure)
        );
        assert_eq!(transport.drain().len(), 1);
        assert!(transport.send(Channel::Sensor, &[3]).is_ok());
    }

    #[test]
    fn test_disconnected() {
        let mut transport = MemoryTransport::new(4);
        transport.set_connected(false);
        assert_eq!(
            transport.send(Channel::CrashAlert, &[0; 9]),
            Err(TransportError::Disconnected)
        );
    }
}
