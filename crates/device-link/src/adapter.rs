//! Device Link Adapter
//!
//! Sits between the state machine and the transport. Sensor and event
//! frames are best-effort; crash alerts are queued and retried until the
//! transport accepts them or the attempt budget runs out.

use std::collections::VecDeque;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::LinkConfig;
use crate::error::LinkError;
use helmet_protocol::{
    elapsed_ms, Channel, Command, CrashAlertFrame, DetectedEvent, Frame, HelmetState, ImuSample,
    Millis, SensorFrame, Transport,
};

/// Link traffic counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub sensor_sent: u64,
    pub sensor_dropped: u64,
    pub events_sent: u64,
    pub events_dropped: u64,
    pub crash_sent: u64,
    pub crash_retried: u64,
    pub crash_failed: u64,
    pub commands_received: u64,
    pub commands_dropped: u64,
    pub malformed: u64,
}

/// Crash alert waiting for the transport
#[derive(Debug, Clone, Copy)]
struct PendingCrash {
    frame: CrashAlertFrame,
    attempts: u8,
    next_attempt_at: Millis,
}

/// Whether `at` has been reached at `now`, tolerant of counter wrap
fn is_due(now: Millis, at: Millis) -> bool {
    elapsed_ms(now, at) <= Millis::MAX / 2
}

pub struct DeviceLinkAdapter {
    config: LinkConfig,
    inbox: VecDeque<Command>,
    last_sensor_at: Option<Millis>,
    /// State changed since the last sensor frame went out
    sensor_forced: bool,
    pending_crash: VecDeque<PendingCrash>,
    stats: LinkStats,
}

impl DeviceLinkAdapter {
    pub fn new(config: LinkConfig) -> Self {
        info!("Creating link adapter with config: {:?}", config);
        let inbox = VecDeque::with_capacity(config.inbox_capacity);
        Self {
            config,
            inbox,
            last_sensor_at: None,
            sensor_forced: false,
            pending_crash: VecDeque::new(),
            stats: LinkStats::default(),
        }
    }

    /// Inbound bytes from the transport.
    ///
    /// Only queues decoded commands; the state machine sees them on the next
    /// tick. Malformed frames are counted and dropped.
    pub fn receive(&mut self, channel: Channel, bytes: &[u8]) -> Result<(), LinkError> {
        let frame = match Frame::decode(channel, bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.malformed += 1;
                counter!("helmet_link_malformed_total").increment(1);
                warn!("Dropping malformed frame on {:?}: {}", channel, e);
                return Err(e.into());
            }
        };

        let Frame::Command(command) = frame else {
            warn!("Ignoring unexpected {:?} frame from companion", channel);
            return Ok(());
        };

        if self.inbox.len() >= self.config.inbox_capacity {
            self.stats.commands_dropped += 1;
            counter!("helmet_link_commands_dropped_total").increment(1);
            warn!("Command inbox full, dropping {:?}", command);
            return Ok(());
        }
        debug!("Queued command {:?}", command);
        self.stats.commands_received += 1;
        counter!("helmet_link_commands_received_total").increment(1);
        self.inbox.push_back(command);
        Ok(())
    }

    /// Take queued commands in arrival order
    pub fn take_commands(&mut self) -> Vec<Command> {
        self.inbox.drain(..).collect()
    }

    /// Make the next sensor frame go out regardless of the rate limit
    pub fn note_state_change(&mut self) {
        self.sensor_forced = true;
    }

    /// Publish the latest sample if the rate limit allows. Returns whether a
    /// frame was handed to the transport.
    pub fn publish_sensor(
        &mut self,
        now: Millis,
        sample: ImuSample,
        state: HelmetState,
        transport: &mut dyn Transport,
    ) -> bool {
        let due = match self.last_sensor_at {
            Some(last) => elapsed_ms(now, last) >= self.config.sensor_notify_interval_ms,
            None => true,
        };
        if !(due || self.sensor_forced) {
            return false;
        }

        self.last_sensor_at = Some(now);
        let frame = SensorFrame { sample, state };
        match transport.send(Channel::Sensor, &frame.encode()) {
            Ok(()) => {
                self.sensor_forced = false;
                self.stats.sensor_sent += 1;
                counter!("helmet_link_sensor_sent_total").increment(1);
                true
            }
            Err(e) => {
                // Telemetry is never queued; the next frame carries newer data
                self.stats.sensor_dropped += 1;
                counter!("helmet_link_sensor_dropped_total").increment(1);
                debug!("Sensor frame dropped: {}", e);
                false
            }
        }
    }

    /// Best-effort event report
    pub fn send_event(&mut self, event: &DetectedEvent, transport: &mut dyn Transport) -> bool {
        let payload = Frame::Event(*event).encode();
        match transport.send(Channel::Event, &payload) {
            Ok(()) => {
                self.stats.events_sent += 1;
                counter!("helmet_link_events_sent_total").increment(1);
                true
            }
            Err(e) => {
                self.stats.events_dropped += 1;
                counter!("helmet_link_events_dropped_total").increment(1);
                warn!("{:?} event frame dropped: {}", event.kind, e);
                false
            }
        }
    }

    /// Queue a crash alert for delivery at the next flush
    pub fn queue_crash_alert(&mut self, frame: CrashAlertFrame, now: Millis) {
        info!("Queueing crash alert from {}ms", frame.timestamp_ms);
        self.pending_crash.push_back(PendingCrash {
            frame,
            attempts: 0,
            next_attempt_at: now,
        });
    }

    /// Attempt every due crash alert in order.
    ///
    /// An alert that runs out of attempts is dropped from the queue and
    /// reported as `DeliveryFailed`.
    pub fn flush_crash_alerts(
        &mut self,
        now: Millis,
        transport: &mut dyn Transport,
    ) -> Result<(), LinkError> {
        while let Some(pending) = self.pending_crash.front_mut() {
            if !is_due(now, pending.next_attempt_at) {
                return Ok(());
            }

            pending.attempts += 1;
            match transport.send(Channel::CrashAlert, &pending.frame.encode()) {
                Ok(()) => {
                    info!(
                        "Crash alert delivered on attempt {}",
                        pending.attempts
                    );
                    self.stats.crash_sent += 1;
                    counter!("helmet_link_crash_sent_total").increment(1);
                    self.pending_crash.pop_front();
                }
                Err(e) if pending.attempts >= self.config.crash_max_attempts => {
                    let failed = LinkError::DeliveryFailed {
                        timestamp_ms: pending.frame.timestamp_ms,
                        attempts: pending.attempts,
                    };
                    error!("{} (last error: {})", failed, e);
                    self.stats.crash_failed += 1;
                    counter!("helmet_link_crash_failed_total").increment(1);
                    self.pending_crash.pop_front();
                    return Err(failed);
                }
                Err(e) => {
                    warn!(
                        "Crash alert attempt {}/{} failed: {}",
                        pending.attempts, self.config.crash_max_attempts, e
                    );
                    pending.next_attempt_at = now.wrapping_add(self.config.crash_retry_interval_ms);
                    self.stats.crash_retried += 1;
                    counter!("helmet_link_crash_retried_total").increment(1);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Crash alerts still waiting for the transport
    pub fn pending_crash_alerts(&self) -> usize {
        self.pending_crash.len()
    }

    /// Queued inbound commands
    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

impl Default for DeviceLinkAdapter {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmet_protocol::{MemoryTransport, ProtocolError};

    fn sample(ts: Millis) -> ImuSample {
        ImuSample::new(ts, [0.0, 0.0, 1.0], [0.0; 3])
    }

    fn crash_frame() -> CrashAlertFrame {
        CrashAlertFrame {
            timestamp_ms: 500,
            peak_accel: 6.0,
        }
    }

    #[test]
    fn test_commands_queued_in_order() {
        let mut adapter = DeviceLinkAdapter::default();
        adapter.receive(Channel::Command, &[0x01]).unwrap();
        adapter.receive(Channel::Command, &[0x06]).unwrap();
        assert_eq!(
            adapter.take_commands(),
            vec![Command::TurnLeftOn, Command::PartyModeOn]
        );
        assert_eq!(adapter.inbox_len(), 0);
    }

    #[test]
    fn test_malformed_command_counted() {
        let mut adapter = DeviceLinkAdapter::default();
        assert_eq!(
            adapter.receive(Channel::Command, &[0x01, 0x02]),
            Err(LinkError::Protocol(ProtocolError::MalformedFrame {
                channel: Channel::Command,
                expected: 1,
                actual: 2
            }))
        );
        assert!(adapter.receive(Channel::Command, &[0x42]).is_err());
        assert_eq!(adapter.stats().malformed, 2);
        assert!(adapter.take_commands().is_empty());
    }

    #[test]
    fn test_inbox_overflow_drops_newest() {
        let mut adapter = DeviceLinkAdapter::new(LinkConfig {
            inbox_capacity: 2,
            ..Default::default()
        });
        for opcode in [0x01, 0x02, 0x03] {
            adapter.receive(Channel::Command, &[opcode]).unwrap();
        }
        assert_eq!(adapter.stats().commands_dropped, 1);
        assert_eq!(
            adapter.take_commands(),
            vec![Command::TurnLeftOn, Command::TurnLeftOff]
        );
    }

    #[test]
    fn test_sensor_rate_limited() {
        let mut adapter = DeviceLinkAdapter::default();
        let mut transport = MemoryTransport::new(64);
        let sent: Vec<bool> = (0..25)
            .map(|i| adapter.publish_sensor(i * 10, sample(i * 10), HelmetState::Normal, &mut transport))
            .collect();
        // 0, 100, 200 ms
        assert_eq!(sent.iter().filter(|s| **s).count(), 3);
        assert_eq!(transport.pending_on(Channel::Sensor).len(), 3);
    }

    #[test]
    fn test_state_change_forces_sensor_frame() {
        let mut adapter = DeviceLinkAdapter::default();
        let mut transport = MemoryTransport::new(64);
        assert!(adapter.publish_sensor(0, sample(0), HelmetState::Normal, &mut transport));
        assert!(!adapter.publish_sensor(10, sample(10), HelmetState::Normal, &mut transport));

        adapter.note_state_change();
        assert!(adapter.publish_sensor(20, sample(20), HelmetState::Braking, &mut transport));
        let frames = transport.drain();
        let last = SensorFrame::decode(&frames[1].1).unwrap();
        assert_eq!(last.state, HelmetState::Braking);
        assert_eq!(last.sample.timestamp_ms, 20);
    }

    #[test]
    fn test_sensor_backpressure_drops() {
        let mut adapter = DeviceLinkAdapter::default();
        let mut transport = MemoryTransport::new(0);
        assert!(!adapter.publish_sensor(0, sample(0), HelmetState::Normal, &mut transport));
        assert_eq!(adapter.stats().sensor_dropped, 1);
        assert!(transport.is_empty());
    }

    #[test]
    fn test_crash_alert_sent_immediately() {
        let mut adapter = DeviceLinkAdapter::default();
        let mut transport = MemoryTransport::new(4);
        adapter.queue_crash_alert(crash_frame(), 500);
        assert!(adapter.flush_crash_alerts(500, &mut transport).is_ok());
        assert_eq!(adapter.pending_crash_alerts(), 0);
        assert_eq!(
            CrashAlertFrame::decode(transport.pending_on(Channel::CrashAlert)[0]),
            Ok(crash_frame())
        );
    }

    #[test]
    fn test_crash_alert_retried_until_accepted() {
        let mut adapter = DeviceLinkAdapter::default();
        let mut transport = MemoryTransport::new(4);
        transport.set_connected(false);

        adapter.queue_crash_alert(crash_frame(), 0);
        adapter.flush_crash_alerts(0, &mut transport).unwrap();
        // Not due again before the retry interval
        adapter.flush_crash_alerts(10, &mut transport).unwrap();
        assert_eq!(adapter.stats().crash_retried, 1);

        transport.set_connected(true);
        adapter.flush_crash_alerts(20, &mut transport).unwrap();
        assert_eq!(adapter.stats().crash_sent, 1);
        assert_eq!(adapter.pending_crash_alerts(), 0);
    }

    #[test]
    fn test_crash_alert_delivery_failed() {
        let mut adapter = DeviceLinkAdapter::default();
        let mut transport = MemoryTransport::new(0);
        adapter.queue_crash_alert(crash_frame(), 0);

        let mut result = Ok(());
        for i in 0..5 {
            result = adapter.flush_crash_alerts(i * 20, &mut transport);
        }
        assert_eq!(
            result,
            Err(LinkError::DeliveryFailed {
                timestamp_ms: 500,
                attempts: 5
            })
        );
        assert_eq!(adapter.stats().crash_failed, 1);
        assert_eq!(adapter.pending_crash_alerts(), 0);
    }

    #[test]
    fn test_event_best_effort() {
        let mut adapter = DeviceLinkAdapter::default();
        let mut transport = MemoryTransport::new(1);
        let event = DetectedEvent::new(helmet_protocol::EventKind::Bump, 40);
        assert!(adapter.send_event(&event, &mut transport));
        assert!(!adapter.send_event(&event, &mut transport));
        assert_eq!(adapter.stats().events_sent, 1);
        assert_eq!(adapter.stats().events_dropped, 1);
    }

    #[test]
    fn test_due_across_wrap() {
        assert!(is_due(5, u32::MAX - 5));
        assert!(!is_due(u32::MAX - 5, 5));
        assert!(is_due(7, 7));
    }
}
