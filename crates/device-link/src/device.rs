//! Helmet device tick pipeline

use tracing::{debug, info, warn};

use crate::adapter::DeviceLinkAdapter;
use crate::alerting::LocalAlerting;
use crate::config::DeviceConfig;
use crate::error::{ImuError, LinkError};
use event_classifier::EventClassifier;
use helmet_protocol::{
    Channel, Command, CrashAlertFrame, DetectedEvent, HelmetState, ImuSample, Millis, Transport,
};
use helmet_state::{CommandOutcome, HelmetStateMachine, LedAnimator, Notification, Rgb};

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Classification of this tick's sample, if it was accepted
    pub event: Option<DetectedEvent>,
    /// Reported state after the tick
    pub state: HelmetState,
    /// Commands applied this tick, in arrival order
    pub commands: Vec<(Command, CommandOutcome)>,
    /// LED frame to show
    pub leds: Vec<Rgb>,
    /// A crash alert ran out of delivery attempts this tick
    pub delivery_failed: bool,
}

/// Single-threaded device pipeline. Every call to [`HelmetDevice::tick`]
/// runs to completion without blocking on the transport.
pub struct HelmetDevice<A: LocalAlerting> {
    classifier: EventClassifier,
    machine: HelmetStateMachine,
    adapter: DeviceLinkAdapter,
    animator: LedAnimator,
    alerting: A,
    /// Newest accepted sample, published on the sensor channel
    last_sample: Option<ImuSample>,
    /// Latched when a crash alert could not be delivered
    fault: bool,
}

impl<A: LocalAlerting> HelmetDevice<A> {
    pub fn new(config: &DeviceConfig, alerting: A) -> Self {
        info!("Starting helmet device pipeline");
        Self {
            classifier: EventClassifier::new(config.classifier.clone()),
            machine: HelmetStateMachine::new(config.state_machine.clone()),
            adapter: DeviceLinkAdapter::new(config.link.clone()),
            animator: LedAnimator::new(config.led.clone()),
            alerting,
            last_sample: None,
            fault: false,
        }
    }

    /// Inbound bytes from the companion; safe to call between ticks
    pub fn receive(&mut self, channel: Channel, bytes: &[u8]) -> Result<(), LinkError> {
        self.adapter.receive(channel, bytes)
    }

    /// Run one pipeline tick
    pub fn tick(
        &mut self,
        now: Millis,
        reading: Result<ImuSample, ImuError>,
        transport: &mut dyn Transport,
    ) -> TickReport {
        // Commands queued before this tick were sent against this state
        let crash_active_at_receipt = self.machine.state() == HelmetState::CrashAlert;

        // 1. Classify; a bad reading skips classification only
        let event = match reading {
            Ok(sample) => match self.classifier.classify(sample) {
                Ok(event) => {
                    self.last_sample = Some(sample);
                    self.machine.on_event(&event, now);
                    Some(event)
                }
                Err(_) => None,
            },
            Err(e) => {
                warn!("IMU read failed at {}ms: {}", now, e);
                None
            }
        };

        // 2. Timers
        self.machine.poll_timers(now);

        // 3. Commands, after any crash from this tick has taken effect
        let commands: Vec<(Command, CommandOutcome)> = self
            .adapter
            .take_commands()
            .into_iter()
            .map(|command| {
                // A false alarm only answers an alert that was already showing
                if command == Command::CrashFalseAlarm && !crash_active_at_receipt {
                    debug!("False alarm queued before crash at {}ms ignored", now);
                    return (command, CommandOutcome::NoOp);
                }
                (command, self.machine.apply_command(command, now))
            })
            .collect();

        // 4. Dispatch
        let mut events = Vec::new();
        for notification in self.machine.drain_notifications() {
            match notification {
                Notification::StateChanged { from, to, cause, .. } => {
                    debug!("Dispatching state change {:?} -> {:?} ({:?})", from, to, cause);
                    self.adapter.note_state_change();
                }
                Notification::Event(event) => events.push(event),
                Notification::CrashAlert {
                    timestamp_ms,
                    peak_accel,
                } => self.adapter.queue_crash_alert(
                    CrashAlertFrame {
                        timestamp_ms,
                        peak_accel,
                    },
                    now,
                ),
                Notification::CrashEscalated {
                    entered_at_ms,
                    escalated_at_ms,
                    peak_accel,
                } => self
                    .alerting
                    .crash_escalated(entered_at_ms, escalated_at_ms, peak_accel),
                Notification::CrashCancelled { at_ms } => {
                    info!("Crash alert cancelled at {}ms", at_ms)
                }
            }
        }

        // 5. Transmit; crash alerts take the transport before anything else
        let delivery_failed = match self.adapter.flush_crash_alerts(now, transport) {
            Ok(()) => false,
            Err(e) => {
                self.alerting.delivery_failed(&e);
                self.fault = true;
                true
            }
        };
        for event in &events {
            self.adapter.send_event(event, transport);
        }
        let state = self.machine.state();
        if let Some(sample) = self.last_sample {
            self.adapter.publish_sensor(now, sample, state, transport);
        }

        // 6. LEDs
        let leds = self.animator.render(state, now, self.fault);

        TickReport {
            event,
            state,
            commands,
            leds,
            delivery_failed,
        }
    }

    /// Explicit external reset: back to Normal, fault overlay cleared
    pub fn reset(&mut self, now: Millis) {
        self.machine.reset(now);
        self.machine.drain_notifications();
        self.adapter.note_state_change();
        self.fault = false;
    }

    pub fn state(&self) -> HelmetState {
        self.machine.state()
    }

    /// Whether the delivery fault overlay is latched
    pub fn fault(&self) -> bool {
        self.fault
    }

    pub fn machine(&self) -> &HelmetStateMachine {
        &self.machine
    }

    pub fn classifier(&self) -> &EventClassifier {
        &self.classifier
    }

    pub fn adapter(&self) -> &DeviceLinkAdapter {
        &self.adapter
    }

    pub fn alerting(&self) -> &A {
        &self.alerting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::LogAlerting;
    use crate::config::LinkConfig;
    use helmet_protocol::{EventKind, Frame, MemoryTransport, SensorFrame};

    fn device() -> HelmetDevice<LogAlerting> {
        HelmetDevice::new(&DeviceConfig::default(), LogAlerting::default())
    }

    fn upright(ts: Millis, g: f32) -> Result<ImuSample, ImuError> {
        Ok(ImuSample::new(ts, [0.0, 0.0, g], [0.0; 3]))
    }

    #[test]
    fn test_crash_scenario_end_to_end() {
        let mut device = device();
        let mut transport = MemoryTransport::new(64);

        let mut reports = Vec::new();
        for (i, g) in [1.0, 1.0, 1.0, 5.0].iter().enumerate() {
            let now = i as Millis * 10;
            reports.push(device.tick(now, upright(now, *g), &mut transport));
        }

        let kinds: Vec<_> = reports.iter().map(|r| r.event.map(|e| e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                Some(EventKind::Normal),
                Some(EventKind::Normal),
                Some(EventKind::Normal),
                Some(EventKind::Crash)
            ]
        );
        assert_eq!(device.state(), HelmetState::CrashAlert);
        assert_eq!(
            device.machine().crash_timer().map(|t| t.deadline),
            Some(30 + 30_000)
        );

        let alerts = transport.pending_on(Channel::CrashAlert);
        assert_eq!(alerts.len(), 1);
        let alert = CrashAlertFrame::decode(alerts[0]).unwrap();
        assert_eq!(alert.timestamp_ms, 30);
        assert_eq!(alert.peak_accel, 5.0);

        // State change forced a sensor frame carrying CrashAlert
        let last_sensor = transport.pending_on(Channel::Sensor).last().map(|b| b.to_vec());
        let frame = SensorFrame::decode(&last_sensor.unwrap()).unwrap();
        assert_eq!(frame.state, HelmetState::CrashAlert);
    }

    #[test]
    fn test_false_alarm_over_the_link() {
        let mut device = device();
        let mut transport = MemoryTransport::new(256);
        device.tick(0, upright(0, 6.0), &mut transport);
        assert_eq!(device.state(), HelmetState::CrashAlert);

        device.receive(Channel::Command, &[0x05]).unwrap();
        let report = device.tick(5_000, upright(5_000, 1.0), &mut transport);
        assert_eq!(
            report.commands,
            vec![(Command::CrashFalseAlarm, CommandOutcome::Applied)]
        );
        assert_eq!(report.state, HelmetState::Normal);

        device.receive(Channel::Command, &[0x05]).unwrap();
        let report = device.tick(6_000, upright(6_000, 1.0), &mut transport);
        assert_eq!(
            report.commands,
            vec![(Command::CrashFalseAlarm, CommandOutcome::NoOp)]
        );
    }

    #[test]
    fn test_crash_preempts_command_in_same_tick() {
        let mut device = device();
        let mut transport = MemoryTransport::new(64);
        device.receive(Channel::Command, &[0x06]).unwrap();
        let report = device.tick(0, upright(0, 8.0), &mut transport);
        assert_eq!(
            report.commands,
            vec![(Command::PartyModeOn, CommandOutcome::Rejected)]
        );
        assert_eq!(report.state, HelmetState::CrashAlert);
    }

    #[test]
    fn test_stale_false_alarm_cannot_cancel_new_crash() {
        let mut device = device();
        let mut transport = MemoryTransport::new(256);
        for i in 0..10 {
            device.tick(i * 10, upright(i * 10, 1.0), &mut transport);
        }
        // Duplicate false alarm arriving while still Normal
        device.receive(Channel::Command, &[0x05]).unwrap();
        let report = device.tick(100, upright(100, 8.0), &mut transport);

        assert_eq!(report.event.map(|e| e.kind), Some(EventKind::Crash));
        assert_eq!(
            report.commands,
            vec![(Command::CrashFalseAlarm, CommandOutcome::NoOp)]
        );
        assert_eq!(report.state, HelmetState::CrashAlert);
        assert_eq!(
            device.machine().crash_timer().map(|t| t.deadline),
            Some(100 + 30_000)
        );

        // A false alarm sent once the alert is showing still cancels it
        device.receive(Channel::Command, &[0x05]).unwrap();
        let report = device.tick(110, upright(110, 1.0), &mut transport);
        assert_eq!(
            report.commands,
            vec![(Command::CrashFalseAlarm, CommandOutcome::Applied)]
        );
        assert_eq!(report.state, HelmetState::Normal);
    }

    #[test]
    fn test_read_failure_keeps_pipeline_running() {
        let mut device = device();
        let mut transport = MemoryTransport::new(64);
        device.tick(0, upright(0, 1.0), &mut transport);
        let report = device.tick(10, Err(ImuError::Read("i2c nack".into())), &mut transport);
        assert!(report.event.is_none());
        assert_eq!(report.state, HelmetState::Normal);
        assert_eq!(device.classifier().buffer().len(), 1);
        assert_eq!(report.leds.len(), 12);
    }

    #[test]
    fn test_delivery_failure_latches_fault() {
        let config = DeviceConfig {
            link: LinkConfig {
                crash_max_attempts: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut device = HelmetDevice::new(&config, LogAlerting::default());
        let mut transport = MemoryTransport::new(8);
        transport.set_connected(false);

        let first = device.tick(0, upright(0, 7.0), &mut transport);
        assert!(!first.delivery_failed);
        device.tick(10, upright(10, 1.0), &mut transport);
        let third = device.tick(20, upright(20, 1.0), &mut transport);
        assert!(third.delivery_failed);
        assert!(device.fault());
        assert_eq!(device.alerting().delivery_failures, 1);
        // Fault overlay on the LEDs
        assert!(third.leds.iter().all(|c| *c == Rgb::new(150, 0, 0)));

        device.reset(30);
        assert!(!device.fault());
        assert_eq!(device.state(), HelmetState::Normal);
    }

    #[test]
    fn test_escalation_reaches_alerting() {
        let mut device = device();
        let mut transport = MemoryTransport::new(4096);
        device.tick(0, upright(0, 9.0), &mut transport);
        device.tick(29_990, upright(29_990, 1.0), &mut transport);
        assert_eq!(device.alerting().escalations, 0);
        device.tick(30_000, upright(30_000, 1.0), &mut transport);
        assert_eq!(device.alerting().escalations, 1);
        assert_eq!(device.state(), HelmetState::CrashAlert);
    }

    #[test]
    fn test_bump_event_frame_forwarded() {
        let mut device = device();
        let mut transport = MemoryTransport::new(64);
        for i in 0..10 {
            device.tick(i * 10, upright(i * 10, 1.0), &mut transport);
        }
        transport.drain();
        let report = device.tick(100, upright(100, 3.0), &mut transport);
        assert_eq!(report.event.map(|e| e.kind), Some(EventKind::Bump));

        let events = transport.pending_on(Channel::Event);
        assert_eq!(events.len(), 1);
        match Frame::decode(Channel::Event, events[0]) {
            Ok(Frame::Event(event)) => assert_eq!(event.kind, EventKind::Bump),
            other => panic!("unexpected frame {:?}", other),
        }
    }
}
