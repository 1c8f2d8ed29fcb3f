//! Companion Event Service Implementation

use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::CompanionConfig;
use crate::error::CompanionError;
use crate::shadow::ShadowState;
use crate::window::EventWindow;
use helmet_protocol::{
    elapsed_ms, Channel, Command, CrashAlertFrame, DetectedEvent, EventKind, Frame, HelmetState,
    ImuSample, Millis, SensorFrame, Transport,
};

/// Update delivered to observers
#[derive(Debug, Clone, PartialEq)]
pub enum CompanionUpdate {
    /// Latest telemetry from the device
    Telemetry(SensorFrame),
    /// Shadow state changed (confirmed or predicted)
    Shadow(ShadowState),
    /// Event reported by the device
    Event(DetectedEvent),
    /// Crash alert; the rider must be asked to confirm
    CrashAlert(CrashAlertFrame),
    /// Event window finished collecting samples
    WindowCompleted(Box<EventWindow>),
    /// Command handed to the transport
    CommandSent {
        command: Command,
        predicted: HelmetState,
    },
}

/// Input to [`CompanionEventService::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Bytes received from the helmet
    Frame(Channel, Vec<u8>),
    /// Command requested by the UI
    Command(Command),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompanionStats {
    pub frames_received: u64,
    pub malformed: u64,
    pub updates_dropped: u64,
    pub windows_opened: u64,
    pub windows_completed: u64,
    pub commands_sent: u64,
}

/// Companion side of the link
pub struct CompanionEventService {
    config: CompanionConfig,
    /// Recent samples for pre-trigger slices
    history: VecDeque<ImuSample>,
    /// Windows still collecting post-trigger samples
    open_windows: Vec<EventWindow>,
    /// Last trigger per kind, for merging duplicate reports
    recent_triggers: Vec<(EventKind, Millis)>,
    shadow: ShadowState,
    updates: mpsc::Sender<CompanionUpdate>,
    shadow_tx: watch::Sender<ShadowState>,
    stats: CompanionStats,
}

impl CompanionEventService {
    /// Create the service and the receiving end of its update stream
    pub fn new(config: CompanionConfig) -> (Self, mpsc::Receiver<CompanionUpdate>) {
        info!("Creating companion event service with config: {:?}", config);
        let (updates, rx) = mpsc::channel(config.update_capacity.max(1));
        let (shadow_tx, _) = watch::channel(ShadowState::default());
        let history_capacity = config.history_capacity.max(config.pre_window_samples);
        let service = Self {
            config,
            history: VecDeque::with_capacity(history_capacity),
            open_windows: Vec::new(),
            recent_triggers: Vec::new(),
            shadow: ShadowState::default(),
            updates,
            shadow_tx,
            stats: CompanionStats::default(),
        };
        (service, rx)
    }

    /// Latest shadow state for late subscribers
    pub fn subscribe_shadow(&self) -> watch::Receiver<ShadowState> {
        self.shadow_tx.subscribe()
    }

    pub fn shadow(&self) -> &ShadowState {
        &self.shadow
    }

    pub fn stats(&self) -> &CompanionStats {
        &self.stats
    }

    /// Windows still collecting samples
    pub fn open_windows(&self) -> &[EventWindow] {
        &self.open_windows
    }

    /// Handle bytes received on `channel`. Never blocks.
    pub fn handle_frame(&mut self, channel: Channel, bytes: &[u8]) -> Result<(), CompanionError> {
        self.stats.frames_received += 1;
        let frame = match Frame::decode(channel, bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.malformed += 1;
                warn!("Dropping malformed frame on {:?}: {}", channel, e);
                return Err(e.into());
            }
        };

        match frame {
            Frame::Sensor(sensor) => self.on_sensor(sensor),
            Frame::Event(event) => self.on_event(event),
            Frame::CrashAlert(alert) => self.on_crash_alert(alert),
            Frame::Command(command) => {
                warn!("Ignoring {:?} command frame from helmet", command);
            }
        }
        Ok(())
    }

    fn on_sensor(&mut self, sensor: SensorFrame) {
        let sample = sensor.sample;

        let history_capacity = self.history_capacity();
        if self.history.len() >= history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);

        let mut completed = Vec::new();
        self.open_windows.retain_mut(|window| {
            if window.push_post(sample) {
                completed.push(window.clone());
                false
            } else {
                true
            }
        });
        for window in completed {
            self.complete_window(window);
        }

        if self.shadow.confirm(sensor.state, sample.timestamp_ms) {
            debug!("Shadow confirmed as {:?}", sensor.state);
            self.publish_shadow();
        }
        self.publish(CompanionUpdate::Telemetry(sensor));
    }

    fn on_event(&mut self, event: DetectedEvent) {
        debug!("Event {:?} at {}ms", event.kind, event.timestamp_ms);
        if self.shadow.predict_event(&event) {
            self.publish_shadow();
        }
        if event.kind.is_reportable() {
            self.open_window(
                event.kind,
                event.timestamp_ms,
                event.confidence,
                event.peak_accel,
                event.peak_jerk,
            );
        }
        self.publish(CompanionUpdate::Event(event));
    }

    fn on_crash_alert(&mut self, alert: CrashAlertFrame) {
        warn!(
            "Crash alert from helmet at {}ms (peak {:.2} g)",
            alert.timestamp_ms, alert.peak_accel
        );
        // The alert frame is the device's own statement of its state
        if self.shadow.confirm(HelmetState::CrashAlert, alert.timestamp_ms) {
            self.publish_shadow();
        }
        self.open_window(EventKind::Crash, alert.timestamp_ms, 1.0, alert.peak_accel, 0.0);
        self.publish(CompanionUpdate::CrashAlert(alert));
    }

    fn open_window(
        &mut self,
        kind: EventKind,
        trigger_ms: Millis,
        confidence: f32,
        peak_accel: f32,
        peak_jerk: f32,
    ) {
        let dedupe_ms = self.config.window_dedupe_ms;
        let near = |at: Millis| {
            elapsed_ms(trigger_ms, at).min(elapsed_ms(at, trigger_ms)) <= dedupe_ms
        };

        if let Some(slot) = self.recent_triggers.iter_mut().find(|(k, _)| *k == kind) {
            if near(slot.1) {
                debug!("Merging duplicate {:?} trigger at {}ms", kind, trigger_ms);
                if let Some(window) = self
                    .open_windows
                    .iter_mut()
                    .find(|w| w.kind == kind && near(w.trigger_timestamp_ms))
                {
                    window.merge_trigger(confidence, peak_accel, peak_jerk);
                }
                return;
            }
            slot.1 = trigger_ms;
        } else {
            self.recent_triggers.push((kind, trigger_ms));
        }

        let skip = self.history.len().saturating_sub(self.config.pre_window_samples);
        let pre: Vec<ImuSample> = self.history.iter().skip(skip).copied().collect();
        let window = EventWindow::open(
            kind,
            trigger_ms,
            confidence,
            peak_accel,
            peak_jerk,
            pre,
            self.config.post_window_samples,
        );
        info!("Opened {:?} window {} at {}ms", kind, window.id, trigger_ms);
        self.stats.windows_opened += 1;

        if window.is_complete() {
            self.complete_window(window);
        } else {
            self.open_windows.push(window);
        }
    }

    fn complete_window(&mut self, window: EventWindow) {
        info!(
            "{:?} window {} complete: {} samples over {}ms",
            window.kind,
            window.id,
            window.pre.len() + window.post.len(),
            window.duration_ms()
        );
        self.stats.windows_completed += 1;
        self.publish(CompanionUpdate::WindowCompleted(Box::new(window)));
    }

    /// Encode and send a command, then predict its effect on the shadow.
    /// Fire-and-forget: the device confirms through later sensor frames.
    pub fn send_command(
        &mut self,
        command: Command,
        transport: &mut dyn Transport,
    ) -> Result<(), CompanionError> {
        transport.send(Channel::Command, &Frame::Command(command).encode())?;
        self.stats.commands_sent += 1;
        info!("Sent {:?}", command);

        if self.shadow.predict_command(command) {
            self.publish_shadow();
        }
        self.publish(CompanionUpdate::CommandSent {
            command,
            predicted: self.shadow.state,
        });
        Ok(())
    }

    /// Process inbound frames and UI commands until the channel closes
    pub async fn run<T: Transport>(
        &mut self,
        inbound: &mut mpsc::Receiver<Inbound>,
        transport: &mut T,
    ) {
        info!("Starting companion event loop");
        while let Some(input) = inbound.recv().await {
            let result = match input {
                Inbound::Frame(channel, bytes) => self.handle_frame(channel, &bytes),
                Inbound::Command(command) => self.send_command(command, transport),
            };
            if let Err(e) = result {
                debug!("Inbound handling failed: {}", e);
            }
        }
        info!("Companion inbound channel closed: {:?}", self.stats);
    }

    fn history_capacity(&self) -> usize {
        self.config
            .history_capacity
            .max(self.config.pre_window_samples)
            .max(1)
    }

    fn publish_shadow(&mut self) {
        self.shadow_tx.send_replace(self.shadow);
        self.publish(CompanionUpdate::Shadow(self.shadow));
    }

    fn publish(&mut self, update: CompanionUpdate) {
        match self.updates.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(update)) => {
                self.stats.updates_dropped += 1;
                warn!("Update channel full, dropping {:?}", update_name(&update));
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.updates_dropped += 1;
                debug!("No update subscribers");
            }
        }
    }
}

fn update_name(update: &CompanionUpdate) -> &'static str {
    match update {
        CompanionUpdate::Telemetry(_) => "telemetry",
        CompanionUpdate::Shadow(_) => "shadow",
        CompanionUpdate::Event(_) => "event",
        CompanionUpdate::CrashAlert(_) => "crash alert",
        CompanionUpdate::WindowCompleted(_) => "window",
        CompanionUpdate::CommandSent { .. } => "command",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmet_protocol::MemoryTransport;

    fn sensor_bytes(ts: Millis, g: f32, state: HelmetState) -> Vec<u8> {
        SensorFrame {
            sample: ImuSample::new(ts, [0.0, 0.0, g], [0.0; 3]),
            state,
        }
        .encode()
        .to_vec()
    }

    fn event_bytes(kind: EventKind, ts: Millis) -> Vec<u8> {
        Frame::Event(DetectedEvent {
            kind,
            confidence: 0.7,
            peak_accel: 5.0,
            peak_jerk: 300.0,
            timestamp_ms: ts,
        })
        .encode()
    }

    fn small_windows() -> CompanionConfig {
        CompanionConfig {
            pre_window_samples: 3,
            post_window_samples: 2,
            history_capacity: 5,
            ..Default::default()
        }
    }

    fn drain(rx: &mut mpsc::Receiver<CompanionUpdate>) -> Vec<CompanionUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    #[test]
    fn test_sensor_confirms_shadow() {
        let (mut service, mut rx) = CompanionEventService::new(CompanionConfig::default());
        let shadow = service.subscribe_shadow();

        service
            .handle_frame(Channel::Sensor, &sensor_bytes(100, 1.0, HelmetState::TurnRight))
            .unwrap();

        assert_eq!(service.shadow().state, HelmetState::TurnRight);
        assert!(service.shadow().authoritative);
        assert_eq!(shadow.borrow().state, HelmetState::TurnRight);
        assert_eq!(shadow.borrow().device_time_ms, Some(100));

        let updates = drain(&mut rx);
        assert!(matches!(updates[0], CompanionUpdate::Shadow(_)));
        assert!(matches!(updates[1], CompanionUpdate::Telemetry(_)));
    }

    #[test]
    fn test_malformed_frame_counted_and_dropped() {
        let (mut service, mut rx) = CompanionEventService::new(CompanionConfig::default());
        assert!(matches!(
            service.handle_frame(Channel::Sensor, &[0u8; 12]),
            Err(CompanionError::Protocol(_))
        ));
        let mut bad_alert = CrashAlertFrame {
            timestamp_ms: 0,
            peak_accel: 5.0,
        }
        .encode();
        bad_alert[8] = HelmetState::Party.as_byte();
        assert!(service.handle_frame(Channel::CrashAlert, &bad_alert).is_err());

        assert_eq!(service.stats().malformed, 2);
        assert_eq!(service.shadow().state, HelmetState::Normal);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_event_window_captures_pre_and_post() {
        let (mut service, mut rx) = CompanionEventService::new(small_windows());
        for i in 0..6 {
            service
                .handle_frame(Channel::Sensor, &sensor_bytes(i * 10, 1.0, HelmetState::Normal))
                .unwrap();
        }
        service
            .handle_frame(Channel::Event, &event_bytes(EventKind::Bump, 60))
            .unwrap();
        assert_eq!(service.open_windows().len(), 1);

        for i in 6..8 {
            service
                .handle_frame(Channel::Sensor, &sensor_bytes(i * 10, 2.0, HelmetState::Normal))
                .unwrap();
        }
        assert!(service.open_windows().is_empty());

        let window = drain(&mut rx)
            .into_iter()
            .find_map(|u| match u {
                CompanionUpdate::WindowCompleted(w) => Some(w),
                _ => None,
            })
            .unwrap();
        assert_eq!(window.kind, EventKind::Bump);
        let pre: Vec<Millis> = window.pre.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(pre, vec![30, 40, 50]);
        let post: Vec<Millis> = window.post.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(post, vec![60, 70]);
        assert_eq!(service.stats().windows_completed, 1);
    }

    #[test]
    fn test_crash_alert_and_event_share_one_window() {
        let (mut service, _rx) = CompanionEventService::new(small_windows());
        let alert = CrashAlertFrame {
            timestamp_ms: 1_000,
            peak_accel: 6.5,
        }
        .encode();
        service
            .handle_frame(Channel::Event, &event_bytes(EventKind::Crash, 1_000))
            .unwrap();
        service.handle_frame(Channel::CrashAlert, &alert).unwrap();

        assert_eq!(service.stats().windows_opened, 1);
        assert_eq!(service.open_windows()[0].peak_accel, 6.5);
        assert_eq!(service.open_windows()[0].confidence, 1.0);
        assert!(service.shadow().in_crash_alert());
        assert!(service.shadow().authoritative);

        // A later crash is a new window
        service
            .handle_frame(Channel::Event, &event_bytes(EventKind::Crash, 40_000))
            .unwrap();
        assert_eq!(service.stats().windows_opened, 2);
    }

    #[test]
    fn test_normal_events_open_no_window() {
        let (mut service, _rx) = CompanionEventService::new(small_windows());
        service
            .handle_frame(Channel::Event, &event_bytes(EventKind::Normal, 10))
            .unwrap();
        assert_eq!(service.stats().windows_opened, 0);
    }

    #[test]
    fn test_send_command_predicts_shadow() {
        let (mut service, mut rx) = CompanionEventService::new(CompanionConfig::default());
        let mut transport = MemoryTransport::new(4);

        service.send_command(Command::TurnLeftOn, &mut transport).unwrap();
        assert_eq!(transport.pending_on(Channel::Command), vec![&[0x01u8][..]]);
        assert_eq!(service.shadow().state, HelmetState::TurnLeft);
        assert!(!service.shadow().authoritative);
        assert!(drain(&mut rx).contains(&CompanionUpdate::CommandSent {
            command: Command::TurnLeftOn,
            predicted: HelmetState::TurnLeft
        }));

        // Device says otherwise: authoritative wins
        service
            .handle_frame(Channel::Sensor, &sensor_bytes(50, 1.0, HelmetState::Normal))
            .unwrap();
        assert_eq!(service.shadow().state, HelmetState::Normal);
    }

    #[test]
    fn test_send_command_transport_error() {
        let (mut service, _rx) = CompanionEventService::new(CompanionConfig::default());
        let mut transport = MemoryTransport::new(4);
        transport.set_connected(false);
        assert!(matches!(
            service.send_command(Command::PartyModeOn, &mut transport),
            Err(CompanionError::Transport(_))
        ));
        assert_eq!(service.shadow().state, HelmetState::Normal);
    }

    #[test]
    fn test_full_update_channel_drops() {
        let config = CompanionConfig {
            update_capacity: 1,
            ..Default::default()
        };
        let (mut service, _rx) = CompanionEventService::new(config);
        for i in 0..3 {
            service
                .handle_frame(Channel::Sensor, &sensor_bytes(i * 10, 1.0, HelmetState::Normal))
                .unwrap();
        }
        // One shadow update went through, every telemetry update was dropped
        assert_eq!(service.stats().updates_dropped, 3);
    }

    #[tokio::test]
    async fn test_run_processes_until_closed() {
        let (mut service, mut rx) = CompanionEventService::new(CompanionConfig::default());
        let (tx, mut inbound) = mpsc::channel(16);
        let mut transport = MemoryTransport::new(4);

        tx.send(Inbound::Frame(
            Channel::Sensor,
            sensor_bytes(0, 1.0, HelmetState::Normal),
        ))
        .await
        .unwrap();
        tx.send(Inbound::Frame(Channel::Command, vec![0x01])).await.unwrap();
        tx.send(Inbound::Frame(Channel::Event, vec![0xFF])).await.unwrap();
        tx.send(Inbound::Command(Command::PartyModeOn)).await.unwrap();
        drop(tx);

        service.run(&mut inbound, &mut transport).await;

        assert_eq!(service.stats().frames_received, 3);
        assert_eq!(service.stats().malformed, 1);
        assert_eq!(service.stats().commands_sent, 1);
        assert_eq!(service.shadow().state, HelmetState::Party);
        assert_eq!(transport.len(), 1);

        let updates = drain(&mut rx);
        assert!(updates
            .iter()
            .any(|u| matches!(u, CompanionUpdate::Telemetry(_))));
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_latest_shadow() {
        let (mut service, _rx) = CompanionEventService::new(CompanionConfig::default());
        service
            .handle_frame(Channel::Sensor, &sensor_bytes(0, 1.0, HelmetState::Braking))
            .unwrap();
        let late = service.subscribe_shadow();
        assert_eq!(late.borrow().state, HelmetState::Braking);
    }
}
