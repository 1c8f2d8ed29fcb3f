//! Scripted ride in virtual time

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::transport::ChannelTransport;
use companion::{
    CompanionConfig, CompanionEventService, CompanionStats, CompanionUpdate, Inbound, ShadowState,
};
use device_link::{DeviceConfig, HelmetDevice, ImuSource, LinkStats, LogAlerting, ScriptedImu};
use helmet_protocol::{Channel, Command, HelmetState, Millis};

/// Frames in flight per direction
const LINK_QUEUE_DEPTH: usize = 64;

/// Command the rider taps on the companion app
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiderAction {
    /// Device time at which the tap happens (ms)
    pub at_ms: Millis,
    pub command: Command,
}

/// Companion updates seen by the observer, by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateTally {
    pub telemetry: u64,
    pub shadow: u64,
    pub events: u64,
    pub crash_alerts: u64,
    pub windows: u64,
    pub commands: u64,
}

impl UpdateTally {
    fn record(&mut self, update: &CompanionUpdate) {
        match update {
            CompanionUpdate::Telemetry(_) => self.telemetry += 1,
            CompanionUpdate::Shadow(_) => self.shadow += 1,
            CompanionUpdate::Event(_) => self.events += 1,
            CompanionUpdate::CrashAlert(_) => self.crash_alerts += 1,
            CompanionUpdate::WindowCompleted(_) => self.windows += 1,
            CompanionUpdate::CommandSent { .. } => self.commands += 1,
        }
    }
}

/// Outcome of a simulated ride
#[derive(Debug, Clone, Serialize)]
pub struct RideSummary {
    pub ticks: usize,
    pub final_state: HelmetState,
    /// Device state changes as `(device time, new state)`
    pub transitions: Vec<(Millis, HelmetState)>,
    pub fault: bool,
    pub escalations: usize,
    pub link: LinkStats,
    pub companion: CompanionStats,
    /// Companion's view of the helmet when the ride ended
    pub shadow: ShadowState,
    pub updates: UpdateTally,
}

/// Cruise, brake, turn with the signal on, bump, crash, then recovery.
/// One entry per tick.
pub fn default_ride() -> ScriptedImu {
    ScriptedImu::new()
        .cruise(200)
        // Hard braking: 0.8 g forward deceleration
        .then([-0.8, 0.0, 1.0], [0.0; 3], 50)
        .cruise(400)
        // Left turn, sustained yaw
        .then([0.0, 0.0, 1.0], [0.0, 0.0, 150.0], 100)
        .cruise(100)
        // Pothole
        .then([0.0, 0.0, 3.0], [0.0; 3], 1)
        .cruise(100)
        // Impact
        .then([4.0, 0.0, 4.5], [0.0, 90.0, 0.0], 1)
        .cruise(300)
        .then_failure()
        .cruise(300)
}

/// Rider taps matching [`default_ride`] at the default 100 Hz tick
pub fn default_rider() -> Vec<RiderAction> {
    vec![
        RiderAction {
            at_ms: 6_400,
            command: Command::TurnLeftOn,
        },
        RiderAction {
            at_ms: 7_800,
            command: Command::TurnLeftOff,
        },
        RiderAction {
            at_ms: 11_500,
            command: Command::CrashFalseAlarm,
        },
    ]
}

fn log_update(update: &CompanionUpdate) {
    match update {
        CompanionUpdate::Telemetry(frame) => debug!(
            "Telemetry at {}ms: {:.2} g, {:?}",
            frame.sample.timestamp_ms,
            frame.sample.accel_magnitude(),
            frame.state
        ),
        CompanionUpdate::Shadow(shadow) => info!(
            "Shadow now {:?} ({})",
            shadow.state,
            if shadow.authoritative {
                "confirmed"
            } else {
                "predicted"
            }
        ),
        CompanionUpdate::Event(event) => info!(
            "Event {:?} at {}ms (confidence {:.2})",
            event.kind, event.timestamp_ms, event.confidence
        ),
        CompanionUpdate::CrashAlert(alert) => warn!(
            "Crash alert at {}ms, peak {:.2} g: asking rider to confirm",
            alert.timestamp_ms, alert.peak_accel
        ),
        CompanionUpdate::WindowCompleted(window) => {
            let features = window.features();
            info!(
                "{:?} window {} ready: {} samples, peak {:.2} g, jerk max {:.1} g/s",
                window.kind,
                window.id,
                features.sample_count,
                features.accel_magnitude.max,
                features.jerk_max
            );
        }
        CompanionUpdate::CommandSent { command, predicted } => {
            info!("Command {:?} sent, expecting {:?}", command, predicted)
        }
    }
}

/// Run `imu` through a simulated helmet until the script is exhausted.
///
/// The device ticks in virtual time (one tick period per loop, no sleeping)
/// and yields between ticks so the companion and observer tasks keep up.
pub async fn run_ride(
    config: &DeviceConfig,
    companion_config: CompanionConfig,
    mut imu: ScriptedImu,
    rider: Vec<RiderAction>,
) -> anyhow::Result<RideSummary> {
    config.validate()?;
    let period = config.tick_period_ms();
    info!("Starting ride: {} ticks of {}ms", imu.remaining(), period);

    let (to_companion, mut companion_inbound) = mpsc::channel::<Inbound>(LINK_QUEUE_DEPTH);
    let (to_device, mut device_inbound) = mpsc::channel::<(Channel, Vec<u8>)>(LINK_QUEUE_DEPTH);

    let (mut service, mut updates) = CompanionEventService::new(companion_config);
    let shadow = service.subscribe_shadow();

    let companion = tokio::spawn(async move {
        let mut transport = ChannelTransport::new(to_device, |channel, bytes| (channel, bytes));
        service.run(&mut companion_inbound, &mut transport).await;
        service.stats().clone()
    });

    let observer = tokio::spawn(async move {
        let mut tally = UpdateTally::default();
        while let Some(update) = updates.recv().await {
            log_update(&update);
            tally.record(&update);
        }
        tally
    });

    let mut device = HelmetDevice::new(config, LogAlerting::default());
    let mut transport = ChannelTransport::new(to_companion.clone(), Inbound::Frame);
    let mut rider = rider.into_iter().peekable();
    let mut transitions = Vec::new();
    let mut last_state = device.state();
    let mut now: Millis = 0;
    let mut ticks = 0;

    while !imu.is_exhausted() {
        while let Some(action) = rider.next_if(|a| a.at_ms <= now) {
            info!("Rider taps {:?} at {}ms", action.command, now);
            to_companion.send(Inbound::Command(action.command)).await?;
        }

        while let Ok((channel, bytes)) = device_inbound.try_recv() {
            if let Err(e) = device.receive(channel, &bytes) {
                warn!("Device rejected inbound frame: {}", e);
            }
        }

        let report = device.tick(now, imu.read(now), &mut transport);
        if report.state != last_state {
            info!("Helmet {:?} -> {:?} at {}ms", last_state, report.state, now);
            transitions.push((now, report.state));
            last_state = report.state;
        }
        for (command, outcome) in &report.commands {
            debug!("Applied {:?}: {:?}", command, outcome);
        }

        ticks += 1;
        now = now.wrapping_add(period);
        tokio::task::yield_now().await;
    }

    // Closing the companion's inbound ends its loop, which in turn closes
    // the update stream.
    drop(transport);
    drop(to_companion);
    let companion_stats = companion.await?;
    let updates = observer.await?;
    let shadow = *shadow.borrow();

    let summary = RideSummary {
        ticks,
        final_state: device.state(),
        transitions,
        fault: device.fault(),
        escalations: device.alerting().escalations,
        link: device.adapter().stats().clone(),
        companion: companion_stats,
        shadow,
        updates,
    };
    info!(
        "Ride finished after {} ticks in {:?}",
        summary.ticks, summary.final_state
    );
    Ok(summary)
}
