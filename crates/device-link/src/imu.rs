//! IMU sources

use std::collections::VecDeque;

use crate::error::ImuError;
use helmet_protocol::{ImuSample, Millis};

/// Something the device can read one sample from per tick
pub trait ImuSource {
    /// Read the current sample, stamped with `now`
    fn read(&mut self, now: Millis) -> Result<ImuSample, ImuError>;
}

/// One scripted tick
#[derive(Debug, Clone, Copy)]
enum Step {
    Reading { accel: [f32; 3], gyro: [f32; 3] },
    Failure,
}

/// Replays a fixed script of readings, one per `read`
#[derive(Debug, Clone, Default)]
pub struct ScriptedImu {
    steps: VecDeque<Step>,
}

impl ScriptedImu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `ticks` identical readings
    pub fn then(mut self, accel: [f32; 3], gyro: [f32; 3], ticks: usize) -> Self {
        self.steps
            .extend(std::iter::repeat(Step::Reading { accel, gyro }).take(ticks));
        self
    }

    /// Append `ticks` level riding at 1 g with no rotation
    pub fn cruise(self, ticks: usize) -> Self {
        self.then([0.0, 0.0, 1.0], [0.0; 3], ticks)
    }

    /// Append one failed read
    pub fn then_failure(mut self) -> Self {
        self.steps.push_back(Step::Failure);
        self
    }

    /// Remaining scripted ticks
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.steps.is_empty()
    }
}

impl ImuSource for ScriptedImu {
    fn read(&mut self, now: Millis) -> Result<ImuSample, ImuError> {
        match self.steps.pop_front() {
            Some(Step::Reading { accel, gyro }) => Ok(ImuSample::new(now, accel, gyro)),
            Some(Step::Failure) => Err(ImuError::Read("scripted bus error".into())),
            None => Err(ImuError::NotInitialized),
        }
    }
}
