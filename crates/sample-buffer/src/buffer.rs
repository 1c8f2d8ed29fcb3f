//! Sample Ring Buffer Implementation

use crate::peak::PeakTracker;
use crate::{elapsed_ms, ImuSample};

/// Default buffer capacity (SENSOR_SAMPLE_SIZE smoothing window)
pub const DEFAULT_CAPACITY: usize = 10;

/// Stored sample plus the per-sample values the statistics are built from
#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    sample: ImuSample,
    magnitude: f32,
    jerk: f32,
}

/// Fixed-capacity ring of IMU samples with rolling statistics.
///
/// Every query is O(1): sums are maintained on push/evict and peaks come
/// from monotonic deques. Sums are re-derived each time the write head
/// wraps, which keeps float drift bounded at amortized O(1) cost.
pub struct SampleBuffer {
    /// Pre-allocated storage
    storage: Box<[Slot]>,
    /// Capacity of the buffer
    capacity: usize,
    /// Next write position
    head: usize,
    /// Number of valid samples
    len: usize,
    /// Total samples written (doubles as the sequence number source)
    total_written: u64,
    magnitude_sum: f64,
    accel_sum: [f64; 3],
    gyro_sum: [f64; 3],
    peak_magnitude: PeakTracker,
    peak_jerk: PeakTracker,
    /// Timestamp and magnitude of the newest sample, for jerk
    last: Option<(u32, f32)>,
    latest_jerk: f32,
}

impl SampleBuffer {
    /// Create a new buffer with given capacity (0 is treated as 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: vec![Slot::default(); capacity].into_boxed_slice(),
            capacity,
            head: 0,
            len: 0,
            total_written: 0,
            magnitude_sum: 0.0,
            accel_sum: [0.0; 3],
            gyro_sum: [0.0; 3],
            peak_magnitude: PeakTracker::with_capacity(capacity),
            peak_jerk: PeakTracker::with_capacity(capacity),
            last: None,
            latest_jerk: 0.0,
        }
    }

    /// Create a buffer with the default smoothing capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Push a sample into the buffer (overwrites oldest if full)
    pub fn push(&mut self, sample: ImuSample) {
        let magnitude = sample.accel_magnitude();
        let jerk = match self.last {
            Some((last_ts, last_mag)) => {
                let dt_s = elapsed_ms(sample.timestamp_ms, last_ts).max(1) as f32 / 1000.0;
                (magnitude - last_mag).abs() / dt_s
            }
            None => 0.0,
        };

        if self.len == self.capacity {
            let evicted = self.storage[self.head];
            self.subtract(&evicted);
        } else {
            self.len += 1;
        }

        let slot = Slot {
            sample,
            magnitude,
            jerk,
        };
        self.storage[self.head] = slot;
        self.add(&slot);

        let seq = self.total_written;
        self.total_written += 1;
        self.head = (self.head + 1) % self.capacity;

        let oldest_seq = self.total_written - self.len as u64;
        self.peak_magnitude.push(seq, magnitude);
        self.peak_magnitude.evict_before(oldest_seq);
        self.peak_jerk.push(seq, jerk);
        self.peak_jerk.evict_before(oldest_seq);

        self.last = Some((sample.timestamp_ms, magnitude));
        self.latest_jerk = jerk;

        if self.head == 0 {
            self.resync();
        }
    }

    /// Mean acceleration magnitude over the buffered samples (g)
    pub fn moving_average_magnitude(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        (self.magnitude_sum / self.len as f64) as f32
    }

    /// Per-axis mean acceleration (g)
    pub fn mean_accel(&self) -> [f32; 3] {
        self.mean_of(&self.accel_sum)
    }

    /// Per-axis mean angular velocity (deg/s)
    pub fn mean_gyro(&self) -> [f32; 3] {
        self.mean_of(&self.gyro_sum)
    }

    /// Largest acceleration magnitude in the buffer (g)
    pub fn peak_magnitude(&self) -> f32 {
        self.peak_magnitude.max()
    }

    /// Largest jerk in the buffer (g/s)
    pub fn peak_jerk(&self) -> f32 {
        self.peak_jerk.max()
    }

    /// Jerk of the newest sample against its predecessor (g/s)
    pub fn latest_jerk(&self) -> f32 {
        self.latest_jerk
    }

    /// Newest sample, if any
    pub fn latest(&self) -> Option<&ImuSample> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.capacity - 1) % self.capacity;
        Some(&self.storage[idx].sample)
    }

    /// Iterate samples oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ImuSample> + '_ {
        let start = (self.head + self.capacity - self.len) % self.capacity;
        (0..self.len).map(move |i| &self.storage[(start + i) % self.capacity].sample)
    }

    /// Chronological copy of the buffered samples
    pub fn snapshot(&self) -> Vec<ImuSample> {
        self.iter().copied().collect()
    }

    /// Read the last N samples (most recent first)
    pub fn read_last(&self, count: usize) -> Vec<ImuSample> {
        let count = count.min(self.len);
        (0..count)
            .map(|i| {
                let idx = (self.head + self.capacity - 1 - i) % self.capacity;
                self.storage[idx].sample
            })
            .collect()
    }

    /// Get the number of samples currently in the buffer
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer holds `capacity` samples
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len as f64 / self.capacity as f64
    }

    /// Get total samples written (for statistics)
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Clear the buffer and its statistics
    pub fn clear(&mut self) {
        self.len = 0;
        self.magnitude_sum = 0.0;
        self.accel_sum = [0.0; 3];
        self.gyro_sum = [0.0; 3];
        self.peak_magnitude.clear();
        self.peak_jerk.clear();
        self.last = None;
        self.latest_jerk = 0.0;
    }

    fn add(&mut self, slot: &Slot) {
        self.magnitude_sum += slot.magnitude as f64;
        for (sum, v) in self.accel_sum.iter_mut().zip(slot.sample.accel()) {
            *sum += v as f64;
        }
        for (sum, v) in self.gyro_sum.iter_mut().zip(slot.sample.gyro()) {
            *sum += v as f64;
        }
    }

    fn subtract(&mut self, slot: &Slot) {
        self.magnitude_sum -= slot.magnitude as f64;
        for (sum, v) in self.accel_sum.iter_mut().zip(slot.sample.accel()) {
            *sum -= v as f64;
        }
        for (sum, v) in self.gyro_sum.iter_mut().zip(slot.sample.gyro()) {
            *sum -= v as f64;
        }
    }

    fn resync(&mut self) {
        self.magnitude_sum = 0.0;
        self.accel_sum = [0.0; 3];
        self.gyro_sum = [0.0; 3];
        let start = (self.head + self.capacity - self.len) % self.capacity;
        for i in 0..self.len {
            let slot = self.storage[(start + i) % self.capacity];
            self.add(&slot);
        }
    }

    fn mean_of(&self, sums: &[f64; 3]) -> [f32; 3] {
        if self.len == 0 {
            return [0.0; 3];
        }
        let n = self.len as f64;
        [(sums[0] / n) as f32, (sums[1] / n) as f32, (sums[2] / n) as f32]
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
