use num_traits::float::FloatCore;

/// Dry air at roughly 20C
pub const SPEED_OF_SOUND_M_PER_S: f32 = 343.0;

// HC-SR04 datasheet range
pub const MIN_RANGE_CM: f32 = 2.0;
pub const MAX_RANGE_CM: f32 = 400.0;

/// Round trip time of flight to one-way distance.
pub fn estimate(duration_seconds: f32, speed_of_sound_m_per_s: f32) -> f32 {
    duration_seconds * speed_of_sound_m_per_s * 100.0 / 2.0
}

/// Result of one measurement. Check `valid` before trusting `distance_cm`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    pub distance_cm: f32,
    pub valid: bool,
}

impl Reading {
    pub const fn invalid() -> Self {
        Self {
            distance_cm: 0.0,
            valid: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceEstimator {
    pub speed_of_sound_m_per_s: f32,
    pub min_cm: f32,
    pub max_cm: f32,
}

impl Default for DistanceEstimator {
    fn default() -> Self {
        Self {
            speed_of_sound_m_per_s: SPEED_OF_SOUND_M_PER_S,
            min_cm: MIN_RANGE_CM,
            max_cm: MAX_RANGE_CM,
        }
    }
}

impl DistanceEstimator {
    /// A distance outside `min_cm..=max_cm` is kept in the reading but flagged invalid.
    pub fn reading(&self, duration_seconds: f32) -> Reading {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Reading::invalid();
        }

        let distance_cm = estimate(duration_seconds, self.speed_of_sound_m_per_s);
        Reading {
            distance_cm,
            valid: (self.min_cm..=self.max_cm).contains(&distance_cm),
        }
    }

    pub fn reading_from_ticks(&self, ticks: u64, tick_rate_hz: u32) -> Reading {
        if tick_rate_hz == 0 {
            return Reading::invalid();
        }
        self.reading(ticks as f32 / tick_rate_hz as f32)
    }

    /// Ticks an echo from `max_cm` takes to come back, plus `margin_ticks` for the sensor's
    /// own start-up before it raises the echo line.
    pub fn echo_timeout_ticks(&self, tick_rate_hz: u32, margin_ticks: u32) -> u32 {
        let round_trip_s = self.max_cm * 2.0 / 100.0 / self.speed_of_sound_m_per_s;
        let ticks = (round_trip_s * tick_rate_hz as f32).ceil();
        if ticks >= u32::MAX as f32 {
            return u32::MAX;
        }
        (ticks as u32).saturating_add(margin_ticks)
    }
}
