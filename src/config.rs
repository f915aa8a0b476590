use fugit::{HertzU32, MicrosDurationU64};
use log::Level;
use sonar_driver::{distance, DistanceEstimator, PulseConfig};

pub const LOG_LEVEL: Level = Level::Info;

/// 1us ticks, 10us trigger
pub const PULSE: PulseConfig = PulseConfig::hcsr04();
pub const TICK_RATE: HertzU32 = HertzU32::from_raw(PULSE.tick_rate_hz);

pub const ESTIMATOR: DistanceEstimator = DistanceEstimator {
    speed_of_sound_m_per_s: distance::SPEED_OF_SOUND_M_PER_S,
    min_cm: distance::MIN_RANGE_CM,
    max_cm: distance::MAX_RANGE_CM,
};

// The HC-SR04 bursts for ~200us before raising echo
pub const ECHO_MARGIN_TICKS: u32 = 2_000;

// Datasheet asks for 60ms between triggers so old echoes die out
pub const MEASURE_INTERVAL: MicrosDurationU64 = MicrosDurationU64::millis(60);
pub const HEARTBEAT_INTERVAL: MicrosDurationU64 = MicrosDurationU64::millis(500);

pub const READING_QUEUE_DEPTH: usize = 4;
