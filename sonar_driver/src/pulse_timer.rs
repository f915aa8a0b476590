use fugit::MicrosDurationU32;
use log::debug;

use crate::platform::OnePulseTimer;
use crate::{BusyError, ConfigError};

/// Largest acceptable tick rate error, in percent
pub const RATE_TOLERANCE_PERCENT: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseConfig {
    pub pulse_width_ticks: u32,
    pub period_ticks: u32,
    pub tick_rate_hz: u32,
}

impl PulseConfig {
    /// 10us trigger on a 1MHz tick, raised 10us after firing
    pub const fn hcsr04() -> Self {
        Self {
            pulse_width_ticks: 10,
            period_ticks: 20,
            tick_rate_hz: 1_000_000,
        }
    }

    pub fn pulse_width(&self) -> MicrosDurationU32 {
        let micros = self.pulse_width_ticks as u64 * 1_000_000 / self.tick_rate_hz.max(1) as u64;
        MicrosDurationU32::micros(u32::try_from(micros).unwrap_or(u32::MAX))
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self::hcsr04()
    }
}

pub(crate) fn within_tolerance(achieved_hz: u64, wanted_hz: u64) -> bool {
    achieved_hz.abs_diff(wanted_hz) * 100 <= wanted_hz * RATE_TOLERANCE_PERCENT
}

/// Closest integer divisor of `base_clock_hz` that lands within tolerance of `tick_rate_hz`.
fn derive_prescaler(
    base_clock_hz: u32,
    tick_rate_hz: u32,
    max_prescaler: u32,
) -> Result<u32, ConfigError> {
    if base_clock_hz == 0 || tick_rate_hz == 0 {
        return Err(ConfigError::UnachievableRate);
    }

    let base = base_clock_hz as u64;
    let wanted = tick_rate_hz as u64;
    let floor = base / wanted;

    let best = [floor, floor + 1]
        .into_iter()
        .filter(|p| (1..=max_prescaler as u64).contains(p))
        .min_by_key(|p| (base / p).abs_diff(wanted))
        .ok_or(ConfigError::UnachievableRate)?;

    if within_tolerance(base / best, wanted) {
        Ok(best as u32)
    } else {
        Err(ConfigError::UnachievableRate)
    }
}

/// One trigger pulse per [`PulseTimer::fire`], never recurring.
pub struct PulseTimer<T> {
    timer: T,
    config: PulseConfig,
    prescaler: u32,
}

impl<T: OnePulseTimer> PulseTimer<T> {
    pub fn configure(
        mut timer: T,
        tick_rate_hz: u32,
        period_ticks: u32,
        pulse_width_ticks: u32,
    ) -> Result<Self, ConfigError> {
        if pulse_width_ticks == 0 || pulse_width_ticks >= period_ticks {
            return Err(ConfigError::InvalidPulseWidth);
        }
        if period_ticks - 1 > T::MAX_PERIOD {
            return Err(ConfigError::PeriodTooLong);
        }

        let prescaler = derive_prescaler(timer.base_clock_hz(), tick_rate_hz, T::MAX_PRESCALER)?;
        timer.configure_timer(prescaler, period_ticks, pulse_width_ticks);

        let config = PulseConfig {
            pulse_width_ticks,
            period_ticks,
            tick_rate_hz,
        };
        debug!(
            "pulse timer: {} Hz / {} -> {} ticks of {}",
            timer.base_clock_hz(),
            prescaler,
            pulse_width_ticks,
            period_ticks
        );

        Ok(Self {
            timer,
            config,
            prescaler,
        })
    }

    pub fn from_config(timer: T, config: PulseConfig) -> Result<Self, ConfigError> {
        Self::configure(
            timer,
            config.tick_rate_hz,
            config.period_ticks,
            config.pulse_width_ticks,
        )
    }

    pub fn fire(&mut self) -> Result<(), BusyError> {
        if self.timer.is_running() {
            return Err(BusyError::TimerBusy);
        }
        self.timer.start();
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.timer.is_running()
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn prescaler(&self) -> u32 {
        self.prescaler
    }

    pub fn achieved_rate_hz(&self) -> u32 {
        self.timer.base_clock_hz() / self.prescaler
    }

    pub fn free(self) -> T {
        self.timer
    }
}
