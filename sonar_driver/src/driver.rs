use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use crate::distance::{DistanceEstimator, Reading};
use crate::echo_capture::{CaptureState, EchoCapture};
use crate::platform::{EdgeInterrupt, OnePulseTimer, TickCounter};
use crate::pulse_timer::{within_tolerance, PulseConfig, PulseTimer};
use crate::{BusyError, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    Idle,
    Triggering,
    AwaitingEcho,
    Resolved,
    TimedOut,
}

/// Trigger, echo capture and distance conversion for one sensor.
pub struct SensorDriver<'a, T, E, C> {
    pulse: PulseTimer<T>,
    echo: EchoCapture<'a, E, C>,
    estimator: DistanceEstimator,
    state: DriverState,
    // timeout of the window in flight
    window_ticks: u32,
}

impl<'a, T, E, C> SensorDriver<'a, T, E, C>
where
    T: OnePulseTimer,
    E: EdgeInterrupt,
    C: TickCounter,
{
    pub fn new(
        config: PulseConfig,
        timer: T,
        echo: EchoCapture<'a, E, C>,
    ) -> Result<Self, ConfigError> {
        let counter_hz = echo.ticks().tick_rate_hz();
        if !within_tolerance(counter_hz as u64, config.tick_rate_hz as u64) {
            return Err(ConfigError::TickRateMismatch);
        }

        let pulse = PulseTimer::from_config(timer, config)?;

        Ok(Self {
            pulse,
            echo,
            estimator: DistanceEstimator::default(),
            state: DriverState::Idle,
            window_ticks: 0,
        })
    }

    pub fn with_estimator(mut self, estimator: DistanceEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// One blocking measurement. Spins for at most `timeout_ticks` after arming.
    pub fn measure(&mut self, timeout_ticks: u32) -> Result<Reading, BusyError> {
        self.trigger(timeout_ticks)?;
        let capture = self.echo.poll_or_wait(timeout_ticks);
        Ok(self.resolve(capture))
    }

    /// Like [`SensorDriver::measure`] but sleeps on `delay` while the echo is in flight.
    ///
    /// Dropping the future mid-wait leaves the window open; the next call reports
    /// [`BusyError::CaptureBusy`] until that window's timeout has run out.
    pub async fn measure_async<D: DelayNs>(
        &mut self,
        timeout_ticks: u32,
        delay: &mut D,
    ) -> Result<Reading, BusyError> {
        self.trigger(timeout_ticks)?;
        let capture = self.echo.wait(timeout_ticks, delay).await;
        Ok(self.resolve(capture))
    }

    /// Echo timeout for the estimator's far limit, plus `margin_ticks`
    pub fn range_timeout_ticks(&self, margin_ticks: u32) -> u32 {
        self.estimator
            .echo_timeout_ticks(self.pulse.config().tick_rate_hz, margin_ticks)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &PulseConfig {
        self.pulse.config()
    }

    pub fn estimator(&self) -> &DistanceEstimator {
        &self.estimator
    }

    pub fn spurious_edges(&self) -> u32 {
        self.echo.latch().spurious_edges()
    }

    pub fn free(self) -> (T, E, C) {
        let timer = self.pulse.free();
        let (irq, ticks) = self.echo.free();
        (timer, irq, ticks)
    }

    fn trigger(&mut self, timeout_ticks: u32) -> Result<(), BusyError> {
        if self.state == DriverState::AwaitingEcho {
            match self.echo.poll(self.window_ticks) {
                Some(_) => debug!("retired abandoned echo window"),
                None => return Err(BusyError::CaptureBusy),
            }
            self.state = DriverState::Idle;
        }

        self.state = DriverState::Triggering;

        // Arm first, a close target echoes back almost immediately
        if let Err(e) = self.echo.arm() {
            self.state = DriverState::Idle;
            return Err(e);
        }
        if let Err(e) = self.pulse.fire() {
            self.echo.abandon();
            self.state = DriverState::Idle;
            return Err(e);
        }

        self.window_ticks = timeout_ticks;
        self.state = DriverState::AwaitingEcho;
        Ok(())
    }

    fn resolve(&mut self, capture: CaptureState) -> Reading {
        let reading = match capture.duration_ticks() {
            Some(ticks) => {
                self.state = DriverState::Resolved;
                let reading = self
                    .estimator
                    .reading_from_ticks(ticks, self.pulse.config().tick_rate_hz);
                if reading.valid {
                    info!("distance={:.1}cm", reading.distance_cm);
                } else {
                    warn!("out of range: {:.1}cm", reading.distance_cm);
                }
                reading
            }
            None => {
                self.state = DriverState::TimedOut;
                info!("timeout");
                Reading::invalid()
            }
        };

        self.state = DriverState::Idle;
        reading
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use core::future::Future;
    use core::pin::pin;
    use core::task::Context;

    use futures::task::noop_waker_ref;

    use super::*;
    use crate::echo_capture::{CaptureStatus, Edge, EdgeLatch};
    use crate::platform::OnePulseTimer;
    use crate::sim::{SimClock, SimDelay, SimEdgeInterrupt, SimTimer};

    const TIMEOUT: u32 = 30_000;

    fn driver<'a>(
        latch: &'a EdgeLatch,
        clock: &'a SimClock<'a>,
        timer: SimTimer,
    ) -> SensorDriver<'a, SimTimer, SimEdgeInterrupt, &'a SimClock<'a>> {
        let echo = EchoCapture::new(latch, clock.edge_interrupt(), clock);
        SensorDriver::new(PulseConfig::hcsr04(), timer, echo).unwrap()
    }

    #[test]
    fn measures_echo_width_as_distance() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5);
        let timer = SimTimer::new(16_000_000);
        let probe = timer.clone();
        let mut sensor = driver(&latch, &clock, timer);

        clock.echo(450, 1160);
        let reading = sensor.measure(TIMEOUT).unwrap();

        assert!(reading.valid);
        assert!((reading.distance_cm - 19.7).abs() <= 0.5, "{}", reading.distance_cm);
        assert_eq!(probe.fired.get(), 1);
        assert_eq!(sensor.state(), DriverState::Idle);
    }

    #[test]
    fn arms_before_firing() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5);
        let irq = clock.edge_interrupt();
        let timer = SimTimer::new(16_000_000);
        let probe = timer.clone();
        let mut sensor = driver(&latch, &clock, timer);

        // A stuck trigger is only noticed after arming, which must then be undone
        probe.running.set(true);
        assert_eq!(sensor.measure(TIMEOUT), Err(BusyError::TimerBusy));
        assert_eq!(latch.status(), CaptureStatus::Idle);
        assert!(!irq.enabled.get());
        assert_eq!(sensor.state(), DriverState::Idle);

        probe.running.set(false);
        clock.echo(10, 580);
        let reading = sensor.measure(TIMEOUT).unwrap();
        assert!(reading.valid);
    }

    /// Reports a pulse still in flight once, with the echo line ringing right after arming.
    struct RingingTimer<'a> {
        latch: &'a EdgeLatch,
        busy_once: Cell<bool>,
        fired: u32,
    }

    impl OnePulseTimer for RingingTimer<'_> {
        const MAX_PERIOD: u32 = 0xFFFF;

        fn base_clock_hz(&self) -> u32 {
            16_000_000
        }

        fn configure_timer(&mut self, _prescaler: u32, _period: u32, _width: u32) {}

        fn start(&mut self) {
            self.fired += 1;
        }

        fn is_running(&self) -> bool {
            if self.busy_once.replace(false) {
                self.latch.on_edge(Edge::Rising, 5);
                true
            } else {
                false
            }
        }
    }

    #[test]
    fn busy_trigger_releases_a_line_that_already_saw_an_edge() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5);
        let irq = clock.edge_interrupt();
        let timer = RingingTimer {
            latch: &latch,
            busy_once: Cell::new(true),
            fired: 0,
        };
        let echo = EchoCapture::new(&latch, clock.edge_interrupt(), &clock);
        let mut sensor = SensorDriver::new(PulseConfig::hcsr04(), timer, echo).unwrap();

        assert_eq!(sensor.measure(TIMEOUT), Err(BusyError::TimerBusy));
        assert_eq!(latch.status(), CaptureStatus::Idle);
        assert!(!irq.enabled.get());
        assert_eq!(sensor.state(), DriverState::Idle);

        clock.echo(450, 1_160);
        let reading = sensor.measure(TIMEOUT).unwrap();
        assert!(reading.valid);

        let (timer, _, _) = sensor.free();
        assert_eq!(timer.fired, 1);
    }

    #[test]
    fn timeout_returns_invalid_and_recovers() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5);
        let mut sensor = driver(&latch, &clock, SimTimer::new(16_000_000));

        clock.schedule(450, Edge::Rising);
        let reading = sensor.measure(TIMEOUT).unwrap();
        assert_eq!(reading, Reading::invalid());
        assert_eq!(sensor.state(), DriverState::Idle);

        clock.echo(450, 2_000);
        let reading = sensor.measure(TIMEOUT).unwrap();
        assert!(reading.valid);
        assert!((reading.distance_cm - 34.3).abs() < 0.1);
    }

    #[test]
    fn counter_wrap_mid_echo_is_a_timeout() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, u32::MAX - 1_000, 5);
        let mut sensor = driver(&latch, &clock, SimTimer::new(16_000_000));

        clock.echo(450, 1_160);
        let reading = sensor.measure(TIMEOUT).unwrap();
        assert!(!reading.valid);
        assert_eq!(sensor.state(), DriverState::Idle);
    }

    #[test]
    fn far_echo_is_reported_out_of_range() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5);
        let mut sensor = driver(&latch, &clock, SimTimer::new(16_000_000));

        clock.echo(450, 26_000);
        let reading = sensor.measure(TIMEOUT).unwrap();
        assert!(!reading.valid);
        assert!(reading.distance_cm > 400.0);
    }

    #[test]
    fn stray_edges_do_not_disturb_a_measurement() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5);
        let mut sensor = driver(&latch, &clock, SimTimer::new(16_000_000));

        clock.schedule(100, Edge::Falling);
        clock.echo(450, 1_160);
        let reading = sensor.measure(TIMEOUT).unwrap();

        assert!(reading.valid);
        assert_eq!(sensor.spurious_edges(), 1);
    }

    #[test]
    fn async_measurement_yields_while_waiting() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5);
        let mut sensor = driver(&latch, &clock, SimTimer::new(16_000_000));
        let mut delay = SimDelay::default();

        clock.echo(450, 1_160);
        let reading =
            futures::executor::block_on(sensor.measure_async(TIMEOUT, &mut delay)).unwrap();

        assert!(reading.valid);
        assert!(delay.yields > 0);
        assert_eq!(sensor.state(), DriverState::Idle);
    }

    #[test]
    fn abandoned_window_keeps_line_busy_until_it_expires() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5);
        let timer = SimTimer::new(16_000_000);
        let probe = timer.clone();
        let mut sensor = driver(&latch, &clock, timer);
        let mut delay = SimDelay::default();

        {
            let mut cx = Context::from_waker(noop_waker_ref());
            let fut = pin!(sensor.measure_async(TIMEOUT, &mut delay));
            assert!(fut.poll(&mut cx).is_pending());
        }
        assert_eq!(sensor.state(), DriverState::AwaitingEcho);

        assert_eq!(sensor.measure(TIMEOUT), Err(BusyError::CaptureBusy));
        assert_eq!(probe.fired.get(), 1);

        clock.advance(TIMEOUT as u64);
        clock.echo(450, 1_160);
        let reading = sensor.measure(TIMEOUT).unwrap();
        assert!(reading.valid);
        assert_eq!(probe.fired.get(), 2);
    }

    #[test]
    fn counter_must_tick_at_configured_rate() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5).with_tick_rate(2_000_000);
        let echo = EchoCapture::new(&latch, clock.edge_interrupt(), &clock);

        let result = SensorDriver::new(PulseConfig::hcsr04(), SimTimer::new(16_000_000), echo);
        assert!(matches!(result, Err(ConfigError::TickRateMismatch)));
    }

    #[test]
    fn range_timeout_matches_far_limit() {
        let latch = EdgeLatch::new();
        let clock = SimClock::new(&latch, 0, 5);
        let sensor = driver(&latch, &clock, SimTimer::new(16_000_000));

        let timeout = sensor.range_timeout_ticks(2_000);
        assert_eq!(
            timeout,
            DistanceEstimator::default().echo_timeout_ticks(1_000_000, 2_000)
        );
    }
}
