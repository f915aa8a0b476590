use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use embedded_hal_async::delay::DelayNs;

use crate::platform::{EdgeInterrupt, TickCounter};
use crate::BusyError;

/// How long the cooperative wait sleeps between looks at the latch
const WAIT_POLL_US: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CaptureStatus {
    Idle = 0,
    Armed = 1,
    RisingSeen = 2,
    Complete = 3,
    TimedOut = 4,
}

impl CaptureStatus {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => CaptureStatus::Armed,
            2 => CaptureStatus::RisingSeen,
            3 => CaptureStatus::Complete,
            4 => CaptureStatus::TimedOut,
            _ => CaptureStatus::Idle,
        }
    }

    /// Still owned by the interrupt side
    pub fn is_pending(&self) -> bool {
        matches!(self, CaptureStatus::Armed | CaptureStatus::RisingSeen)
    }
}

/// Application side view of one echo window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureState {
    pub rising_edge_tick: Option<u64>,
    pub falling_edge_tick: Option<u64>,
    pub state: CaptureStatus,
}

impl CaptureState {
    /// Echo pulse width, only for a complete capture.
    pub fn duration_ticks(&self) -> Option<u64> {
        match (self.state, self.rising_edge_tick, self.falling_edge_tick) {
            (CaptureStatus::Complete, Some(rising), Some(falling)) if falling > rising => {
                Some(falling - rising)
            }
            _ => None,
        }
    }
}

/// Capture state shared with the edge interrupt.
///
/// Meant to live in a `static`. While a window is pending only [`EdgeLatch::on_edge`] moves it
/// forward; the application only reads it once it has settled on `Complete` or `TimedOut`.
/// Tick values are stored before the status that publishes them, and every move out of a
/// pending status is a compare-exchange, so a window forced to `TimedOut` stays that way even
/// if the interrupt fires right behind it.
pub struct EdgeLatch {
    status: AtomicU8,
    armed_at: AtomicU32,
    rising: AtomicU32,
    falling: AtomicU32,
    spurious: AtomicU32,
}

impl Default for EdgeLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeLatch {
    pub const fn new() -> Self {
        Self {
            status: AtomicU8::new(CaptureStatus::Idle as u8),
            armed_at: AtomicU32::new(0),
            rising: AtomicU32::new(0),
            falling: AtomicU32::new(0),
            spurious: AtomicU32::new(0),
        }
    }

    /// Call from the echo line interrupt with the counter value taken at the edge.
    pub fn on_edge(&self, edge: Edge, tick: u32) {
        match (self.status(), edge) {
            (CaptureStatus::Armed, Edge::Rising) => {
                // Counter wrapped since arming
                if tick < self.armed_at.load(Ordering::Relaxed) {
                    self.transition(CaptureStatus::Armed, CaptureStatus::TimedOut);
                    return;
                }
                self.rising.store(tick, Ordering::Relaxed);
                self.transition(CaptureStatus::Armed, CaptureStatus::RisingSeen);
            }
            (CaptureStatus::RisingSeen, Edge::Falling) => {
                if tick <= self.rising.load(Ordering::Relaxed) {
                    self.transition(CaptureStatus::RisingSeen, CaptureStatus::TimedOut);
                    return;
                }
                self.falling.store(tick, Ordering::Relaxed);
                self.transition(CaptureStatus::RisingSeen, CaptureStatus::Complete);
            }
            _ => {
                self.spurious.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus::from_bits(self.status.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> CaptureState {
        let state = self.status();
        let rising_edge_tick = match state {
            CaptureStatus::RisingSeen | CaptureStatus::Complete => {
                Some(self.rising.load(Ordering::Relaxed) as u64)
            }
            _ => None,
        };
        let falling_edge_tick = match state {
            CaptureStatus::Complete => Some(self.falling.load(Ordering::Relaxed) as u64),
            _ => None,
        };

        CaptureState {
            rising_edge_tick,
            falling_edge_tick,
            state,
        }
    }

    /// Edges that arrived when no window expected them
    pub fn spurious_edges(&self) -> u32 {
        self.spurious.load(Ordering::Relaxed)
    }

    fn transition(&self, from: CaptureStatus, to: CaptureStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn open(&self, armed_at: u32) -> Result<(), BusyError> {
        let current = self.status();
        if current.is_pending() {
            return Err(BusyError::CaptureBusy);
        }

        self.armed_at.store(armed_at, Ordering::Relaxed);
        self.rising.store(0, Ordering::Relaxed);
        self.falling.store(0, Ordering::Relaxed);

        if self.transition(current, CaptureStatus::Armed) {
            Ok(())
        } else {
            Err(BusyError::CaptureBusy)
        }
    }

    /// Force a pending window to `TimedOut`. Loses gracefully to an edge that completed it.
    fn expire(&self) {
        let current = self.status();
        if current.is_pending() && !self.transition(current, CaptureStatus::TimedOut) {
            // Rising edge landed in between, retry from the newer status
            self.transition(CaptureStatus::RisingSeen, CaptureStatus::TimedOut);
        }
    }

    /// Drop a window that never got its trigger. An edge may already have moved it on.
    fn close(&self) {
        if !self.transition(CaptureStatus::Armed, CaptureStatus::Idle) {
            self.transition(CaptureStatus::RisingSeen, CaptureStatus::Idle);
        }
    }
}

/// Arms the echo line and waits for the latch to settle.
pub struct EchoCapture<'a, E, C> {
    latch: &'a EdgeLatch,
    irq: E,
    ticks: C,
    armed_at: u32,
}

impl<'a, E, C> EchoCapture<'a, E, C>
where
    E: EdgeInterrupt,
    C: TickCounter,
{
    pub fn new(latch: &'a EdgeLatch, mut irq: E, ticks: C) -> Self {
        irq.configure_edge_interrupt(false);
        Self {
            latch,
            irq,
            ticks,
            armed_at: 0,
        }
    }

    pub fn arm(&mut self) -> Result<(), BusyError> {
        if self.latch.status().is_pending() {
            return Err(BusyError::CaptureBusy);
        }

        let now = self.ticks.read_tick_counter();
        self.latch.open(now)?;
        self.armed_at = now;
        self.irq.configure_edge_interrupt(true);
        Ok(())
    }

    /// One look at the latch. `None` while the window is still open.
    pub fn poll(&mut self, timeout_ticks: u32) -> Option<CaptureState> {
        let status = self.latch.status();
        if !status.is_pending() {
            self.irq.configure_edge_interrupt(false);
            return Some(self.latch.snapshot());
        }

        let now = self.ticks.read_tick_counter();
        let expired = now < self.armed_at || now - self.armed_at >= timeout_ticks;
        if !expired {
            return None;
        }

        self.latch.expire();
        self.irq.configure_edge_interrupt(false);
        Some(self.latch.snapshot())
    }

    /// Spin until the echo completes or `timeout_ticks` pass since [`EchoCapture::arm`].
    pub fn poll_or_wait(&mut self, timeout_ticks: u32) -> CaptureState {
        loop {
            if let Some(capture) = self.poll(timeout_ticks) {
                return capture;
            }
            core::hint::spin_loop();
        }
    }

    /// Same as [`EchoCapture::poll_or_wait`] but sleeps on `delay` between polls.
    pub async fn wait<D: DelayNs>(&mut self, timeout_ticks: u32, delay: &mut D) -> CaptureState {
        loop {
            if let Some(capture) = self.poll(timeout_ticks) {
                return capture;
            }
            delay.delay_us(WAIT_POLL_US).await;
        }
    }

    /// Drop a window that never got its trigger pulse.
    pub(crate) fn abandon(&mut self) {
        self.irq.configure_edge_interrupt(false);
        self.latch.close();
    }

    pub fn latch(&self) -> &'a EdgeLatch {
        self.latch
    }

    pub fn ticks(&self) -> &C {
        &self.ticks
    }

    pub fn free(mut self) -> (E, C) {
        self.irq.configure_edge_interrupt(false);
        (self.irq, self.ticks)
    }
}
