//! Bench stand-ins for the platform traits. Scheduled echo edges are handed to the latch the
//! moment the simulated counter passes them, the same way the EXTI handler would cut into a
//! polling loop on hardware.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;

use crate::echo_capture::{Edge, EdgeLatch};
use crate::platform::{EdgeInterrupt, OnePulseTimer, TickCounter};

pub const TICK_RATE_HZ: u32 = 1_000_000;

#[derive(Clone, Default)]
pub struct SimTimer {
    pub running: Rc<Cell<bool>>,
    pub fired: Rc<Cell<u32>>,
    pub configured: Rc<Cell<Option<(u32, u32, u32)>>>,
    base_clock_hz: u32,
}

impl SimTimer {
    pub fn new(base_clock_hz: u32) -> Self {
        Self {
            base_clock_hz,
            ..Default::default()
        }
    }
}

impl OnePulseTimer for SimTimer {
    const MAX_PERIOD: u32 = 0xFFFF;

    fn base_clock_hz(&self) -> u32 {
        self.base_clock_hz
    }

    fn configure_timer(&mut self, prescaler: u32, period_ticks: u32, pulse_width_ticks: u32) {
        self.configured
            .set(Some((prescaler, period_ticks, pulse_width_ticks)));
    }

    fn start(&mut self) {
        self.fired.set(self.fired.get() + 1);
    }

    fn is_running(&self) -> bool {
        self.running.get()
    }
}

#[derive(Clone, Default)]
pub struct SimEdgeInterrupt {
    pub enabled: Rc<Cell<bool>>,
}

impl EdgeInterrupt for SimEdgeInterrupt {
    fn configure_edge_interrupt(&mut self, enabled: bool) {
        self.enabled.set(enabled);
    }
}

/// Counter that moves `step` ticks every time it is read.
pub struct SimClock<'a> {
    latch: &'a EdgeLatch,
    irq: SimEdgeInterrupt,
    start: u32,
    step: u32,
    tick_rate_hz: u32,
    elapsed: Cell<u64>,
    // (ticks since start, edge), kept sorted
    pending: RefCell<Vec<(u64, Edge)>>,
}

impl<'a> SimClock<'a> {
    pub fn new(latch: &'a EdgeLatch, start: u32, step: u32) -> Self {
        Self {
            latch,
            irq: SimEdgeInterrupt::default(),
            start,
            step,
            tick_rate_hz: TICK_RATE_HZ,
            elapsed: Cell::new(0),
            pending: RefCell::new(Vec::new()),
        }
    }

    pub fn with_tick_rate(mut self, tick_rate_hz: u32) -> Self {
        self.tick_rate_hz = tick_rate_hz;
        self
    }

    /// Handle onto the interrupt line this clock delivers through.
    pub fn edge_interrupt(&self) -> SimEdgeInterrupt {
        self.irq.clone()
    }

    /// Schedule an edge `after` ticks from the current simulated time.
    pub fn schedule(&self, after: u64, edge: Edge) {
        let at = self.elapsed.get() + after;
        let mut pending = self.pending.borrow_mut();
        pending.push((at, edge));
        pending.sort_by_key(|(t, _)| *t);
    }

    /// Schedule a full echo pulse.
    pub fn echo(&self, after: u64, width: u64) {
        self.schedule(after, Edge::Rising);
        self.schedule(after + width, Edge::Falling);
    }

    pub fn advance(&self, ticks: u64) {
        self.elapsed.set(self.elapsed.get() + ticks);
        self.deliver();
    }

    fn raw(&self, elapsed: u64) -> u32 {
        self.start.wrapping_add(elapsed as u32)
    }

    fn deliver(&self) {
        let now = self.elapsed.get();
        let mut pending = self.pending.borrow_mut();
        while let Some(&(at, edge)) = pending.first() {
            if at > now {
                break;
            }
            pending.remove(0);
            // A masked line loses the edge
            if self.irq.enabled.get() {
                self.latch.on_edge(edge, self.raw(at));
            }
        }
    }
}

impl TickCounter for SimClock<'_> {
    fn read_tick_counter(&self) -> u32 {
        self.deliver();
        let now = self.raw(self.elapsed.get());
        self.elapsed.set(self.elapsed.get() + self.step as u64);
        now
    }

    fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }
}

/// Async delay that hands control back to the executor once per call.
#[derive(Default)]
pub struct SimDelay {
    pub yields: u32,
}

struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

impl DelayNs for SimDelay {
    async fn delay_ns(&mut self, _ns: u32) {
        self.yields += 1;
        YieldOnce(false).await
    }
}
