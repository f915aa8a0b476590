//! Capabilities a board has to provide. Pin muxing and clock trees are done once by the board
//! crate before any of these are handed over.

/// A timer channel that can emit a single pulse and then stop on its own.
pub trait OnePulseTimer {
    /// Largest auto-reload value the counter supports. ARR is `period - 1`, so the longest
    /// period is `MAX_PERIOD + 1` ticks.
    const MAX_PERIOD: u32;
    /// Largest clock divisor, e.g. 65536 for a 16 bit prescaler register
    const MAX_PRESCALER: u32 = 65_536;

    /// Frequency feeding the prescaler
    fn base_clock_hz(&self) -> u32;

    /// Output stays idle until the counter reaches `period_ticks - pulse_width_ticks`,
    /// is active until `period_ticks`, and the counter stops at the update event.
    /// `prescaler` is the divisor itself, not the register value.
    fn configure_timer(&mut self, prescaler: u32, period_ticks: u32, pulse_width_ticks: u32);

    /// Reset the counter to zero and let it run for one period
    fn start(&mut self);

    fn is_running(&self) -> bool;
}

/// The interrupt line the echo input is wired to.
pub trait EdgeInterrupt {
    /// Enabling also discards any edge that latched while the line was off.
    fn configure_edge_interrupt(&mut self, enabled: bool);
}

/// Free running counter used to timestamp edges. Wraps at `u32::MAX`.
pub trait TickCounter {
    fn read_tick_counter(&self) -> u32;
    fn tick_rate_hz(&self) -> u32;
}

impl<T: TickCounter> TickCounter for &T {
    fn read_tick_counter(&self) -> u32 {
        (**self).read_tick_counter()
    }

    fn tick_rate_hz(&self) -> u32 {
        (**self).tick_rate_hz()
    }
}
