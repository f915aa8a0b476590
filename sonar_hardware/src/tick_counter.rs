use stm32f4xx_hal::{pac::TIM5, timer::Timer};

use sonar_driver::TickCounter;

/// TIM5 free running over its full 32 bits, timestamps for the echo edges.
pub struct TickTimer {
    _tim: TIM5,
    tick_rate_hz: u32,
}

impl TickTimer {
    pub fn new(timer: Timer<TIM5>, base_clock_hz: u32, tick_rate_hz: u32) -> Self {
        let tim = timer.release();
        let prescaler = (base_clock_hz / tick_rate_hz.max(1)).clamp(1, 0x1_0000);

        tim.cr1.modify(|_, w| w.cen().clear_bit());
        unsafe {
            tim.psc.write(|w| w.bits(prescaler - 1));
            tim.arr.write(|w| w.bits(u32::MAX));
            tim.cnt.write(|w| w.bits(0));
        }
        tim.egr.write(|w| w.ug().set_bit());
        tim.sr.modify(|_, w| w.uif().clear_bit());
        tim.cr1.modify(|_, w| w.cen().set_bit());

        Self {
            _tim: tim,
            tick_rate_hz: base_clock_hz / prescaler,
        }
    }

    /// Read-only handles, one for the driver and one for the interrupt handler.
    pub fn reader(&self) -> TickReader {
        TickReader {
            tick_rate_hz: self.tick_rate_hz,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TickReader {
    tick_rate_hz: u32,
}

impl TickCounter for TickReader {
    fn read_tick_counter(&self) -> u32 {
        // CNT is only ever read here, TickTimer owns the configuration
        unsafe { (*TIM5::ptr()).cnt.read().bits() }
    }

    fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }
}
