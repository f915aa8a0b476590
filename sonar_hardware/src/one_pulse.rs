//! TIM3 channel 1 in one-pulse mode, driving the sensor's trigger input on PA6.
//!
//! PWM mode 2 keeps the output low while CNT < CCR1 and high from CCR1 up to ARR. With OPM
//! set the counter clears CEN on the update event, so every start gives exactly one pulse.

use stm32f4xx_hal::{
    gpio::{Alternate, Pin},
    pac::TIM3,
    timer::Timer,
};

use sonar_driver::OnePulseTimer;

pub type TriggerPin = Pin<'A', 6_u8, Alternate<2>>;

pub struct OnePulseTim3 {
    tim: TIM3,
    _pin: TriggerPin,
    base_clock_hz: u32,
}

impl OnePulseTim3 {
    /// `timer` already has its bus clock enabled and reset.
    pub fn new(timer: Timer<TIM3>, pin: TriggerPin, base_clock_hz: u32) -> Self {
        let tim = timer.release();

        tim.cr1.modify(|_, w| w.cen().clear_bit());
        tim.ccmr1_output().modify(|_, w| {
            w.cc1s().output();
            w.oc1m().pwm_mode2();
            w.oc1pe().enabled()
        });
        tim.ccer.modify(|_, w| w.cc1p().clear_bit().cc1e().set_bit());
        tim.cr1.modify(|_, w| w.arpe().enabled().opm().set_bit());

        Self {
            tim,
            _pin: pin,
            base_clock_hz,
        }
    }
}

impl OnePulseTimer for OnePulseTim3 {
    const MAX_PERIOD: u32 = 0xFFFF;

    fn base_clock_hz(&self) -> u32 {
        self.base_clock_hz
    }

    fn configure_timer(&mut self, prescaler: u32, period_ticks: u32, pulse_width_ticks: u32) {
        self.tim.cr1.modify(|_, w| w.cen().clear_bit());

        // Counter runs 0..=ARR, output is high for the last `pulse_width_ticks` of it
        unsafe {
            self.tim.psc.write(|w| w.bits(prescaler - 1));
            self.tim.arr.write(|w| w.bits(period_ticks - 1));
            self.tim
                .ccr1()
                .write(|w| w.bits(period_ticks - pulse_width_ticks));
        }

        // Latch PSC/ARR/CCR1 now rather than at the first overflow
        self.tim.cr1.modify(|_, w| w.urs().set_bit());
        self.tim.egr.write(|w| w.ug().set_bit());
        self.tim.sr.modify(|_, w| w.uif().clear_bit());
        self.tim.cr1.modify(|_, w| w.urs().clear_bit());
    }

    fn start(&mut self) {
        unsafe {
            self.tim.cnt.write(|w| w.bits(0));
        }
        self.tim.cr1.modify(|_, w| w.cen().set_bit());
    }

    fn is_running(&self) -> bool {
        self.tim.cr1.read().cen().bit_is_set()
    }
}
