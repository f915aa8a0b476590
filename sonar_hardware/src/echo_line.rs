use cortex_m::peripheral::NVIC;
use stm32f4xx_hal::{
    gpio::{ExtiPin, Input, Pin},
    pac::{Interrupt, EXTI},
};

use sonar_driver::{Edge, EdgeInterrupt, EdgeLatch, TickCounter};

use crate::tick_counter::TickReader;

pub type EchoPin = Pin<'B', 10, Input>;

// PB10 sits on EXTI line 10, shared with lines 11..=15
const ECHO_EXTI_LINE: u8 = 10;
pub const ECHO_INTERRUPT: Interrupt = Interrupt::EXTI15_10;

/// Gates the echo interrupt at the NVIC so the pin itself can stay with the handler.
pub struct NvicEdgeInterrupt {
    interrupt: Interrupt,
    exti_line: u8,
}

impl NvicEdgeInterrupt {
    pub fn echo() -> Self {
        Self {
            interrupt: ECHO_INTERRUPT,
            exti_line: ECHO_EXTI_LINE,
        }
    }
}

impl EdgeInterrupt for NvicEdgeInterrupt {
    fn configure_edge_interrupt(&mut self, enabled: bool) {
        if enabled {
            // Write-one-to-clear, nothing else touches other lines' bits
            unsafe {
                (*EXTI::ptr())
                    .pr
                    .write(|w| w.bits(1 << self.exti_line));
            }
            NVIC::unpend(self.interrupt);
            unsafe { NVIC::unmask(self.interrupt) };
        } else {
            NVIC::mask(self.interrupt);
        }
    }
}

/// Interrupt side of the echo input: timestamps the edge and feeds the latch.
pub struct EchoLine {
    pin: EchoPin,
    ticks: TickReader,
}

impl EchoLine {
    pub fn new(pin: EchoPin, ticks: TickReader) -> Self {
        Self { pin, ticks }
    }

    /// Call from the EXTI handler
    pub fn on_interrupt(&mut self, latch: &EdgeLatch) {
        let tick = self.ticks.read_tick_counter();
        let edge = if self.pin.is_high() {
            Edge::Rising
        } else {
            Edge::Falling
        };
        self.pin.clear_interrupt_pending_bit();
        latch.on_edge(edge, tick);
    }
}
