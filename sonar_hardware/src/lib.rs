#![no_std]

use fugit::HertzU32;
use stm32f4xx_hal::{
    gpio::Edge,
    pac::{CorePeripherals, Peripherals},
    prelude::*,
    rcc::Clocks,
    timer::{SysDelay, Timer},
};

pub mod echo_line;
pub mod led;
pub mod one_pulse;
pub mod serial;
pub mod tick_counter;

use echo_line::{EchoLine, NvicEdgeInterrupt};
use led::StatusLeds;
use one_pulse::OnePulseTim3;
use serial::DebugSerialPort;
use tick_counter::{TickReader, TickTimer};

pub use sonar_driver;
use sonar_driver::EdgeInterrupt;

/// Everything the ranging firmware needs, configured and split by owner.
pub struct SonarHardware {
    pub clocks: Clocks,
    pub delay: SysDelay,
    pub leds: StatusLeds,

    pub dbg_serial: DebugSerialPort,

    /// One-pulse trigger output, PA6
    pub trigger: OnePulseTim3,
    /// Gate for the echo interrupt, owned by the driver
    pub echo_irq: NvicEdgeInterrupt,
    /// Echo input, PB10, owned by the EXTI15_10 handler
    pub echo_line: EchoLine,

    pub tick_timer: TickTimer,
    pub ticks: TickReader,
}

impl SonarHardware {
    /// `tick_rate` is what the timestamp counter runs at; give the driver the same rate so
    /// trigger and echo share one clock domain.
    pub fn init(mut pac: Peripherals, core: CorePeripherals, tick_rate: HertzU32) -> Self {
        let mut syscfg = pac.SYSCFG.constrain();

        let rcc = pac.RCC.constrain();
        let clocks = rcc
            .cfgr
            .use_hse(8.MHz())
            .sysclk(168.MHz())
            .pclk1(42.MHz())
            .freeze();
        let delay = core.SYST.delay(&clocks);

        let gpioa = pac.GPIOA.split();
        let gpiob = pac.GPIOB.split();
        let gpiod = pac.GPIOD.split();

        let leds = StatusLeds {
            green: gpiod.pd12.into_push_pull_output(),
            red: gpiod.pd14.into_push_pull_output(),
            blue: gpiod.pd15.into_push_pull_output(),
        };

        let debug_tx_pin = gpioa.pa9.into_alternate();
        let dbg_serial = pac
            .USART1
            .tx(debug_tx_pin, 115200.bps(), &clocks)
            .unwrap();

        // TIM3 and TIM5 both hang off APB1
        let timclk = clocks.timclk1().raw();

        let tick_timer = TickTimer::new(Timer::new(pac.TIM5, &clocks), timclk, tick_rate.raw());
        let ticks = tick_timer.reader();

        let trigger = OnePulseTim3::new(
            Timer::new(pac.TIM3, &clocks),
            gpioa.pa6.into_alternate(),
            timclk,
        );

        let mut echo_pin = gpiob.pb10.into_pull_down_input();
        echo_pin.make_interrupt_source(&mut syscfg);
        echo_pin.trigger_on_edge(&mut pac.EXTI, Edge::RisingFalling);
        echo_pin.enable_interrupt(&mut pac.EXTI);

        let mut echo_irq = NvicEdgeInterrupt::echo();
        echo_irq.configure_edge_interrupt(false);

        Self {
            clocks,
            delay,
            leds,
            dbg_serial,
            trigger,
            echo_irq,
            echo_line: EchoLine::new(echo_pin, ticks),
            tick_timer,
            ticks,
        }
    }
}
