//! Blocking measurement loop, readings printed over semihosting.
#![no_main]
#![no_std]

use core::cell::RefCell;
use core::fmt::Write;

use panic_halt as _;

use cortex_m::interrupt::Mutex;
use cortex_m_rt::entry;
use cortex_m_semihosting::hio;
use stm32f4xx_hal::{
    pac::{self, interrupt},
    prelude::*,
};

use sonar_driver::{EchoCapture, EdgeLatch, PulseConfig, SensorDriver};
use sonar_hardware::{echo_line::EchoLine, SonarHardware};

static LATCH: EdgeLatch = EdgeLatch::new();
static ECHO_LINE: Mutex<RefCell<Option<EchoLine>>> = Mutex::new(RefCell::new(None));

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().expect("Failed to get device periph");
    let cp = cortex_m::peripheral::Peripherals::take().expect("Failed to get core periph");

    let mut stdout = hio::hstdout().map_err(|_| core::fmt::Error).unwrap();

    let config = PulseConfig::hcsr04();
    let hw = SonarHardware::init(dp, cp, config.tick_rate_hz.Hz());
    let mut delay = hw.delay;

    cortex_m::interrupt::free(|cs| ECHO_LINE.borrow(cs).replace(Some(hw.echo_line)));

    let echo = EchoCapture::new(&LATCH, hw.echo_irq, hw.ticks);
    let mut sensor = match SensorDriver::new(config, hw.trigger, echo) {
        Ok(s) => s,
        Err(e) => {
            writeln!(stdout, "Couldn't create sensor: {:?}", e).unwrap();
            panic!();
        }
    };
    let timeout = sensor.range_timeout_ticks(2_000);

    loop {
        match sensor.measure(timeout) {
            Ok(r) if r.valid => writeln!(stdout, "Distance read: {} cm", r.distance_cm).unwrap(),
            Ok(_) => writeln!(stdout, "No echo").unwrap(),
            Err(e) => writeln!(stdout, "Sensor busy: {:?}", e).unwrap(),
        }
        delay.delay_ms(100_u32);
    }
}

#[interrupt]
fn EXTI15_10() {
    cortex_m::interrupt::free(|cs| {
        if let Some(line) = ECHO_LINE.borrow(cs).borrow_mut().as_mut() {
            line.on_interrupt(&LATCH);
        }
    });
}
