#![no_std]
#![no_main]

mod config;
mod logging;

#[cfg(feature = "defmt_logger")]
use panic_probe as _;

#[cfg(all(feature = "serial_logger", not(feature = "defmt_logger")))]
use panic_halt as _;

use sonar_driver::EdgeLatch;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Written only by the echo interrupt while a window is open
static ECHO_LATCH: EdgeLatch = EdgeLatch::new();

#[rtic::app(device = stm32f4xx_hal::pac, dispatchers = [USART3, UART4])]
mod app {
    use super::*;

    use log::{error, info, warn};
    use rtic_monotonics::{stm32::Tim2, Monotonic};
    use rtic_sync::{
        channel::{Receiver, Sender},
        make_channel,
    };
    use sonar_driver::{EchoCapture, Reading, SensorDriver};
    use sonar_hardware::{
        echo_line::{EchoLine, NvicEdgeInterrupt},
        led::StatusLeds,
        one_pulse::OnePulseTim3,
        tick_counter::TickReader,
        SonarHardware,
    };

    type Sensor = SensorDriver<'static, OnePulseTim3, NvicEdgeInterrupt, TickReader>;
    type ReadingTx = Sender<'static, Reading, { config::READING_QUEUE_DEPTH }>;
    type ReadingRx = Receiver<'static, Reading, { config::READING_QUEUE_DEPTH }>;

    #[shared]
    struct Shared {
        leds: StatusLeds,
    }

    #[local]
    struct Local {
        sensor: Sensor,
        timeout_ticks: u32,
        echo_line: EchoLine,
        reading_tx: ReadingTx,
        reading_rx: ReadingRx,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        // set DBGMCU to allow wfi in idle function while using defmt
        cx.device.DBGMCU.cr.modify(|_, w| {
            w.dbg_sleep().set_bit();
            w.dbg_standby().set_bit();
            w.dbg_stop().set_bit()
        });
        // enabling the dma1 clock keeps one AHB bus master active, which prevents SRAM from reading as 0's
        // https://github.com/probe-rs/probe-rs/issues/350#issuecomment-740550519
        cx.device.RCC.ahb1enr.modify(|_, w| w.dma1en().enabled());

        let hw = SonarHardware::init(cx.device, cx.core, config::TICK_RATE);

        #[cfg(feature = "serial_logger")]
        logging::serial_logger::init(hw.dbg_serial);
        if logging::init(config::LOG_LEVEL).is_err() {
            panic!("logger installed twice");
        }
        info!("{} v{}", NAME, VERSION);

        let token = rtic_monotonics::create_stm32_tim2_monotonic_token!();
        Tim2::start(hw.clocks.timclk1().raw(), token);

        let echo = EchoCapture::new(&ECHO_LATCH, hw.echo_irq, hw.ticks);
        let sensor = match SensorDriver::new(config::PULSE, hw.trigger, echo) {
            Ok(s) => s.with_estimator(config::ESTIMATOR),
            Err(e) => {
                error!("sensor setup failed: {:?}", e);
                panic!("sensor setup failed");
            }
        };
        let timeout_ticks = sensor.range_timeout_ticks(config::ECHO_MARGIN_TICKS);
        info!(
            "trigger {}us every {}ms, echo timeout {} ticks",
            sensor.config().pulse_width().to_micros(),
            config::MEASURE_INTERVAL.to_millis(),
            timeout_ticks
        );

        let (reading_tx, reading_rx) = make_channel!(Reading, { config::READING_QUEUE_DEPTH });

        ranging::spawn().ok();
        report::spawn().ok();
        heartbeat::spawn().ok();

        (
            Shared { leds: hw.leds },
            Local {
                sensor,
                timeout_ticks,
                echo_line: hw.echo_line,
                reading_tx,
                reading_rx,
            },
        )
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }

    /// The outer polling loop: one measurement per interval, results queued for reporting.
    #[task(priority = 2, local = [sensor, timeout_ticks, reading_tx])]
    async fn ranging(cx: ranging::Context) {
        let mut delay = Tim2;
        loop {
            let next = Tim2::now() + config::MEASURE_INTERVAL;

            match cx
                .local
                .sensor
                .measure_async(*cx.local.timeout_ticks, &mut delay)
                .await
            {
                Ok(reading) => {
                    if cx.local.reading_tx.try_send(reading).is_err() {
                        warn!("report queue full, reading dropped");
                    }
                }
                Err(e) => warn!("sensor busy: {:?}", e),
            }

            let spurious = cx.local.sensor.spurious_edges();
            if spurious > 0 {
                log::debug!("spurious echo edges so far: {}", spurious);
            }

            Tim2::delay_until(next).await;
        }
    }

    #[task(priority = 1, shared = [leds], local = [reading_rx])]
    async fn report(mut cx: report::Context) {
        while let Ok(reading) = cx.local.reading_rx.recv().await {
            cx.shared.leds.lock(|leds| leds.show_reading(reading.valid));
        }
    }

    #[task(priority = 1, shared = [leds])]
    async fn heartbeat(mut cx: heartbeat::Context) {
        loop {
            cx.shared.leds.lock(|leds| leds.heartbeat());
            Tim2::delay(config::HEARTBEAT_INTERVAL).await;
        }
    }

    #[task(priority = 3, binds = EXTI15_10, local = [echo_line])]
    fn echo_edge(cx: echo_edge::Context) {
        cx.local.echo_line.on_interrupt(&ECHO_LATCH);
    }
}
