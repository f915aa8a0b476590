use core::cell::RefCell;
use core::fmt::Write;

use cortex_m::interrupt::Mutex;
use log::{Level, Record};
use sonar_hardware::serial::DebugSerialPort;

pub type LoggerType = DebugSerialPort;

static SERIAL_LOGGER: Mutex<RefCell<Option<LoggerType>>> = Mutex::new(RefCell::new(None));

pub fn init(logger: LoggerType) {
    cortex_m::interrupt::free(|cs| {
        SERIAL_LOGGER.borrow(cs).replace(Some(logger));
    });
}

pub(super) fn log(record: &Record) {
    let level = match record.level() {
        Level::Trace => "trace",
        Level::Debug => "debug",
        Level::Info => "info",
        Level::Warn => "warn",
        Level::Error => "error",
    };

    cortex_m::interrupt::free(|cs| {
        if let Some(tx) = SERIAL_LOGGER.borrow(cs).borrow_mut().as_mut() {
            // Best effort, a dropped diagnostic line is not worth a fault
            let _ = write!(tx, "{}: {}\r\n", level, record.args());
        }
    });
}
