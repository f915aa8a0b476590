use stm32f4xx_hal::gpio::{Output, PushPull, PD12, PD14, PD15};

pub type GreenLed = PD12<Output<PushPull>>;
pub type RedLed = PD14<Output<PushPull>>;
pub type BlueLed = PD15<Output<PushPull>>;

/// Green for a valid reading, red for a timeout or out of range echo
pub struct StatusLeds {
    pub green: GreenLed,
    pub red: RedLed,
    pub blue: BlueLed,
}

impl StatusLeds {
    pub fn show_reading(&mut self, valid: bool) {
        if valid {
            self.green.set_high();
            self.red.set_low();
        } else {
            self.green.set_low();
            self.red.set_high();
        }
    }

    pub fn heartbeat(&mut self) {
        self.blue.toggle();
    }
}
