use stm32f4xx_hal::{pac::USART1, serial::Tx};

// TX only on PA9
pub type DebugSerialPort = Tx<USART1>;
