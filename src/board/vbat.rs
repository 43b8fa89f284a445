//! VBAT through the on-board divider into AIN7 (P0.31).
//!
//! Gain 1/4 against VDD/4 gives a VDD full scale, so a 12-bit result
//! shifted to 16 bits lines up with [`BatteryCalibration`].
//!
//! [`BatteryCalibration`]: page_turner::battery::BatteryCalibration

use embassy_nrf::peripherals::{P0_31, SAADC};
use embassy_nrf::saadc::{self, ChannelConfig, Gain, Reference, Resolution, Saadc, Time};

use page_turner::battery::BatteryAdc;

use super::Irqs;

pub struct VbatAdc {
    saadc: Saadc<'static, 1>,
}

impl VbatAdc {
    pub async fn new(saadc: SAADC, pin: P0_31) -> Self {
        let mut channel = ChannelConfig::single_ended(pin);
        channel.gain = Gain::GAIN1_4;
        channel.reference = Reference::VDD1_4;
        // 1M divider source impedance.
        channel.time = Time::_40US;

        let mut config = saadc::Config::default();
        config.resolution = Resolution::_12BIT;

        let saadc = Saadc::new(saadc, Irqs, config, [channel]);
        saadc.calibrate().await;
        Self { saadc }
    }
}

fn scale_to_16_bit(sample: i16) -> u16 {
    (sample.clamp(0, 4095) as u16) << 4
}

impl BatteryAdc for VbatAdc {
    async fn read_raw(&mut self) -> u16 {
        let mut buf = [0i16; 1];
        self.saadc.sample(&mut buf).await;
        scale_to_16_bit(buf[0])
    }
}
