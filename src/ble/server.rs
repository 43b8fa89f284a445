//! GATT server: HID over GATT (consumer control + mouse) and battery level.

use defmt::{debug, Format};
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, RegisterError, Service, WriteOp};
use nrf_softdevice::ble::{Connection, SecurityMode, Uuid};
use nrf_softdevice::Softdevice;

use page_turner::hid::consumer::CONSUMER_REPORT_SIZE;
use page_turner::hid::mouse::MOUSE_REPORT_SIZE;
use page_turner::hid::{CONSUMER_REPORT_ID, MOUSE_REPORT_ID, REPORT_MAP};

const HID_SERVICE: Uuid = Uuid::new_16(0x1812);
const HID_INFO: Uuid = Uuid::new_16(0x2a4a);
const REPORT_MAP_CHAR: Uuid = Uuid::new_16(0x2a4b);
const HID_CONTROL_POINT: Uuid = Uuid::new_16(0x2a4c);
const HID_REPORT: Uuid = Uuid::new_16(0x2a4d);
const REPORT_REFERENCE: Uuid = Uuid::new_16(0x2908);

/// Report Reference type byte for an input report.
const INPUT_REPORT: u8 = 1;

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    #[characteristic(uuid = "2a19", read, notify)]
    pub battery_level: u8,
}

/// Attribute handles of the HID service.
#[derive(Clone, Copy, Format)]
pub struct HidService {
    pub consumer: u16,
    consumer_cccd: u16,
    pub mouse: u16,
    mouse_cccd: u16,
    control_point: u16,
}

impl HidService {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut sb = ServiceBuilder::new(sd, HID_SERVICE)?;

        sb.add_characteristic(
            HID_INFO,
            // HID 1.1, no country, remote wake + normally connectable
            Attribute::new([0x01u8, 0x01, 0x00, 0x03]).security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read()),
        )?
        .build();

        sb.add_characteristic(
            REPORT_MAP_CHAR,
            Attribute::new(REPORT_MAP).security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read()),
        )?
        .build();

        let control_point = sb
            .add_characteristic(
                HID_CONTROL_POINT,
                Attribute::new([0u8]).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().write_without_response()),
            )?
            .build();

        let mut consumer = sb.add_characteristic(
            HID_REPORT,
            Attribute::new([0u8; CONSUMER_REPORT_SIZE]).security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read().notify()),
        )?;
        consumer.add_descriptor(
            REPORT_REFERENCE,
            Attribute::new([CONSUMER_REPORT_ID, INPUT_REPORT]).security(SecurityMode::JustWorks),
        )?;
        let consumer = consumer.build();

        let mut mouse = sb.add_characteristic(
            HID_REPORT,
            Attribute::new([0u8; MOUSE_REPORT_SIZE]).security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read().notify()),
        )?;
        mouse.add_descriptor(
            REPORT_REFERENCE,
            Attribute::new([MOUSE_REPORT_ID, INPUT_REPORT]).security(SecurityMode::JustWorks),
        )?;
        let mouse = mouse.build();

        let _service = sb.build();

        Ok(Self {
            consumer: consumer.value_handle,
            consumer_cccd: consumer.cccd_handle,
            mouse: mouse.value_handle,
            mouse_cccd: mouse.cccd_handle,
            control_point: control_point.value_handle,
        })
    }
}

#[derive(Clone, Copy, Format)]
pub enum HidServiceEvent {
    ConsumerCccdWrite(bool),
    MouseCccdWrite(bool),
    /// 0 = suspend, 1 = exit suspend.
    ControlPoint(u8),
}

impl Service for HidService {
    type Event = HidServiceEvent;

    fn on_write(&self, handle: u16, data: &[u8]) -> Option<Self::Event> {
        let notify = data.first().is_some_and(|b| b & 0x01 != 0);
        if handle == self.consumer_cccd {
            Some(HidServiceEvent::ConsumerCccdWrite(notify))
        } else if handle == self.mouse_cccd {
            Some(HidServiceEvent::MouseCccdWrite(notify))
        } else if handle == self.control_point {
            data.first().map(|b| HidServiceEvent::ControlPoint(*b))
        } else {
            None
        }
    }
}

pub struct Server {
    pub hid: HidService,
    pub battery: BatteryService,
}

impl Server {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let battery = BatteryService::new(sd)?;
        let hid = HidService::new(sd)?;
        Ok(Self { hid, battery })
    }
}

impl gatt_server::Server for Server {
    type Event = ();

    fn on_write(
        &self,
        _conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        if let Some(event) = self.hid.on_write(handle, data) {
            debug!("HID: {}", event);
        }
        if let Some(BatteryServiceEvent::BatteryLevelCccdWrite { notifications }) =
            self.battery.on_write(handle, data)
        {
            debug!("Battery notifications: {}", notifications);
        }
        None
    }
}
