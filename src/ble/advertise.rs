use nrf_softdevice::ble::advertisement_builder::{
    AdvertisementDataType, Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload,
    ServiceList, ServiceUuid16,
};

use page_turner::config::BLE_DEVICE_NAME;

/// Generic HID appearance (0x03C0), little-endian.
const APPEARANCE_HID: [u8; 2] = [0xC0, 0x03];

pub static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .services_16(
        ServiceList::Incomplete,
        &[ServiceUuid16::HUMAN_INTERFACE_DEVICE],
    )
    .full_name(BLE_DEVICE_NAME)
    .raw(AdvertisementDataType::APPEARANCE, &APPEARANCE_HID)
    .build();

pub static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .services_16(
        ServiceList::Complete,
        &[
            ServiceUuid16::HUMAN_INTERFACE_DEVICE,
            ServiceUuid16::BATTERY,
        ],
    )
    .build();
