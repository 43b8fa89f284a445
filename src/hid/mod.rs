//! HID report types and the BLE HID report map.
//!
//! The turner exposes two input reports over HID-over-GATT:
//!
//! - Report ID 1: Consumer Control (16-bit usage) for page keys, Back, Power
//! - Report ID 2: Mouse (buttons, X, Y, wheel) for the center-tap gesture

pub mod consumer;
pub mod mouse;

pub use consumer::{ConsumerReport, ConsumerUsage};
pub use mouse::{CenterTapGesture, MouseReport};

/// Report ID of the consumer-control input report.
pub const CONSUMER_REPORT_ID: u8 = 1;

/// Report ID of the mouse input report.
pub const MOUSE_REPORT_ID: u8 = 2;

/// Combined HID Report Map served on characteristic 0x2A4B.
pub const REPORT_MAP: &[u8] = &[
    // - Consumer control -
    0x05, 0x0C, // Usage Page (Consumer)
    0x09, 0x01, // Usage (Consumer Control)
    0xA1, 0x01, // Collection (Application)
    0x85, CONSUMER_REPORT_ID, //   Report ID (1)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x03, //   Logical Maximum (1023)
    0x19, 0x00, //   Usage Minimum (0)
    0x2A, 0xFF, 0x03, //   Usage Maximum (1023)
    0x75, 0x10, //   Report Size (16)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x00, //   Input (Data, Array, Absolute)
    0xC0, // End Collection
    //
    // - Mouse -
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x85, MOUSE_REPORT_ID, //   Report ID (2)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Buttons)
    0x19, 0x01, //     Usage Minimum (Button 1)
    0x29, 0x03, //     Usage Maximum (Button 3)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x05, //     Report Size (5)
    0x81, 0x01, //     Input (Constant) - padding
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x09, 0x38, //     Usage (Wheel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x03, //     Report Count (3)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0xC0, //   End Collection (Physical)
    0xC0, // End Collection (Application)
];

/// Length of [`REPORT_MAP`], needed by the GATT characteristic declaration.
pub const REPORT_MAP_LEN: usize = 79;
