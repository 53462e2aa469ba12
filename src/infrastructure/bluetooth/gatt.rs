//! MetaWear GATT layout
//!
//! Service and characteristic identifiers a transport needs to talk to the
//! board, plus decoding for the standard characteristics it exposes.

use uuid::Uuid;

use crate::domain::models::CharacteristicValue;

/// MetaWear vendor service.
pub const METAWEAR_SERVICE: Uuid = Uuid::from_u128(0x326a9000_85cb_9195_d9dd_464cfbbae75a);

/// Command characteristic - every encoded command is written here
pub const COMMAND_CHAR: Uuid = Uuid::from_u128(0x326a9001_85cb_9195_d9dd_464cfbbae75a);

/// Notification characteristic - register notifications and read responses
pub const NOTIFY_CHAR: Uuid = Uuid::from_u128(0x326a9006_85cb_9195_d9dd_464cfbbae75a);

/// Expand a 16-bit Bluetooth SIG assigned number onto the base UUID.
pub const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_00805f9b34fb)
}

pub const DEVICE_INFORMATION_SERVICE: Uuid = sig_uuid(0x180a);
pub const MANUFACTURER_NAME: Uuid = sig_uuid(0x2a29);
pub const MODEL_NUMBER: Uuid = sig_uuid(0x2a24);
pub const SERIAL_NUMBER: Uuid = sig_uuid(0x2a25);
pub const FIRMWARE_REVISION: Uuid = sig_uuid(0x2a26);
pub const HARDWARE_REVISION: Uuid = sig_uuid(0x2a27);

pub const BATTERY_SERVICE: Uuid = sig_uuid(0x180f);
pub const BATTERY_LEVEL: Uuid = sig_uuid(0x2a19);

/// Client characteristic configuration descriptor
pub const CCCD: Uuid = sig_uuid(0x2902);

/// CCCD value that turns notifications on
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Device information characteristics, in the order they are usually read.
pub const DEVICE_INFORMATION: [Uuid; 5] = [
    MANUFACTURER_NAME,
    MODEL_NUMBER,
    SERIAL_NUMBER,
    FIRMWARE_REVISION,
    HARDWARE_REVISION,
];

const DEVICE_INFORMATION_FIELDS: [&str; 5] = [
    "manufacturer",
    "model_number",
    "serial_number",
    "firmware_revision",
    "hardware_revision",
];

fn device_information_field(characteristic: Uuid) -> Option<&'static str> {
    DEVICE_INFORMATION
        .iter()
        .position(|c| *c == characteristic)
        .map(|i| DEVICE_INFORMATION_FIELDS[i])
}

/// Interpret the value of a standard characteristic.
pub fn decode_characteristic(characteristic: Uuid, value: &[u8]) -> CharacteristicValue {
    if characteristic == BATTERY_LEVEL {
        if let [level, ..] = value {
            return CharacteristicValue::BatteryLevel(*level);
        }
    }
    match device_information_field(characteristic) {
        Some(field) => CharacteristicValue::DeviceInformation {
            field,
            value: String::from_utf8_lossy(value).into_owned(),
        },
        None => CharacteristicValue::Raw(value.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuids_are_bit_exact() {
        assert_eq!(
            METAWEAR_SERVICE.to_string(),
            "326a9000-85cb-9195-d9dd-464cfbbae75a"
        );
        assert_eq!(NOTIFY_CHAR.to_string(), "326a9006-85cb-9195-d9dd-464cfbbae75a");
        assert_eq!(
            BATTERY_LEVEL.to_string(),
            "00002a19-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(CCCD.to_string(), "00002902-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn test_decode_standard_characteristics() {
        assert_eq!(
            decode_characteristic(BATTERY_LEVEL, &[87]),
            CharacteristicValue::BatteryLevel(87)
        );
        assert_eq!(
            decode_characteristic(FIRMWARE_REVISION, b"1.3.6"),
            CharacteristicValue::DeviceInformation {
                field: "firmware_revision",
                value: "1.3.6".to_string()
            }
        );
        assert_eq!(
            decode_characteristic(BATTERY_LEVEL, &[]),
            CharacteristicValue::Raw(vec![])
        );
    }
}
