//! DS18B20 scratchpad decoding for drivers that talk to the probe directly
//! on a 1-Wire bus.

use super::SensorError;

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected).
pub fn dallas_crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// Temperature from a raw 9-byte DS18B20 scratchpad, in degrees Celsius at
/// the default 12-bit resolution (1/16 degC per count).
pub fn scratchpad_celsius(scratchpad: &[u8; 9]) -> Result<f32, SensorError> {
    if dallas_crc8(&scratchpad[..8]) != scratchpad[8] {
        return Err(SensorError::CrcFailed);
    }
    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    Ok(f32::from(raw) / 16.0)
}
