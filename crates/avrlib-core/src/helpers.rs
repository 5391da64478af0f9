//! Volume conversion helpers.
//!
//! Receivers report and accept volume as a short digit string in tenths of
//! a step: `"45"` is 45.0, `"455"` is 45.5. avrlib exposes volume as an
//! `f32` on a 0-100 scale with one decimal of precision.

use crate::error::{Error, Result};

/// Highest volume value accepted by [`volume_to_device`].
pub const MAX_VOLUME: f32 = 100.0;

/// Encode a 0-100 volume as the device's digit string.
///
/// The value is converted to tenths (`round(volume * 10)`) and zero-padded
/// to three digits so that whole volumes below 10 are not mistaken for
/// two-digit whole numbers by the receiver.
///
/// # Example
///
/// ```
/// use avrlib_core::volume_to_device;
///
/// assert_eq!(volume_to_device(45.5).unwrap(), "455");
/// assert_eq!(volume_to_device(5.0).unwrap(), "050");
/// assert_eq!(volume_to_device(100.0).unwrap(), "1000");
/// ```
pub fn volume_to_device(volume: f32) -> Result<String> {
    if !volume.is_finite() || !(0.0..=MAX_VOLUME).contains(&volume) {
        return Err(Error::InvalidParameter(format!(
            "volume {volume} outside 0-{MAX_VOLUME}"
        )));
    }
    let units = (volume * 10.0).round() as u32;
    Ok(format!("{units:03}"))
}

/// Decode the device's digit string into a 0-100 volume.
///
/// One- and two-digit strings are whole numbers; longer strings carry a
/// trailing tenth digit.
///
/// # Example
///
/// ```
/// use avrlib_core::volume_from_device;
///
/// assert_eq!(volume_from_device("455").unwrap(), 45.5);
/// assert_eq!(volume_from_device("45").unwrap(), 45.0);
/// assert_eq!(volume_from_device("1000").unwrap(), 100.0);
/// ```
pub fn volume_from_device(raw: &str) -> Result<f32> {
    let digits = raw.trim();
    if digits.is_empty() || digits.len() > 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Protocol(format!(
            "volume payload {raw:?} is not a 1-4 digit number"
        )));
    }
    let value: u32 = digits
        .parse()
        .map_err(|_| Error::Protocol(format!("volume payload {raw:?} is not numeric")))?;
    if digits.len() <= 2 {
        Ok(value as f32)
    } else {
        Ok(value as f32 / 10.0)
    }
}
