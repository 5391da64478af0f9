//! Core types used throughout avrlib.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of an independently controllable output zone.
///
/// The main zone is `ZM` on the wire; secondary zones are `Z2` through
/// `Z9`. Ordering follows the zone number, so the main zone sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(u8);

impl ZoneId {
    /// The main zone (`ZM`).
    pub const MAIN: ZoneId = ZoneId(1);

    /// Highest zone number the protocol can address.
    pub const MAX_INDEX: u8 = 9;

    /// Create a `ZoneId` from its number: `1` for the main zone, `2..=9`
    /// for secondary zones.
    pub fn from_index(index: u8) -> Option<Self> {
        (1..=Self::MAX_INDEX).contains(&index).then_some(ZoneId(index))
    }

    /// Return the zone number (`1` for the main zone).
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Whether this is the main zone.
    pub fn is_main(&self) -> bool {
        self.0 == 1
    }

    /// The name receivers show for this zone when none has been configured.
    pub fn default_name(&self) -> String {
        if self.is_main() {
            "MAIN ZONE".to_string()
        } else {
            format!("ZONE{}", self.0)
        }
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_main() {
            write!(f, "ZM")
        } else {
            write!(f, "Z{}", self.0)
        }
    }
}

/// Error returned when a string cannot be parsed into a [`ZoneId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseZoneError(String);

impl fmt::Display for ParseZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown zone: {}", self.0)
    }
}

impl std::error::Error for ParseZoneError {}

impl FromStr for ZoneId {
    type Err = ParseZoneError;

    /// Accepts `ZM`/`MAIN` and `Z2`..`Z9`, case-insensitively.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "ZM" | "MAIN" => Ok(ZoneId::MAIN),
            other => other
                .strip_prefix('Z')
                .filter(|n| n.len() == 1)
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|&n| n >= 2)
                .and_then(ZoneId::from_index)
                .ok_or_else(|| ParseZoneError(s.to_string())),
        }
    }
}

/// Zones present on a receiver, keyed by id, mapped to display names.
pub type ZoneMap = BTreeMap<ZoneId, String>;

/// The sources a zone is playing from.
///
/// The receiver reports the audio input and, where the model has a
/// separate video switch, the video source in the same answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputInfo {
    /// Selected input, e.g. `MPLAY` or `TUNER`.
    pub source: String,
    /// Selected video source (`SV` line), if the receiver sent one.
    pub video: Option<String>,
}
