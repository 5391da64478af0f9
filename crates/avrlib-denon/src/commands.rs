//! Denon/Marantz command builders and response decoders.
//!
//! Builders return [`Command`]s ready for the dispatcher: the line to send
//! and a description of which received lines answer it. Decoders turn the
//! resolved [`Reply`] into a typed value. Nothing here performs I/O.
//!
//! # Command reference
//!
//! Commands are short ASCII mnemonics. A trailing `?` asks for state; any
//! other suffix sets it. The main zone uses per-function prefixes (`PW`,
//! `MV`, `MU`, `SI`); secondary zones fold everything under their zone
//! prefix (`Z2`), so `Z2?` answers with the zone's input, power, and volume
//! lines at once.

use std::collections::{BTreeMap, BTreeSet};

use avrlib_core::{
    Error, InputInfo, Result, ZoneId, ZoneMap, volume_from_device, volume_to_device,
};
use avrlib_text_io::{Command, Match, Reply, ResponsePattern};

// ---------------------------------------------------------------
// Response patterns
// ---------------------------------------------------------------

const POWER_PATTERN: &str = r"PW(ON|STANDBY|OFF)";
const MAIN_VOLUME_PATTERN: &str = r"MV(\d{1,4})";
const MAIN_MUTE_PATTERN: &str = r"MU(ON|OFF)";
const MAIN_INPUT_PATTERN: &str = r"SI(.+)";
const MAIN_INPUT_INFO_PATTERN: &str = r"(SI|SV)(.+)";
/// Secondary-zone suffixes that are not input names: power, volume, mute,
/// channel volume, channel setting, sleep, parameters, high-pass filter,
/// and quick/smart select.
const ZONE_SUBCOMMANDS: &str = r"ON|OFF|\d+|MU.*|CV.*|CS.*|SLP.*|PS.*|HPF.*|QUICK.*|SMART.*";
const ZONE_PRESENCE_PATTERN: &str = r"(PW|ZM|Z[2-9])(ON|OFF|STANDBY)";
const ZONE_NAME_PATTERN: &str = r"R([1-9])(.*)";
const RAW_PATTERN: &str = r"(.+)";

fn query(text: String, pattern: &str) -> Result<Command> {
    Ok(Command::query(text, ResponsePattern::new(pattern)?))
}

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Build a "read global power" command (`PW?`).
pub fn cmd_get_power() -> Result<Command> {
    query("PW?".into(), POWER_PATTERN)
}

/// Build a "set global power" command (`PWON` / `PWSTANDBY`).
pub fn cmd_set_power(on: bool) -> Command {
    Command::fire_and_forget(if on { "PWON" } else { "PWSTANDBY" })
}

/// Build a "read zone power" command (`ZM?`, `Z2?`, ...).
pub fn cmd_get_zone_power(zone: ZoneId) -> Result<Command> {
    query(format!("{zone}?"), &format!("{zone}(ON|OFF)"))
}

/// Build a "set zone power" command (`ZMON`, `Z2OFF`, ...).
pub fn cmd_set_zone_power(zone: ZoneId, on: bool) -> Command {
    Command::fire_and_forget(format!("{zone}{}", on_off(on)))
}

/// Build a "read volume" command (`MV?` for the main zone, `Z2?` otherwise).
pub fn cmd_get_volume(zone: ZoneId) -> Result<Command> {
    if zone.is_main() {
        query("MV?".into(), MAIN_VOLUME_PATTERN)
    } else {
        query(format!("{zone}?"), &format!(r"{zone}(\d{{1,4}})"))
    }
}

/// Build a "set volume" command (`MV455`, `Z2050`, ...).
///
/// The volume is on a 0-100 scale; see [`volume_to_device`] for the digit
/// encoding.
pub fn cmd_set_volume(zone: ZoneId, volume: f32) -> Result<Command> {
    let digits = volume_to_device(volume)?;
    Ok(Command::fire_and_forget(format!(
        "{}{digits}",
        volume_prefix(zone)
    )))
}

/// Build a "read mute" command (`MU?` / `Z2MU?`).
pub fn cmd_get_mute(zone: ZoneId) -> Result<Command> {
    if zone.is_main() {
        query("MU?".into(), MAIN_MUTE_PATTERN)
    } else {
        query(format!("{zone}MU?"), &format!("{zone}MU(ON|OFF)"))
    }
}

/// Build a "set mute" command (`MUON` / `Z2MUOFF`).
pub fn cmd_set_mute(zone: ZoneId, muted: bool) -> Command {
    let prefix = if zone.is_main() {
        "MU".to_string()
    } else {
        format!("{zone}MU")
    };
    Command::fire_and_forget(format!("{prefix}{}", on_off(muted)))
}

/// Build a "read input source" command (`SI?` / `Z2?`).
///
/// A zone query also returns the zone's power and volume lines under the
/// same prefix, and mute or channel changes may be broadcast meanwhile, so
/// every zone sub-command line is excluded from the match.
pub fn cmd_get_input(zone: ZoneId) -> Result<Command> {
    if zone.is_main() {
        return query("SI?".into(), MAIN_INPUT_PATTERN);
    }
    let pattern = ResponsePattern::new(&format!("{zone}(.+)"))?.with_reject(&zone_reject(zone))?;
    Ok(Command::query(format!("{zone}?"), pattern))
}

/// Build a "read input and video source" command (`SI?` / `Z2?`, table).
///
/// The receiver follows its input line with an `SV` line naming the video
/// source; both are collected.
pub fn cmd_get_input_info(zone: ZoneId) -> Result<Command> {
    if zone.is_main() {
        return Ok(Command::table(
            "SI?",
            ResponsePattern::new(MAIN_INPUT_INFO_PATTERN)?,
        ));
    }
    let pattern =
        ResponsePattern::new(&format!("({zone}|SV)(.+)"))?.with_reject(&zone_reject(zone))?;
    Ok(Command::table(format!("{zone}?"), pattern))
}

/// Build a "select input source" command (`SIMPLAY`, `Z2TUNER`, ...).
pub fn cmd_set_input(zone: ZoneId, input: &str) -> Result<Command> {
    let input = input.trim();
    validate_text("input", input)?;
    if input.ends_with('?') {
        return Err(Error::InvalidParameter(format!(
            "input {input:?} must not end in '?'"
        )));
    }
    if zone.is_main() {
        return Ok(Command::fire_and_forget(format!("SI{input}")));
    }
    // Z2ON, Z245, Z2MUON... are other commands under the same prefix.
    let subcommands = ResponsePattern::new(ZONE_SUBCOMMANDS)?;
    if subcommands.matches(&input.to_ascii_uppercase()).is_some() {
        return Err(Error::InvalidParameter(format!(
            "input {input:?} is a {zone} control command, not a source"
        )));
    }
    Ok(Command::fire_and_forget(format!("{zone}{input}")))
}

/// Build the "which zones exist" command (`PW?`, table).
///
/// The receiver answers `PW?` with the global power line followed by a power
/// line for each zone it has.
pub fn cmd_zone_presence() -> Result<Command> {
    Ok(Command::table("PW?", ResponsePattern::new(ZONE_PRESENCE_PATTERN)?))
}

/// Build the "read zone names" command (`RR?`, table).
pub fn cmd_zone_names() -> Result<Command> {
    Ok(Command::table("RR?", ResponsePattern::new(ZONE_NAME_PATTERN)?))
}

/// Build a raw command.
///
/// A query collects every line the receiver sends back; anything else is
/// fire-and-forget.
pub fn cmd_raw(text: &str) -> Result<Command> {
    let text = text.trim();
    validate_text("command", text)?;
    if text.ends_with('?') {
        Ok(Command::table(text, ResponsePattern::new(RAW_PATTERN)?))
    } else {
        Ok(Command::fire_and_forget(text))
    }
}

// ---------------------------------------------------------------
// Response decoders
// ---------------------------------------------------------------

/// Decode a global power reply. Only `ON` counts as on.
pub fn parse_power(reply: Reply) -> Result<bool> {
    Ok(expect_line(reply, "power")?.payload() == "ON")
}

/// Decode an `ON`/`OFF` reply (zone power, mute).
pub fn parse_on_off(reply: Reply) -> Result<bool> {
    let line = expect_line(reply, "on/off")?;
    match line.payload() {
        "ON" => Ok(true),
        "OFF" => Ok(false),
        other => Err(Error::Protocol(format!(
            "expected ON or OFF in {:?}, got {other:?}",
            line.line
        ))),
    }
}

/// Decode a volume reply onto the 0-100 scale.
pub fn parse_volume(reply: Reply) -> Result<f32> {
    volume_from_device(expect_line(reply, "volume")?.payload())
}

/// Decode an input source reply.
pub fn parse_input(reply: Reply) -> Result<String> {
    Ok(expect_line(reply, "input")?.payload().to_string())
}

/// Decode an input table into the input and video sources.
///
/// Fails if the receiver sent a video line but no input line.
pub fn parse_input_info(lines: Vec<Match>) -> Result<InputInfo> {
    let mut source = None;
    let mut video = None;
    for m in &lines {
        let (Some(prefix), Some(value)) = (m.group(1), m.group(2)) else {
            continue;
        };
        let slot = if prefix == "SV" { &mut video } else { &mut source };
        slot.get_or_insert_with(|| value.to_string());
    }
    let source = source.ok_or_else(|| Error::Protocol("no input line in reply".into()))?;
    Ok(InputInfo { source, video })
}

/// Decode the zones present from a `PW?` table.
///
/// `PW` and `ZM` lines both mean the main zone; `Zn` lines mean zone `n`.
pub fn parse_zone_presence(lines: Vec<Match>) -> BTreeSet<ZoneId> {
    lines
        .iter()
        .filter_map(|m| match m.payload() {
            "PW" => Some(ZoneId::MAIN),
            prefix => prefix.parse().ok(),
        })
        .collect()
}

/// Decode zone names from an `RR?` table. `R1` is the main zone.
///
/// Blank names are left out so the zone falls back to its default name.
pub fn parse_zone_names(lines: Vec<Match>) -> BTreeMap<ZoneId, String> {
    lines
        .iter()
        .filter_map(|m| {
            let index: u8 = m.group(1)?.parse().ok()?;
            let zone = ZoneId::from_index(index)?;
            let name = m.group(2)?.trim();
            (!name.is_empty()).then(|| (zone, name.to_string()))
        })
        .collect()
}

/// Combine zone presence with zone names.
///
/// Only zones that are present appear in the result; a zone without a
/// reported name gets its default name.
pub fn merge_zones(present: &BTreeSet<ZoneId>, names: &BTreeMap<ZoneId, String>) -> ZoneMap {
    present
        .iter()
        .map(|zone| {
            let name = names
                .get(zone)
                .cloned()
                .unwrap_or_else(|| zone.default_name());
            (*zone, name)
        })
        .collect()
}

/// Collect the text of every line in a raw command reply.
pub fn parse_raw(reply: Reply) -> Vec<String> {
    reply.into_lines().into_iter().map(|m| m.line).collect()
}

// ---------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

fn volume_prefix(zone: ZoneId) -> String {
    if zone.is_main() {
        "MV".to_string()
    } else {
        zone.to_string()
    }
}

fn zone_reject(zone: ZoneId) -> String {
    format!("{zone}({ZONE_SUBCOMMANDS})")
}

fn expect_line(reply: Reply, what: &str) -> Result<Match> {
    reply
        .into_line()
        .ok_or_else(|| Error::Protocol(format!("no {what} line in reply")))
}

/// Reject text that would break line framing.
fn validate_text(what: &str, text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(Error::InvalidParameter(format!("{what} must not be empty")));
    }
    if text.chars().any(|c| c.is_control()) {
        return Err(Error::InvalidParameter(format!(
            "{what} {text:?} contains control characters"
        )));
    }
    Ok(())
}
