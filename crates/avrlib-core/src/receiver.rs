//! The `AvReceiver` trait -- unified interface for receiver backends.
//!
//! Home-automation bridges and CLI tools program against `dyn AvReceiver`
//! without needing to know which command dialect is spoken on the wire.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{InputInfo, ZoneId, ZoneMap};

/// Unified asynchronous interface for controlling an AV receiver.
///
/// Every method that talks to the device is `async` and resolves exactly
/// once. Calls made concurrently from several tasks are executed one at a
/// time, in the order they were issued.
///
/// Methods taking a [`ZoneId`] address the main zone with
/// [`ZoneId::MAIN`].
#[async_trait]
pub trait AvReceiver: Send + Sync {
    /// The `host:port` this receiver is reached at.
    fn address(&self) -> &str;

    /// Get the global power state. Returns `true` if the receiver is on.
    async fn get_power(&self) -> Result<bool>;

    /// Switch the whole receiver on, or to standby.
    async fn set_power(&self, on: bool) -> Result<()>;

    /// Get the power state of a single zone.
    async fn get_zone_power(&self, zone: ZoneId) -> Result<bool>;

    /// Switch a single zone on or off.
    async fn set_zone_power(&self, zone: ZoneId, on: bool) -> Result<()>;

    /// Get the volume of a zone on a 0-100 scale.
    async fn get_volume(&self, zone: ZoneId) -> Result<f32>;

    /// Set the volume of a zone on a 0-100 scale (half steps honoured).
    async fn set_volume(&self, zone: ZoneId, volume: f32) -> Result<()>;

    /// Get the mute state of a zone. Returns `true` if muted.
    async fn get_mute(&self, zone: ZoneId) -> Result<bool>;

    /// Mute or unmute a zone.
    async fn set_mute(&self, zone: ZoneId, muted: bool) -> Result<()>;

    /// Get the selected input source of a zone (e.g. `"MPLAY"`, `"TUNER"`).
    async fn get_input(&self, zone: ZoneId) -> Result<String>;

    /// Get the input source of a zone together with its video source.
    ///
    /// Slower than [`get_input`](Self::get_input): it listens until the
    /// receiver has finished answering.
    async fn get_input_info(&self, zone: ZoneId) -> Result<InputInfo>;

    /// Select the input source of a zone.
    async fn set_input(&self, zone: ZoneId, input: &str) -> Result<()>;

    /// List the zones the receiver has, mapped to their display names.
    async fn get_zones(&self) -> Result<ZoneMap>;

    /// Send a raw protocol command and return every line it produced.
    ///
    /// Query commands (ending in `?`) wait for at least one line; other
    /// commands return an empty list when the receiver stays silent.
    async fn command(&self, text: &str) -> Result<Vec<String>>;
}
