//! DenonReceiver -- the [`AvReceiver`] implementation for Denon and Marantz
//! receivers.
//!
//! Every operation is one or two commands from [`commands`] pushed through
//! the shared dispatcher, so concurrent callers are serialised onto the
//! receiver's single control session in the order they called.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use avrlib_core::error::Result;
use avrlib_core::receiver::AvReceiver;
use avrlib_core::types::{InputInfo, ZoneId, ZoneMap};
use avrlib_text_io::AvrIo;

use crate::commands;

/// A Denon or Marantz receiver controlled over its telnet port.
///
/// Constructed via [`DenonBuilder`](crate::builder::DenonBuilder). No
/// connection is held while the receiver is idle.
pub struct DenonReceiver {
    io: AvrIo,
}

impl DenonReceiver {
    pub(crate) fn new(io: AvrIo) -> Self {
        Self { io }
    }

    /// Stop the dispatcher. Commands still queued fail with
    /// [`NotConnected`](avrlib_core::Error::NotConnected).
    pub async fn shutdown(self) -> Result<()> {
        self.io.shutdown().await
    }

    async fn zone_names(&self) -> Result<BTreeMap<ZoneId, String>> {
        let reply = self.io.execute(commands::cmd_zone_names()?).await?;
        Ok(commands::parse_zone_names(reply.into_lines()))
    }
}

#[async_trait]
impl AvReceiver for DenonReceiver {
    fn address(&self) -> &str {
        self.io.address()
    }

    async fn get_power(&self) -> Result<bool> {
        let reply = self.io.execute(commands::cmd_get_power()?).await?;
        commands::parse_power(reply)
    }

    async fn set_power(&self, on: bool) -> Result<()> {
        self.io.execute(commands::cmd_set_power(on)).await?;
        Ok(())
    }

    async fn get_zone_power(&self, zone: ZoneId) -> Result<bool> {
        let reply = self.io.execute(commands::cmd_get_zone_power(zone)?).await?;
        commands::parse_on_off(reply)
    }

    async fn set_zone_power(&self, zone: ZoneId, on: bool) -> Result<()> {
        self.io.execute(commands::cmd_set_zone_power(zone, on)).await?;
        Ok(())
    }

    async fn get_volume(&self, zone: ZoneId) -> Result<f32> {
        let reply = self.io.execute(commands::cmd_get_volume(zone)?).await?;
        commands::parse_volume(reply)
    }

    async fn set_volume(&self, zone: ZoneId, volume: f32) -> Result<()> {
        self.io.execute(commands::cmd_set_volume(zone, volume)?).await?;
        Ok(())
    }

    async fn get_mute(&self, zone: ZoneId) -> Result<bool> {
        let reply = self.io.execute(commands::cmd_get_mute(zone)?).await?;
        commands::parse_on_off(reply)
    }

    async fn set_mute(&self, zone: ZoneId, muted: bool) -> Result<()> {
        self.io.execute(commands::cmd_set_mute(zone, muted)).await?;
        Ok(())
    }

    async fn get_input(&self, zone: ZoneId) -> Result<String> {
        let reply = self.io.execute(commands::cmd_get_input(zone)?).await?;
        commands::parse_input(reply)
    }

    async fn get_input_info(&self, zone: ZoneId) -> Result<InputInfo> {
        let reply = self.io.execute(commands::cmd_get_input_info(zone)?).await?;
        commands::parse_input_info(reply.into_lines())
    }

    async fn set_input(&self, zone: ZoneId, input: &str) -> Result<()> {
        self.io.execute(commands::cmd_set_input(zone, input)?).await?;
        Ok(())
    }

    async fn get_zones(&self) -> Result<ZoneMap> {
        let reply = self.io.execute(commands::cmd_zone_presence()?).await?;
        let present = commands::parse_zone_presence(reply.into_lines());

        // Older models do not know RR?; fall back to the default names.
        let names = self.zone_names().await.unwrap_or_else(|e| {
            debug!(error = %e, "zone names unavailable, using defaults");
            BTreeMap::new()
        });

        Ok(commands::merge_zones(&present, &names))
    }

    async fn command(&self, text: &str) -> Result<Vec<String>> {
        let reply = self.io.execute(commands::cmd_raw(text)?).await?;
        Ok(commands::parse_raw(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrlib_core::Error;
    use avrlib_test_harness::{MockConnector, MockTransport};
    use avrlib_text_io::{IoConfig, spawn_io_task};

    fn receiver(connector: MockConnector) -> DenonReceiver {
        DenonReceiver::new(spawn_io_task(Box::new(connector), IoConfig::default()))
    }

    fn zone(n: u8) -> ZoneId {
        ZoneId::from_index(n).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn power_and_volume_scenario() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", "PWON\rZ2ON\rZ2NET\rZ240\r");
        mock.expect("MV?", "MV455\rMVMAX 999\r");
        let rx = receiver(MockConnector::new().session(mock));

        assert!(rx.get_power().await.unwrap());
        assert_eq!(rx.get_volume(ZoneId::MAIN).await.unwrap(), 45.5);
        rx.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn set_commands_succeed_on_silence() {
        let mut mock = MockTransport::new();
        mock.expect_silence("PWSTANDBY");
        mock.expect_silence("Z2050");
        mock.expect("MUON", "MUON\r");
        mock.expect_silence("Z3ON");
        mock.expect_silence("SITUNER");
        let connector = MockConnector::new().session(mock);
        let log = connector.log();
        let rx = receiver(connector);

        rx.set_power(false).await.unwrap();
        rx.set_volume(zone(2), 5.0).await.unwrap();
        rx.set_mute(ZoneId::MAIN, true).await.unwrap();
        rx.set_zone_power(zone(3), true).await.unwrap();
        rx.set_input(ZoneId::MAIN, "TUNER").await.unwrap();

        assert_eq!(log.sent(), ["PWSTANDBY", "Z2050", "MUON", "Z3ON", "SITUNER"]);
        rx.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_volume_is_rejected_before_sending() {
        let connector = MockConnector::new();
        let log = connector.log();
        let rx = receiver(connector);

        let err = rx.set_volume(ZoneId::MAIN, 120.0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(log.connects(), 0);
        rx.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zone_queries() {
        let mut mock = MockTransport::new();
        mock.expect("Z2?", "Z2ON\rZ2NET\rZ240\r");
        mock.expect("Z2?", "Z2ON\rZ2NET\rZ240\r");
        mock.expect("Z2MU?", "Z2MUOFF\r");
        mock.expect("ZM?", "ZMON\r");
        let rx = receiver(MockConnector::new().session(mock));

        assert_eq!(rx.get_input(zone(2)).await.unwrap(), "NET");
        assert_eq!(rx.get_volume(zone(2)).await.unwrap(), 40.0);
        assert!(!rx.get_mute(zone(2)).await.unwrap());
        assert!(rx.get_zone_power(ZoneId::MAIN).await.unwrap());
        rx.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn input_info_reports_video_source() {
        let mut mock = MockTransport::new();
        mock.expect_chunks("SI?", &["SIMPLAY\r", "SVOFF\r"]);
        mock.expect("Z2?", "Z2MUOFF\rZ2ON\rZ2NET\rZ240\r");
        let rx = receiver(MockConnector::new().session(mock));

        let info = rx.get_input_info(ZoneId::MAIN).await.unwrap();
        assert_eq!(info.source, "MPLAY");
        assert_eq!(info.video.as_deref(), Some("OFF"));

        let info = rx.get_input_info(zone(2)).await.unwrap();
        assert_eq!(info.source, "NET");
        assert_eq!(info.video, None);
        rx.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zone_input_rejects_power_alias_before_sending() {
        let connector = MockConnector::new();
        let log = connector.log();
        let rx = receiver(connector);

        let err = rx.set_input(zone(2), "ON").await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(log.connects(), 0);
        rx.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn get_zones_merges_presence_and_names() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", "PWON\rZMON\rZ2OFF\r");
        mock.expect("RR?", "R1Living Room\rR2Kitchen\rR3Patio\r");
        let rx = receiver(MockConnector::new().session(mock));

        let zones = rx.get_zones().await.unwrap();
        let listed: Vec<(ZoneId, &str)> = zones.iter().map(|(z, n)| (*z, n.as_str())).collect();
        assert_eq!(listed, [(ZoneId::MAIN, "Living Room"), (zone(2), "Kitchen")]);
        rx.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn get_zones_falls_back_to_default_names() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", "PWON\rZ2ON\r");
        mock.expect_silence("RR?");
        let rx = receiver(MockConnector::new().session(mock));

        let zones = rx.get_zones().await.unwrap();
        assert_eq!(zones[&ZoneId::MAIN], "MAIN ZONE");
        assert_eq!(zones[&zone(2)], "ZONE2");
        rx.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn get_zones_reports_presence_failure() {
        let rx = receiver(MockConnector::new().refuse("connection refused"));
        let err = rx.get_zones().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed(_)));
        rx.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn raw_command_returns_all_lines() {
        let mut mock = MockTransport::new();
        mock.expect("PSTONE CTRL ?", "PSTONE CTRL OFF\rPSBAS 50\r");
        mock.expect_silence("MNMEN OFF");
        let rx = receiver(MockConnector::new().session(mock));

        let lines = rx.command("PSTONE CTRL ?").await.unwrap();
        assert_eq!(lines, ["PSTONE CTRL OFF", "PSBAS 50"]);
        assert!(rx.command("MNMEN OFF").await.unwrap().is_empty());
        rx.shutdown().await.unwrap();
    }
}
