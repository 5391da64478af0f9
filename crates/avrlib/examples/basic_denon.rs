//! Basic receiver control example.
//!
//! Demonstrates connecting to a Denon or Marantz receiver, reading its
//! state, listing zones, and changing the main zone volume.
//!
//! # Requirements
//!
//! - A network-connected Denon or Marantz receiver with network control
//!   enabled (Setup > Network > Network Control: Always On)
//! - Its address passed as the first argument
//!
//! # Usage
//!
//! ```sh
//! cargo run -p avrlib --example basic_denon -- 192.168.1.20
//! ```

use avrlib::denon::DenonBuilder;
use avrlib::{AvReceiver, ZoneId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.1.20".to_string());

    println!("Connecting to {host}...");

    let receiver = DenonBuilder::new(&host).build().await?;

    let on = receiver.get_power().await?;
    println!("Power: {}", if on { "ON" } else { "STANDBY" });
    if !on {
        println!("Receiver is in standby; nothing more to read.");
        return Ok(());
    }

    // List zones with their names.
    for (zone, name) in receiver.get_zones().await? {
        let power = receiver.get_zone_power(zone).await?;
        println!("{zone}: {name} ({})", if power { "on" } else { "off" });
    }

    let main = ZoneId::MAIN;
    let volume = receiver.get_volume(main).await?;
    let input = receiver.get_input(main).await?;
    let muted = receiver.get_mute(main).await?;
    println!("Main zone: volume {volume:.1}, input {input}, muted {muted}");

    // Nudge the volume up half a step and read it back.
    let target = (volume + 0.5).min(avrlib::MAX_VOLUME);
    println!("\nSetting volume to {target:.1}...");
    receiver.set_volume(main, target).await?;
    println!("Volume now: {:.1}", receiver.get_volume(main).await?);

    receiver.shutdown().await?;
    println!("\nDone.");
    Ok(())
}
