//! Loopback Home Example
//!
//! Runs a MoxHome engine against a fake controller on 127.0.0.1. The fake
//! controller answers every set command with the matching state report, so
//! the store converges on what the client asked for.
//!
//! Run with: `MOX_LOG_MODE=development cargo run -p mox-home --example loopback_home`

use std::sync::Arc;
use std::time::Duration;

use mox_home::logging::init_logging_from_env;
use mox_home::{
    Accessory, AccessoryKey, AccessoryKind, ChannelId, Classification, HomeClient, HomeConfig,
    House, MemoryBus, MemoryStore, ModuleId, MoxHome,
};
use mox_protocol::{Command, CommandFrame, ResponseFrame};
use tokio::net::UdpSocket;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let controller = UdpSocket::bind("127.0.0.1:0").await?;
    let controller_port = controller.local_addr()?.port();
    let client_port = std::net::UdpSocket::bind("127.0.0.1:0")?.local_addr()?.port();
    tokio::spawn(run_fake_controller(controller));

    let lamp = AccessoryKey::new(ModuleId::parse("0x0000cc")?, ChannelId::new(0x16));
    let store = Arc::new(MemoryStore::new().with_house(
        House::new("demo", "Demo house")
            .with_server("127.0.0.1", controller_port)
            .with_client("127.0.0.1", client_port),
    ));
    store.insert_accessory(Accessory::new(lamp, AccessoryKind::Dimmer, "Lamp"));
    let bus = Arc::new(MemoryBus::new());

    let home = MoxHome::new(HomeConfig::new("demo"), store.clone(), bus.clone())?;
    home.connect().await?;
    println!("Engine bound to {:?}", home.local_address());

    let client = HomeClient::new(store.clone(), bus.clone());
    client.connect().await?;

    for value in [32u8, 128, 255] {
        client.set_dimmer_value(lamp, value).await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        println!("Lamp is now at {:?}", client.dimmer_value(lamp).await?);
    }

    client.disconnect().await?;
    home.disconnect().await?;
    Ok(())
}

/// Replies to set commands with the report a real controller would send
async fn run_fake_controller(socket: UdpSocket) {
    let mut buf = [0u8; 64];
    while let Ok((len, from)) = socket.recv_from(&mut buf).await {
        let Some((key, classification)) = report_for(&buf[..len]) else {
            continue;
        };
        let report = ResponseFrame::build(key, classification);
        let _ = socket.send_to(report.as_bytes(), from).await;
    }
}

fn report_for(frame: &[u8]) -> Option<(AccessoryKey, Classification)> {
    let key = AccessoryKey::new(
        ModuleId::new(*frame.get(1)?, *frame.get(2)?, *frame.get(3)?),
        ChannelId::new(*frame.get(4)?),
    );
    let command = [
        Command::SetDimmerValue(*frame.get(10)?),
        Command::SetCurtainPosition(*frame.get(10)?),
        Command::SetLightStatus(*frame.get(10)? != 0),
    ]
    .into_iter()
    .find(|command| CommandFrame::encode(key, *command).as_bytes() == frame)?;

    let classification = match command {
        Command::SetDimmerValue(value) => Classification::LightBrightness(value),
        Command::SetCurtainPosition(value) => Classification::CurtainPosition(value),
        Command::SetLightStatus(on) => Classification::LightStatus(on),
        _ => return None,
    };
    Some((key, classification))
}
