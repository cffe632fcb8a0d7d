//! Remote control example
//!
//! Takes control of the unit, runs a mode for a while, stops it and hands
//! control back to the front panel.

use std::time::Duration;

use et312::{BoxCommand, Device, DeviceEvent};
use tokio::time::sleep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port = std::env::var("ET312_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
    let device = Device::serial(port);

    let mut events = device.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                DeviceEvent::Status(status) => println!("status: {}", status),
                other => println!("event: {:?}", other),
            }
        }
    });

    device.connect().await?;
    let heartbeat = device.spawn_heartbeat();

    device.take_control(true).await?;
    device.execute(BoxCommand::parse("setMode", Some(0x76))?).await?;
    device.execute(BoxCommand::parse("setPowerLevel", Some(1))?).await?;
    device.display_text("Remote", 1, 0)?.wait().await?;

    sleep(Duration::from_secs(10)).await;

    device.execute(BoxCommand::Stop).await?;
    device.close(false).await?;
    heartbeat.await?;

    Ok(())
}
