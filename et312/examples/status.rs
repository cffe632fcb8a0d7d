//! Status example
//!
//! Connects over a serial port, or a TCP bridge given as `host:port`, and
//! prints a full status read.

use anyhow::Context;
use et312::Device;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let device = match target.rsplit_once(':') {
        Some((host, port)) => Device::tcp(host, port.parse().context("invalid TCP port")?),
        None => Device::serial(target.as_str()),
    };

    println!("Connecting to {}...", device.name());
    device.connect().await.context("connect")?;

    let status = device.request_status(true).await?;
    println!("{}", status);

    device.close(false).await?;
    Ok(())
}
