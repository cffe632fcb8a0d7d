//! Periodic status polling

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::device::Device;

impl Device {
    /// Poll heartbeat status in the background while connected
    ///
    /// Ticks share the throttle with other throttled callers, so a tick is
    /// skipped if one of them read status within the heartbeat interval.
    /// The task ends once the device disconnects. Failed reads are reported
    /// through the usual error events.
    pub fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let device = self.clone();
        let period = self.config().heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if !device.is_connected() {
                    debug!("Heartbeat stopped: {} disconnected", device.name());
                    break;
                }

                match device.request_status_throttled(false, period).await {
                    Ok(Some(_)) => trace!("Heartbeat"),
                    Ok(None) => {}
                    Err(e) => debug!("Heartbeat failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::event::DeviceEvent;
    use crate::testing::{SimulatedUnit, init_tracing};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_until_closed() {
        init_tracing();

        let config = DeviceConfig::default().with_heartbeat_interval(Duration::from_secs(5));
        let device = Device::with_config(SimulatedUnit::new(), config);
        device.connect().await.unwrap();
        let mut events = device.subscribe();

        let task = device.spawn_heartbeat();
        tokio::time::sleep(Duration::from_secs(11)).await;

        let mut beats = 0;
        while let Ok(event) = events.try_recv() {
            if let DeviceEvent::Status(status) = event {
                assert!(status.is_heartbeat());
                beats += 1;
            }
        }
        assert_eq!(beats, 3);

        device.close(false).await.unwrap();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_shares_throttle() {
        let config = DeviceConfig::default().with_heartbeat_interval(Duration::from_secs(5));
        let device = Device::with_config(SimulatedUnit::new(), config);
        device.connect().await.unwrap();

        let interval = Duration::from_secs(5);
        assert!(device.request_status_throttled(true, interval).await.unwrap().is_some());
        let mut events = device.subscribe();

        let task = device.spawn_heartbeat();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(events.try_recv().is_err());
        task.abort();
    }
}
