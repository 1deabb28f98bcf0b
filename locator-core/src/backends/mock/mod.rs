use crate::traits::{ConnectRequest, LinkCheck, Network, WifiStation};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use tokio::sync::Mutex;

/// A mock station for testing purposes.
/// It simulates scanning and connecting without any real hardware interaction.
#[derive(Debug, Default)]
pub struct MockStation {
    networks: Vec<Network>,
    fail_scan: bool,
    reachable: bool,
    connected: Mutex<Option<String>>,
    connects: Mutex<Vec<ConnectRequest>>,
}

impl MockStation {
    pub fn new(networks: Vec<Network>) -> Self {
        Self {
            networks,
            fail_scan: false,
            reachable: true,
            connected: Mutex::new(None),
            connects: Mutex::new(Vec::new()),
        }
    }

    /// Canned neighbourhood used when no specific scan result matters.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Network {
                ssid: "MyHomeWiFi".to_string(),
                signal: 95,
                security: "WPA3".to_string(),
            },
            Network {
                ssid: "CafeGuest".to_string(),
                signal: 78,
                security: "Open".to_string(),
            },
            Network {
                ssid: "karch_eeg_88005553535".to_string(),
                signal: 60,
                security: "WPA2".to_string(),
            },
        ])
    }

    /// Every scan fails, as if the scan utility were missing.
    pub fn with_scan_failure(mut self) -> Self {
        self.fail_scan = true;
        self
    }

    /// Ping checks report the device as unreachable.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Connect requests recorded so far.
    pub async fn connects(&self) -> Vec<ConnectRequest> {
        self.connects.lock().await.clone()
    }

    /// Pretend we are already associated with `ssid`.
    pub async fn set_connected(&self, ssid: &str) {
        *self.connected.lock().await = Some(ssid.to_string());
    }
}

#[async_trait]
impl LinkCheck for MockStation {
    async fn is_connected_to(&self, ssid: &str) -> Result<bool> {
        Ok(self.connected.lock().await.as_deref() == Some(ssid))
    }

    async fn can_reach(&self, _host: IpAddr) -> bool {
        self.reachable
    }
}

#[async_trait]
impl WifiStation for MockStation {
    async fn scan(&self) -> Result<Vec<Network>> {
        if self.fail_scan {
            return Err(Error::CommandFailed("mock scan failure".to_string()));
        }
        Ok(self.networks.clone())
    }

    async fn connect(&self, req: &ConnectRequest) -> Result<()> {
        self.connects.lock().await.push(req.clone());
        *self.connected.lock().await = Some(req.ssid.clone());
        Ok(())
    }
}
