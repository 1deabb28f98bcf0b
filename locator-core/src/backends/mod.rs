pub mod nmcli;

pub mod netsh;

#[cfg(any(test, feature = "backend_mock"))]
pub mod mock;

use crate::traits::WifiStation;
use std::sync::Arc;

#[cfg(not(any(target_os = "linux", windows, feature = "backend_mock")))]
compile_error!(
    "No Wi-Fi backend for this platform. Build on Linux (nmcli) or Windows (netsh), or enable the `backend_mock` feature."
);

// 在启动时一次性选择平台实现，循环里不再做任何 OS 分支

#[cfg(target_os = "linux")]
pub fn default_station(interface: &str) -> Arc<dyn WifiStation> {
    Arc::new(nmcli::NmcliStation::new(interface))
}

#[cfg(windows)]
pub fn default_station(_interface: &str) -> Arc<dyn WifiStation> {
    Arc::new(netsh::NetshStation::new())
}

#[cfg(all(feature = "backend_mock", not(any(target_os = "linux", windows))))]
pub fn default_station(_interface: &str) -> Arc<dyn WifiStation> {
    Arc::new(mock::MockStation::with_defaults())
}
