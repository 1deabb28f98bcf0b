use crate::{Error, Result};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Runtime configuration, immutable for the process lifetime.
/// 全部字段在启动时解析完毕，循环里只读。
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// SSID broadcast by the embedded device.
    pub target_ssid: String,
    /// Passphrase of the device network (empty = open network).
    pub target_password: String,
    /// Address of the status endpoint inside the device network.
    pub device_addr: SocketAddr,
    /// Home network to rejoin after a successful device session.
    pub home_network: Option<HomeNetwork>,
    /// Wireless interface the backends operate on.
    pub interface: String,
    /// Fixed delay between poll cycles.
    pub poll_interval: Duration,
    /// `None` = poll until interrupted.
    pub max_attempts: Option<u32>,
    /// Socket timeout for the device query.
    pub query_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HomeNetwork {
    pub ssid: String,
    pub password: String,
}

/// 用于解析 TOML 的临时结构
#[derive(Deserialize)]
struct LocatorConfigFile {
    esp_network_name: String,
    esp_network_password: String,
    device_ip: String,
    device_port: u16,

    pc_wifi_ssid: Option<String>,
    pc_wifi_password: Option<String>,

    #[serde(default = "default_interface")]
    interface: String,
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
    max_attempts: Option<u32>,
    #[serde(default = "default_query_timeout_secs")]
    query_timeout_secs: u64,
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_query_timeout_secs() -> u64 {
    5
}

impl TryFrom<LocatorConfigFile> for LocatorConfig {
    type Error = Error;

    fn try_from(f: LocatorConfigFile) -> Result<Self> {
        let ip: IpAddr = f
            .device_ip
            .parse()
            .map_err(|_| Error::Config(format!("invalid device_ip '{}'", f.device_ip)))?;

        if f.esp_network_name.is_empty() {
            return Err(Error::Config("esp_network_name must not be empty".into()));
        }

        // pc_wifi_ssid 没有密码时按开放网络处理
        let home_network = f.pc_wifi_ssid.map(|ssid| HomeNetwork {
            ssid,
            password: f.pc_wifi_password.unwrap_or_default(),
        });

        Ok(LocatorConfig {
            target_ssid: f.esp_network_name,
            target_password: f.esp_network_password,
            device_addr: SocketAddr::new(ip, f.device_port),
            home_network,
            interface: f.interface,
            poll_interval: Duration::from_secs(f.poll_interval_secs),
            max_attempts: f.max_attempts,
            query_timeout: Duration::from_secs(f.query_timeout_secs),
        })
    }
}

/// 从 TOML 字符串加载配置
pub fn config_from_toml_str(s: &str) -> Result<LocatorConfig> {
    let parsed: LocatorConfigFile =
        toml::from_str(s).map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
    LocatorConfig::try_from(parsed)
}

/// Load the configuration file. A missing or unreadable file is a
/// `Config` error so the entry point can turn it into exit code 1.
pub fn load_config(path: &Path) -> Result<LocatorConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    config_from_toml_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
esp_network_name = "karch_eeg_88005553535"
esp_network_password = "12345678"
device_ip = "192.168.4.1"
device_port = 8888
pc_wifi_ssid = "MTSRouter_28F9"
pc_wifi_password = "66705895"
interface = "wlp2s0"
poll_interval_secs = 3
max_attempts = 20
query_timeout_secs = 2
"#;

    const MINIMAL: &str = r#"
esp_network_name = "karch_eeg_88005553535"
esp_network_password = "12345678"
device_ip = "192.168.4.1"
device_port = 8888
"#;

    #[test]
    fn full_config_parses() {
        let cfg = config_from_toml_str(FULL).unwrap();
        assert_eq!(cfg.target_ssid, "karch_eeg_88005553535");
        assert_eq!(cfg.device_addr.to_string(), "192.168.4.1:8888");
        assert_eq!(cfg.interface, "wlp2s0");
        assert_eq!(cfg.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.max_attempts, Some(20));
        let home = cfg.home_network.unwrap();
        assert_eq!(home.ssid, "MTSRouter_28F9");
        assert_eq!(home.password, "66705895");
    }

    #[test]
    fn minimal_config_applies_defaults() {
        let cfg = config_from_toml_str(MINIMAL).unwrap();
        assert_eq!(cfg.interface, "wlan0");
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.max_attempts, None);
        assert_eq!(cfg.query_timeout, Duration::from_secs(5));
        assert!(cfg.home_network.is_none());
    }

    #[test]
    fn invalid_device_ip_is_config_error() {
        let bad = MINIMAL.replace("192.168.4.1", "not-an-ip");
        let err = config_from_toml_str(&bad).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_target_ssid_rejected() {
        let bad = MINIMAL.replace("karch_eeg_88005553535", "");
        assert!(matches!(
            config_from_toml_str(&bad),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_required_key_is_config_error() {
        let err = config_from_toml_str("device_ip = \"192.168.4.1\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_config(Path::new("/definitely/not/here/locator.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
