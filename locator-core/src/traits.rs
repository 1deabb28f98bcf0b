use async_trait::async_trait;
use std::collections::HashSet;
use std::net::IpAddr;

// 在这里定义共享的数据结构，和为所有平台后端定义的 trait。

/// Represents a single Wi-Fi network found during a scan.
/// Wi-Fi 扫描时单个网络的具体信息。
#[derive(Debug, Clone)]
pub struct Network {
    pub ssid: String,
    pub signal: u8, // 信号强度，0到100
    pub security: String, // "WPA2", "WEP", "Open"
}

/// Parameters for a single join attempt.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub ssid: String,
    pub password: String,
}

/// The de-duplicated set of SSIDs visible in one scan result.
/// 每次扫描后重新构建，不保留历史。
pub fn visible_ssids(networks: &[Network]) -> HashSet<String> {
    networks.iter().map(|n| n.ssid.clone()).collect()
}

/// Membership test of one target SSID against a scan result.
pub fn is_target_visible(networks: &[Network], target: &str) -> bool {
    networks.iter().any(|n| n.ssid == target)
}

// -----------------------------------------------------------------------------
// 链路层最小化能力：只关心当前关联状态和可达性
// 用于循环里的前置检查，比如"已经连上目标网络就跳过扫描"
#[async_trait]
pub trait LinkCheck: Send + Sync {
    /// 检查当前是否已关联到指定 SSID
    async fn is_connected_to(&self, ssid: &str) -> crate::Result<bool>;

    /// Single ICMP echo against `host`. Fail-soft: any execution error is
    /// reported as "not reachable".
    async fn can_reach(&self, host: IpAddr) -> bool;
}

/// 平台 Wi-Fi 能力：扫描可见网络 + 尝试加入
/// 要求实现 LinkCheck 接口
#[async_trait]
pub trait WifiStation: LinkCheck {
    /// 执行一次实时的 Wi-Fi 扫描
    async fn scan(&self) -> crate::Result<Vec<Network>>;

    /// 尝试连接；返回 Ok 仅表示命令链执行完毕并通过了关联检查
    async fn connect(&self, req: &ConnectRequest) -> crate::Result<()>;
}
