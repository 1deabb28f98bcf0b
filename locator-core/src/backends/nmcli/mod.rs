use crate::traits::{ConnectRequest, LinkCheck, Network, WifiStation};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tokio::process::Command;

// 通过调用nmcli命令行工具实现的后端，适用于使用NetworkManager管理网络连接的Linux系统

/// Seconds the post-connect association check is polled before giving up.
const CONNECT_VERIFY_SECS: u32 = 10;

#[derive(Debug)]
pub struct NmcliStation {
    interface: String,
}

impl NmcliStation {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    /// Split one line of `nmcli -t` output into fields.
    /// 终端模式只转义 `:` 和 `\`，这里必须按未转义的冒号切分；
    /// 未知的转义序列（比如 `\x00` 占位符）原样保留。
    fn split_terse(line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(next @ (':' | '\\')) => current.push(next),
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => current.push('\\'),
                },
                ':' => fields.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }
        fields.push(current);
        fields
    }

    fn parse_wifi_list(output: &str) -> Vec<Network> {
        let mut networks = Vec::new();
        for line in output.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let fields = Self::split_terse(line);
            let ssid = fields.first().cloned().unwrap_or_default();
            if ssid.is_empty() || ssid == "\\x00" {
                continue;
            }
            // SIGNAL 已经是 0-100 的百分比
            let signal = fields
                .get(1)
                .and_then(|s| s.parse::<u8>().ok())
                .unwrap_or(0)
                .min(100);
            let security = match fields.get(2) {
                Some(s) if !s.is_empty() => s.clone(),
                // 空的 SECURITY 字段表示开放网络；缺列才是未知
                Some(_) => "Open".to_string(),
                None => "Unknown".to_string(),
            };
            networks.push(Network {
                ssid,
                signal,
                security,
            });
        }
        networks
    }

    async fn scan_internal(&self) -> Result<Vec<Network>> {
        // 先请求一次重扫；失败不致命，list 仍会返回缓存结果
        let _ = Command::new("nmcli")
            .arg("device")
            .arg("wifi")
            .arg("rescan")
            .output()
            .await;
        let output = Command::new("nmcli")
            .arg("-t")
            .arg("-f")
            .arg("SSID,SIGNAL,SECURITY")
            .arg("device")
            .arg("wifi")
            .arg("list")
            .output()
            .await?;
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!("nmcli scan failed: {err}")));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Self::parse_wifi_list(&stdout))
    }
}

#[async_trait]
impl LinkCheck for NmcliStation {
    async fn is_connected_to(&self, ssid: &str) -> Result<bool> {
        let output = Command::new("nmcli")
            .arg("-t")
            .arg("-f")
            .arg("NAME,DEVICE,STATE")
            .arg("connection")
            .arg("show")
            .arg("--active")
            .output()
            .await;
        match output {
            Ok(out) => {
                if !out.status.success() {
                    return Ok(false);
                }
                let stdout = String::from_utf8_lossy(&out.stdout);
                for line in stdout.lines() {
                    let fields = Self::split_terse(line);
                    if fields.len() >= 3
                        && fields[0] == ssid
                        && fields[1] == self.interface
                        && fields[2] == "activated"
                    {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    async fn can_reach(&self, host: IpAddr) -> bool {
        match Command::new("ping")
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg("2")
            .arg(host.to_string())
            .output()
            .await
        {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl WifiStation for NmcliStation {
    async fn scan(&self) -> Result<Vec<Network>> {
        self.scan_internal().await
    }

    async fn connect(&self, req: &ConnectRequest) -> Result<()> {
        tracing::info!(ssid = %req.ssid, "🔍 nmcli: joining network");

        let output = if req.password.is_empty() {
            Command::new("nmcli")
                .arg("device")
                .arg("wifi")
                .arg("connect")
                .arg(&req.ssid)
                .output()
                .await?
        } else {
            Command::new("nmcli")
                .arg("device")
                .arg("wifi")
                .arg("connect")
                .arg(&req.ssid)
                .arg("password")
                .arg(&req.password)
                .output()
                .await?
        };
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!(
                "nmcli connect '{}' failed: {}",
                req.ssid,
                err.trim()
            )));
        }

        // 轮询关联状态；超时只告警，真正的可达性由调用方检查
        for i in 0..CONNECT_VERIFY_SECS {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if self.is_connected_to(&req.ssid).await? {
                tracing::info!(ssid = %req.ssid, "✅ association confirmed");
                return Ok(());
            }
            tracing::debug!("waiting for association ({}/{})", i + 1, CONNECT_VERIFY_SECS);
        }
        tracing::warn!(
            ssid = %req.ssid,
            "could not confirm association within {CONNECT_VERIFY_SECS}s, continuing"
        );
        Ok(())
    }
}
