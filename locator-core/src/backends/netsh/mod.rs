//! Backend that drives the Windows WLAN stack through `netsh wlan`.
//!
//! Scanning parses the textual output of `netsh wlan show networks`; joining
//! a network renders a WLAN profile XML, registers it with
//! `netsh wlan add profile` and then issues `netsh wlan connect`.
//!
//! The subprocess calls are Windows-only in practice, but the module compiles
//! everywhere so the parsers stay testable on any host; on other platforms
//! the commands simply fail with `CommandFailed`.

use crate::traits::{ConnectRequest, LinkCheck, Network, WifiStation};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

const CONNECT_VERIFY_SECS: u32 = 10;

#[derive(Debug, Default)]
pub struct NetshStation;

impl NetshStation {
    pub fn new() -> Self {
        Self
    }

    async fn scan_internal(&self) -> Result<Vec<Network>> {
        let output = Command::new("netsh")
            .args(["wlan", "show", "networks"])
            .output()
            .await?;
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed(format!("netsh scan failed: {err}")));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_show_networks(&stdout))
    }

    /// Register the profile XML and ask the WLAN service to connect.
    async fn add_profile_and_connect(&self, req: &ConnectRequest) -> Result<()> {
        let profile = wlan_profile_xml(&req.ssid, &req.password);
        let path = profile_path(&req.ssid);
        tokio::fs::write(&path, profile).await?;

        let add = Command::new("netsh")
            .arg("wlan")
            .arg("add")
            .arg("profile")
            .arg(format!("filename={}", path.display()))
            .arg("user=all")
            .output()
            .await;
        // 临时文件注册完就删，失败无所谓
        let _ = tokio::fs::remove_file(&path).await;

        let add = add?;
        if !add.status.success() {
            let err = String::from_utf8_lossy(&add.stdout);
            return Err(Error::CommandFailed(format!(
                "netsh add profile failed: {}",
                err.trim()
            )));
        }

        let connect = Command::new("netsh")
            .arg("wlan")
            .arg("connect")
            .arg(format!("name={}", req.ssid))
            .output()
            .await?;
        if !connect.status.success() {
            let err = String::from_utf8_lossy(&connect.stdout);
            return Err(Error::CommandFailed(format!(
                "netsh connect '{}' failed: {}",
                req.ssid,
                err.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkCheck for NetshStation {
    async fn is_connected_to(&self, ssid: &str) -> Result<bool> {
        let output = Command::new("netsh")
            .args(["wlan", "show", "interfaces"])
            .output()
            .await;
        match output {
            Ok(out) => {
                if !out.status.success() {
                    return Ok(false);
                }
                let stdout = String::from_utf8_lossy(&out.stdout);
                Ok(interface_connected_to(&stdout, ssid))
            }
            Err(_) => Ok(false),
        }
    }

    async fn can_reach(&self, host: IpAddr) -> bool {
        match Command::new("ping")
            .arg("-n")
            .arg("1")
            .arg("-w")
            .arg("2000")
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
impl WifiStation for NetshStation {
    async fn scan(&self) -> Result<Vec<Network>> {
        self.scan_internal().await
    }

    async fn connect(&self, req: &ConnectRequest) -> Result<()> {
        tracing::info!(ssid = %req.ssid, "⚙️ netsh: joining network");
        self.add_profile_and_connect(req).await?;

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

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Split a netsh key-value line on the first `" : "` separator.
///
/// The space-colon-space convention avoids mis-splitting on colons inside
/// MAC addresses or SSIDs. A line ending in `" :"` yields an empty value
/// (hidden networks).
fn split_kv(line: &str) -> Option<(&str, &str)> {
    if let Some(idx) = line.find(" : ") {
        return Some((line[..idx].trim(), line[idx + 3..].trim()));
    }
    if let Some(stripped) = line.strip_suffix(" :") {
        return Some((stripped.trim(), ""));
    }
    None
}

/// SSID header: `"SSID 1 : name"`. Must not match `"BSSID 1 : ..."`.
fn try_parse_ssid_line(line: &str) -> Option<String> {
    let upper = line.to_ascii_uppercase();
    if !upper.starts_with("SSID") || upper.starts_with("BSSID") {
        return None;
    }
    let (_key, value) = split_kv(line)?;
    Some(value.to_owned())
}

/// Parse the output of `netsh wlan show networks` into scan records.
///
/// The output is a sequence of SSID blocks; `Authentication` lines fill the
/// security field and `Signal` lines (only present with `mode=bssid`) fill
/// the signal. Unknown or localised lines are silently skipped, hidden
/// (empty-name) networks are dropped.
fn parse_show_networks(output: &str) -> Vec<Network> {
    let mut networks: Vec<Network> = Vec::new();
    let mut current: Option<Network> = None;

    for line in output.lines() {
        let trimmed = line.trim();

        if let Some(ssid) = try_parse_ssid_line(trimmed) {
            if let Some(net) = current.take() {
                networks.push(net);
            }
            if !ssid.is_empty() {
                current = Some(Network {
                    ssid,
                    signal: 0,
                    security: "Unknown".to_string(),
                });
            }
            continue;
        }

        let Some(net) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = split_kv(trimmed) else {
            continue;
        };
        let upper = key.to_ascii_uppercase();
        if upper.starts_with("AUTHENTICATION") {
            net.security = value.to_string();
        } else if upper.starts_with("SIGNAL") {
            net.signal = value
                .trim_end_matches('%')
                .trim()
                .parse::<u8>()
                .unwrap_or(0)
                .min(100);
        }
    }

    if let Some(net) = current.take() {
        networks.push(net);
    }
    networks
}

/// Check `netsh wlan show interfaces` output for an interface that is
/// both associated with `ssid` and in the connected state.
fn interface_connected_to(output: &str, ssid: &str) -> bool {
    let mut state_connected = false;
    let mut current_ssid: Option<String> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        let Some((key, value)) = split_kv(trimmed) else {
            continue;
        };
        let upper = key.to_ascii_uppercase();
        if upper == "STATE" {
            state_connected = value.to_ascii_lowercase().contains("connected")
                && !value.to_ascii_lowercase().contains("disconnected");
        } else if upper == "SSID" {
            current_ssid = Some(value.to_string());
        }
        if state_connected && current_ssid.as_deref() == Some(ssid) {
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Profile XML
// ---------------------------------------------------------------------------

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Render the WLAN profile registered before connecting.
/// WPA2PSK/AES 模板来自设备配套脚本；空密码走开放认证模板。
fn wlan_profile_xml(ssid: &str, password: &str) -> String {
    let name = xml_escape(ssid);
    if password.is_empty() {
        return format!(
            r#"<?xml version="1.0"?>
<WLANProfile xmlns="http://www.microsoft.com/networking/WLAN/profile/v1">
    <name>{name}</name>
    <SSIDConfig>
        <SSID>
            <name>{name}</name>
        </SSID>
    </SSIDConfig>
    <connectionType>ESS</connectionType>
    <connectionMode>manual</connectionMode>
    <MSM>
        <security>
            <authEncryption>
                <authentication>open</authentication>
                <encryption>none</encryption>
                <useOneX>false</useOneX>
            </authEncryption>
        </security>
    </MSM>
</WLANProfile>"#
        );
    }
    let key = xml_escape(password);
    format!(
        r#"<?xml version="1.0"?>
<WLANProfile xmlns="http://www.microsoft.com/networking/WLAN/profile/v1">
    <name>{name}</name>
    <SSIDConfig>
        <SSID>
            <name>{name}</name>
        </SSID>
    </SSIDConfig>
    <connectionType>ESS</connectionType>
    <connectionMode>manual</connectionMode>
    <MSM>
        <security>
            <authEncryption>
                <authentication>WPA2PSK</authentication>
                <encryption>AES</encryption>
                <useOneX>false</useOneX>
            </authEncryption>
            <sharedKey>
                <keyType>passPhrase</keyType>
                <protected>false</protected>
                <keyMaterial>{key}</keyMaterial>
            </sharedKey>
        </security>
    </MSM>
</WLANProfile>"#
    )
}

/// Temp-file location for the rendered profile. The SSID is sanitised so it
/// cannot smuggle path separators into the file name.
fn profile_path(ssid: &str) -> PathBuf {
    let safe: String = ssid
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    std::env::temp_dir().join(format!("wlan-profile-{safe}.xml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::is_target_visible;

    const SAMPLE_OUTPUT: &str = "\
Interface name : Wi-Fi
There are 3 networks currently visible.

SSID 1 : karch_eeg_88005553535
    Network type            : Infrastructure
    Authentication          : WPA2-Personal
    Encryption              : CCMP

SSID 2 : MTSRouter_28F9
    Network type            : Infrastructure
    Authentication          : WPA2-Personal
    Encryption              : CCMP

SSID 3 : CafeGuest
    Network type            : Infrastructure
    Authentication          : Open
    Encryption              : None
";

    #[test]
    fn parses_all_ssid_blocks() {
        let networks = parse_show_networks(SAMPLE_OUTPUT);
        assert_eq!(networks.len(), 3);
        assert_eq!(networks[0].ssid, "karch_eeg_88005553535");
        assert_eq!(networks[0].security, "WPA2-Personal");
        assert_eq!(networks[2].security, "Open");
        assert!(is_target_visible(&networks, "karch_eeg_88005553535"));
        assert!(!is_target_visible(&networks, "NotHere"));
    }

    #[test]
    fn bare_ssid_header_without_index_parses() {
        let networks = parse_show_networks("SSID : karch_eeg_88005553535\n");
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].ssid, "karch_eeg_88005553535");
    }

    #[test]
    fn signal_line_populates_signal_in_bssid_mode() {
        let output = "\
SSID 1 : HomeNet
    Authentication          : WPA2-Personal
    BSSID 1                 : d8:32:14:b0:a0:3e
         Signal             : 84%
";
        let networks = parse_show_networks(output);
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].signal, 84);
    }

    #[test]
    fn bssid_lines_are_not_networks() {
        let output = "\
SSID 1 : HomeNet
    Authentication          : WPA2-Personal
    BSSID 1                 : d8:32:14:b0:a0:3e
    BSSID 2                 : d8:32:14:b0:a0:3d
";
        let networks = parse_show_networks(output);
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].ssid, "HomeNet");
    }

    #[test]
    fn hidden_networks_are_dropped() {
        let output = "\
SSID 1 :
    Authentication          : Open

SSID 2 : Visible
    Authentication          : WPA2-Personal
";
        let networks = parse_show_networks(output);
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].ssid, "Visible");
    }

    #[test]
    fn ssid_with_colons_survives() {
        let output = "SSID 1 : My:Weird:SSID\n    Authentication          : WPA2-Personal\n";
        let networks = parse_show_networks(output);
        assert_eq!(networks[0].ssid, "My:Weird:SSID");
    }

    #[test]
    fn crlf_output_parses() {
        let output = "SSID 1 : Test\r\n    Authentication          : WPA2-Personal\r\n";
        let networks = parse_show_networks(output);
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].ssid, "Test");
        assert_eq!(networks[0].security, "WPA2-Personal");
    }

    #[test]
    fn no_networks_message_parses_to_empty() {
        let output = "Interface name : Wi-Fi\nThere is 0 network currently visible.\n";
        assert!(parse_show_networks(output).is_empty());
        assert!(parse_show_networks("").is_empty());
    }

    #[test]
    fn connected_interface_matches_ssid() {
        let output = "\
There is 1 interface on the system:

    Name                   : Wi-Fi
    State                  : connected
    SSID                   : karch_eeg_88005553535
    BSSID                  : d8:32:14:b0:a0:3e
";
        assert!(interface_connected_to(output, "karch_eeg_88005553535"));
        assert!(!interface_connected_to(output, "OtherNet"));
    }

    #[test]
    fn disconnected_interface_does_not_match() {
        let output = "\
    Name                   : Wi-Fi
    State                  : disconnected
";
        assert!(!interface_connected_to(output, "karch_eeg_88005553535"));
    }

    #[test]
    fn profile_xml_contains_ssid_and_key() {
        let xml = wlan_profile_xml("karch_eeg_88005553535", "12345678");
        assert!(xml.contains("<name>karch_eeg_88005553535</name>"));
        assert!(xml.contains("<keyMaterial>12345678</keyMaterial>"));
        assert!(xml.contains("<authentication>WPA2PSK</authentication>"));
    }

    #[test]
    fn open_network_profile_has_no_shared_key() {
        let xml = wlan_profile_xml("CafeGuest", "");
        assert!(xml.contains("<authentication>open</authentication>"));
        assert!(!xml.contains("sharedKey"));
    }

    #[test]
    fn profile_xml_escapes_markup() {
        let xml = wlan_profile_xml("A&B <Net>", "p\"w'd");
        assert!(xml.contains("<name>A&amp;B &lt;Net&gt;</name>"));
        assert!(xml.contains("<keyMaterial>p&quot;w&apos;d</keyMaterial>"));
    }

    #[test]
    fn profile_path_sanitises_ssid() {
        let path = profile_path("weird/../ssid name");
        let file = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!file.contains('/'));
        assert!(!file.contains(".."));
        assert!(file.starts_with("wlan-profile-"));
        assert!(file.ends_with(".xml"));
    }

    #[test]
    fn split_kv_variants() {
        assert_eq!(split_kv("SSID 1 : Foo"), Some(("SSID 1", "Foo")));
        assert_eq!(split_kv("SSID 1 :"), Some(("SSID 1", "")));
        assert_eq!(split_kv("no separator"), None);
        // MAC 地址里的冒号不能当作分隔符
        assert_eq!(
            split_kv("BSSID 1 : d8:32:14:b0:a0:3e"),
            Some(("BSSID 1", "d8:32:14:b0:a0:3e"))
        );
    }
}
