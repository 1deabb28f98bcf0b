use locator_core::config::LocatorConfig;
use locator_core::device::StatusClient;
use locator_core::traits::{ConnectRequest, WifiStation, visible_ssids};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Seconds the device IP is pinged after joining before the query is sent.
const REACH_WAIT_SECS: u32 = 10;

/// Exit of one poll cycle.
/// 每个周期重新走一遍 未发现 → 发现 → 连接 → (查询成功 | 查询失败)。
#[derive(Debug)]
enum Cycle {
    NotFound,
    Queried(String),
    QueryFailed,
}

/// Poll until the device has been found and queried once, the attempt bound
/// is exhausted, or the user interrupts. Either way the return is normal;
/// only the entry point turns errors into a nonzero exit.
pub async fn run_locator(station: Arc<dyn WifiStation>, cfg: &LocatorConfig) -> anyhow::Result<()> {
    let client = StatusClient::new(cfg.device_addr, cfg.query_timeout);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        tracing::debug!(attempt, "starting poll cycle");

        match run_cycle(station.as_ref(), cfg, &client).await {
            Cycle::Queried(reply) => {
                tracing::info!(reply = %reply.trim(), "📨 device response");
                restore_home_network(station.as_ref(), cfg).await;
                return Ok(());
            }
            Cycle::QueryFailed => {
                tracing::warn!("device query failed, will retry next cycle");
            }
            Cycle::NotFound => {
                tracing::info!(ssid = %cfg.target_ssid, "network not found this cycle");
            }
        }

        if let Some(max) = cfg.max_attempts {
            if attempt >= max {
                tracing::info!("giving up after {max} attempts");
                return Ok(());
            }
        }

        // 固定间隔轮询；Ctrl-C 只在周期之间生效
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                return Ok(());
            }
            _ = tokio::time::sleep(cfg.poll_interval) => {}
        }
    }
}

async fn run_cycle(station: &dyn WifiStation, cfg: &LocatorConfig, client: &StatusClient) -> Cycle {
    // 已经挂在目标网络上就直接查询，不再扫描
    let already_joined = station
        .is_connected_to(&cfg.target_ssid)
        .await
        .unwrap_or(false);

    if !already_joined {
        // 扫描失败按"本周期未发现"处理，绝不让进程退出
        let networks = match station.scan().await {
            Ok(networks) => networks,
            Err(e) => {
                tracing::warn!("scan failed: {e}, treating as empty result");
                Vec::new()
            }
        };
        let ssids = visible_ssids(&networks);
        tracing::debug!(visible = ssids.len(), "scan complete");

        if !ssids.contains(&cfg.target_ssid) {
            return Cycle::NotFound;
        }
        tracing::info!(ssid = %cfg.target_ssid, "✅ target network found");

        let req = ConnectRequest {
            ssid: cfg.target_ssid.clone(),
            password: cfg.target_password.clone(),
        };
        if let Err(e) = station.connect(&req).await {
            tracing::warn!("connect failed: {e}");
            return Cycle::NotFound;
        }
    }

    wait_reachable(station, cfg.device_addr.ip()).await;

    match client.query_status().await {
        Ok(reply) => Cycle::Queried(reply),
        Err(e) => {
            tracing::warn!(device = %cfg.device_addr, "query failed: {e}");
            Cycle::QueryFailed
        }
    }
}

/// Ping the device once per second until it answers or the wait budget is
/// spent. A silent device is not fatal; the query itself decides.
async fn wait_reachable(station: &dyn WifiStation, host: IpAddr) {
    for i in 0..REACH_WAIT_SECS {
        if station.can_reach(host).await {
            tracing::debug!(%host, "device answered ping");
            return;
        }
        tracing::debug!("waiting for device ({}/{})", i + 1, REACH_WAIT_SECS);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    tracing::warn!(%host, "device never answered ping, querying anyway");
}

/// Best-effort rejoin of the configured home network after a successful
/// device session. Failure only logs; the session already succeeded.
async fn restore_home_network(station: &dyn WifiStation, cfg: &LocatorConfig) {
    let Some(home) = &cfg.home_network else {
        return;
    };
    tracing::info!(ssid = %home.ssid, "🔄 restoring home network");
    let req = ConnectRequest {
        ssid: home.ssid.clone(),
        password: home.password.clone(),
    };
    if let Err(e) = station.connect(&req).await {
        tracing::warn!("failed to restore home network: {e}");
    }
}
