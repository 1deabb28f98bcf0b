mod runner;

use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 初始化日志（这是入口点的职责）
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 2. 加载配置；缺失或无效的配置文件以退出码 1 结束
    let path = std::env::var_os("LOCATOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("locator.toml"));
    let cfg = match locator_core::config::load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("❌ {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        target = %cfg.target_ssid,
        device = %cfg.device_addr,
        "🚀 Starting access-point locator"
    );

    // 3. 在启动时选定平台后端，然后进入轮询循环
    let station = locator_core::backends::default_station(&cfg.interface);
    if let Err(e) = runner::run_locator(station, &cfg).await {
        tracing::error!("❌ Locator failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}
