// ==========================================
// 生产批次追踪系统 - 主入口
// ==========================================
// 职责: 初始化日志与数据库，输出当前主数据概况
// 说明: HTTP/控制器层不在本仓库内，由外层进程挂载 AppState
// ==========================================

use anyhow::Context;
use production_tracking::app::{get_default_db_path, AppState};
use production_tracking::logging;

fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", production_tracking::APP_NAME);
    tracing::info!("系统版本: {}", production_tracking::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    let machines = state.master_data_api.list_machines()?;
    tracing::info!(machine_count = machines.len(), "已登记机台");
    for machine in &machines {
        tracing::info!(
            code = %machine.machine_code,
            name = %machine.machine_name,
            status = %machine.status,
            "机台"
        );
    }

    let config = state
        .config_manager
        .get_config_snapshot()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::info!(?config, "当前配置");

    Ok(())
}
