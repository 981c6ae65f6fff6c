// ==========================================
// 生产批次追踪系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 全部组件共用一个 SQLite 连接，事务边界由引擎控制
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{MasterDataApi, ProductionApi};
use crate::config::ConfigManager;
use crate::db::{check_schema_version, ensure_schema, open_sqlite_connection};
use crate::engine::{FinishedProductTracker, OperationFanOutEngine, QualityEvaluationShadow};
use crate::repository::{ActionLogRepository, MachineRepository, MaterialBatchRepository};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "PRODUCTION_TRACKING_DB";

/// 应用状态
pub struct AppState {
    pub db_path: String,

    /// 生产业务API（分发/成品/评价）
    pub production_api: Arc<ProductionApi>,

    /// 主数据API（机台/原料批次）
    pub master_data_api: Arc<MasterDataApi>,

    /// 配置管理器（config_kv）
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 1. 打开共享连接（统一 PRAGMA），按需挂载 SQL 统计
    /// 2. 幂等建表 + schema_version 校验
    /// 3. 依次初始化 Repository → Engine → API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::perf::install_sqlite_tracing(&mut conn);
        ensure_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;
        check_schema_version(&conn).map_err(|e| format!("schema_version 读取失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let machine_repo = Arc::new(MachineRepository::new(conn.clone()));
        let material_batch_repo = Arc::new(MaterialBatchRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let fan_out_engine = Arc::new(OperationFanOutEngine::new(conn.clone(), config_manager.clone()));
        let tracker = Arc::new(FinishedProductTracker::new(conn.clone()));
        let shadow = Arc::new(QualityEvaluationShadow::new(conn.clone()));

        // ==========================================
        // 初始化API层
        // ==========================================
        let production_api = Arc::new(ProductionApi::new(
            fan_out_engine,
            tracker,
            shadow,
            action_log_repo.clone(),
        ));
        let master_data_api = Arc::new(MasterDataApi::new(
            machine_repo,
            material_batch_repo,
            config_manager.clone(),
            action_log_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            production_api,
            master_data_api,
            config_manager,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先使用 PRODUCTION_TRACKING_DB，其次为用户数据目录，最后回退到当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./production_tracking.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("production-tracking");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("production_tracking.db");
        }
    }

    path.to_string_lossy().to_string()
}
