// ==========================================
// 生产批次追踪系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// 说明: 非法取值回退默认值并告警，不中断业务
// ==========================================

use crate::config::fan_out_config_trait::{ConfigResult, FanOutConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::types::OrphanPolicy;
use crate::repository::CodeFormat;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

/// 编码宽度上限（防止配置错误生成超长编码）
const MAX_CODE_WIDTH: usize = 12;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }
        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 所有 global 配置的快照（按键排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    fn read_code_format(
        &self,
        prefix_key: &str,
        default_prefix: &str,
        width_key: &str,
        default_width: usize,
    ) -> ConfigResult<CodeFormat> {
        let prefix = self.get_config_or_default(prefix_key, default_prefix)?;
        let prefix = if prefix.trim().is_empty() {
            tracing::warn!(config_key = prefix_key, "编码前缀为空，使用默认值");
            default_prefix.to_string()
        } else {
            prefix.trim().to_string()
        };

        let raw_width = self.get_config_or_default(width_key, &default_width.to_string())?;
        let width = match raw_width.trim().parse::<usize>() {
            Ok(w) if (1..=MAX_CODE_WIDTH).contains(&w) => w,
            _ => {
                tracing::warn!(
                    config_key = width_key,
                    raw_value = %raw_width,
                    "编码宽度配置非法，使用默认值"
                );
                default_width
            }
        };

        Ok(CodeFormat::new(prefix, width))
    }
}

// ==========================================
// FanOutConfigReader Trait 实现
// ==========================================
#[async_trait]
impl FanOutConfigReader for ConfigManager {
    async fn get_orphan_policy(&self) -> ConfigResult<OrphanPolicy> {
        let value = self.get_config_or_default(config_keys::FANOUT_ORPHAN_POLICY, "REJECT")?;
        Ok(value.parse::<OrphanPolicy>().unwrap_or_else(|e| {
            tracing::warn!(
                config_key = config_keys::FANOUT_ORPHAN_POLICY,
                raw_value = %value,
                error = %e,
                "孤儿策略配置非法，使用 REJECT"
            );
            OrphanPolicy::Reject
        }))
    }

    async fn get_operation_code_format(&self) -> ConfigResult<CodeFormat> {
        self.read_code_format(
            config_keys::OPERATION_CODE_PREFIX,
            "OP",
            config_keys::OPERATION_CODE_WIDTH,
            6,
        )
    }

    async fn get_batch_code_format(&self) -> ConfigResult<CodeFormat> {
        self.read_code_format(
            config_keys::BATCH_CODE_PREFIX,
            "C",
            config_keys::BATCH_CODE_WIDTH,
            3,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 分发
    pub const FANOUT_ORPHAN_POLICY: &str = "fanout_orphan_policy";

    // 编码
    pub const OPERATION_CODE_PREFIX: &str = "operation_code_prefix";
    pub const OPERATION_CODE_WIDTH: &str = "operation_code_width";
    pub const BATCH_CODE_PREFIX: &str = "batch_code_prefix";
    pub const BATCH_CODE_WIDTH: &str = "batch_code_width";
}
