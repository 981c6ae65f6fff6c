// ==========================================
// 生产批次追踪系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 统一建表入口，保证批次三类记录的唯一约束在存储层兜底
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 统一的时间存储格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）
///
/// 唯一约束说明：
/// - batch_fanout.batch_code 为主键：并发 fan_out 的最终兜底
/// - operation_record / finished_product 的 (batch_code, machine_id) 唯一
/// - quality_evaluation.finished_product_id 唯一（一条成品记录只挂一条评价）
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
          scope_id TEXT NOT NULL,
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          updated_at TEXT NOT NULL DEFAULT (datetime('now')),
          PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS code_sequence (
          seq_name TEXT PRIMARY KEY,
          last_value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS machine (
          machine_id TEXT PRIMARY KEY,
          machine_code TEXT NOT NULL UNIQUE,
          machine_name TEXT NOT NULL UNIQUE,
          status TEXT NOT NULL CHECK (status IN ('RUNNING', 'MAINTENANCE', 'STOPPED')),
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS material_batch (
          material_batch_id TEXT PRIMARY KEY,
          batch_code TEXT NOT NULL,
          process_time TEXT NOT NULL,
          goods_name TEXT NOT NULL,
          input_weight_kg REAL NOT NULL DEFAULT 0,
          soak_time_min REAL NOT NULL DEFAULT 0,
          soak_temperature_c REAL NOT NULL DEFAULT 0,
          frying_temperature_c REAL,
          notes TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          UNIQUE(batch_code, process_time)
        );

        CREATE TABLE IF NOT EXISTS batch_fanout (
          batch_code TEXT PRIMARY KEY,
          process_time TEXT NOT NULL,
          material_batch_id TEXT REFERENCES material_batch(material_batch_id) ON DELETE SET NULL,
          machine_count INTEGER NOT NULL,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS operation_record (
          operation_id TEXT PRIMARY KEY,
          operation_code TEXT NOT NULL UNIQUE,
          batch_code TEXT NOT NULL,
          process_time TEXT,
          material_batch_id TEXT REFERENCES material_batch(material_batch_id) ON DELETE SET NULL,
          machine_id TEXT NOT NULL REFERENCES machine(machine_id),
          machine_name TEXT NOT NULL,
          machine_status TEXT NOT NULL,
          stage1_duration_min REAL NOT NULL DEFAULT 0,
          stage1_temperature_c REAL NOT NULL DEFAULT 0,
          stage1_pressure_kpa REAL NOT NULL DEFAULT 0,
          stage2_duration_min REAL NOT NULL DEFAULT 0,
          stage2_temperature_c REAL NOT NULL DEFAULT 0,
          stage2_pressure_kpa REAL NOT NULL DEFAULT 0,
          stage3_duration_min REAL NOT NULL DEFAULT 0,
          stage3_temperature_c REAL NOT NULL DEFAULT 0,
          stage3_pressure_kpa REAL NOT NULL DEFAULT 0,
          stage4_duration_min REAL NOT NULL DEFAULT 0,
          stage4_temperature_c REAL NOT NULL DEFAULT 0,
          stage4_pressure_kpa REAL NOT NULL DEFAULT 0,
          total_dry_time_min REAL NOT NULL DEFAULT 0,
          operator TEXT,
          notes TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          UNIQUE(batch_code, machine_id)
        );

        CREATE INDEX IF NOT EXISTS idx_operation_record_batch
          ON operation_record(batch_code);

        CREATE TABLE IF NOT EXISTS finished_product (
          finished_product_id TEXT PRIMARY KEY,
          batch_code TEXT NOT NULL,
          process_time TEXT NOT NULL,
          machine_id TEXT NOT NULL REFERENCES machine(machine_id),
          material_batch_id TEXT REFERENCES material_batch(material_batch_id) ON DELETE SET NULL,
          goods_name TEXT NOT NULL,
          grade_a_kg REAL NOT NULL DEFAULT 0,
          grade_b_kg REAL NOT NULL DEFAULT 0,
          grade_b_head_kg REAL NOT NULL DEFAULT 0,
          grade_c_kg REAL NOT NULL DEFAULT 0,
          large_scrap_kg REAL NOT NULL DEFAULT 0,
          small_scrap_kg REAL NOT NULL DEFAULT 0,
          reject_kg REAL NOT NULL DEFAULT 0,
          wet_kg REAL NOT NULL DEFAULT 0,
          total_weight_kg REAL NOT NULL DEFAULT 0,
          grade_a_pct REAL NOT NULL DEFAULT 0,
          grade_b_pct REAL NOT NULL DEFAULT 0,
          grade_b_head_pct REAL NOT NULL DEFAULT 0,
          grade_c_pct REAL NOT NULL DEFAULT 0,
          large_scrap_pct REAL NOT NULL DEFAULT 0,
          small_scrap_pct REAL NOT NULL DEFAULT 0,
          reject_pct REAL NOT NULL DEFAULT 0,
          wet_pct REAL NOT NULL DEFAULT 0,
          notes TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          UNIQUE(batch_code, machine_id)
        );

        CREATE INDEX IF NOT EXISTS idx_finished_product_batch
          ON finished_product(batch_code);

        CREATE TABLE IF NOT EXISTS quality_evaluation (
          quality_evaluation_id TEXT PRIMARY KEY,
          finished_product_id TEXT UNIQUE
            REFERENCES finished_product(finished_product_id) ON DELETE SET NULL,
          batch_code TEXT NOT NULL,
          process_time TEXT,
          machine_id TEXT REFERENCES machine(machine_id),
          goods_name TEXT,
          grade_a_pct REAL NOT NULL DEFAULT 0,
          grade_b_pct REAL NOT NULL DEFAULT 0,
          grade_b_head_pct REAL NOT NULL DEFAULT 0,
          grade_c_pct REAL NOT NULL DEFAULT 0,
          large_scrap_pct REAL NOT NULL DEFAULT 0,
          small_scrap_pct REAL NOT NULL DEFAULT 0,
          reject_pct REAL NOT NULL DEFAULT 0,
          wet_pct REAL NOT NULL DEFAULT 0,
          color TEXT,
          aroma TEXT,
          taste TEXT,
          sweetness TEXT,
          crispness TEXT,
          overall_remark TEXT,
          suggested_adjustment TEXT,
          evaluator TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_quality_evaluation_batch
          ON quality_evaluation(batch_code);

        CREATE TABLE IF NOT EXISTS action_log (
          action_id TEXT PRIMARY KEY,
          batch_code TEXT,
          action_type TEXT NOT NULL,
          action_ts TEXT NOT NULL,
          actor TEXT NOT NULL,
          payload_json TEXT,
          detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_batch
          ON action_log(batch_code, action_ts DESC);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 校验 schema_version，仅告警不做自动迁移
pub fn check_schema_version(conn: &Connection) -> rusqlite::Result<()> {
    match read_schema_version(conn)? {
        Some(v) if v == CURRENT_SCHEMA_VERSION => {}
        Some(v) => tracing::warn!(
            expected = CURRENT_SCHEMA_VERSION,
            actual = v,
            "schema_version 不一致，可能运行在旧库上"
        ),
        None => tracing::warn!("schema_version 表不存在"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = open_sqlite_connection(":memory:").unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_read_schema_version_without_table() {
        let conn = open_sqlite_connection(":memory:").unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
