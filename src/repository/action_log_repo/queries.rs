use super::core::ActionLogRepository;
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use crate::repository::get_ts;
use rusqlite::{params, Result as SqliteResult, Row};

const ACTION_LOG_COLUMNS: &str =
    "action_id, batch_code, action_type, action_ts, actor, payload_json, detail";

impl ActionLogRepository {
    /// 某批次的全部留痕（时间倒序）
    pub fn list_by_batch_code(&self, batch_code: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE batch_code = ?1 ORDER BY action_ts DESC, rowid DESC",
            ACTION_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![batch_code], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 最近的留痕（不限批次，时间倒序）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC, rowid DESC LIMIT ?1",
            ACTION_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit as i64], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }
}

fn map_row(row: &Row) -> SqliteResult<ActionLog> {
    let payload: Option<String> = row.get(5)?;
    Ok(ActionLog {
        action_id: row.get(0)?,
        batch_code: row.get(1)?,
        action_type: row.get(2)?,
        action_ts: get_ts(row, 3)?,
        actor: row.get(4)?,
        payload_json: payload.and_then(|raw| serde_json::from_str(&raw).ok()),
        detail: row.get(6)?,
    })
}
