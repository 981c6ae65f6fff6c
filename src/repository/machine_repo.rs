// ==========================================
// 生产批次追踪系统 - 机台登记仓储
// ==========================================
// 职责: 管理 machine 表（身份 + 当前状态）
// 说明: 对分发引擎只读；list_all 的顺序即分发顺序
// ==========================================

use crate::domain::machine::Machine;
use crate::domain::types::MachineStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{format_ts, get_enum, get_ts};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

const MACHINE_COLUMNS: &str =
    "machine_id, machine_code, machine_name, status, created_at, updated_at";

pub struct MachineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MachineRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记机台
    pub fn insert(&self, machine: &Machine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO machine (machine_id, machine_code, machine_name, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                machine.machine_id,
                machine.machine_code,
                machine.machine_name,
                machine.status.as_str(),
                format_ts(&machine.created_at),
                format_ts(&machine.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, machine_id: &str) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, machine_id)
    }

    pub fn find_by_name(&self, machine_name: &str) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        Self::find_by_name_tx(&conn, machine_name)
    }

    /// 列出全部机台（按机台代码排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Machine>> {
        let conn = self.get_conn()?;
        Self::list_all_tx(&conn)
    }

    /// 更新机台状态
    ///
    /// 说明: 已分发的操作记录保存的是分发时刻快照，不受影响
    pub fn update_status(&self, machine_id: &str, status: MachineStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now = chrono::Local::now().naive_local();
        let affected = conn.execute(
            "UPDATE machine SET status = ?1, updated_at = ?2 WHERE machine_id = ?3",
            params![status.as_str(), format_ts(&now), machine_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Machine".to_string(),
                id: machine_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除机台（仍被操作/成品记录引用时触发外键约束）
    pub fn delete(&self, machine_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM machine WHERE machine_id = ?1", params![machine_id])?;
        Ok(affected)
    }

    // ==========================================
    // 事务内查询
    // ==========================================

    pub fn find_by_id_tx(conn: &Connection, machine_id: &str) -> RepositoryResult<Option<Machine>> {
        let sql = format!("SELECT {} FROM machine WHERE machine_id = ?1", MACHINE_COLUMNS);
        let machine = conn
            .query_row(&sql, params![machine_id], Self::map_row)
            .optional()?;
        Ok(machine)
    }

    pub fn find_by_name_tx(conn: &Connection, machine_name: &str) -> RepositoryResult<Option<Machine>> {
        let sql = format!("SELECT {} FROM machine WHERE machine_name = ?1", MACHINE_COLUMNS);
        let machine = conn
            .query_row(&sql, params![machine_name.trim()], Self::map_row)
            .optional()?;
        Ok(machine)
    }

    pub fn list_all_tx(conn: &Connection) -> RepositoryResult<Vec<Machine>> {
        let sql = format!("SELECT {} FROM machine ORDER BY machine_code ASC", MACHINE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<Machine> {
        Ok(Machine {
            machine_id: row.get(0)?,
            machine_code: row.get(1)?,
            machine_name: row.get(2)?,
            status: get_enum(row, 3)?,
            created_at: get_ts(row, 4)?,
            updated_at: get_ts(row, 5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ensure_schema, open_sqlite_connection};

    fn setup_test_repo() -> MachineRepository {
        let conn = open_sqlite_connection(":memory:").expect("Failed to open db");
        ensure_schema(&conn).expect("Failed to create schema");
        MachineRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_insert_and_list_ordered_by_code() {
        let repo = setup_test_repo();
        for (code, name) in [("M02", "Máy 2"), ("M01", "Máy 1"), ("M03", "Máy 3")] {
            repo.insert(&Machine::new(code.into(), name.into(), MachineStatus::Running))
                .expect("Failed to insert");
        }

        let machines = repo.list_all().expect("Failed to list");
        let codes: Vec<_> = machines.iter().map(|m| m.machine_code.as_str()).collect();
        assert_eq!(codes, vec!["M01", "M02", "M03"]);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let repo = setup_test_repo();
        repo.insert(&Machine::new("M01".into(), "Máy 1".into(), MachineStatus::Running))
            .unwrap();

        let err = repo
            .insert(&Machine::new("M09".into(), "Máy 1".into(), MachineStatus::Stopped))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_update_status_and_find_by_name() {
        let repo = setup_test_repo();
        let machine = Machine::new("M01".into(), "Máy 1".into(), MachineStatus::Running);
        repo.insert(&machine).unwrap();

        repo.update_status(&machine.machine_id, MachineStatus::Maintenance)
            .unwrap();
        let found = repo.find_by_name(" Máy 1 ").unwrap().expect("machine not found");
        assert_eq!(found.status, MachineStatus::Maintenance);

        let err = repo.update_status("missing", MachineStatus::Stopped).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
