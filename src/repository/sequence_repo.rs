// ==========================================
// 生产批次追踪系统 - 编码序列仓储
// ==========================================
// 职责: 管理 code_sequence 表，生成人类可读的顺序编码
// 说明: 读-增-写在调用方事务内一次完成 (UPSERT ... RETURNING)，
//       不再“查最大编码再 +1”，并发下不会产生重复编码
// ==========================================

use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection};

/// 编码格式：前缀 + 定宽零填充序号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFormat {
    pub prefix: String,
    pub width: usize,
}

impl CodeFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    pub fn render(&self, value: i64) -> String {
        format!("{}{:0width$}", self.prefix, value, width = self.width)
    }

    /// 序列名按前缀区分，不同前缀互不干扰
    pub fn sequence_name(&self, family: &str) -> String {
        format!("{}:{}", family, self.prefix)
    }
}

pub struct SequenceRepository;

impl SequenceRepository {
    /// 在调用方事务内取下一个序号
    pub fn next_value_tx(conn: &Connection, seq_name: &str) -> RepositoryResult<i64> {
        let value = conn.query_row(
            r#"
            INSERT INTO code_sequence (seq_name, last_value) VALUES (?1, 1)
            ON CONFLICT(seq_name) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
            params![seq_name],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(value)
    }

    /// 在调用方事务内生成下一个编码
    pub fn next_code_tx(conn: &Connection, family: &str, format: &CodeFormat) -> RepositoryResult<String> {
        let value = Self::next_value_tx(conn, &format.sequence_name(family))?;
        Ok(format.render(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ensure_schema, open_sqlite_connection};
    use rusqlite::OptionalExtension;

    fn setup() -> Connection {
        let conn = open_sqlite_connection(":memory:").unwrap();
        ensure_schema(&conn).unwrap();
        conn
    }

    fn stored_value(conn: &Connection, seq_name: &str) -> Option<i64> {
        conn.query_row(
            "SELECT last_value FROM code_sequence WHERE seq_name = ?1",
            params![seq_name],
            |row| row.get(0),
        )
        .optional()
        .unwrap()
    }

    #[test]
    fn test_render_pads_to_width() {
        let format = CodeFormat::new("OP", 6);
        assert_eq!(format.render(7), "OP000007");
        assert_eq!(CodeFormat::new("C", 3).render(1234), "C1234");
    }

    #[test]
    fn test_next_code_is_monotonic() {
        let conn = setup();
        let format = CodeFormat::new("OP", 6);

        let a = SequenceRepository::next_code_tx(&conn, "operation", &format).unwrap();
        let b = SequenceRepository::next_code_tx(&conn, "operation", &format).unwrap();

        assert_eq!(a, "OP000001");
        assert_eq!(b, "OP000002");
        assert_eq!(stored_value(&conn, "operation:OP"), Some(2));
    }

    #[test]
    fn test_prefixes_use_separate_counters() {
        let conn = setup();
        SequenceRepository::next_code_tx(&conn, "operation", &CodeFormat::new("OP", 6)).unwrap();
        let other = SequenceRepository::next_code_tx(&conn, "operation", &CodeFormat::new("MX", 4)).unwrap();
        assert_eq!(other, "MX0001");
    }

    #[test]
    fn test_rolled_back_transaction_does_not_consume_value() {
        let mut conn = setup();
        {
            let tx = conn.transaction().unwrap();
            SequenceRepository::next_value_tx(&tx, "batch:C").unwrap();
            // 未提交，drop 即回滚
        }
        assert_eq!(stored_value(&conn, "batch:C"), None);
    }
}
