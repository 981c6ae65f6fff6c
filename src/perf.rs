// ==========================================
// 生产批次追踪系统 - SQL 计数与耗时统计
// ==========================================
// 用途: fan_out / 级联删除等多语句事务的性能观测
// 开关:
// - PRODUCTION_TRACKING_PERF_SQL=1 强制开启（Debug 默认开启）
// - PRODUCTION_TRACKING_SLOW_SQL_MS=50 慢 SQL 阈值（毫秒）
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static SQL_TRACE_ON: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static ACTIVE_GUARDS: Cell<u32> = const { Cell::new(0) };
    static STATEMENTS: Cell<u64> = const { Cell::new(0) };
    static SLOW_STATEMENTS: Cell<u64> = const { Cell::new(0) };
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn inside_guard() -> bool {
    ACTIVE_GUARDS.with(|g| g.get() > 0)
}

/// 为连接安装 trace/profile 回调
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = env_flag("PRODUCTION_TRACKING_PERF_SQL").unwrap_or(cfg!(debug_assertions));
    SQL_TRACE_ON.store(enabled, Ordering::Relaxed);

    if !enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    let threshold = std::env::var("PRODUCTION_TRACKING_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
    SLOW_SQL_MS.store(threshold, Ordering::Relaxed);

    conn.trace(Some(on_statement));
    conn.profile(Some(on_profile));
}

fn on_statement(_sql: &str) {
    if SQL_TRACE_ON.load(Ordering::Relaxed) && inside_guard() {
        STATEMENTS.with(|c| c.set(c.get().saturating_add(1)));
    }
}

fn on_profile(sql: &str, duration: Duration) {
    if !SQL_TRACE_ON.load(Ordering::Relaxed) {
        return;
    }
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    let elapsed_ms = duration.as_millis() as u64;
    if threshold == 0 || elapsed_ms < threshold {
        return;
    }

    let flat: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    let shown: String = flat.chars().take(400).collect();
    tracing::warn!(target: "slow_sql", duration_ms = elapsed_ms, sql = %shown, "slow sql");

    if inside_guard() {
        SLOW_STATEMENTS.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 性能统计 Guard：drop 时输出耗时、SQL 条数、慢 SQL 条数
///
/// ```ignore
/// let _perf = production_tracking::perf::PerfGuard::new("fan_out");
/// ```
pub struct PerfGuard {
    op: &'static str,
    started: Instant,
    statements_at_start: u64,
    slow_at_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        ACTIVE_GUARDS.with(|g| g.set(g.get().saturating_add(1)));
        Self {
            op,
            started: Instant::now(),
            statements_at_start: STATEMENTS.with(|c| c.get()),
            slow_at_start: SLOW_STATEMENTS.with(|c| c.get()),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let sql_count = STATEMENTS.with(|c| c.get()).saturating_sub(self.statements_at_start);
        let slow_sql_count = SLOW_STATEMENTS.with(|c| c.get()).saturating_sub(self.slow_at_start);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            sql_count,
            slow_sql_count,
            "done"
        );

        ACTIVE_GUARDS.with(|g| g.set(g.get().saturating_sub(1)));
    }
}
