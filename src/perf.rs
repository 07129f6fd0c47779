// ==========================================
// 教务排课核心 - SQL 性能统计
// ==========================================
// 职责: 统计 API 调用内的 SQL 语句数 / 慢 SQL 数，并输出 perf 日志
// 开关: ACADEMY_SCHED_PERF_SQL（Debug 默认开启）
//       ACADEMY_SCHED_SLOW_SQL_MS 慢 SQL 阈值（毫秒）
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const ENV_PERF_SQL: &str = "ACADEMY_SCHED_PERF_SQL";
pub const ENV_SLOW_SQL_MS: &str = "ACADEMY_SCHED_SLOW_SQL_MS";

static PERF_SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static PERF_DEPTH: Cell<u32> = Cell::new(0);
    static SQL_COUNT: Cell<u64> = Cell::new(0);
    static SLOW_SQL_COUNT: Cell<u64> = Cell::new(0);
}

/// SQL 统计开关（从环境变量解析）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSettings {
    pub enabled: bool,
    pub slow_sql_ms: u64,
}

impl PerfSettings {
    pub fn from_env() -> Self {
        Self::parse(
            std::env::var(ENV_PERF_SQL).ok().as_deref(),
            std::env::var(ENV_SLOW_SQL_MS).ok().as_deref(),
        )
    }

    fn parse(enabled: Option<&str>, slow_ms: Option<&str>) -> Self {
        let enabled = match enabled {
            Some(v) => is_true(v),
            None => cfg!(debug_assertions),
        };
        let slow_sql_ms = slow_ms
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self {
            enabled,
            slow_sql_ms,
        }
    }
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// 截断 SQL 用于日志（按字符截断，避免切断多字节字符）
fn truncate_sql(sql: &str, max_chars: usize) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}

/// 为连接安装 profile 回调（语句计数与慢 SQL 都在 profile 中统计）
pub fn install_sqlite_tracing(conn: &mut Connection, settings: PerfSettings) {
    PERF_SQL_ENABLED.store(settings.enabled, Ordering::Relaxed);

    if !settings.enabled {
        conn.profile(None);
        return;
    }

    SLOW_SQL_THRESHOLD_MS.store(settings.slow_sql_ms, Ordering::Relaxed);
    conn.profile(Some(on_sql_profile));
}

fn guard_active() -> bool {
    PERF_DEPTH.with(|d| d.get() > 0)
}

fn on_sql_profile(sql: &str, duration: Duration) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    if guard_active() {
        SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }

    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }

    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %truncate_sql(sql, 400),
        "慢 SQL"
    );
    if guard_active() {
        SLOW_SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 调用级性能统计：drop 时输出 elapsed_ms / sql_count / slow_sql_count
///
/// ```ignore
/// let _perf = PerfGuard::new("reschedule");
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    sql_start: u64,
    slow_sql_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        PERF_DEPTH.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            start: Instant::now(),
            sql_start: SQL_COUNT.with(|c| c.get()),
            slow_sql_start: SLOW_SQL_COUNT.with(|c| c.get()),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let sql_count = SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_start);
        let slow_sql_count = SLOW_SQL_COUNT
            .with(|c| c.get())
            .saturating_sub(self.slow_sql_start);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            sql_count,
            slow_sql_count,
            "done"
        );

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
