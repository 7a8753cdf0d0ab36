//! 投递记录存储 - 业务能力层
//!
//! 只负责"记录 / 查询投递结果"，不关心流程
//!
//! 以 `job_id` 为唯一键，重复保存同一个职位会覆盖旧记录。

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StorageError;
use crate::models::{ApplicationOutcome, ApplicationStatus, JobFilter};

/// 当前数据库结构版本
const SCHEMA_VERSION: i64 = 1;

const JOB_FILTER_KEY: &str = "job_filter";

/// 某一天的投递统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub applied: u32,
    pub failed: u32,
    pub skipped: u32,
    pub tokens_used: u32,
}

/// 投递记录存储
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// 该职位是否已经成功投递过
    async fn is_already_applied(&self, job_id: &str) -> Result<bool, StorageError>;

    /// 保存结果（按 `job_id` 覆盖）
    async fn save_outcome(&self, outcome: &ApplicationOutcome) -> Result<(), StorageError>;

    async fn get_outcome(&self, job_id: &str) -> Result<Option<ApplicationOutcome>, StorageError>;

    /// 最近的记录，按时间倒序
    async fn list_outcomes(
        &self,
        limit: usize,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationOutcome>, StorageError>;

    /// `day` 当天成功投递的数量
    async fn get_today_count(&self, day: NaiveDate) -> Result<u32, StorageError>;

    async fn increment_daily_stats(
        &self,
        day: NaiveDate,
        status: ApplicationStatus,
        tokens_used: u32,
    ) -> Result<(), StorageError>;

    async fn get_daily_stats(&self, day: NaiveDate) -> Result<DailyStats, StorageError>;

    async fn save_job_filter(&self, filter: &JobFilter) -> Result<(), StorageError>;

    async fn get_job_filter(&self) -> Result<Option<JobFilter>, StorageError>;
}

/// 基于 SQLite 的存储
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// 打开（必要时创建）数据库文件
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!("📂 打开数据库: {}", path.display());
        Self::with_connection(conn)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::ConnectionPoisoned)
    }
}

fn migrate(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );
        "#,
    )?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    debug!("数据库结构升级: v{} → v{}", current, SCHEMA_VERSION);
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS applications (
            job_id TEXT PRIMARY KEY,
            company TEXT NOT NULL,
            title TEXT NOT NULL,
            location TEXT NOT NULL DEFAULT '',
            applied_at TEXT NOT NULL,
            applied_on TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('success', 'failure', 'skipped', 'pending')),
            log_message TEXT NOT NULL DEFAULT '',
            tokens_used INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS daily_stats (
            day TEXT PRIMARY KEY,
            applied INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            tokens_used INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
        CREATE INDEX IF NOT EXISTS idx_applications_day ON applications(applied_on);
        "#,
    )?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

const OUTCOME_COLUMNS: &str =
    "job_id, company, title, location, applied_at, status, log_message, tokens_used";

/// 原始行，解析时间和状态前的中间形态
struct OutcomeRow {
    job_id: String,
    company: String,
    title: String,
    location: String,
    applied_at: String,
    status: String,
    log_message: String,
    tokens_used: u32,
}

impl OutcomeRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            job_id: row.get(0)?,
            company: row.get(1)?,
            title: row.get(2)?,
            location: row.get(3)?,
            applied_at: row.get(4)?,
            status: row.get(5)?,
            log_message: row.get(6)?,
            tokens_used: row.get(7)?,
        })
    }

    fn into_outcome(self) -> Result<ApplicationOutcome, StorageError> {
        let timestamp = DateTime::parse_from_rfc3339(&self.applied_at)
            .map_err(|e| StorageError::CorruptRecord {
                job_id: self.job_id.clone(),
                message: format!("时间格式错误: {}", e),
            })?
            .with_timezone(&Utc);
        let status = self
            .status
            .parse::<ApplicationStatus>()
            .map_err(|message| StorageError::CorruptRecord {
                job_id: self.job_id.clone(),
                message,
            })?;

        Ok(ApplicationOutcome {
            job_id: self.job_id,
            company: self.company,
            title: self.title,
            location: self.location,
            timestamp,
            status,
            log_message: self.log_message,
            tokens_used: self.tokens_used,
        })
    }
}

#[async_trait]
impl ApplicationStore for SqliteStore {
    async fn is_already_applied(&self, job_id: &str) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM applications WHERE job_id = ?1 AND status = 'success'",
                [job_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn save_outcome(&self, outcome: &ApplicationOutcome) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let applied_on = day_key(outcome.timestamp.with_timezone(&Local).date_naive());
        conn.execute(
            r#"
            INSERT INTO applications
                (job_id, company, title, location, applied_at, applied_on, status, log_message, tokens_used)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(job_id) DO UPDATE SET
                company = excluded.company,
                title = excluded.title,
                location = excluded.location,
                applied_at = excluded.applied_at,
                applied_on = excluded.applied_on,
                status = excluded.status,
                log_message = excluded.log_message,
                tokens_used = excluded.tokens_used
            "#,
            params![
                outcome.job_id,
                outcome.company,
                outcome.title,
                outcome.location,
                outcome
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
                applied_on,
                outcome.status.as_str(),
                outcome.log_message,
                outcome.tokens_used,
            ],
        )?;
        debug!("已保存投递记录: {} ({})", outcome.job_id, outcome.status);
        Ok(())
    }

    async fn get_outcome(&self, job_id: &str) -> Result<Option<ApplicationOutcome>, StorageError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM applications WHERE job_id = ?1", OUTCOME_COLUMNS);
        let row = conn
            .query_row(&sql, [job_id], OutcomeRow::from_row)
            .optional()?;
        row.map(OutcomeRow::into_outcome).transpose()
    }

    async fn list_outcomes(
        &self,
        limit: usize,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationOutcome>, StorageError> {
        let conn = self.conn()?;
        let mut sql = format!("SELECT {} FROM applications", OUTCOME_COLUMNS);
        if status.is_some() {
            sql.push_str(" WHERE status = ?2");
        }
        sql.push_str(" ORDER BY applied_at DESC LIMIT ?1");

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(&sql)?;
        let rows = match status {
            Some(s) => stmt
                .query_map(params![limit, s.as_str()], OutcomeRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![limit], OutcomeRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        rows.into_iter().map(OutcomeRow::into_outcome).collect()
    }

    async fn get_today_count(&self, day: NaiveDate) -> Result<u32, StorageError> {
        let conn = self.conn()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM applications WHERE applied_on = ?1 AND status = 'success'",
            [day_key(day)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    async fn increment_daily_stats(
        &self,
        day: NaiveDate,
        status: ApplicationStatus,
        tokens_used: u32,
    ) -> Result<(), StorageError> {
        let (applied, failed, skipped) = match status {
            ApplicationStatus::Success => (1, 0, 0),
            ApplicationStatus::Failure => (0, 1, 0),
            ApplicationStatus::Skipped => (0, 0, 1),
            ApplicationStatus::Pending => (0, 0, 0),
        };
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO daily_stats (day, applied, failed, skipped, tokens_used)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(day) DO UPDATE SET
                applied = applied + excluded.applied,
                failed = failed + excluded.failed,
                skipped = skipped + excluded.skipped,
                tokens_used = tokens_used + excluded.tokens_used
            "#,
            params![day_key(day), applied, failed, skipped, tokens_used],
        )?;
        Ok(())
    }

    async fn get_daily_stats(&self, day: NaiveDate) -> Result<DailyStats, StorageError> {
        let conn = self.conn()?;
        let stats = conn
            .query_row(
                "SELECT applied, failed, skipped, tokens_used FROM daily_stats WHERE day = ?1",
                [day_key(day)],
                |row| {
                    Ok(DailyStats {
                        applied: row.get(0)?,
                        failed: row.get(1)?,
                        skipped: row.get(2)?,
                        tokens_used: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(stats.unwrap_or_default())
    }

    async fn save_job_filter(&self, filter: &JobFilter) -> Result<(), StorageError> {
        let value = serde_json::to_string(filter)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![JOB_FILTER_KEY, value],
        )?;
        Ok(())
    }

    async fn get_job_filter(&self) -> Result<Option<JobFilter>, StorageError> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                [JOB_FILTER_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map(|v| serde_json::from_str(&v)).transpose()?)
    }
}
