use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use outreach_core::errors::{OutreachError, OutreachResult};
use outreach_core::models::CallAttempt;
use outreach_core::traits::CallAttemptRepository;

pub struct SqliteCallAttemptRepository {
    pool: SqlitePool,
}

impl SqliteCallAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_attempt(row: &sqlx::sqlite::SqliteRow) -> OutreachResult<CallAttempt> {
        Ok(CallAttempt {
            id: row.try_get("id")?,
            lead_id: row.try_get("lead_id")?,
            attempt_no: row.try_get("attempt_no")?,
            call_handle: row.try_get("call_handle")?,
            status: row.try_get("status")?,
            scheduled_at: row.try_get("scheduled_at")?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            raw_outcome: row.try_get("raw_outcome")?,
            transcript: row.try_get("transcript")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

const ATTEMPT_COLUMNS: &str = "id, lead_id, attempt_no, call_handle, status, scheduled_at, \
                               started_at, ended_at, raw_outcome, transcript, created_at";

#[async_trait]
impl CallAttemptRepository for SqliteCallAttemptRepository {
    async fn create(&self, attempt: &CallAttempt) -> OutreachResult<CallAttempt> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO call_attempts (lead_id, attempt_no, call_handle, status, scheduled_at,
                                       started_at, ended_at, raw_outcome, transcript, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(attempt.lead_id)
        .bind(attempt.attempt_no)
        .bind(&attempt.call_handle)
        .bind(attempt.status)
        .bind(attempt.scheduled_at)
        .bind(attempt.started_at)
        .bind(attempt.ended_at)
        .bind(&attempt.raw_outcome)
        .bind(&attempt.transcript)
        .bind(attempt.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        let created = Self::row_to_attempt(&row)?;
        debug!(
            "创建呼叫尝试成功: 线索 {} 第 {} 次, ID {}",
            created.lead_id, created.attempt_no, created.id
        );
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> OutreachResult<Option<CallAttempt>> {
        let row = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM call_attempts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_attempt(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_by_call_handle(&self, call_handle: &str) -> OutreachResult<Option<CallAttempt>> {
        let row = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM call_attempts WHERE call_handle = $1"
        ))
        .bind(call_handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_attempt(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_by_lead_id(&self, lead_id: i64) -> OutreachResult<Vec<CallAttempt>> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM call_attempts WHERE lead_id = $1 ORDER BY attempt_no ASC"
        ))
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        rows.iter().map(Self::row_to_attempt).collect()
    }

    async fn latest_for_lead(&self, lead_id: i64) -> OutreachResult<Option<CallAttempt>> {
        let row = sqlx::query(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM call_attempts \
             WHERE lead_id = $1 ORDER BY attempt_no DESC LIMIT 1"
        ))
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_attempt(&row)?)),
            None => Ok(None),
        }
    }

    async fn has_in_flight(&self, lead_id: i64) -> OutreachResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as in_flight FROM call_attempts \
             WHERE lead_id = $1 AND ended_at IS NULL \
               AND status IN ('dispatching', 'dispatched', 'in-call')",
        )
        .bind(lead_id)
        .fetch_one(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        let in_flight: i64 = row.try_get("in_flight")?;
        Ok(in_flight > 0)
    }

    async fn update(&self, attempt: &CallAttempt) -> OutreachResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE call_attempts
            SET call_handle = $2, status = $3, scheduled_at = $4, started_at = $5,
                ended_at = $6, raw_outcome = $7, transcript = $8
            WHERE id = $1
            "#,
        )
        .bind(attempt.id)
        .bind(&attempt.call_handle)
        .bind(attempt.status)
        .bind(attempt.scheduled_at)
        .bind(attempt.started_at)
        .bind(attempt.ended_at)
        .bind(&attempt.raw_outcome)
        .bind(&attempt.transcript)
        .execute(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        if result.rows_affected() == 0 {
            return Err(OutreachError::AttemptNotFound { id: attempt.id });
        }

        debug!("更新呼叫尝试成功: ID {}", attempt.id);
        Ok(())
    }

    async fn store_transcript(
        &self,
        id: i64,
        transcript: &serde_json::Value,
    ) -> OutreachResult<()> {
        let result = sqlx::query("UPDATE call_attempts SET transcript = $1 WHERE id = $2")
            .bind(transcript)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(OutreachError::Database)?;

        if result.rows_affected() == 0 {
            return Err(OutreachError::AttemptNotFound { id });
        }

        debug!("保存呼叫尝试转写成功: ID {}", id);
        Ok(())
    }
}
