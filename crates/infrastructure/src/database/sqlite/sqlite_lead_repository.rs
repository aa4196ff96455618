use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use outreach_core::errors::{OutreachError, OutreachResult};
use outreach_core::models::{Lead, LeadStatus};
use outreach_core::traits::LeadRepository;

pub struct SqliteLeadRepository {
    pool: SqlitePool,
}

impl SqliteLeadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_lead(row: &sqlx::sqlite::SqliteRow) -> OutreachResult<Lead> {
        Ok(Lead {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            messaging_handle: row.try_get("messaging_handle")?,
            city: row.try_get("city")?,
            specialty: row.try_get("specialty")?,
            reason: row.try_get("reason")?,
            channel_preference: row.try_get("channel_preference")?,
            utc_offset_minutes: row.try_get("utc_offset_minutes")?,
            status: row.try_get("status")?,
            next_retry_at: row.try_get("next_retry_at")?,
            max_attempts: row.try_get("max_attempts")?,
            appointment_at: row.try_get("appointment_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const LEAD_COLUMNS: &str = "id, name, phone, messaging_handle, city, specialty, reason, \
                            channel_preference, utc_offset_minutes, status, next_retry_at, \
                            max_attempts, appointment_at, created_at, updated_at";

#[async_trait]
impl LeadRepository for SqliteLeadRepository {
    async fn create(&self, lead: &Lead) -> OutreachResult<Lead> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO leads (name, phone, messaging_handle, city, specialty, reason,
                               channel_preference, utc_offset_minutes, status, next_retry_at,
                               max_attempts, appointment_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(&lead.name)
        .bind(&lead.phone)
        .bind(&lead.messaging_handle)
        .bind(&lead.city)
        .bind(&lead.specialty)
        .bind(&lead.reason)
        .bind(lead.channel_preference)
        .bind(lead.utc_offset_minutes)
        .bind(lead.status)
        .bind(lead.next_retry_at)
        .bind(lead.max_attempts)
        .bind(lead.appointment_at)
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        let created = Self::row_to_lead(&row)?;
        debug!("创建线索成功: ID {}", created.id);
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> OutreachResult<Option<Lead>> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(OutreachError::Database)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_lead(&row)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, lead: &Lead) -> OutreachResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET name = $2, phone = $3, messaging_handle = $4, city = $5, specialty = $6,
                reason = $7, channel_preference = $8, utc_offset_minutes = $9, status = $10,
                next_retry_at = $11, max_attempts = $12, appointment_at = $13, updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(lead.id)
        .bind(&lead.name)
        .bind(&lead.phone)
        .bind(&lead.messaging_handle)
        .bind(&lead.city)
        .bind(&lead.specialty)
        .bind(&lead.reason)
        .bind(lead.channel_preference)
        .bind(lead.utc_offset_minutes)
        .bind(lead.status)
        .bind(lead.next_retry_at)
        .bind(lead.max_attempts)
        .bind(lead.appointment_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        if result.rows_affected() == 0 {
            return Err(OutreachError::LeadNotFound { id: lead.id });
        }

        debug!("更新线索成功: ID {}", lead.id);
        Ok(())
    }

    async fn get_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: Option<i64>,
    ) -> OutreachResult<Vec<Lead>> {
        let mut query = format!(
            "SELECT {LEAD_COLUMNS} FROM leads \
             WHERE status = 'retry-pending' AND next_retry_at IS NOT NULL AND next_retry_at <= $1 \
             ORDER BY next_retry_at ASC"
        );
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(OutreachError::Database)?;

        rows.iter().map(Self::row_to_lead).collect()
    }

    async fn get_by_status(&self, status: LeadStatus) -> OutreachResult<Vec<Lead>> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE status = $1 ORDER BY id ASC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(OutreachError::Database)?;

        rows.iter().map(Self::row_to_lead).collect()
    }
}
