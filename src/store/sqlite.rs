use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::info;

use super::{guard_update, BeneficiaryQuery, QueryOrder, RecordStore, StoreError};
use crate::config::DatabaseConfig;
use crate::models::{
    Beneficiary, BeneficiaryId, CampEvent, EventDraft, EventId, RegNumber, RegistrationDetails,
};
use crate::stages::{FieldWrite, StageUpdate, Step};

/// SQLite-backed record store with automatic migrations
pub struct SqliteRecordStore {
    pool: SqlitePool,
    enforce_transitions: bool,
}

impl SqliteRecordStore {
    /// Open (creating if needed) the database and run migrations if enabled
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
        enforce_transitions: bool,
    ) -> Result<Self, StoreError> {
        if !Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self {
            pool,
            enforce_transitions,
        })
    }

    pub async fn from_config(config: &DatabaseConfig, enforce_transitions: bool) -> Result<Self, StoreError> {
        Self::connect(
            &config.url,
            config.max_connections,
            config.auto_migrate,
            enforce_transitions,
        )
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }

    async fn fetch_beneficiary(&self, id: &BeneficiaryId) -> Result<Option<Beneficiary>, StoreError> {
        let row = sqlx::query("SELECT * FROM beneficiaries WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(beneficiary_from_row).transpose()
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn parse_uuid(text: &str) -> Result<uuid::Uuid, StoreError> {
    uuid::Uuid::parse_str(text).map_err(|e| StoreError::Malformed(format!("id '{text}': {e}")))
}

fn parse_date(text: &str) -> Result<NaiveDate, StoreError> {
    text.parse::<NaiveDate>()
        .map_err(|e| StoreError::Malformed(format!("date '{text}': {e}")))
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Malformed(format!("timestamp '{text}': {e}")))
}

fn parse_step(text: String) -> Result<Step, StoreError> {
    text.parse::<Step>().map_err(|_| StoreError::UnknownStep(text))
}

fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<Option<T>, StoreError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(StoreError::from)
}

fn event_from_row(row: &SqliteRow) -> Result<CampEvent, StoreError> {
    Ok(CampEvent {
        id: EventId(parse_uuid(&row.try_get::<String, _>("id")?)?),
        event_name: row.try_get("event_name")?,
        event_date: parse_date(&row.try_get::<String, _>("event_date")?)?,
        location: row.try_get("location")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn beneficiary_from_row(row: &SqliteRow) -> Result<Beneficiary, StoreError> {
    let age: Option<i64> = row.try_get("age")?;
    let date_of_birth: Option<String> = row.try_get("date_of_birth")?;
    let reg_number: String = row.try_get("reg_number")?;

    let details = RegistrationDetails {
        name: row.try_get("name")?,
        father_name: row.try_get("father_name")?,
        date_of_birth: date_of_birth.as_deref().map(parse_date).transpose()?,
        age: age.map(|a| a.clamp(0, i64::from(u8::MAX)) as u8),
        address: row.try_get("address")?,
        state: row.try_get("state")?,
        phone_number: row.try_get("phone_number")?,
        aadhar_number: row.try_get("aadhar_number")?,
        type_of_aid: json_column(row, "type_of_aid")?.unwrap_or_default(),
    };

    Ok(Beneficiary {
        id: BeneficiaryId(parse_uuid(&row.try_get::<String, _>("id")?)?),
        event_id: EventId(parse_uuid(&row.try_get::<String, _>("event_id")?)?),
        reg_number: reg_number.parse::<RegNumber>().map_err(StoreError::Malformed)?,
        camp_date: parse_date(&row.try_get::<String, _>("camp_date")?)?,
        details,
        current_step: parse_step(row.try_get("current_step")?)?,
        completed_steps: json_column(row, "completed_steps")?.unwrap_or_default(),
        step_volunteers: json_column(row, "step_volunteers")?.unwrap_or_default(),
        before_photo_url: row.try_get("before_photo_url")?,
        measurement_data: json_column(row, "measurement_data")?,
        fitment_data: json_column(row, "fitment_data")?,
        extra_items: json_column(row, "extra_items")?,
        after_photo_url: row.try_get("after_photo_url")?,
        cancel_reason: row.try_get("cancel_reason")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

/// Column value for a field write; structured payloads are stored as JSON.
fn write_value(write: &FieldWrite) -> Result<Option<String>, StoreError> {
    Ok(match write {
        FieldWrite::BeforePhotoUrl(v) | FieldWrite::AfterPhotoUrl(v) | FieldWrite::CancelReason(v) => v.clone(),
        FieldWrite::MeasurementData(v) => v.as_ref().map(serde_json::to_string).transpose()?,
        FieldWrite::FitmentData(v) => v.as_ref().map(serde_json::to_string).transpose()?,
        FieldWrite::ExtraItems(v) => v.as_ref().map(serde_json::to_string).transpose()?,
    })
}

fn constraint_or(err: sqlx::Error, message: String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Constraint(message),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_event(&self, event: &CampEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO events (id, event_name, event_date, location, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(event.id.to_string())
        .bind(&event.event_name)
        .bind(event.event_date.to_string())
        .bind(&event.location)
        .bind(timestamp(event.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| constraint_or(e, format!("event {} already exists", event.id)))?;
        Ok(())
    }

    async fn get_event(&self, id: &EventId) -> Result<Option<CampEvent>, StoreError> {
        let row = sqlx::query("SELECT * FROM events WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn list_events(&self) -> Result<Vec<CampEvent>, StoreError> {
        let rows = sqlx::query("SELECT * FROM events ORDER BY event_date DESC, created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn update_event(&self, id: &EventId, draft: &EventDraft) -> Result<CampEvent, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE events SET event_name = ?1, event_date = ?2, location = ?3
            WHERE id = ?4
            "#,
        )
        .bind(draft.event_name.trim())
        .bind(draft.event_date.to_string())
        .bind(draft.location.trim())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Event", id));
        }
        self.get_event(id).await?.ok_or_else(|| not_found("Event", id))
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), StoreError> {
        if self.count_beneficiaries(id).await? > 0 {
            return Err(StoreError::Constraint(format!(
                "event {id} still has registered beneficiaries"
            )));
        }
        let result = sqlx::query("DELETE FROM events WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("Event", id));
        }
        Ok(())
    }

    async fn count_beneficiaries(&self, event_id: &EventId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM beneficiaries WHERE event_id = ?1")
            .bind(event_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_beneficiary(&self, b: &Beneficiary) -> Result<(), StoreError> {
        let d = &b.details;
        sqlx::query(
            r#"
            INSERT INTO beneficiaries (
                id, event_id, reg_number, camp_date, name, father_name, date_of_birth, age,
                address, state, phone_number, aadhar_number, type_of_aid, current_step,
                completed_steps, step_volunteers, before_photo_url, measurement_data,
                fitment_data, extra_items, after_photo_url, cancel_reason, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
            "#,
        )
        .bind(b.id.to_string())
        .bind(b.event_id.to_string())
        .bind(b.reg_number.as_str())
        .bind(b.camp_date.to_string())
        .bind(&d.name)
        .bind(&d.father_name)
        .bind(d.date_of_birth.map(|dob| dob.to_string()))
        .bind(d.age.map(i64::from))
        .bind(&d.address)
        .bind(&d.state)
        .bind(&d.phone_number)
        .bind(&d.aadhar_number)
        .bind(serde_json::to_string(&d.type_of_aid)?)
        .bind(b.current_step.as_str())
        .bind(serde_json::to_string(&b.completed_steps)?)
        .bind(serde_json::to_string(&b.step_volunteers)?)
        .bind(&b.before_photo_url)
        .bind(b.measurement_data.as_ref().map(serde_json::to_string).transpose()?)
        .bind(b.fitment_data.as_ref().map(serde_json::to_string).transpose()?)
        .bind(b.extra_items.as_ref().map(serde_json::to_string).transpose()?)
        .bind(&b.after_photo_url)
        .bind(&b.cancel_reason)
        .bind(timestamp(b.created_at))
        .bind(timestamp(b.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            constraint_or(
                e,
                format!("registration number {} already exists for this event", b.reg_number),
            )
        })?;
        Ok(())
    }

    async fn get_beneficiary(&self, id: &BeneficiaryId) -> Result<Option<Beneficiary>, StoreError> {
        self.fetch_beneficiary(id).await
    }

    async fn select_beneficiaries(&self, query: &BeneficiaryQuery) -> Result<Vec<Beneficiary>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM beneficiaries WHERE 1 = 1");
        if let Some(event_id) = query.event_id {
            qb.push(" AND event_id = ").push_bind(event_id.to_string());
        }
        if let Some(step) = query.current_step {
            qb.push(" AND current_step = ").push_bind(step.as_str());
        }
        if let Some(reg) = &query.reg_number {
            qb.push(" AND reg_number = ").push_bind(reg.as_str().to_string());
        }
        if let Some(from) = query.camp_date_from {
            qb.push(" AND camp_date >= ").push_bind(from.to_string());
        }
        if let Some(to) = query.camp_date_to {
            qb.push(" AND camp_date <= ").push_bind(to.to_string());
        }
        qb.push(match query.order {
            QueryOrder::CreatedAsc => " ORDER BY created_at ASC",
            QueryOrder::CreatedDesc => " ORDER BY created_at DESC",
            QueryOrder::CampDateDesc => " ORDER BY camp_date DESC, created_at ASC",
        });

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(beneficiary_from_row).collect()
    }

    async fn apply_stage_update(
        &self,
        id: &BeneficiaryId,
        update: &StageUpdate,
    ) -> Result<Beneficiary, StoreError> {
        // Write lock up front: a racing advance waits, then fails the step check
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let stored: Option<String> = sqlx::query_scalar("SELECT current_step FROM beneficiaries WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let stored = parse_step(stored.ok_or_else(|| not_found("Beneficiary", id))?)?;
        guard_update(self.enforce_transitions, id, stored, update)?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE beneficiaries SET current_step = ");
        qb.push_bind(update.to.as_str());
        qb.push(", completed_steps = ")
            .push_bind(serde_json::to_string(&update.completed_steps)?);
        qb.push(", step_volunteers = ")
            .push_bind(serde_json::to_string(&update.step_volunteers)?);
        qb.push(", updated_at = ").push_bind(timestamp(Utc::now()));
        for write in &update.writes {
            qb.push(", ")
                .push(write.column())
                .push(" = ")
                .push_bind(write_value(write)?);
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());
        if self.enforce_transitions {
            // compare-and-set on the row
            qb.push(" AND current_step = ").push_bind(update.from.as_str());
        }

        let result = qb.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::StaleStep {
                id: id.to_string(),
                expected: update.from,
                actual: stored,
            });
        }
        tx.commit().await?;

        self.fetch_beneficiary(id)
            .await?
            .ok_or_else(|| not_found("Beneficiary", id))
    }

    async fn update_details(
        &self,
        id: &BeneficiaryId,
        details: &RegistrationDetails,
    ) -> Result<Beneficiary, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE beneficiaries SET
                name = ?1, father_name = ?2, date_of_birth = ?3, age = ?4, address = ?5,
                state = ?6, phone_number = ?7, aadhar_number = ?8, type_of_aid = ?9, updated_at = ?10
            WHERE id = ?11
            "#,
        )
        .bind(&details.name)
        .bind(&details.father_name)
        .bind(details.date_of_birth.map(|dob| dob.to_string()))
        .bind(details.age.map(i64::from))
        .bind(&details.address)
        .bind(&details.state)
        .bind(&details.phone_number)
        .bind(&details.aadhar_number)
        .bind(serde_json::to_string(&details.type_of_aid)?)
        .bind(timestamp(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Beneficiary", id));
        }
        self.fetch_beneficiary(id)
            .await?
            .ok_or_else(|| not_found("Beneficiary", id))
    }
}
