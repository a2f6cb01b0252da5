//! PostgreSQL store over the `customers`, `customer_segments`, and
//! `recent_activities` tables.
//!
//! Only parameterized statements are issued; schema management is owned
//! elsewhere.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_core::config::DatabaseConfig;
use crm_core::types::{Activity, Address, Customer, NewActivity, NewSegment, Segment, SegmentCriteria};
use crm_core::{CrmError, CrmResult};
use crm_segmentation::{CompiledPredicate, RecordStore, SqlParam};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};

const CUSTOMER_COLUMNS: &str = "id::bigint AS id, first_name, last_name, email, phone, company, \
     industry, status, value::float8 AS value, created_at::timestamptz AS created_at, \
     updated_at::timestamptz AS updated_at, last_contact::timestamptz AS last_contact, address, tags";

const SEGMENT_COLUMNS: &str =
    "id::bigint AS id, name, description, criteria, created_at::timestamptz AS created_at";

const ACTIVITY_COLUMNS: &str =
    "id::bigint AS id, action, user_name, target, details, created_at::timestamptz AS created_at";

pub struct PgStore {
    pool: PgPool,
    schema: String,
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    industry: Option<String>,
    status: Option<String>,
    value: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    last_contact: Option<DateTime<Utc>>,
    address: Option<Json<Address>>,
    tags: Option<Vec<String>>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            first_name: row.first_name.unwrap_or_default(),
            last_name: row.last_name.unwrap_or_default(),
            email: row.email.unwrap_or_default(),
            phone: row.phone,
            company: row.company,
            industry: row.industry,
            status: row.status.unwrap_or_default(),
            value: row.value.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_contact: row.last_contact,
            address: row.address.map(|a| a.0),
            tags: row.tags.unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SegmentRow {
    id: i64,
    name: String,
    description: Option<String>,
    criteria: Option<Json<SegmentCriteria>>,
    created_at: DateTime<Utc>,
}

impl From<SegmentRow> for Segment {
    fn from(row: SegmentRow) -> Self {
        Segment {
            id: row.id,
            name: row.name,
            description: row.description,
            criteria: row.criteria.map(|c| c.0).unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    action: String,
    user_name: Option<String>,
    target: Option<String>,
    details: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Activity {
            id: row.id,
            action: row.action,
            user_name: row.user_name.unwrap_or_default(),
            target: row.target.unwrap_or_default(),
            details: row.details.unwrap_or(serde_json::Value::Null),
            created_at: row.created_at,
        }
    }
}

fn store_error(e: sqlx::Error) -> CrmError {
    CrmError::Store(e.to_string())
}

/// Double-quote an identifier taken from configuration.
fn quote_ident(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}

impl PgStore {
    /// Connect a pool using the configured URL and schema.
    pub async fn connect(config: &DatabaseConfig) -> CrmResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(store_error)?;
        info!(
            schema = %config.schema,
            max_connections = config.max_connections,
            "PostgreSQL connected"
        );
        Ok(Self::from_pool(pool, &config.schema))
    }

    pub fn from_pool(pool: PgPool, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), name)
    }

    fn count_sql(&self, predicate: &CompiledPredicate) -> String {
        format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            self.table("customers"),
            predicate.clause()
        )
    }

    fn select_sql(&self, predicate: &CompiledPredicate) -> String {
        format!(
            "SELECT {} FROM {} WHERE {}",
            CUSTOMER_COLUMNS,
            self.table("customers"),
            predicate.clause()
        )
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn count_matching(&self, predicate: &CompiledPredicate) -> CrmResult<u64> {
        let sql = self.count_sql(predicate);
        debug!(params = predicate.parameters().len(), "Counting segment members");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for param in predicate.parameters() {
            query = match param {
                SqlParam::Text(s) => query.bind(s.as_str()),
                SqlParam::Number(n) => query.bind(*n),
                SqlParam::Timestamp(t) => query.bind(*t),
            };
        }
        let count = query.fetch_one(&self.pool).await.map_err(store_error)?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_matching(&self, predicate: &CompiledPredicate) -> CrmResult<Vec<Customer>> {
        let sql = self.select_sql(predicate);
        debug!(params = predicate.parameters().len(), "Fetching segment members");

        let mut query = sqlx::query_as::<_, CustomerRow>(&sql);
        for param in predicate.parameters() {
            query = match param {
                SqlParam::Text(s) => query.bind(s.as_str()),
                SqlParam::Number(n) => query.bind(*n),
                SqlParam::Timestamp(t) => query.bind(*t),
            };
        }
        let rows = query.fetch_all(&self.pool).await.map_err(store_error)?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }
}

#[async_trait]
impl crate::SegmentStore for PgStore {
    async fn list_segments(&self) -> CrmResult<Vec<Segment>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY created_at DESC",
            SEGMENT_COLUMNS,
            self.table("customer_segments")
        );
        let rows = sqlx::query_as::<_, SegmentRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Segment::from).collect())
    }

    async fn get_segment(&self, id: i64) -> CrmResult<Option<Segment>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            SEGMENT_COLUMNS,
            self.table("customer_segments")
        );
        let row = sqlx::query_as::<_, SegmentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(Segment::from))
    }

    async fn create_segment(&self, segment: NewSegment) -> CrmResult<Segment> {
        let sql = format!(
            "INSERT INTO {} (name, description, criteria) VALUES ($1, $2, $3) RETURNING {}",
            self.table("customer_segments"),
            SEGMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, SegmentRow>(&sql)
            .bind(&segment.name)
            .bind(&segment.description)
            .bind(Json(&segment.criteria))
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.into())
    }

    async fn delete_segment(&self, id: i64) -> CrmResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table("customer_segments"));
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl crate::ActivityLog for PgStore {
    async fn append(&self, activity: NewActivity) -> CrmResult<Activity> {
        let sql = format!(
            "INSERT INTO {} (action, user_name, target, details, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING {}",
            self.table("recent_activities"),
            ACTIVITY_COLUMNS
        );
        let row = sqlx::query_as::<_, ActivityRow>(&sql)
            .bind(activity.action.as_str())
            .bind(&activity.user_name)
            .bind(&activity.target)
            .bind(&activity.details)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.into())
    }

    async fn recent(&self, limit: usize) -> CrmResult<Vec<Activity>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY created_at DESC LIMIT $1",
            ACTIVITY_COLUMNS,
            self.table("recent_activities")
        );
        let rows = sqlx::query_as::<_, ActivityRow>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Activity::from).collect())
    }
}
