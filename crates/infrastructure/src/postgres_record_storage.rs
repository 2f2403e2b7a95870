use archivum_application::{RecordStorage, StorageReadResult};
use archivum_core::{AppError, AppResult};
use archivum_domain::{DataGroup, FilterCondition, ListFilter};
use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::record_storage_support::{linked_records, window_bounds};

/// PostgreSQL-backed record storage.
///
/// Records live as JSONB documents in `records`. Outgoing record links are
/// denormalized into `record_links` on write so incoming-link checks stay an
/// index lookup.
#[derive(Clone)]
pub struct PostgresRecordStorage {
    pool: PgPool,
}

impl PostgresRecordStorage {
    /// Creates a storage with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new record together with its outgoing links.
    pub async fn create(&self, record_type: &str, record: &DataGroup) -> AppResult<()> {
        let record_id = record
            .record_id()
            .ok_or_else(|| AppError::Validation("record has no recordInfo id".to_owned()))?;
        let data = serde_json::to_value(record).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize record '{record_type}:{record_id}': {error}"
            ))
        })?;

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start record create transaction for '{record_type}:{record_id}': {error}"
            ))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO records (record_type, record_id, data)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(record_type)
        .bind(record_id)
        .bind(data)
        .execute(&mut *transaction)
        .await;

        if let Err(error) = result {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23505")
            {
                return Err(AppError::Conflict(format!(
                    "record '{record_type}:{record_id}' already exists"
                )));
            }

            return Err(AppError::Internal(format!(
                "failed to insert record '{record_type}:{record_id}': {error}"
            )));
        }

        for (linked_type, linked_id) in linked_records(record) {
            sqlx::query(
                r#"
                INSERT INTO record_links (from_type, from_id, to_type, to_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(record_type)
            .bind(record_id)
            .bind(linked_type)
            .bind(linked_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to store link from '{record_type}:{record_id}' to '{linked_type}:{linked_id}': {error}"
                ))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit record create transaction for '{record_type}:{record_id}': {error}"
            ))
        })
    }
}

#[derive(Debug, FromRow)]
struct RecordRow {
    data: Value,
}

fn record_from_row(row: RecordRow) -> AppResult<DataGroup> {
    serde_json::from_value(row.data)
        .map_err(|error| AppError::Internal(format!("failed to decode stored record: {error}")))
}

fn condition_document(condition: &FilterCondition) -> Value {
    json!([{
        "kind": "atomic",
        "name_in_data": condition.name_in_data,
        "value": condition.value,
    }])
}

fn push_conditions(
    builder: &mut QueryBuilder<'_, Postgres>,
    record_type: &str,
    conditions: &[FilterCondition],
) {
    builder.push(" WHERE record_type = ");
    builder.push_bind(record_type.to_owned());

    for condition in conditions {
        builder.push(" AND data -> 'children' @> ");
        builder.push_bind(condition_document(condition));
    }
}

fn to_i64(value: u64, label: &str) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|error| AppError::Validation(format!("invalid record list {label}: {error}")))
}

#[async_trait]
impl RecordStorage for PostgresRecordStorage {
    async fn read(&self, record_type: &str, record_id: &str) -> AppResult<DataGroup> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT data
            FROM records
            WHERE record_type = $1 AND record_id = $2
            "#,
        )
        .bind(record_type)
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to read record '{record_type}:{record_id}': {error}"
            ))
        })?;

        row.map(record_from_row)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("record '{record_type}:{record_id}'")))
    }

    async fn read_list(
        &self,
        record_type: &str,
        filter: &ListFilter,
    ) -> AppResult<StorageReadResult> {
        let mut count_builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM records");
        push_conditions(&mut count_builder, record_type, &filter.conditions);

        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to count records of type '{record_type}': {error}"
                ))
            })?;
        let total_number_of_matches = u64::try_from(total).unwrap_or_default();

        let (offset, limit) = window_bounds(filter, total_number_of_matches);
        if limit == 0 {
            return Ok(StorageReadResult {
                records: Vec::new(),
                total_number_of_matches,
            });
        }

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT data FROM records");
        push_conditions(&mut builder, record_type, &filter.conditions);
        builder.push(" ORDER BY record_id LIMIT ");
        builder.push_bind(to_i64(limit, "limit")?);
        builder.push(" OFFSET ");
        builder.push_bind(to_i64(offset, "offset")?);

        let rows = builder
            .build_query_as::<RecordRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list records of type '{record_type}': {error}"
                ))
            })?;

        Ok(StorageReadResult {
            records: rows
                .into_iter()
                .map(record_from_row)
                .collect::<AppResult<_>>()?,
            total_number_of_matches,
        })
    }

    async fn links_exist_for_record(&self, record_type: &str, record_id: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM record_links
                WHERE to_type = $1
                    AND to_id = $2
                    AND NOT (from_type = $1 AND from_id = $2)
            )
            "#,
        )
        .bind(record_type)
        .bind(record_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to check incoming links for '{record_type}:{record_id}': {error}"
            ))
        })
    }
}
