use archivum_application::PermissionRuleRepository;
use archivum_core::{AppError, AppResult};
use archivum_domain::PermissionRule;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository for subject permission rules.
#[derive(Clone)]
pub struct PostgresPermissionRuleRepository {
    pool: PgPool,
}

impl PostgresPermissionRuleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionRuleRow {
    rule_id: String,
    rule: Value,
}

fn rule_from_row(subject: &str, row: PermissionRuleRow) -> AppResult<PermissionRule> {
    serde_json::from_value(row.rule).map_err(|error| {
        AppError::Internal(format!(
            "failed to decode permission rule '{}' for subject '{subject}': {error}",
            row.rule_id
        ))
    })
}

#[async_trait]
impl PermissionRuleRepository for PostgresPermissionRuleRepository {
    async fn list_rules_for_subject(&self, subject: &str) -> AppResult<Vec<PermissionRule>> {
        let rows = sqlx::query_as::<_, PermissionRuleRow>(
            r#"
            SELECT rules.rule_id, rules.rule
            FROM subject_permission_rules AS subject_rules
            INNER JOIN permission_rules AS rules
                ON rules.rule_id = subject_rules.rule_id
            WHERE subject_rules.subject = $1
            ORDER BY rules.rule_id
            "#,
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load permission rules for subject '{subject}': {error}"
            ))
        })?;

        rows.into_iter()
            .map(|row| rule_from_row(subject, row))
            .collect()
    }
}
