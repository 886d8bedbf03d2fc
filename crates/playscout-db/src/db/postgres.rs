use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use playscout_core::models::{MediaId, MediaRecord};
use playscout_core::AppError;

use super::document::{
    document_from_record, record_from_document, DocumentStore, PartialUpdate, UpdateOutcome,
};

/// Media documents in a JSONB column of `media_documents`.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `ai_analysis.status` -> `["ai_analysis", "status"]`, bound as `text[]`.
pub(crate) fn dotted_to_pg_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Bind {
    Path(Vec<String>),
    Json(Value),
    Texts(Vec<String>),
}

/// Build the `UPDATE` statement for a partial update. `$1` is always the record id.
///
/// Parents of the assigned paths are first reset to `{}` when missing or not an
/// object (one level deep), then each assignment is applied as a nested `jsonb_set`.
pub(crate) fn build_update_sql(update: &PartialUpdate) -> (String, Vec<Bind>) {
    let mut binds = Vec::new();
    let mut next = 2;
    let mut expr = "doc".to_string();

    let mut parents: Vec<Vec<String>> = Vec::new();
    for (path, _) in update.sets() {
        let segments = dotted_to_pg_path(path);
        if segments.len() > 1 {
            let parent = segments[..segments.len() - 1].to_vec();
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
    }

    for parent in parents {
        let p = next;
        next += 1;
        binds.push(Bind::Path(parent));
        expr = format!(
            "jsonb_set({expr}, ${p}, CASE WHEN jsonb_typeof(doc #> ${p}) = 'object' THEN doc #> ${p} ELSE '{{}}'::jsonb END, true)"
        );
    }

    for (path, value) in update.sets() {
        let (p, v) = (next, next + 1);
        next += 2;
        binds.push(Bind::Path(dotted_to_pg_path(path)));
        binds.push(Bind::Json(value.clone()));
        expr = format!("jsonb_set({expr}, ${p}, ${v}, true)");
    }

    let mut sql = format!("UPDATE media_documents SET doc = {expr}, updated_at = NOW() WHERE id = $1");

    for guard in update.guards() {
        let (p, a) = (next, next + 1);
        next += 2;
        binds.push(Bind::Path(dotted_to_pg_path(&guard.path)));
        binds.push(Bind::Texts(
            guard
                .allowed
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ));
        sql.push_str(&format!(" AND doc #>> ${p} = ANY(${a})"));
    }

    (sql, binds)
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: Vec<Bind>,
) -> Query<'q, Postgres, PgArguments> {
    for bind in binds {
        query = match bind {
            Bind::Path(path) => query.bind(path),
            Bind::Json(value) => query.bind(value),
            Bind::Texts(values) => query.bind(values),
        };
    }
    query
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[tracing::instrument(skip(self), fields(db.system = "postgresql", db.table = "media_documents", db.operation = "select"))]
    async fn get(&self, id: &MediaId) -> Result<Option<MediaRecord>, AppError> {
        let row = sqlx::query("SELECT doc FROM media_documents WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let doc: Value = row.try_get("doc")?;
                Ok(Some(record_from_document(doc)?))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, record), fields(db.system = "postgresql", db.table = "media_documents", db.operation = "upsert", media_id = %record.id))]
    async fn insert(&self, record: &MediaRecord) -> Result<(), AppError> {
        let doc = document_from_record(record)?;
        sqlx::query(
            r#"
            INSERT INTO media_documents (id, doc)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(record.id.as_str())
        .bind(doc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, update), fields(db.system = "postgresql", db.table = "media_documents", db.operation = "update"))]
    async fn update(
        &self,
        id: &MediaId,
        update: &PartialUpdate,
    ) -> Result<UpdateOutcome, AppError> {
        let (sql, binds) = build_update_sql(update);
        let query = bind_all(sqlx::query(&sql).bind(id.as_str()), binds);
        let result = query.execute(&self.pool).await?;

        if result.rows_affected() > 0 {
            return Ok(UpdateOutcome::Applied);
        }

        let Some(guard) = update.guards().first() else {
            return Ok(UpdateOutcome::NotFound);
        };

        let current = sqlx::query("SELECT doc #> $2 AS current FROM media_documents WHERE id = $1")
            .bind(id.as_str())
            .bind(dotted_to_pg_path(&guard.path))
            .fetch_optional(&self.pool)
            .await?;

        match current {
            Some(row) => {
                let current: Option<Value> = row.try_get("current")?;
                Ok(UpdateOutcome::Rejected {
                    current: current.unwrap_or(Value::Null),
                })
            }
            None => Ok(UpdateOutcome::NotFound),
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playscout_core::models::{fields, AnalysisStatus};
    use serde_json::json;

    #[test]
    fn dotted_path_splits_into_segments() {
        assert_eq!(
            dotted_to_pg_path("ai_analysis.next_retry_at"),
            vec!["ai_analysis".to_string(), "next_retry_at".to_string()]
        );
        assert_eq!(dotted_to_pg_path("url"), vec!["url".to_string()]);
    }

    #[test]
    fn unguarded_update_nests_jsonb_set() {
        let update = PartialUpdate::new()
            .set(fields::STATUS, "completed")
            .clear(fields::ERROR_MESSAGE);
        let (sql, binds) = build_update_sql(&update);

        assert!(sql.starts_with("UPDATE media_documents SET doc = jsonb_set("));
        assert!(sql.ends_with("WHERE id = $1"));
        assert_eq!(sql.matches("jsonb_set(").count(), 3);
        assert_eq!(binds.len(), 5);
        assert_eq!(binds[0], Bind::Path(vec!["ai_analysis".to_string()]));
        assert_eq!(binds[2], Bind::Json(json!("completed")));
        assert_eq!(binds[4], Bind::Json(Value::Null));
    }

    #[test]
    fn guarded_update_compares_text_status() {
        let update = PartialUpdate::new()
            .set(fields::STATUS, "processing")
            .when_status_in(&[AnalysisStatus::Pending, AnalysisStatus::Retrying]);
        let (sql, binds) = build_update_sql(&update);

        assert!(sql.ends_with("AND doc #>> $5 = ANY($6)"));
        assert_eq!(binds.len(), 5);

        let (sql, binds) = build_update_sql(&update.guard(fields::RETRY_COUNT, [2]));
        assert!(sql.ends_with("AND doc #>> $5 = ANY($6) AND doc #>> $7 = ANY($8)"));
        assert_eq!(binds[6], Bind::Texts(vec!["2".to_string()]));
        assert_eq!(
            binds[3],
            Bind::Path(vec!["ai_analysis".to_string(), "status".to_string()])
        );
        assert_eq!(
            binds[4],
            Bind::Texts(vec!["pending".to_string(), "retrying".to_string()])
        );
    }
}
