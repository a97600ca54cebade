/// Review comments on tasks
///
/// Comments are removed together with their task (`ON DELETE CASCADE`).
/// Editing overwrites the content in place; there is no history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::normalize_email;

/// Projection shared by every query; expects the comment row aliased `c`
const COMMENT_COLUMNS: &str = r#"
    c.id, c.task_id, c.author_email, u.name AS author_name, c.content,
    c.created_at, c.updated_at
"#;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,

    pub task_id: Uuid,

    /// Lower-cased email of the author
    pub author_email: String,

    /// Display name of the author, if set
    pub author_name: Option<String>,

    pub content: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub task_id: Uuid,
    pub author_email: String,
    pub content: String,
}

impl Comment {
    pub fn is_authored_by(&self, email: &str) -> bool {
        self.author_email == normalize_email(email)
    }

    pub async fn create(pool: &PgPool, data: CreateComment) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            WITH c AS (
                INSERT INTO comments (task_id, author_email, content)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT {columns}
            FROM c
            LEFT JOIN users u ON u.email = c.author_email
            "#,
            columns = COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(data.task_id)
            .bind(normalize_email(&data.author_email))
            .bind(data.content)
            .fetch_one(pool)
            .await?;

        Ok(comment)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {columns}
            FROM comments c
            LEFT JOIN users u ON u.email = c.author_email
            WHERE c.id = $1
            "#,
            columns = COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(comment)
    }

    /// Comments on a task, newest first
    pub async fn list_by_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {columns}
            FROM comments c
            LEFT JOIN users u ON u.email = c.author_email
            WHERE c.task_id = $1
            ORDER BY c.created_at DESC
            "#,
            columns = COMMENT_COLUMNS
        );

        let comments = sqlx::query_as::<_, Comment>(&sql)
            .bind(task_id)
            .fetch_all(pool)
            .await?;

        Ok(comments)
    }

    pub async fn update_content(
        pool: &PgPool,
        id: Uuid,
        content: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            WITH c AS (
                UPDATE comments
                SET content = $2,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {columns}
            FROM c
            LEFT JOIN users u ON u.email = c.author_email
            "#,
            columns = COMMENT_COLUMNS
        );

        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .bind(content)
            .fetch_optional(pool)
            .await?;

        Ok(comment)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_authored_by() {
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            author_email: "sup@x.com".to_string(),
            author_name: Some("Sam".to_string()),
            content: "Nice work".to_string(),
            created_at: now,
            updated_at: now,
        };

        assert!(comment.is_authored_by("SUP@x.com"));
        assert!(!comment.is_authored_by("admin@x.com"));

        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["authorEmail"], "sup@x.com");
        assert_eq!(json["authorName"], "Sam");
        assert!(json.get("taskId").is_some());
    }
}
