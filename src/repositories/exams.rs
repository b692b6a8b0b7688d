use sqlx::PgPool;

use crate::db::models::Exam;

pub(crate) const COLUMNS: &str = "id, title, grading_mode, answer_key, created_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS}
         FROM exams
         WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
