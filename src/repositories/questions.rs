use sqlx::PgPool;

use crate::db::models::Question;

pub(crate) const COLUMNS: &str =
    "id, exam_id, question_number, question_text, max_marks, answer_key";

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS}
         FROM questions
         WHERE exam_id = $1
         ORDER BY question_number"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}
