//! Primary-key sequence resynchronisation
//!
//! Bulk copy writes explicit ids, so the backing sequence still points at
//! its old value afterwards. Resync moves it past the loaded maximum so the
//! next regular insert gets `max + 1`.

use sqlx::PgConnection;
use tracing::debug;

/// Primary key column of a table. Tables whose key is not `id` are listed here.
pub fn primary_key_column(table: &str) -> &'static str {
    match table {
        "retry_task" => "retry_task_id",
        "task_type" => "task_type_id",
        "task_type_key" => "task_type_key_id",
        _ => "id",
    }
}

/// Name PostgreSQL gives the sequence behind a `serial` column
pub fn sequence_name(table: &str) -> String {
    format!("{}_{}_seq", table, primary_key_column(table))
}

/// Move the sequence of `table` to `max(pk) + 1` in the not-yet-called state.
///
/// Returns the value the next insert will receive, or `None` when the table
/// has no such sequence.
pub async fn resync_sequence(
    conn: &mut PgConnection,
    table: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let sequence = sequence_name(table);

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM pg_class WHERE relname = $1 AND relkind = 'S')",
    )
    .bind(&sequence)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        debug!("No sequence {} for {}, skipping resync", sequence, table);
        return Ok(None);
    }

    let statement = format!(
        "SELECT setval($1::regclass, COALESCE((SELECT MAX(\"{column}\") FROM \"{table}\"), 0) + 1, false)",
        column = primary_key_column(table),
        table = table,
    );
    let next: i64 = sqlx::query_scalar(&statement)
        .bind(&sequence)
        .fetch_one(&mut *conn)
        .await?;

    Ok(Some(next))
}
