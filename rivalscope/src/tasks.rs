use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::SqlitePool;

use crate::storage::parse_timestamp;

/// A follow-up item on the analyst's task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: i64,
    pub task: String,
    pub is_completed: bool,
    pub reminder_days: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    task: String,
    is_completed: bool,
    reminder_days: Option<i64>,
    created_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = anyhow::Error;

    fn try_from(row: TaskRow) -> Result<Self> {
        Ok(Task {
            id: row.id,
            task: row.task,
            is_completed: row.is_completed,
            reminder_days: row.reminder_days,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Partial update. Absent fields are left alone; `"reminder_days": null` clears the reminder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub is_completed: Option<bool>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub reminder_days: Option<Option<i64>>,
}

fn present_or_null<'de, D>(deserializer: D) -> std::result::Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

const SELECT_TASK: &str = "SELECT id, task, is_completed, reminder_days, created_at FROM tasks";

/// Open tasks first, soonest reminder first (no reminder last), then newest.
pub async fn list_tasks(pool: &SqlitePool) -> Result<Vec<Task>> {
    let query = format!(
        "{} ORDER BY is_completed ASC, reminder_days IS NULL ASC, reminder_days ASC, id DESC",
        SELECT_TASK
    );
    let rows = sqlx::query_as::<_, TaskRow>(&query)
        .fetch_all(pool)
        .await
        .context("Failed to list tasks")?;

    rows.into_iter().map(Task::try_from).collect()
}

pub async fn get_task(pool: &SqlitePool, id: i64) -> Result<Option<Task>> {
    let query = format!("{} WHERE id = ?", SELECT_TASK);
    let row = sqlx::query_as::<_, TaskRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch task")?;

    row.map(Task::try_from).transpose()
}

pub async fn create_task(pool: &SqlitePool, task: &str) -> Result<Task> {
    let task = task.trim();
    if task.is_empty() {
        anyhow::bail!("task text must not be empty");
    }

    let id = sqlx::query("INSERT INTO tasks (task) VALUES (?)")
        .bind(task)
        .execute(pool)
        .await
        .context("Failed to insert task")?
        .last_insert_rowid();

    get_task(pool, id)
        .await?
        .context("Inserted task disappeared")
}

/// Apply `update` to a task. Returns `None` when no task had that id.
pub async fn update_task(pool: &SqlitePool, id: i64, update: &TaskUpdate) -> Result<Option<Task>> {
    let Some(current) = get_task(pool, id).await? else {
        return Ok(None);
    };

    let is_completed = update.is_completed.unwrap_or(current.is_completed);
    let reminder_days = update.reminder_days.unwrap_or(current.reminder_days);

    sqlx::query("UPDATE tasks SET is_completed = ?, reminder_days = ? WHERE id = ?")
        .bind(is_completed)
        .bind(reminder_days)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update task")?;

    get_task(pool, id).await
}

/// Returns `false` when no task had that id.
pub async fn delete_task(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete task")?;

    Ok(result.rows_affected() > 0)
}
