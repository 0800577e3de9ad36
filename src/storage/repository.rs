use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::date_util::{format_timestamp, parse_timestamp};
use crate::error::Error;
use crate::insights::{FieldGroup, ProductiveRecord, ProjectTaskCounts};
use crate::model::{EntityKind, ObjectId, Priority, Project, Task, User, COMPLETED};

// ── Users ──────────────────────────────────────────────────────────

pub fn upsert_user(conn: &Connection, user: &User) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO users (id, name, email, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            name=excluded.name, email=excluded.email, updated_at=excluded.updated_at",
        params![
            user.id,
            user.name,
            user.email,
            format_timestamp(&user.created_at),
            format_timestamp(&user.updated_at),
        ],
    )?;
    Ok(())
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, created_at, updated_at FROM users ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            created_at: timestamp_at(row, 3)?,
            updated_at: timestamp_at(row, 4)?,
        })
    })?;
    rows.collect()
}

/// Delete a user; their projects and tasks go with them.
pub fn delete_user(conn: &Connection, id: &ObjectId) -> Result<bool, rusqlite::Error> {
    let count = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Projects ───────────────────────────────────────────────────────

pub fn upsert_project(conn: &Connection, project: &Project) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO projects (
            id, name, description, status, priority, deadline, owner_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            name=excluded.name, description=excluded.description, status=excluded.status,
            priority=excluded.priority, deadline=excluded.deadline, owner_id=excluded.owner_id,
            updated_at=excluded.updated_at",
        params![
            project.id,
            project.name,
            project.description,
            project.status,
            project.priority,
            project.deadline.as_ref().map(format_timestamp),
            project.owner_id,
            format_timestamp(&project.created_at),
            format_timestamp(&project.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_project(conn: &Connection, id: &ObjectId) -> Result<Option<Project>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, name, description, status, priority, deadline, owner_id, created_at, updated_at
         FROM projects WHERE id = ?1",
        params![id],
        |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                status: row.get(3)?,
                priority: row.get(4)?,
                deadline: optional_timestamp_at(row, 5)?,
                owner_id: row.get(6)?,
                created_at: timestamp_at(row, 7)?,
                updated_at: timestamp_at(row, 8)?,
            })
        },
    )
    .optional()
}

/// Delete a project; its tasks go with it.
pub fn delete_project(conn: &Connection, id: &ObjectId) -> Result<bool, rusqlite::Error> {
    let count = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Tasks ──────────────────────────────────────────────────────────

pub fn upsert_task(conn: &Connection, task: &Task) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO tasks (
            id, name, description, status, priority, deadline, owner_id, project_id,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(id) DO UPDATE SET
            name=excluded.name, description=excluded.description, status=excluded.status,
            priority=excluded.priority, deadline=excluded.deadline, owner_id=excluded.owner_id,
            project_id=excluded.project_id, updated_at=excluded.updated_at",
        params![
            task.id,
            task.name,
            task.description,
            task.status,
            task.priority,
            task.deadline.as_ref().map(format_timestamp),
            task.owner_id,
            task.project_id,
            format_timestamp(&task.created_at),
            format_timestamp(&task.updated_at),
        ],
    )?;
    Ok(())
}

// ── Aggregations ───────────────────────────────────────────────────

/// Count the owner's records grouped by `fields`, ordered by the grouped
/// values. `fields` must come from the kind's field registry.
pub fn group_count(
    conn: &Connection,
    owner_id: &ObjectId,
    kind: EntityKind,
    fields: &[&'static str],
) -> Result<Vec<FieldGroup>, rusqlite::Error> {
    let columns = fields.join(", ");
    let sql = format!(
        "SELECT COUNT(*), {columns} FROM {table}
         WHERE owner_id = ?1
         GROUP BY {columns}
         ORDER BY {columns}",
        table = kind.table(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner_id], |row| {
        let count: i64 = row.get(0)?;
        let mut values = BTreeMap::new();
        for (i, field) in fields.iter().enumerate() {
            values.insert(field.to_string(), row.get::<_, Option<String>>(i + 1)?);
        }
        Ok(FieldGroup {
            count: count as u64,
            values,
        })
    })?;
    rows.collect()
}

/// Every project of the owner with its completed and total task counts,
/// ordered by project id.
pub fn project_task_counts(
    conn: &Connection,
    owner_id: &ObjectId,
    priority: Option<Priority>,
) -> Result<Vec<ProjectTaskCounts>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.name, p.priority, p.status,
                COALESCE(SUM(CASE WHEN t.status = ?3 THEN 1 ELSE 0 END), 0),
                COUNT(t.id)
         FROM projects p
         LEFT JOIN tasks t ON t.project_id = p.id
         WHERE p.owner_id = ?1 AND (?2 IS NULL OR p.priority = ?2)
         GROUP BY p.id
         ORDER BY p.id",
    )?;
    let rows = stmt.query_map(params![owner_id, priority, COMPLETED], |row| {
        Ok(ProjectTaskCounts {
            id: row.get(0)?,
            name: row.get(1)?,
            priority: row.get(2)?,
            status: row.get(3)?,
            completed_tasks: row.get::<_, i64>(4)? as u64,
            total_tasks: row.get::<_, i64>(5)? as u64,
        })
    })?;
    rows.collect()
}

/// The owner's completed records of one kind, most recently updated first.
pub fn completed_records(
    conn: &Connection,
    owner_id: &ObjectId,
    kind: EntityKind,
) -> Result<Vec<ProductiveRecord>, rusqlite::Error> {
    let sql = format!(
        "SELECT id, name, priority, status, updated_at FROM {table}
         WHERE owner_id = ?1 AND status = ?2
         ORDER BY updated_at DESC, id",
        table = kind.table(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner_id, COMPLETED], |row| {
        Ok(ProductiveRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            priority: row.get(2)?,
            status: row.get(3)?,
            updated_at: timestamp_at(row, 4)?,
        })
    })?;
    rows.collect()
}

/// Row counts for users, projects, and tasks.
pub fn table_counts(conn: &Connection) -> Result<(u64, u64, u64), rusqlite::Error> {
    let count = |table: &str| -> Result<u64, rusqlite::Error> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(n as u64)
    };
    Ok((count("users")?, count("projects")?, count("tasks")?))
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Row helpers ────────────────────────────────────────────────────

fn timestamp_at(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| bad_timestamp(idx, &raw))
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| bad_timestamp(idx, &raw)),
        None => Ok(None),
    }
}

fn bad_timestamp(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(Error::InvalidValue(format!("unparseable timestamp '{raw}'"))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectStatus, TaskStatus};
    use crate::storage::Database;

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                set_config(conn, "query_timeout_ms", "2500")?;
                let val = get_config(conn, "query_timeout_ms")?;
                assert_eq!(val, Some("2500".to_string()));

                let missing = get_config(conn, "nonexistent")?;
                assert_eq!(missing, None);

                assert_eq!(
                    list_config(conn)?,
                    vec![("query_timeout_ms".to_string(), "2500".to_string())]
                );
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_project_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let user = User::new("Mostly Tasks", "owner@example.com");
                upsert_user(conn, &user)?;
                let project = Project::new(&user.id, "Website")
                    .status(ProjectStatus::Completed)
                    .priority(Priority::High);
                upsert_project(conn, &project)?;

                let loaded = get_project(conn, &project.id)?.expect("project stored");
                assert_eq!(loaded.name, "Website");
                assert_eq!(loaded.status, ProjectStatus::Completed);
                assert_eq!(loaded.priority, Priority::High);
                assert_eq!(loaded.owner_id, user.id);
                assert_eq!(loaded.deadline, None);

                let missing = get_project(conn, &ObjectId::generate())?;
                assert!(missing.is_none());
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let user = User::new("Owner", "owner@example.com");
                upsert_user(conn, &user)?;
                let project = Project::new(&user.id, "Docs");
                upsert_project(conn, &project)?;
                let task = Task::new(&project, "Outline");
                upsert_task(conn, &task)?;
                upsert_task(conn, &task.clone().status(TaskStatus::Completed))?;

                let (users, projects, tasks) = table_counts(conn)?;
                assert_eq!((users, projects, tasks), (1, 1, 1));

                let status: String = conn.query_row(
                    "SELECT status FROM tasks WHERE id = ?1",
                    params![task.id],
                    |row| row.get(0),
                )?;
                assert_eq!(status, "completed");
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let user = User::new("Owner", "owner@example.com");
                upsert_user(conn, &user)?;
                let keep = Project::new(&user.id, "Keep");
                let doomed = Project::new(&user.id, "Drop");
                upsert_project(conn, &keep)?;
                upsert_project(conn, &doomed)?;
                upsert_task(conn, &Task::new(&keep, "a"))?;
                upsert_task(conn, &Task::new(&doomed, "b"))?;
                upsert_task(conn, &Task::new(&doomed, "c"))?;

                assert!(delete_project(conn, &doomed.id)?);
                assert!(!delete_project(conn, &doomed.id)?);
                assert_eq!(table_counts(conn)?, (1, 1, 1));

                assert!(delete_user(conn, &user.id)?);
                assert_eq!(table_counts(conn)?, (0, 0, 0));
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_unknown_status() {
        let db = Database::open_memory().await.unwrap();

        let result = db
            .writer()
            .call(|conn| {
                let user = User::new("Owner", "owner@example.com");
                upsert_user(conn, &user)?;
                conn.execute(
                    "INSERT INTO projects (id, name, status, priority, owner_id, created_at, updated_at)
                     VALUES ('aaaaaaaaaaaaaaaaaaaaaaaa', 'Bad', 'archived', 'low', ?1,
                             datetime('now'), datetime('now'))",
                    params![user.id],
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_users() {
        let db = Database::open_memory().await.unwrap();

        let users = db
            .writer()
            .call(|conn| {
                upsert_user(conn, &User::new("A", "a@example.com"))?;
                upsert_user(conn, &User::new("B", "b@example.com"))?;
                list_users(conn)
            })
            .await
            .unwrap();
        assert_eq!(users.len(), 2);
        assert!(users[0].id < users[1].id);
    }

    #[tokio::test]
    async fn test_task_owner_must_match_project_owner() {
        let db = Database::open_memory().await.unwrap();

        let result = db
            .writer()
            .call(|conn| {
                let alice = User::new("Alice", "alice@example.com");
                let bob = User::new("Bob", "bob@example.com");
                upsert_user(conn, &alice)?;
                upsert_user(conn, &bob)?;
                let project = Project::new(&alice.id, "Alice's");
                upsert_project(conn, &project)?;

                let mut task = Task::new(&project, "misfiled");
                task.owner_id = bob.id.clone();
                upsert_task(conn, &task)
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_project_owner_change_moves_tasks() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let alice = User::new("Alice", "alice@example.com");
                let bob = User::new("Bob", "bob@example.com");
                upsert_user(conn, &alice)?;
                upsert_user(conn, &bob)?;
                let mut project = Project::new(&alice.id, "Handover");
                upsert_project(conn, &project)?;
                upsert_task(conn, &Task::new(&project, "a"))?;
                upsert_task(conn, &Task::new(&project, "b"))?;

                project.owner_id = bob.id.clone();
                upsert_project(conn, &project)?;

                let owners: Vec<ObjectId> = conn
                    .prepare("SELECT DISTINCT owner_id FROM tasks")?
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<_, _>>()?;
                assert_eq!(owners, vec![bob.id.clone()]);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
