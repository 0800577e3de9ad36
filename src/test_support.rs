//! Fixtures and store doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::insights::{FieldGroup, ProductiveRecord, ProjectTaskCounts};
use crate::model::{EntityKind, ObjectId, Priority, Project, Task, User};
use crate::storage::{repository, Database, InsightStore};

pub const OWNER_ID: &str = "507f1f77bcf86cd799439011";

pub fn owner() -> User {
    User {
        id: ObjectId::parse(OWNER_ID).unwrap(),
        ..User::new("Owner", "owner@example.com")
    }
}

pub async fn insert(db: &Database, users: Vec<User>, projects: Vec<Project>, tasks: Vec<Task>) {
    db.writer()
        .call(move |conn| {
            for user in &users {
                repository::upsert_user(conn, user)?;
            }
            for project in &projects {
                repository::upsert_project(conn, project)?;
            }
            for task in &tasks {
                repository::upsert_task(conn, task)?;
            }
            Ok::<(), rusqlite::Error>(())
        })
        .await
        .unwrap();
}

fn unreachable_store() -> Error {
    Error::Database("connection refused".into())
}

/// Every query fails as if the datastore were down.
pub struct FailingStore;

#[async_trait]
impl InsightStore for FailingStore {
    async fn group_count(
        &self,
        _owner_id: &ObjectId,
        _kind: EntityKind,
        _fields: &[&'static str],
    ) -> Result<Vec<FieldGroup>> {
        Err(unreachable_store())
    }

    async fn project_task_counts(
        &self,
        _owner_id: &ObjectId,
        _priority: Option<Priority>,
    ) -> Result<Vec<ProjectTaskCounts>> {
        Err(unreachable_store())
    }

    async fn completed_records(
        &self,
        _owner_id: &ObjectId,
        _kind: EntityKind,
    ) -> Result<Vec<ProductiveRecord>> {
        Err(unreachable_store())
    }
}

/// Empty results, except grouped counts over one field, which fail.
pub struct FlakyStore {
    failing_field: &'static str,
}

impl FlakyStore {
    pub fn failing_on(field: &'static str) -> Self {
        Self {
            failing_field: field,
        }
    }
}

#[async_trait]
impl InsightStore for FlakyStore {
    async fn group_count(
        &self,
        _owner_id: &ObjectId,
        _kind: EntityKind,
        fields: &[&'static str],
    ) -> Result<Vec<FieldGroup>> {
        if fields.contains(&self.failing_field) {
            return Err(unreachable_store());
        }
        Ok(Vec::new())
    }

    async fn project_task_counts(
        &self,
        _owner_id: &ObjectId,
        _priority: Option<Priority>,
    ) -> Result<Vec<ProjectTaskCounts>> {
        Ok(Vec::new())
    }

    async fn completed_records(
        &self,
        _owner_id: &ObjectId,
        _kind: EntityKind,
    ) -> Result<Vec<ProductiveRecord>> {
        Ok(Vec::new())
    }
}

/// Empty results after a fixed delay. Counts calls to `cancel`.
pub struct SlowStore {
    pub delay: Duration,
    pub cancels: Arc<AtomicUsize>,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            cancels: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl InsightStore for SlowStore {
    async fn group_count(
        &self,
        _owner_id: &ObjectId,
        _kind: EntityKind,
        _fields: &[&'static str],
    ) -> Result<Vec<FieldGroup>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn project_task_counts(
        &self,
        _owner_id: &ObjectId,
        _priority: Option<Priority>,
    ) -> Result<Vec<ProjectTaskCounts>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn completed_records(
        &self,
        _owner_id: &ObjectId,
        _kind: EntityKind,
    ) -> Result<Vec<ProductiveRecord>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}
