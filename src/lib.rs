pub mod date_util;
pub mod error;
pub mod insights;
pub mod model;
pub mod seed;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use error::{Error, Result};
pub use insights::{
    ApiResponse, DashboardInsights, ErrorResponse, FieldCounts, FieldGroup, GeneralInfo,
    ProductiveRecord, ProductivityInsight, ProjectProgress, ProjectsInsight, TasksInsight,
};
pub use model::{EntityKind, ObjectId, Priority, Project, ProjectStatus, Task, TaskStatus, User};
pub use seed::{SeedOptions, SeedReport};
pub use storage::{Database, InsightStore};

/// Config key holding the per-call deadline in milliseconds.
pub const QUERY_TIMEOUT_KEY: &str = "query_timeout_ms";

/// Main entry point: owner-scoped insights over an injected store.
///
/// Every public call takes the owner identifier as received from the caller
/// and validates it before touching the store.
#[derive(Clone)]
pub struct TaskInsights {
    store: Arc<dyn InsightStore>,
    timeout: Option<Duration>,
}

impl TaskInsights {
    pub fn new(store: impl InsightStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
            timeout: None,
        }
    }

    /// Fail any call that has not finished within `timeout`. When the
    /// deadline fires the store is told to cancel the queries still in
    /// flight.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &dyn InsightStore {
        self.store.as_ref()
    }

    // ── Insights ───────────────────────────────────────────────────

    /// Projects general info plus the progress of every project.
    pub async fn projects_insight(&self, owner_id: &str) -> Result<ProjectsInsight> {
        self.run("projects insight", async {
            let owner_id = ObjectId::parse(owner_id)?;
            self.projects_for(&owner_id).await
        })
        .await
    }

    /// Tasks general info plus productivity buckets.
    pub async fn tasks_insight(&self, owner_id: &str) -> Result<TasksInsight> {
        self.run("tasks insight", async {
            let owner_id = ObjectId::parse(owner_id)?;
            self.tasks_for(&owner_id).await
        })
        .await
    }

    /// Both insights, as served by the dashboard.
    pub async fn dashboard(&self, owner_id: &str) -> Result<DashboardInsights> {
        self.run("dashboard", async {
            let owner_id = ObjectId::parse(owner_id)?;
            let (projects, tasks) =
                tokio::try_join!(self.projects_for(&owner_id), self.tasks_for(&owner_id))?;
            Ok(DashboardInsights { projects, tasks })
        })
        .await
    }

    // ── Individual aggregations ────────────────────────────────────

    pub async fn count_fields(
        &self,
        owner_id: &str,
        kind: &str,
        fields: &[&str],
    ) -> Result<FieldCounts> {
        self.run("field count", async {
            let owner_id = ObjectId::parse(owner_id)?;
            let kind: EntityKind = kind.parse()?;
            insights::count_fields(self.store(), &owner_id, kind, fields).await
        })
        .await
    }

    pub async fn general_info(&self, owner_id: &str, kind: &str) -> Result<GeneralInfo> {
        self.run("general info", async {
            let owner_id = ObjectId::parse(owner_id)?;
            let kind: EntityKind = kind.parse()?;
            insights::general_info(self.store(), &owner_id, kind).await
        })
        .await
    }

    pub async fn projects_progress(
        &self,
        owner_id: &str,
        priority: Option<&str>,
    ) -> Result<Vec<ProjectProgress>> {
        self.run("projects progress", async {
            let owner_id = ObjectId::parse(owner_id)?;
            let priority = priority.map(str::parse::<Priority>).transpose()?;
            insights::projects_progress(self.store(), &owner_id, priority).await
        })
        .await
    }

    pub async fn productivity(&self, owner_id: &str, kind: &str) -> Result<ProductivityInsight> {
        self.run("productivity", async {
            let owner_id = ObjectId::parse(owner_id)?;
            let kind: EntityKind = kind.parse()?;
            insights::productivity(self.store(), &owner_id, kind).await
        })
        .await
    }

    // ── Internals ──────────────────────────────────────────────────

    async fn projects_for(&self, owner_id: &ObjectId) -> Result<ProjectsInsight> {
        let store = self.store();
        let (general, progresses) = tokio::try_join!(
            insights::general_info(store, owner_id, EntityKind::Projects),
            insights::projects_progress(store, owner_id, None),
        )?;
        Ok(ProjectsInsight {
            general,
            progresses,
        })
    }

    async fn tasks_for(&self, owner_id: &ObjectId) -> Result<TasksInsight> {
        let store = self.store();
        let (general, productivity) = tokio::try_join!(
            insights::general_info(store, owner_id, EntityKind::Tasks),
            insights::productivity(store, owner_id, EntityKind::Tasks),
        )?;
        Ok(TasksInsight {
            general,
            productivity,
        })
    }

    /// Apply the deadline and log failures. Validation failures are logged
    /// as warnings, everything else as errors.
    async fn run<T>(&self, label: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => {
                    self.store.cancel();
                    Err(Error::Timeout(limit))
                }
            },
            None => fut.await,
        };
        if let Err(e) = &result {
            if e.is_client_error() {
                log::warn!("{label} rejected: {e}");
            } else {
                log::error!("{label} failed: {e}");
            }
        }
        result
    }
}
