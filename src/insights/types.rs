use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{ObjectId, Priority, ProjectStatus};

/// One distinct combination of grouped field values and how many records
/// share it. Serializes as `{"_count": n, "<field>": "<value>", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldGroup {
    #[serde(rename = "_count")]
    pub count: u64,
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<String>>,
}

impl FieldGroup {
    /// The grouped value of `field`, if the field was grouped and non-null.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(|v| v.as_deref())
    }
}

/// Grouped counts keyed by group index (not by value), in store order.
pub type FieldCounts = BTreeMap<usize, FieldGroup>;

/// Total plus status and priority breakdowns for one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralInfo {
    pub total: u64,
    pub status: FieldCounts,
    pub priority: FieldCounts,
}

/// A project with the task tallies progress is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTaskCounts {
    pub id: ObjectId,
    pub name: String,
    pub priority: Priority,
    pub status: ProjectStatus,
    pub completed_tasks: u64,
    pub total_tasks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectProgress {
    pub id: ObjectId,
    pub name: String,
    pub priority: Priority,
    pub status: ProjectStatus,
    /// Percentage of completed tasks, two decimal places.
    pub progress: f64,
}

/// A completed project or task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductiveRecord {
    pub id: ObjectId,
    pub name: String,
    pub priority: Priority,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Completed records bucketed into nested 7/30/365-day windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityInsight {
    pub last_seven: Vec<ProductiveRecord>,
    pub last_thirty: Vec<ProductiveRecord>,
    pub last_sixty_five: Vec<ProductiveRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectsInsight {
    pub general: GeneralInfo,
    pub progresses: Vec<ProjectProgress>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TasksInsight {
    pub general: GeneralInfo,
    pub productivity: ProductivityInsight,
}

/// Everything the dashboard shows for one owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardInsights {
    pub projects: ProjectsInsight,
    pub tasks: TasksInsight,
}
