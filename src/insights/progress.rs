use crate::error::Result;
use crate::insights::types::{ProjectProgress, ProjectTaskCounts};
use crate::model::{ObjectId, Priority};
use crate::storage::InsightStore;

/// Percentage of completed tasks rounded to two decimals. A project with no
/// tasks has made no progress.
pub fn progress_percent(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(completed as f64 / total as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl From<ProjectTaskCounts> for ProjectProgress {
    fn from(p: ProjectTaskCounts) -> Self {
        Self {
            progress: progress_percent(p.completed_tasks, p.total_tasks),
            id: p.id,
            name: p.name,
            priority: p.priority,
            status: p.status,
        }
    }
}

/// Progress of each of the owner's projects, optionally only those with the
/// given priority, ordered by project id.
pub async fn projects_progress(
    store: &dyn InsightStore,
    owner_id: &ObjectId,
    priority: Option<Priority>,
) -> Result<Vec<ProjectProgress>> {
    log::debug!("Loading project progress for {owner_id} (priority: {priority:?})");
    let projects = store.project_task_counts(owner_id, priority).await?;
    let mut progresses: Vec<ProjectProgress> =
        projects.into_iter().map(ProjectProgress::from).collect();
    progresses.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(progresses)
}
