use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::{ObjectId, Priority, Project, ProjectStatus, Task, TaskStatus, User};
use crate::storage::{repository, Database};

const PROJECT_NAMES: &[&str] = &[
    "Website Redesign",
    "Mobile App",
    "Quarterly Report",
    "Onboarding Guide",
    "Data Migration",
    "Marketing Campaign",
];

const TASK_NAMES: &[&str] = &[
    "Draft outline",
    "Review feedback",
    "Fix layout",
    "Write tests",
    "Update docs",
    "Prepare demo",
    "Clean backlog",
];

/// How much demo data to generate.
#[derive(Debug, Clone, Copy)]
pub struct SeedOptions {
    pub owners: usize,
    pub projects_per_owner: usize,
    pub tasks_per_project: usize,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            owners: 1,
            projects_per_owner: 4,
            tasks_per_project: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub owner_ids: Vec<ObjectId>,
    pub projects: u64,
    pub tasks: u64,
}

/// Insert demo owners, projects, and tasks in one transaction.
///
/// Statuses and priorities cycle deterministically; task `updated_at`
/// values are spread over roughly the past thirteen months so every
/// productivity window has something in it.
pub async fn seed_demo(db: &Database, options: &SeedOptions) -> Result<SeedReport> {
    let options = *options;
    let now = Utc::now();

    let report = db
        .writer()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut report = SeedReport {
                owner_ids: Vec::with_capacity(options.owners),
                projects: 0,
                tasks: 0,
            };

            for o in 0..options.owners {
                let mut owner = User::new(&format!("Demo Owner {}", o + 1), "");
                owner.email = format!("demo-{}@example.com", owner.id);
                repository::upsert_user(&tx, &owner)?;

                for p in 0..options.projects_per_owner {
                    let project = Project::new(&owner.id, PROJECT_NAMES[p % PROJECT_NAMES.len()])
                        .status(ProjectStatus::ALL[p % ProjectStatus::ALL.len()])
                        .priority(Priority::ALL[(o + p) % Priority::ALL.len()])
                        .deadline(now + Duration::weeks(p as i64 + 1))
                        .updated_at(now - Duration::days((p as i64 * 11) % 60));
                    repository::upsert_project(&tx, &project)?;
                    report.projects += 1;

                    for t in 0..options.tasks_per_project {
                        let age = ((p * options.tasks_per_project + t) as i64 * 37) % 400;
                        let mut task = Task::new(&project, TASK_NAMES[t % TASK_NAMES.len()])
                            .status(TaskStatus::ALL[(p + t) % TaskStatus::ALL.len()])
                            .priority(Priority::ALL[(2 * t + p) % Priority::ALL.len()])
                            .updated_at(now - Duration::days(age));
                        task.created_at = task.updated_at - Duration::days(2);
                        repository::upsert_task(&tx, &task)?;
                        report.tasks += 1;
                    }
                }
                report.owner_ids.push(owner.id);
            }

            tx.commit()?;
            Ok::<SeedReport, rusqlite::Error>(report)
        })
        .await?;

    log::info!(
        "Seeded {} owners, {} projects, {} tasks",
        report.owner_ids.len(),
        report.projects,
        report.tasks
    );
    Ok(report)
}
