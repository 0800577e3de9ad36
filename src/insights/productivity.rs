use chrono::{DateTime, Duration, Utc};

use crate::date_util::within_window;
use crate::error::Result;
use crate::insights::types::{ProductiveRecord, ProductivityInsight};
use crate::model::{EntityKind, ObjectId};
use crate::storage::InsightStore;

/// Trailing windows completed work is bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductivityWindow {
    Week,
    Month,
    Year,
}

impl ProductivityWindow {
    pub const ALL: [ProductivityWindow; 3] = [
        ProductivityWindow::Week,
        ProductivityWindow::Month,
        ProductivityWindow::Year,
    ];

    pub fn days(&self) -> i64 {
        match self {
            ProductivityWindow::Week => 7,
            ProductivityWindow::Month => 30,
            ProductivityWindow::Year => 365,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::days(self.days())
    }
}

/// Bucket completed records by how recently they were last updated.
///
/// The windows nest: anything in the 7-day bucket is also in the 30- and
/// 365-day buckets. Records older than a year appear in none.
pub fn bucket_records(records: Vec<ProductiveRecord>, now: DateTime<Utc>) -> ProductivityInsight {
    let mut insight = ProductivityInsight::default();
    for record in records {
        let in_window = |w: ProductivityWindow| within_window(now, record.updated_at, w.duration());
        if in_window(ProductivityWindow::Week) {
            insight.last_seven.push(record.clone());
        }
        if in_window(ProductivityWindow::Month) {
            insight.last_thirty.push(record.clone());
        }
        if in_window(ProductivityWindow::Year) {
            insight.last_sixty_five.push(record);
        }
    }
    insight
}

/// The owner's completed records of `kind` bucketed relative to now.
pub async fn productivity(
    store: &dyn InsightStore,
    owner_id: &ObjectId,
    kind: EntityKind,
) -> Result<ProductivityInsight> {
    productivity_at(store, owner_id, kind, Utc::now()).await
}

/// Same as [`productivity`] with an explicit reference time.
pub async fn productivity_at(
    store: &dyn InsightStore,
    owner_id: &ObjectId,
    kind: EntityKind,
    now: DateTime<Utc>,
) -> Result<ProductivityInsight> {
    log::debug!("Loading completed {kind} for {owner_id}");
    let records = store.completed_records(owner_id, kind).await?;
    Ok(bucket_records(records, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::model::{Priority, Project, ProjectStatus, Task, TaskStatus};
    use crate::storage::Database;
    use crate::test_support::{self, FailingStore};

    fn record(name: &str, updated_at: DateTime<Utc>) -> ProductiveRecord {
        ProductiveRecord {
            id: ObjectId::generate(),
            name: name.to_string(),
            priority: Priority::Moderate,
            status: "completed".to_string(),
            updated_at,
        }
    }

    fn names(records: &[ProductiveRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_bucket_boundaries() {
        let now = Utc.with_ymd_and_hms(2025, 4, 17, 12, 0, 0).unwrap();
        let records = vec![
            record("three days", now - Duration::days(3)),
            record("forty days", now - Duration::days(40)),
            record("two years", now - Duration::days(730)),
            record("exactly a week", now - Duration::days(7)),
            record("a month and a minute", now - Duration::days(30) - Duration::minutes(1)),
        ];

        let insight = bucket_records(records, now);

        assert_eq!(names(&insight.last_seven), vec!["three days", "exactly a week"]);
        assert_eq!(
            names(&insight.last_thirty),
            vec!["three days", "exactly a week"]
        );
        assert_eq!(
            names(&insight.last_sixty_five),
            vec![
                "three days",
                "forty days",
                "exactly a week",
                "a month and a minute"
            ]
        );
    }

    #[test]
    fn test_buckets_nest() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let records: Vec<ProductiveRecord> = (0..400)
            .step_by(3)
            .map(|d| record(&format!("{d}"), now - Duration::days(d)))
            .collect();

        let insight = bucket_records(records, now);

        for r in &insight.last_seven {
            assert!(insight.last_thirty.contains(r));
        }
        for r in &insight.last_thirty {
            assert!(insight.last_sixty_five.contains(r));
        }
        assert!(insight.last_seven.len() <= insight.last_thirty.len());
        assert!(insight.last_thirty.len() <= insight.last_sixty_five.len());
        assert_eq!(insight.last_sixty_five.len(), (0..=365).step_by(3).count());
    }

    #[test]
    fn test_window_days() {
        let days: Vec<i64> = ProductivityWindow::ALL.iter().map(|w| w.days()).collect();
        assert_eq!(days, vec![7, 30, 365]);
    }

    #[tokio::test]
    async fn test_productivity_only_completed_records() {
        let db = Database::open_memory().await.unwrap();
        let owner = test_support::owner();
        let owner_id = owner.id.clone();
        let now = Utc::now();

        let project = Project::new(&owner_id, "Garden")
            .status(ProjectStatus::Completed)
            .updated_at(now - Duration::days(10));
        let tasks = vec![
            Task::new(&project, "recent")
                .status(TaskStatus::Completed)
                .updated_at(now - Duration::days(3)),
            Task::new(&project, "older")
                .status(TaskStatus::Completed)
                .updated_at(now - Duration::days(40)),
            Task::new(&project, "open")
                .status(TaskStatus::InProgress)
                .updated_at(now - Duration::days(1)),
        ];
        test_support::insert(&db, vec![owner], vec![project], tasks).await;

        let insight = productivity_at(&db, &owner_id, EntityKind::Tasks, now)
            .await
            .unwrap();
        assert_eq!(names(&insight.last_seven), vec!["recent"]);
        assert_eq!(names(&insight.last_thirty), vec!["recent"]);
        assert_eq!(names(&insight.last_sixty_five), vec!["recent", "older"]);
        assert!(insight
            .last_sixty_five
            .iter()
            .all(|r| r.status == "completed"));

        let projects = productivity_at(&db, &owner_id, EntityKind::Projects, now)
            .await
            .unwrap();
        assert!(projects.last_seven.is_empty());
        assert_eq!(names(&projects.last_thirty), vec!["Garden"]);
    }

    #[tokio::test]
    async fn test_productivity_store_failure() {
        let owner_id = test_support::owner().id;
        assert!(productivity(&FailingStore, &owner_id, EntityKind::Tasks)
            .await
            .is_err());
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_value(ProductivityInsight::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"lastSeven": [], "lastThirty": [], "lastSixtyFive": []})
        );
    }
}
