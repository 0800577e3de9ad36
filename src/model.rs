use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static RE_OBJECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());

// Starts at zero so ids from one process sort in creation order until the
// counter passes 2^24.
static OBJECT_ID_COUNTER: AtomicU32 = AtomicU32::new(0);

static PROCESS_UNIQUE: LazyLock<u64> = LazyLock::new(|| {
    let nanos = Utc::now().timestamp_subsec_nanos() as u64;
    (((std::process::id() as u64) << 20) ^ nanos) & 0xff_ffff_ffff
});

/// Status value shared by both entity kinds for finished work.
pub const COMPLETED: &str = "completed";

// ── Identifiers ────────────────────────────────────────────────────

/// A 24-character hexadecimal record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Validate an identifier. Hex digits are normalized to lowercase.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidIdentifier("identifier is empty".into()));
        }
        if !RE_OBJECT_ID.is_match(s) {
            return Err(Error::InvalidIdentifier(format!(
                "expected 24 hex characters, got '{s}'"
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Create a fresh identifier: 4 bytes of seconds, 5 bytes unique to this
    /// process, 3 bytes of an incrementing counter.
    pub fn generate() -> Self {
        let secs = Utc::now().timestamp() as u32;
        let count = OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;
        Self(format!("{secs:08x}{:010x}{count:06x}", *PROCESS_UNIQUE))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl ToSql for ObjectId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for ObjectId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// ── Entity kinds and the field registry ────────────────────────────

/// The two record types insights can be computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Projects,
    Tasks,
}

const PROJECT_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "status",
    "priority",
    "deadline",
    "owner_id",
    "created_at",
    "updated_at",
];

const TASK_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "status",
    "priority",
    "deadline",
    "owner_id",
    "project_id",
    "created_at",
    "updated_at",
];

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Projects, EntityKind::Tasks];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Projects => "projects",
            EntityKind::Tasks => "tasks",
        }
    }

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Projects => "projects",
            EntityKind::Tasks => "tasks",
        }
    }

    /// Declared scalar fields of this kind.
    pub fn scalar_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Projects => PROJECT_FIELDS,
            EntityKind::Tasks => TASK_FIELDS,
        }
    }

    /// Look a field name up in the registry, returning the registry's own
    /// `'static` copy so only known column names ever reach SQL.
    pub fn resolve_field(&self, name: &str) -> Result<&'static str> {
        self.scalar_fields()
            .iter()
            .copied()
            .find(|f| *f == name)
            .ok_or_else(|| Error::InvalidField {
                kind: self.as_str().to_string(),
                field: name.to_string(),
            })
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "projects" => Ok(EntityKind::Projects),
            "tasks" => Ok(EntityKind::Tasks),
            other => Err(Error::InvalidEntityKind(other.to_string())),
        }
    }
}

// ── Enumerated columns ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Moderate,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Moderate, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Moderate => "moderate",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Priority::Low),
            "moderate" => Ok(Priority::Moderate),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidValue(format!("unknown priority '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Completed,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 2] = [ProjectStatus::Active, ProjectStatus::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => COMPLETED,
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            other => Err(Error::InvalidValue(format!(
                "unknown project status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => COMPLETED,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(Error::InvalidValue(format!("unknown task status '{other}'"))),
        }
    }
}

/// Display plus SQLite text conversion for enums that already provide
/// `as_str` and `FromStr`.
macro_rules! text_column {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_column!(Priority);
text_column!(ProjectStatus);
text_column!(TaskStatus);

// ── Records ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: &str, email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::generate(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: ObjectId,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub priority: Priority,
    pub deadline: Option<DateTime<Utc>>,
    pub owner_id: ObjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// A new active, moderate-priority project.
    pub fn new(owner_id: &ObjectId, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::generate(),
            name: name.to_string(),
            description: None,
            status: ProjectStatus::Active,
            priority: Priority::Moderate,
            deadline: None,
            owner_id: owner_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: ObjectId,
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub deadline: Option<DateTime<Utc>>,
    pub owner_id: ObjectId,
    pub project_id: ObjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A new todo, moderate-priority task owned by the project's owner.
    pub fn new(project: &Project, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::generate(),
            name: name.to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Moderate,
            deadline: None,
            owner_id: project.owner_id.clone(),
            project_id: project.id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }
}
