use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use taskinsights::insights::field_counter;
use taskinsights::storage::repository;
use taskinsights::{
    ApiResponse, Database, ErrorResponse, ObjectId, Priority, Project, ProjectStatus, SeedOptions,
    Task, TaskInsights, TaskStatus, User, QUERY_TIMEOUT_KEY,
};

#[derive(Parser)]
#[command(name = "taskinsights", about = "Task and project insights CLI")]
struct Cli {
    /// Database path (default: ~/.taskinsights/taskinsights.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Projects and tasks insights for an owner
    Dashboard {
        owner: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Projects general info and progress
    Projects {
        owner: String,
        #[arg(long)]
        json: bool,
    },
    /// Tasks general info and productivity
    Tasks {
        owner: String,
        #[arg(long)]
        json: bool,
    },
    /// Count records grouped by one or more fields
    Count {
        owner: String,
        /// Entity kind: projects or tasks
        #[arg(long, default_value = "tasks")]
        kind: String,
        /// Field to group by (repeatable)
        #[arg(long = "field", required = true)]
        fields: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Completion percentage per project
    Progress {
        owner: String,
        /// Only projects with this priority: low, moderate, high
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Completed records bucketed by recency
    Productivity {
        owner: String,
        #[arg(long, default_value = "tasks")]
        kind: String,
        #[arg(long)]
        json: bool,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Generate demo data
    Seed {
        #[arg(long, default_value = "1")]
        owners: usize,
        /// Projects per owner
        #[arg(long, default_value = "4")]
        projects: usize,
        /// Tasks per project
        #[arg(long, default_value = "6")]
        tasks: usize,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum UserAction {
    /// Add a user
    Add { name: String, email: String },
    /// List users
    List,
    /// Remove a user along with their projects and tasks
    Remove { id: String },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Add a project for an owner
    Add {
        owner: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// active or completed
        #[arg(long, default_value = "active")]
        status: String,
        /// low, moderate or high
        #[arg(long, default_value = "moderate")]
        priority: String,
        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Remove a project along with its tasks
    Remove { id: String },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task to a project
    Add {
        project: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// todo, in-progress or completed
        #[arg(long, default_value = "todo")]
        status: String,
        #[arg(long, default_value = "moderate")]
        priority: String,
        #[arg(long)]
        deadline: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn parse_deadline(
    deadline: Option<&str>,
) -> anyhow::Result<Option<chrono::DateTime<chrono::Utc>>> {
    deadline
        .map(|s| {
            taskinsights::date_util::parse_timestamp(s)
                .ok_or_else(|| anyhow::anyhow!("invalid deadline '{s}', expected YYYY-MM-DD"))
        })
        .transpose()
}

/// Print a result either as the response envelope or through `render`.
fn emit<T: Serialize>(
    result: taskinsights::Result<T>,
    json: bool,
    render: impl FnOnce(&T),
) -> anyhow::Result<()> {
    match (result, json) {
        (Ok(data), true) => {
            println!("{}", serde_json::to_string_pretty(&ApiResponse::success(&data))?);
            Ok(())
        }
        (Ok(data), false) => {
            render(&data);
            Ok(())
        }
        (Err(e), true) => {
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from_error(&e))?);
            Err(e.into())
        }
        (Err(e), false) => Err(e.into()),
    }
}

async fn insights_for(db: &Database) -> anyhow::Result<TaskInsights> {
    let timeout = db
        .reader()
        .call(|conn| repository::get_config(conn, QUERY_TIMEOUT_KEY))
        .await?;
    let insights = TaskInsights::new(db.clone());
    Ok(match timeout {
        Some(raw) => {
            let ms: u64 = raw.parse().map_err(|_| {
                taskinsights::Error::Config(format!(
                    "{QUERY_TIMEOUT_KEY} must be an integer, got '{raw}'"
                ))
            })?;
            insights.with_timeout(Duration::from_millis(ms))
        }
        None => insights,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => Database::open_at(path).await?,
        None => Database::open().await?,
    };

    match cli.command {
        Commands::Dashboard { owner, json } => {
            let insights = insights_for(&db).await?;
            emit(insights.dashboard(&owner).await, json, |d| {
                print_projects(&d.projects);
                println!();
                print_tasks(&d.tasks);
            })?;
        }
        Commands::Projects { owner, json } => {
            let insights = insights_for(&db).await?;
            emit(insights.projects_insight(&owner).await, json, print_projects)?;
        }
        Commands::Tasks { owner, json } => {
            let insights = insights_for(&db).await?;
            emit(insights.tasks_insight(&owner).await, json, print_tasks)?;
        }
        Commands::Count {
            owner,
            kind,
            fields,
            json,
        } => {
            let insights = insights_for(&db).await?;
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            emit(
                insights.count_fields(&owner, &kind, &fields).await,
                json,
                |counts| {
                    for group in counts.values() {
                        let labels: Vec<String> = fields
                            .iter()
                            .map(|f| {
                                let value = group.value(f).unwrap_or(field_counter::NULL_LABEL);
                                format!("{f}={value}")
                            })
                            .collect();
                        println!("  {:>6}  {}", group.count, labels.join(" "));
                    }
                    println!("  {:>6}  total", field_counter::total(counts));
                },
            )?;
        }
        Commands::Progress {
            owner,
            priority,
            json,
        } => {
            let insights = insights_for(&db).await?;
            emit(
                insights.projects_progress(&owner, priority.as_deref()).await,
                json,
                |progresses| print_progresses(progresses),
            )?;
        }
        Commands::Productivity { owner, kind, json } => {
            let insights = insights_for(&db).await?;
            emit(insights.productivity(&owner, &kind).await, json, |p| {
                print_productivity(p)
            })?;
        }
        Commands::User { action } => handle_user(&db, action).await?,
        Commands::Project { action } => handle_project(&db, action).await?,
        Commands::Task { action } => handle_task(&db, action).await?,
        Commands::Seed {
            owners,
            projects,
            tasks,
        } => {
            let options = SeedOptions {
                owners,
                projects_per_owner: projects,
                tasks_per_project: tasks,
            };
            let report = taskinsights::seed::seed_demo(&db, &options).await?;
            println!(
                "Seeded {} projects and {} tasks for:",
                report.projects, report.tasks
            );
            for id in &report.owner_ids {
                println!("  {id}");
            }
        }
        Commands::Config { action } => handle_config(&db, action).await?,
        Commands::Status => print_status(&db).await?,
    }

    Ok(())
}

fn print_general(title: &str, general: &taskinsights::GeneralInfo) {
    println!("{title}: {} total", general.total);
    for (label, count) in field_counter::breakdown(&general.status, "status") {
        println!("  status   {label:<12} {count}");
    }
    for (label, count) in field_counter::breakdown(&general.priority, "priority") {
        println!("  priority {label:<12} {count}");
    }
}

fn print_progresses(progresses: &[taskinsights::ProjectProgress]) {
    if progresses.is_empty() {
        println!("No projects.");
        return;
    }
    for p in progresses {
        println!(
            "  {:>6.2}%  {:<9} {:<10} {}  {}",
            p.progress, p.priority, p.status, p.id, p.name
        );
    }
}

fn print_projects(insight: &taskinsights::ProjectsInsight) {
    print_general("Projects", &insight.general);
    println!("Progress:");
    print_progresses(&insight.progresses);
}

fn print_productivity(p: &taskinsights::ProductivityInsight) {
    let buckets = [
        ("Last 7 days", &p.last_seven),
        ("Last 30 days", &p.last_thirty),
        ("Last 365 days", &p.last_sixty_five),
    ];
    for (label, records) in buckets {
        println!("{label}: {} completed", records.len());
        for r in records.iter().take(10) {
            println!("  {}  {}", r.updated_at.format("%Y-%m-%d"), r.name);
        }
    }
}

fn print_tasks(insight: &taskinsights::TasksInsight) {
    print_general("Tasks", &insight.general);
    print_productivity(&insight.productivity);
}

async fn handle_user(db: &Database, action: UserAction) -> anyhow::Result<()> {
    match action {
        UserAction::Add { name, email } => {
            let user = User::new(&name, &email);
            let id = user.id.clone();
            db.writer()
                .call(move |conn| repository::upsert_user(conn, &user))
                .await?;
            println!("Added user {id}");
        }
        UserAction::List => {
            let users = db.reader().call(|conn| repository::list_users(conn)).await?;
            if users.is_empty() {
                println!("No users.");
            }
            for u in users {
                println!("  {}  {:<24} {}", u.id, u.name, u.email);
            }
        }
        UserAction::Remove { id } => {
            let id = ObjectId::parse(&id)?;
            let removed = db
                .writer()
                .call({
                    let id = id.clone();
                    move |conn| repository::delete_user(conn, &id)
                })
                .await?;
            if removed {
                println!("Removed user {id} with their projects and tasks.");
            } else {
                println!("User {id} not found.");
            }
        }
    }
    Ok(())
}

async fn handle_project(db: &Database, action: ProjectAction) -> anyhow::Result<()> {
    match action {
        ProjectAction::Add {
            owner,
            name,
            description,
            status,
            priority,
            deadline,
        } => {
            let owner_id = ObjectId::parse(&owner)?;
            let mut project = Project::new(&owner_id, &name)
                .status(status.parse::<ProjectStatus>()?)
                .priority(priority.parse::<Priority>()?);
            project.description = description;
            if let Some(d) = parse_deadline(deadline.as_deref())? {
                project = project.deadline(d);
            }
            let id = project.id.clone();
            db.writer()
                .call(move |conn| repository::upsert_project(conn, &project))
                .await?;
            println!("Added project {id}");
        }
        ProjectAction::Remove { id } => {
            let id = ObjectId::parse(&id)?;
            let removed = db
                .writer()
                .call({
                    let id = id.clone();
                    move |conn| repository::delete_project(conn, &id)
                })
                .await?;
            if removed {
                println!("Removed project {id} with its tasks.");
            } else {
                println!("Project {id} not found.");
            }
        }
    }
    Ok(())
}

async fn handle_task(db: &Database, action: TaskAction) -> anyhow::Result<()> {
    match action {
        TaskAction::Add {
            project,
            name,
            description,
            status,
            priority,
            deadline,
        } => {
            let project_id = ObjectId::parse(&project)?;
            let status: TaskStatus = status.parse()?;
            let priority: Priority = priority.parse()?;
            let deadline = parse_deadline(deadline.as_deref())?;

            let project = db
                .reader()
                .call({
                    let project_id = project_id.clone();
                    move |conn| repository::get_project(conn, &project_id)
                })
                .await?
                .ok_or_else(|| taskinsights::Error::NotFound(format!("project {project_id}")))?;

            let mut task = Task::new(&project, &name).status(status).priority(priority);
            task.description = description;
            if let Some(d) = deadline {
                task = task.deadline(d);
            }
            let id = task.id.clone();
            db.writer()
                .call(move |conn| repository::upsert_task(conn, &task))
                .await?;
            println!("Added task {id}");
        }
    }
    Ok(())
}

async fn handle_config(db: &Database, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let val: Option<String> = db
                .reader()
                .call({
                    let key = key.clone();
                    move |conn| repository::get_config(conn, &key)
                })
                .await?;
            match val {
                Some(v) => println!("{key} = {v}"),
                None => println!("{key} is not set"),
            }
        }
        ConfigAction::Set { key, value } => {
            if key == QUERY_TIMEOUT_KEY && value.parse::<u64>().is_err() {
                anyhow::bail!("{QUERY_TIMEOUT_KEY} must be a whole number of milliseconds");
            }
            db.writer()
                .call(move |conn| repository::set_config(conn, &key, &value))
                .await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = db.reader().call(|conn| repository::list_config(conn)).await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

async fn print_status(db: &Database) -> anyhow::Result<()> {
    let (users, projects, tasks) = db
        .reader()
        .call(|conn| repository::table_counts(conn))
        .await?;
    println!("Database Status");
    println!("  Users:    {users}");
    println!("  Projects: {projects}");
    println!("  Tasks:    {tasks}");
    Ok(())
}
