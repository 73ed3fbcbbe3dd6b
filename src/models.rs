//! Data models for the dashboard.
//!
//! This module contains the entity types handed over by the data layer
//! (projects, tasks, clients, invoices) and the summary structures the
//! aggregation engine produces from them.
//!
//! Decoding is deliberately forgiving: rows coming back from the hosted
//! backend may carry nulls, numeric strings or odd timestamps, and none of
//! that is allowed to make a dashboard refresh fail.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::analysis::{ratio, TimeRange};

/// A row of one backend table, addressable by id.
pub trait Entity: Clone + Serialize + DeserializeOwned {
    /// Backend table holding this entity.
    const TABLE: &'static str;

    fn id(&self) -> &str;

    /// Fill in the values a freshly inserted row starts with.
    fn prepare_insert(_row: &mut Map<String, Value>) {}
}

/// The four entity kinds, as named on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EntityKind {
    Project,
    Task,
    Client,
    Invoice,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Project => write!(f, "project"),
            EntityKind::Task => write!(f, "task"),
            EntityKind::Client => write!(f, "client"),
            EntityKind::Invoice => write!(f, "invoice"),
        }
    }
}

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    #[serde(rename = "On Hold")]
    OnHold,
    /// Missing or unrecognized status.
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStatus::InProgress => write!(f, "In Progress"),
            ProjectStatus::Completed => write!(f, "Completed"),
            ProjectStatus::OnHold => write!(f, "On Hold"),
            ProjectStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Task priority. Anything unrecognized is treated as `Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

impl Priority {
    /// Returns an emoji badge for the priority.
    pub fn emoji(&self) -> &'static str {
        match self {
            Priority::Low => "🟢",
            Priority::Medium => "🟡",
            Priority::High => "🔴",
        }
    }
}

/// Payment status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Paid,
    Pending,
    Overdue,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A client project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub client_id: Option<String>,
    /// Client display name, when the backend joins it in.
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub client: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: ProjectStatus,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub budget: f64,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub due_date: Option<DateTime<Utc>>,
    /// Always within 0..=100.
    #[serde(default, deserialize_with = "lenient::percentage")]
    pub completion_percentage: u8,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for Project {
    const TABLE: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }

    /// New projects start at 0% and default to "In Progress".
    fn prepare_insert(row: &mut Map<String, Value>) {
        row.insert("completion_percentage".to_string(), Value::from(0));
        let has_status = match row.get("status") {
            Some(Value::String(status)) => !status.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if !has_status {
            row.insert("status".to_string(), Value::from("In Progress"));
        }
    }
}

/// A unit of work with a deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub title: String,
    #[serde(
        rename = "dueDate",
        alias = "due_date",
        default,
        deserialize_with = "lenient::timestamp"
    )]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub priority: Priority,
    #[serde(
        default,
        deserialize_with = "lenient::opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<String>,
}

impl Task {
    /// Incomplete and due strictly before `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Incomplete and due strictly after `now`.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due > now)
    }
}

impl Entity for Task {
    const TABLE: &'static str = "tasks";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A customer. Only counted by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub company: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub industry: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub website: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<String>,
}

impl Entity for Client {
    const TABLE: &'static str = "clients";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A billed amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(
        default,
        deserialize_with = "lenient::opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub amount: f64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: InvoiceStatus,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for Invoice {
    const TABLE: &'static str = "invoices";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Point-in-time copy of every collection the dashboard reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

impl Snapshot {
    /// Total number of entities across all collections.
    pub fn len(&self) -> usize {
        self.projects.len() + self.tasks.len() + self.clients.len() + self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Share of the task total per category, as percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProportions {
    pub completed: f64,
    pub in_progress: f64,
    pub overdue: f64,
}

/// Task counters shown in the task summary panel.
///
/// `in_progress` counts every incomplete task, so an overdue task is
/// counted in both `in_progress` and `overdue`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub completed: usize,
    pub in_progress: usize,
    pub overdue: usize,
    pub total: usize,
    pub proportions: TaskProportions,
}

impl TaskStats {
    /// Creates the counters from a task collection at a reference instant.
    pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let mut stats = Self {
            total: tasks.len(),
            ..Self::default()
        };

        for task in tasks {
            if task.completed {
                stats.completed += 1;
            } else {
                stats.in_progress += 1;
                if task.is_overdue(now) {
                    stats.overdue += 1;
                }
            }
        }

        stats.proportions = TaskProportions {
            completed: ratio(stats.completed, stats.total),
            in_progress: ratio(stats.in_progress, stats.total),
            overdue: ratio(stats.overdue, stats.total),
        };

        stats
    }
}

/// Scalar values for the stat cards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub active_projects: usize,
    pub total_clients: usize,
    pub pending_tasks: usize,
    /// Raw amount; formatting is up to the presentation layer.
    pub total_revenue: f64,
}

/// Everything a dashboard view needs for one render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub generated_at: DateTime<Utc>,
    pub range: TimeRange,
    pub cutoff: DateTime<Utc>,
    pub stats: SummaryStats,
    pub recent_projects: Vec<Project>,
    pub upcoming_deadlines: Vec<Task>,
    pub task_stats: TaskStats,
}

/// Forgiving field decoders for rows of uncertain shape.
pub mod lenient {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Decode `T`, falling back to `T::default()` on null or a mismatched shape.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(T::deserialize(value).unwrap_or_default())
    }

    pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_id(&value).unwrap_or_default())
    }

    pub fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_id(&value))
    }

    pub fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_amount(&value))
    }

    pub fn percentage<'de, D>(deserializer: D) -> Result<u8, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let pct = coerce_amount(&value).round().clamp(0.0, 100.0);
        Ok(pct as u8)
    }

    pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => parse_timestamp(&s),
            Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        })
    }

    fn value_to_id(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Coerce a JSON value into a finite number. Non-numeric input is `0.0`.
    pub fn coerce_amount(value: &Value) -> f64 {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
    }

    /// Parse the timestamp shapes the backend and hand-written snapshots use.
    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        // Postgres text output: "2024-03-01 10:00:00.123+00"
        if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Some(dt.with_timezone(&Utc));
        }

        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn task(completed: bool, due: Option<DateTime<Utc>>) -> Task {
        Task {
            id: "t".to_string(),
            title: "Task".to_string(),
            due_date: due,
            completed,
            priority: Priority::Medium,
            project_id: None,
        }
    }

    #[test]
    fn test_project_decodes_backend_row() {
        let project: Project = serde_json::from_value(json!({
            "id": 42,
            "name": "Website redesign",
            "client_id": "c-1",
            "status": "In Progress",
            "budget": "12500.00",
            "due_date": "2024-09-01",
            "completion_percentage": 140,
            "created_at": "2024-06-10T08:30:00.000000+00:00"
        }))
        .unwrap();

        assert_eq!(project.id, "42");
        assert_eq!(project.status, ProjectStatus::InProgress);
        assert_eq!(project.budget, 12500.0);
        assert_eq!(project.completion_percentage, 100);
        assert_eq!(
            project.due_date,
            Some(Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            project.created_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 10, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_unknown_and_null_fields_fall_back() {
        let project: Project = serde_json::from_value(json!({
            "id": "p",
            "name": null,
            "status": "Archived",
            "budget": null,
            "completion_percentage": -5,
            "created_at": "not a date"
        }))
        .unwrap();

        assert_eq!(project.name, "");
        assert_eq!(project.status, ProjectStatus::Unknown);
        assert_eq!(project.budget, 0.0);
        assert_eq!(project.completion_percentage, 0);
        assert!(project.created_at.is_none());

        let task: Task = serde_json::from_value(json!({
            "id": 7,
            "title": "Call client",
            "completed": null,
            "priority": "Urgent"
        }))
        .unwrap();
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Low);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn test_task_accepts_both_due_date_spellings() {
        let camel: Task =
            serde_json::from_value(json!({"id": "a", "dueDate": "2024-06-20T00:00:00Z"})).unwrap();
        let snake: Task =
            serde_json::from_value(json!({"id": "b", "due_date": "2024-06-20T00:00:00Z"})).unwrap();
        assert_eq!(camel.due_date, snake.due_date);
        assert!(camel.due_date.is_some());
    }

    #[test]
    fn test_coerce_amount() {
        use lenient::coerce_amount;
        assert_eq!(coerce_amount(&json!(200)), 200.0);
        assert_eq!(coerce_amount(&json!("100.50")), 100.5);
        assert_eq!(coerce_amount(&json!(" 7 ")), 7.0);
        assert_eq!(coerce_amount(&json!(null)), 0.0);
        assert_eq!(coerce_amount(&json!("abc")), 0.0);
        assert_eq!(coerce_amount(&json!("NaN")), 0.0);
        assert_eq!(coerce_amount(&json!(true)), 0.0);
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        use lenient::parse_timestamp;
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 10:00:00+00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-01"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_task_overdue_and_upcoming() {
        let yesterday = now() - Duration::days(1);
        let tomorrow = now() + Duration::days(1);

        assert!(task(false, Some(yesterday)).is_overdue(now()));
        assert!(!task(false, Some(yesterday)).is_upcoming(now()));
        assert!(task(false, Some(tomorrow)).is_upcoming(now()));
        assert!(!task(true, Some(yesterday)).is_overdue(now()));
        assert!(!task(true, Some(tomorrow)).is_upcoming(now()));
        assert!(!task(false, None).is_overdue(now()));
        assert!(!task(false, None).is_upcoming(now()));
        // due exactly now is neither
        assert!(!task(false, Some(now())).is_overdue(now()));
        assert!(!task(false, Some(now())).is_upcoming(now()));
    }

    #[test]
    fn test_task_stats_scenario() {
        let tasks = vec![
            task(false, Some(now() - Duration::days(1))),
            task(false, Some(now() + Duration::days(1))),
            task(true, Some(now() - Duration::days(1))),
        ];

        let stats = TaskStats::from_tasks(&tasks, now());
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 2);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed + stats.in_progress, stats.total);
        assert!(stats.overdue <= stats.in_progress);
        assert!((stats.proportions.in_progress - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_task_stats_empty() {
        let stats = TaskStats::from_tasks(&[], now());
        assert_eq!(stats, TaskStats::default());
        assert_eq!(stats.proportions.completed, 0.0);
    }

    #[test]
    fn test_project_insert_defaults() {
        let mut row = Map::new();
        row.insert("name".to_string(), json!("Website"));
        row.insert("completion_percentage".to_string(), json!(80));
        Project::prepare_insert(&mut row);
        assert_eq!(row["completion_percentage"], json!(0));
        assert_eq!(row["status"], json!("In Progress"));

        let mut row = Map::new();
        row.insert("status".to_string(), json!("On Hold"));
        Project::prepare_insert(&mut row);
        assert_eq!(row["status"], json!("On Hold"));

        let mut row = Map::new();
        row.insert("status".to_string(), json!(""));
        Project::prepare_insert(&mut row);
        assert_eq!(row["status"], json!("In Progress"));

        let mut row = Map::new();
        Client::prepare_insert(&mut row);
        assert!(row.is_empty());
    }

    #[test]
    fn test_snapshot_missing_collections() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"clients":[{"id":1,"name":"Acme"}]}"#).unwrap();
        assert!(snapshot.projects.is_empty());
        assert!(snapshot.tasks.is_empty());
        assert_eq!(snapshot.clients.len(), 1);
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.is_empty());
    }
}
