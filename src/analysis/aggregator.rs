//! Dashboard aggregation and derived statistics.
//!
//! Every function here is a pure recomputation over the snapshot it is
//! given. Nothing reads the clock: the caller passes the reference instant.

use crate::analysis::range::{resolve_cutoff, TimeRange};
use crate::models::{
    DashboardSummary, Invoice, InvoiceStatus, Project, ProjectStatus, Snapshot, SummaryStats,
    Task, TaskStats,
};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Maximum entries in the recent-projects and upcoming-deadlines lists.
pub const DISPLAY_LIMIT: usize = 5;

/// Percentage of `numerator` over `total`, within `0.0..=100.0`.
///
/// A zero total yields `0.0`.
pub fn ratio(numerator: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (numerator as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Completion of a single project as a progress-bar percentage.
pub fn project_progress(project: &Project) -> f64 {
    ratio(project.completion_percentage as usize, 100)
}

/// Projects created strictly after `cutoff`, newest first.
///
/// Projects sharing a `created_at` keep their input order.
pub fn recent_projects(projects: &[Project], cutoff: DateTime<Utc>) -> Vec<Project> {
    let mut recent: Vec<Project> = projects
        .iter()
        .filter(|p| p.created_at.is_some_and(|created| created > cutoff))
        .cloned()
        .collect();

    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(DISPLAY_LIMIT);
    recent
}

/// Incomplete tasks due strictly after `now`, soonest first.
pub fn upcoming_deadlines(tasks: &[Task], now: DateTime<Utc>) -> Vec<Task> {
    let mut upcoming: Vec<Task> = tasks
        .iter()
        .filter(|t| t.is_upcoming(now))
        .cloned()
        .collect();

    upcoming.sort_by_key(|t| t.due_date);
    upcoming.truncate(DISPLAY_LIMIT);
    upcoming
}

/// Sum of paid invoice amounts.
pub fn total_revenue(invoices: &[Invoice]) -> f64 {
    invoices
        .iter()
        .filter(|i| i.status == InvoiceStatus::Paid)
        .fold(0.0, |sum, i| sum + i.amount)
}

/// Number of projects currently in progress.
pub fn active_projects(projects: &[Project]) -> usize {
    projects
        .iter()
        .filter(|p| p.status == ProjectStatus::InProgress)
        .count()
}

/// Number of tasks not yet completed.
pub fn pending_tasks(tasks: &[Task]) -> usize {
    tasks.iter().filter(|t| !t.completed).count()
}

/// Task counters and proportions.
pub fn task_stats(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    TaskStats::from_tasks(tasks, now)
}

/// Scalar values for the stat cards.
pub fn summary_stats(snapshot: &Snapshot) -> SummaryStats {
    SummaryStats {
        active_projects: active_projects(&snapshot.projects),
        total_clients: snapshot.clients.len(),
        pending_tasks: pending_tasks(&snapshot.tasks),
        total_revenue: total_revenue(&snapshot.invoices),
    }
}

/// Build everything a dashboard render needs from one snapshot.
pub fn build_summary(
    snapshot: &Snapshot,
    range: TimeRange,
    now: DateTime<Utc>,
) -> DashboardSummary {
    let cutoff = resolve_cutoff(range, now);

    let summary = DashboardSummary {
        generated_at: now,
        range,
        cutoff,
        stats: summary_stats(snapshot),
        recent_projects: recent_projects(&snapshot.projects, cutoff),
        upcoming_deadlines: upcoming_deadlines(&snapshot.tasks, now),
        task_stats: task_stats(&snapshot.tasks, now),
    };

    debug!(
        "Built {} summary: {} recent projects, {} upcoming deadlines, {} overdue",
        range,
        summary.recent_projects.len(),
        summary.upcoming_deadlines.len(),
        summary.task_stats.overdue
    );

    summary
}
