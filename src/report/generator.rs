//! Markdown and JSON dashboard reports.
//!
//! This module lays a dashboard summary out the way the dashboard screen
//! does: stat cards, recent projects, the task summary with progress bars
//! and the upcoming deadlines list.

use crate::analysis::project_progress;
use crate::models::{DashboardSummary, Project, SummaryStats, Task, TaskStats};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

const BAR_WIDTH: usize = 20;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(summary: &DashboardSummary) -> String {
    let mut output = String::new();

    output.push_str("# Dashboard\n\n");
    output.push_str(&generate_header_section(summary));
    output.push_str(&generate_stats_section(&summary.stats));
    output.push_str(&generate_projects_section(&summary.recent_projects));
    output.push_str(&generate_task_summary_section(&summary.task_stats));
    output.push_str(&generate_deadlines_section(
        &summary.upcoming_deadlines,
        summary.generated_at,
    ));
    output.push_str(&generate_footer());

    output
}

/// Generate the header with the range and reference instant.
fn generate_header_section(summary: &DashboardSummary) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Range:** {}\n", summary.range.label()));
    section.push_str(&format!(
        "- **As of:** {}\n",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Recent since:** {}\n\n",
        summary.cutoff.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    section
}

/// Generate the stat cards.
fn generate_stats_section(stats: &SummaryStats) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str("| Active Projects | Total Clients | Pending Tasks | Total Revenue |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        stats.active_projects,
        stats.total_clients,
        stats.pending_tasks,
        format_currency(stats.total_revenue)
    ));

    section
}

/// Generate the recent projects list.
fn generate_projects_section(projects: &[Project]) -> String {
    let mut section = String::new();

    section.push_str("## Recent Projects\n\n");

    if projects.is_empty() {
        section.push_str("No recent projects\n\n");
        return section;
    }

    section.push_str("| Project | Client | Status | Progress |\n");
    section.push_str("|:---|:---|:---|:---|\n");
    for project in projects {
        let progress = project_progress(project);
        section.push_str(&format!(
            "| {} | {} | {} | `{}` {:.0}% |\n",
            escape_cell(&project.name),
            escape_cell(project.client.as_deref().unwrap_or("-")),
            project.status,
            progress_bar(progress),
            progress
        ));
    }
    section.push('\n');

    section
}

/// Generate the task summary with one bar per category.
fn generate_task_summary_section(stats: &TaskStats) -> String {
    let mut section = String::new();

    section.push_str("## Task Summary\n\n");

    let rows = [
        ("Completed", stats.completed, stats.proportions.completed),
        ("In Progress", stats.in_progress, stats.proportions.in_progress),
        ("Overdue", stats.overdue, stats.proportions.overdue),
    ];
    for (label, count, pct) in rows {
        section.push_str(&format!(
            "- **{}:** {} `{}` {:.0}%\n",
            label,
            count,
            progress_bar(pct),
            pct
        ));
    }
    section.push_str(&format!("- **Total:** {}\n\n", stats.total));

    section
}

/// Generate the upcoming deadlines list.
fn generate_deadlines_section(tasks: &[Task], now: DateTime<Utc>) -> String {
    let mut section = String::new();

    section.push_str("## Upcoming Deadlines\n\n");

    if tasks.is_empty() {
        section.push_str("No upcoming deadlines\n\n");
        return section;
    }

    for task in tasks {
        let marker = if task.is_overdue(now) { "⚠️" } else { "⏰" };
        let due = task
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        section.push_str(&format!(
            "- {} **{}** (due {}) {} {}\n",
            marker,
            task.title,
            due,
            task.priority.emoji(),
            task.priority
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Generated by opsboard*\n".to_string()
}

/// Escape text for a Markdown table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render a percentage as a fixed-width bar.
fn progress_bar(pct: f64) -> String {
    let filled = ((pct.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Format an amount as US dollars, e.g. `$12,345.60`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Generate a JSON report.
pub fn generate_json_report(summary: &DashboardSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}

/// Write a report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}
