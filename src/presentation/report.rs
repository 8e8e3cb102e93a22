use std::fmt::Write as _;

use thiserror::Error;

use crate::application::grouping::GroupingReport;
use crate::config::OutputFormat;
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to format report: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Render `report` for stdout.
pub fn render(report: &GroupingReport, format: OutputFormat) -> Result<String, RenderError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => render_text(report),
    }
}

fn render_text(report: &GroupingReport) -> Result<String, RenderError> {
    let mut out = String::new();

    if report.groups.is_empty() {
        writeln!(out, "No groups found.")?;
    }
    for (index, group) in report.groups.iter().enumerate() {
        let label = if group.label.trim().is_empty() {
            "(unlabelled)"
        } else {
            group.label.trim_end()
        };
        writeln!(out, "Group {}: {label}", index + 1)?;
        writeln!(out, "  similar: {}", handles(&group.similarities))?;
        writeln!(out, "  members: {}", handles(&group.members))?;
    }

    if !report.power_users.is_empty() {
        writeln!(out)?;
        writeln!(out, "Power users:")?;
        for user in &report.power_users {
            writeln!(
                out,
                "  @{} ({} followers)",
                user.screen_name, user.followers_count
            )?;
        }
    }

    let stats = &report.expansion;
    writeln!(out)?;
    writeln!(
        out,
        "Expansion: {} dispatched, {} succeeded, {} failed",
        stats.dispatched, stats.succeeded, stats.failed
    )?;

    Ok(out)
}

fn handles(users: &[UserRecord]) -> String {
    if users.is_empty() {
        return "-".to_string();
    }
    users
        .iter()
        .map(|user| format!("@{}", user.screen_name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use crate::application::grouping::ExpansionStats;
    use crate::domain::entities::Group;

    use super::*;

    fn user(id: u64, name: &str, followers: u64) -> UserRecord {
        UserRecord {
            id,
            screen_name: name.to_string(),
            followers_count: followers,
            friends_count: 1,
            description: None,
        }
    }

    fn report() -> GroupingReport {
        GroupingReport {
            groups: vec![Group {
                label: "Rustacean's Gardener ".to_string(),
                similarity_ids: vec![1, 2],
                similarities: vec![user(1, "ferris", 10), user(2, "crab", 20)],
                members: vec![user(10, "ada", 5)],
            }],
            power_users: vec![user(99, "famous", 1_000_000)],
            expansion: ExpansionStats {
                dispatched: 3,
                succeeded: 2,
                failed: 1,
            },
        }
    }

    #[test]
    fn text_lists_groups_power_users_and_stats() {
        let text = render(&report(), OutputFormat::Text).expect("render");

        assert!(text.contains("Group 1: Rustacean's Gardener\n"));
        assert!(text.contains("  similar: @ferris, @crab\n"));
        assert!(text.contains("  members: @ada\n"));
        assert!(text.contains("  @famous (1000000 followers)\n"));
        assert!(text.contains("Expansion: 3 dispatched, 2 succeeded, 1 failed\n"));
    }

    #[test]
    fn text_reports_empty_result() {
        let empty = GroupingReport {
            groups: Vec::new(),
            power_users: Vec::new(),
            expansion: ExpansionStats::default(),
        };
        let text = render(&empty, OutputFormat::Text).expect("render");
        assert!(text.starts_with("No groups found.\n"));
        assert!(!text.contains("Power users"));
    }

    #[test]
    fn json_keeps_report_shape() {
        let json = render(&report(), OutputFormat::Json).expect("render");
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");

        assert_eq!(value["groups"][0]["similarity_ids"], serde_json::json!([1, 2]));
        assert_eq!(value["power_users"][0]["screen_name"], "famous");
        assert_eq!(value["expansion"]["failed"], 1);
    }
}
