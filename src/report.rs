use crate::api::{ClassificationResult, Statistics};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBar {
    pub category: String,
    pub count: u64,
    pub percentage: f64,
    /// Bar length relative to the largest bucket (largest = 100).
    pub width: f64,
}

pub fn category_bars(stats: &Statistics) -> Vec<CategoryBar> {
    let max = stats
        .category_breakdown
        .values()
        .copied()
        .max()
        .unwrap_or(0);

    let mut bars: Vec<CategoryBar> = stats
        .category_breakdown
        .iter()
        .map(|(category, &count)| CategoryBar {
            category: category.clone(),
            count,
            percentage: if stats.total == 0 {
                0.0
            } else {
                round1(count as f64 * 100.0 / stats.total as f64)
            },
            width: if max == 0 {
                0.0
            } else {
                count as f64 * 100.0 / max as f64
            },
        })
        .collect();
    bars.sort_by(|a, b| b.count.cmp(&a.count));
    bars
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn format_time_remaining(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| *s > 0.0 && s.is_finite()) else {
        return "Calculating...".to_string();
    };
    if seconds < 60.0 {
        format!("~{}s remaining", seconds.round() as u64)
    } else if seconds < 3600.0 {
        let mins = (seconds / 60.0).floor() as u64;
        let secs = (seconds % 60.0).round() as u64;
        format!("~{mins}m {secs}s remaining")
    } else {
        let hours = (seconds / 3600.0).floor() as u64;
        let mins = ((seconds % 3600.0) / 60.0).round() as u64;
        format!("~{hours}h {mins}m remaining")
    }
}

pub fn artifact_name(server_path: &str) -> &str {
    server_path
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(server_path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub topic: String,
    pub started: String,
    pub finished: String,
    pub statistics: Statistics,
    pub bars: Vec<CategoryBar>,
    pub accepted_file: String,
    pub rejected_file: String,
}

impl JobSummary {
    pub fn new(
        job_id: &str,
        topic: &str,
        started: String,
        finished: String,
        result: &ClassificationResult,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            topic: topic.to_string(),
            started,
            finished,
            statistics: result.statistics.clone(),
            bars: category_bars(&result.statistics),
            accepted_file: artifact_name(&result.accepted_file).to_string(),
            rejected_file: artifact_name(&result.rejected_file).to_string(),
        }
    }
}

const BAR_COLUMNS: f64 = 30.0;

pub fn render_text(result: &ClassificationResult) -> String {
    let stats = &result.statistics;
    let mut out = String::new();
    let _ = writeln!(out, "Total:     {}", stats.total);
    let _ = writeln!(out, "Accepted:  {}", stats.accepted);
    let _ = writeln!(out, "Rejected:  {}", stats.rejected);
    let _ = writeln!(out, "Rate:      {}%", stats.acceptance_rate);

    let bars = category_bars(stats);
    if !bars.is_empty() {
        let label_w = bars.iter().map(|b| b.category.chars().count()).max().unwrap_or(0);
        let _ = writeln!(out, "\nCategories:");
        for b in &bars {
            let cells = (b.width / 100.0 * BAR_COLUMNS).round() as usize;
            let _ = writeln!(
                out,
                "  {:<label_w$}  {:<30}  {} ({:.1}%)",
                b.category,
                "█".repeat(cells),
                b.count,
                b.percentage
            );
        }
    }

    let _ = writeln!(out, "\nAccepted keywords: {}", artifact_name(&result.accepted_file));
    let _ = write!(out, "Rejected keywords: {}", artifact_name(&result.rejected_file));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_buckets() {
        assert_eq!(format_time_remaining(None), "Calculating...");
        assert_eq!(format_time_remaining(Some(-3.0)), "Calculating...");
        assert_eq!(format_time_remaining(Some(42.4)), "~42s remaining");
        assert_eq!(format_time_remaining(Some(125.0)), "~2m 5s remaining");
        assert_eq!(format_time_remaining(Some(7260.0)), "~2h 1m remaining");
    }

    #[test]
    fn artifact_name_handles_both_separators() {
        assert_eq!(artifact_name("..\\outputs\\accepted_1.csv"), "accepted_1.csv");
        assert_eq!(artifact_name("../outputs/rejected_1.csv"), "rejected_1.csv");
        assert_eq!(artifact_name("plain.csv"), "plain.csv");
    }

    #[test]
    fn label_column_counts_characters() {
        let result = ClassificationResult {
            status: Some("completed".into()),
            statistics: Statistics {
                total: 3,
                accepted: 3,
                rejected: 0,
                acceptance_rate: 100.0,
                category_breakdown: [("área".to_string(), 2), ("news".to_string(), 1)]
                    .into_iter()
                    .collect(),
            },
            accepted_file: "accepted.csv".into(),
            rejected_file: "rejected.csv".into(),
        };
        let text = render_text(&result);
        let rows: Vec<&str> = text.lines().filter(|l| l.contains('█')).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("  área  █"), "{}", rows[0]);
        assert!(rows[1].starts_with("  news  █"), "{}", rows[1]);
    }
}
