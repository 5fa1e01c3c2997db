//! Stats-only derivations and the inline summary text

use super::aggregator::Aggregation;
use super::kind::ReportKind;
use super::table::AggregateTable;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryShare {
    pub category: String,
    pub value: f64,
    /// Percentage of the table total, 0.0 when the total is zero
    pub percent: f64,
}

/// Per-category totals with their share of the grand total, largest first
pub fn category_shares(table: &AggregateTable) -> Vec<CategoryShare> {
    let total = table.total();
    let mut shares: Vec<CategoryShare> = table
        .category_totals()
        .into_iter()
        .map(|(category, value)| CategoryShare {
            percent: if total > 0.0 { value / total * 100.0 } else { 0.0 },
            category,
            value,
        })
        .collect();

    shares.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
    shares
}

/// Render the stats message sent before the chart
pub fn format_summary(aggregation: &Aggregation, period_label: &str, currency: &str) -> String {
    let table = &aggregation.table;
    let mut text = String::new();

    match aggregation.kind {
        ReportKind::Sales => {
            let _ = writeln!(text, "📊 Sales statistics for {}:\n", period_label);
            let _ = writeln!(text, "📈 Total sales: {:.2} {}\n", table.total(), currency);
            let _ = writeln!(text, "🏆 Sales by product:");
            for share in category_shares(table) {
                let _ = writeln!(
                    text,
                    "- {}: {:.2} {} ({:.1}%)",
                    share.category, share.value, currency, share.percent
                );
            }
        }
        ReportKind::Activity => {
            let _ = writeln!(text, "📊 Activity statistics for {}:\n", period_label);
            let _ = writeln!(text, "📈 Total actions: {}\n", table.total() as u64);
            let _ = writeln!(text, "🔍 Breakdown by action type:");
            for share in category_shares(table) {
                let _ = writeln!(
                    text,
                    "- {}: {} ({:.1}%)",
                    share.category, share.value as u64, share.percent
                );
            }
            let _ = writeln!(text, "\n👥 Most active users:");
            for leader in &aggregation.leaders {
                let _ = writeln!(text, "- {}: {} actions", leader.display_name, leader.actions);
            }
        }
    }

    text
}
