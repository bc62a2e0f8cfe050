//! Output formatting module for CLI display
//!
//! Keeps presentation of run reports apart from the update itself.

use colored::Colorize;
use p2p_rates::updater::{CurrencyOutcome, RunReport, TabReport};
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

/// Format a run report for JSON output
pub fn format_run_json(report: &RunReport) -> String {
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn format_tab_table(tab: &TabReport) -> String {
    #[derive(Tabled)]
    struct CurrencyRow {
        #[tabled(rename = "Currency")]
        currency: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Row")]
        row: String,
        #[tabled(rename = "Median")]
        price: String,
    }

    let rows: Vec<CurrencyRow> = tab
        .results
        .iter()
        .map(|r| {
            let (row, price) = match &r.outcome {
                CurrencyOutcome::Written { row, price }
                | CurrencyOutcome::WriteFailed { row, price, .. } => {
                    (row.to_string(), price.normalize().to_string())
                }
                _ => ("-".to_string(), "-".to_string()),
            };
            let status = match &r.outcome {
                CurrencyOutcome::Written { .. } => r.outcome.label().green().to_string(),
                CurrencyOutcome::NoPrice | CurrencyOutcome::RowNotFound => {
                    r.outcome.label().yellow().to_string()
                }
                CurrencyOutcome::FetchFailed { .. } | CurrencyOutcome::WriteFailed { .. } => {
                    r.outcome.label().red().to_string()
                }
            };
            CurrencyRow {
                currency: r.currency.clone(),
                status,
                row,
                price,
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    // Right-align Row (2) and Median (3)
    table.modify(Columns::new(2..), Alignment::right());
    table.to_string()
}

/// Format a run report for terminal table output
pub fn format_run_table(report: &RunReport, dry_run: bool) -> String {
    let mut output = String::new();

    for tab in &report.tabs {
        output.push_str(&format!(
            "\n{} {} ({}) → column {} ({}), {}\n\n",
            "📈".cyan().bold(),
            tab.tab.bold(),
            tab.side,
            tab.column_letter.bold(),
            tab.column,
            report.date.format("%Y-%m-%d")
        ));
        output.push_str(&format_tab_table(tab));
        output.push('\n');

        // Failure details don't fit the table
        for r in &tab.results {
            if let CurrencyOutcome::FetchFailed { error }
            | CurrencyOutcome::WriteFailed { error, .. } = &r.outcome
            {
                output.push_str(&format!("  {} {}: {}\n", "✗".red(), r.currency, error));
            }
        }
    }

    output.push_str(&format!("\n{} Update complete!\n", "✓".green().bold()));
    output.push_str(&format!("  Source: {}\n", report.source));
    output.push_str(&format!("  Written: {}\n", report.written().to_string().green()));
    if report.skipped() > 0 {
        output.push_str(&format!("  Skipped: {}\n", report.skipped().to_string().yellow()));
    }
    if dry_run {
        output.push_str(&format!(
            "\n{} Dry run - no changes saved\n",
            "ℹ".blue().bold()
        ));
    }

    output
}
