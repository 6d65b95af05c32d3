//! Rendering of resolved results for stdout.

use clap::ValueEnum;

use crate::errors::Result;
use crate::models::AccountLastLogonResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    Table,
    /// Pretty-printed JSON array
    Json,
    /// Comma-separated values with a header row
    Csv,
}

const BASE_HEADERS: [&str; 5] = ["Name", "Account", "SamAccountName", "LastLogon", "Server"];
const EXTENDED_HEADERS: [&str; 2] = ["Description", "Created"];

/// Render results in input order.
pub fn render(results: &[AccountLastLogonResult], format: OutputFormat, extended: bool) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(results)?),
        OutputFormat::Csv => Ok(render_csv(results, extended)),
        OutputFormat::Table => Ok(render_table(results, extended)),
    }
}

fn headers(extended: bool) -> Vec<&'static str> {
    let mut headers = BASE_HEADERS.to_vec();
    if extended {
        headers.extend(EXTENDED_HEADERS);
    }
    headers
}

fn row(result: &AccountLastLogonResult, extended: bool) -> Vec<String> {
    let mut row = vec![
        result.display_name.clone().unwrap_or_default(),
        result.account_identifier.to_string(),
        result.sam_account_name.clone().unwrap_or_default(),
        result.last_logon_display(),
        result.source_server_name.clone().unwrap_or_default(),
    ];
    if extended {
        row.push(result.description.clone().unwrap_or_default());
        row.push(result.when_created.map(|dt| dt.to_rfc3339()).unwrap_or_default());
    }
    row
}

fn render_table(results: &[AccountLastLogonResult], extended: bool) -> String {
    let headers = headers(extended);
    let rows: Vec<Vec<String>> = results.iter().map(|r| row(r, extended)).collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_line(headers.iter().map(|h| h.to_string()).collect()));
    lines.push(format_line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        lines.push(format_line(row));
    }
    lines.join("\n")
}

fn render_csv(results: &[AccountLastLogonResult], extended: bool) -> String {
    let mut lines = vec![headers(extended).join(",")];
    for result in results {
        let cells: Vec<String> = row(result, extended).iter().map(|c| csv_escape(c)).collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

fn csv_escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
