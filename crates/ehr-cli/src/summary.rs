//! Human-readable run summary.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use ehr_model::dates::format_date;

use crate::commands::{FileOutcome, FileResult, RunSummary};

pub fn print_summary(summary: &RunSummary) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Lines"),
        header_cell("Accepted"),
        header_cell("Rejected"),
        header_cell("Sorted"),
        header_cell("First date"),
        header_cell("Last date"),
        header_cell("Status"),
    ]);
    apply_table_style(&mut table);
    for column in 1..=3 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    align_column(&mut table, 4, CellAlignment::Center);
    align_column(&mut table, 7, CellAlignment::Center);

    for outcome in &summary.outcomes {
        table.add_row(outcome_row(outcome));
    }
    println!("{table}");
    if summary.failed {
        println!("Run failed: at least one input did not validate.");
    }
}

fn outcome_row(outcome: &FileOutcome) -> Vec<Cell> {
    match &outcome.result {
        FileResult::Report(report) => {
            let status = if report.failed() {
                Cell::new("FAILED").fg(Color::Red).add_attribute(Attribute::Bold)
            } else if report.error_count() > 0 {
                Cell::new("OK*").fg(Color::Yellow)
            } else {
                Cell::new("OK").fg(Color::Green)
            };
            vec![
                Cell::new(outcome.kind),
                Cell::new(report.stats.lines_read),
                Cell::new(report.stats.records_accepted),
                Cell::new(report.stats.records_rejected),
                Cell::new(if report.is_sorted { "yes" } else { "no" }),
                date_cell(report.stats.first_date),
                date_cell(report.stats.last_date),
                status,
            ]
        }
        FileResult::Fatal(message) => vec![
            Cell::new(outcome.kind),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new(message.as_str()).fg(Color::Red),
            Cell::new("FATAL").fg(Color::Red).add_attribute(Attribute::Bold),
        ],
    }
}

fn date_cell(date: Option<i32>) -> Cell {
    match date {
        Some(days) => Cell::new(format_date(days)),
        None => Cell::new("-").fg(Color::DarkGrey),
    }
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}
