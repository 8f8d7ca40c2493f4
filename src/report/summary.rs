//! Fit summary report generation

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;
use std::collections::BTreeMap;

use crate::pipeline::table::BinningTable;

/// Qualitative predictive-strength label for an IV value
pub fn iv_strength(iv: f64) -> &'static str {
    if iv < 0.02 {
        "unpredictive"
    } else if iv < 0.1 {
        "weak"
    } else if iv < 0.3 {
        "medium"
    } else {
        "strong"
    }
}

fn iv_color(iv: f64) -> Color {
    if iv < 0.02 {
        Color::Red
    } else if iv < 0.1 {
        Color::Yellow
    } else if iv < 0.3 {
        Color::Cyan
    } else {
        Color::Green
    }
}

/// Summary of a binning fit across all variables
#[derive(Debug, Default)]
pub struct FitSummary {
    pub total_rows: usize,
    pub variables: usize,
    pub degenerate: Vec<String>,
}

impl FitSummary {
    pub fn from_tables(tables: &BTreeMap<String, BinningTable>, total_rows: usize) -> Self {
        Self {
            total_rows,
            variables: tables.len(),
            degenerate: tables
                .values()
                .filter(|t| t.degenerate)
                .map(|t| t.variable.clone())
                .collect(),
        }
    }

    /// Render the per-variable table, strongest IV first
    pub fn display(&self, tables: &BTreeMap<String, BinningTable>) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("BINNING SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Variable").add_attribute(Attribute::Bold),
            Cell::new("Kind").add_attribute(Attribute::Bold),
            Cell::new("Bins").add_attribute(Attribute::Bold),
            Cell::new("Special").add_attribute(Attribute::Bold),
            Cell::new("IV").add_attribute(Attribute::Bold),
            Cell::new("Strength").add_attribute(Attribute::Bold),
        ]);

        let mut sorted: Vec<&BinningTable> = tables.values().collect();
        sorted.sort_by(|a, b| {
            b.total_iv
                .partial_cmp(&a.total_iv)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for t in sorted {
            let strength = if t.degenerate {
                Cell::new("degenerate").fg(Color::Red)
            } else {
                Cell::new(iv_strength(t.total_iv)).fg(iv_color(t.total_iv))
            };
            table.add_row(vec![
                Cell::new(&t.variable),
                Cell::new(t.kind.to_string()),
                Cell::new(t.bins.len()),
                Cell::new(t.special_bins.len()),
                Cell::new(format!("{:.4}", t.total_iv)),
                strength,
            ]);
        }

        // Indent the table
        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        println!();
        println!(
            "    {} rows, {} variables binned",
            style(self.total_rows).green().bold(),
            style(self.variables).green().bold()
        );

        if !self.degenerate.is_empty() {
            println!();
            println!(
                "    {} {} collapsed to a single bin:",
                style("⚠").yellow(),
                style(self.degenerate.len()).yellow().bold()
            );
            for variable in &self.degenerate {
                println!("      {} {}", style("•").dim(), variable);
            }
        }
    }
}
