//! Terminal tables.
//!
//! ```rust
//! let mut table = ciqx::ui::Table::new("Garmin Connect IQ Devices", &["Device ID", "Name"]);
//! table.add_row(vec!["fenix7".to_string(), "fēnix 7".to_string()]);
//! table.print();
//! ```

use colored::*;
use console::{measure_text_width, truncate_str};

/// Narrowest a column is squeezed to when the terminal is small
const MIN_COL_WIDTH: usize = 6;

pub struct Table {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: &str, headers: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows with the wrong number of cells are ignored
    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    /// Column widths in visible characters, shrunk to fit `max_width`
    pub fn column_widths(&self, max_width: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| measure_text_width(h)).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(measure_text_width(cell));
            }
        }

        // "│ a │ b │" costs 3 per column plus 1
        let overhead = 1 + 3 * widths.len();
        while overhead + widths.iter().sum::<usize>() > max_width {
            let Some(widest) = widths.iter_mut().filter(|w| **w > MIN_COL_WIDTH).max() else {
                break;
            };
            *widest -= 1;
        }
        widths
    }

    pub fn render(&self, max_width: usize) -> Vec<String> {
        if self.headers.is_empty() {
            return Vec::new();
        }
        let widths = self.column_widths(max_width);

        let border = |left: &str, mid: &str, right: &str| {
            let inner: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{}{}{}", left, inner.join(mid), right)
        };
        let line = |cells: &[String], header: bool| {
            let cells: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, &w)| {
                    let text = truncate_str(cell, w, "…");
                    let pad = " ".repeat(w.saturating_sub(measure_text_width(&text)));
                    if header {
                        format!(" {}{} ", text.bold(), pad)
                    } else {
                        format!(" {}{} ", text, pad)
                    }
                })
                .collect();
            format!("│{}│", cells.join("│"))
        };

        let mut out = Vec::with_capacity(self.rows.len() + 5);
        if !self.title.is_empty() {
            out.push(self.title.bold().to_string());
        }
        out.push(border("┌", "┬", "┐"));
        out.push(line(&self.headers, true));
        out.push(border("├", "┼", "┤"));
        for row in &self.rows {
            out.push(line(row, false));
        }
        out.push(border("└", "┴", "┘"));
        out
    }

    pub fn print(&self) {
        let (_, cols) = console::Term::stdout().size();
        for line in self.render(cols as usize) {
            println!("{}", line);
        }
    }
}
