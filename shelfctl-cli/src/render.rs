//! Fixed-width text rendering of result sets

use shelfctl_core::TableData;

/// Width of every rendered column
pub const COLUMN_WIDTH: usize = 30;

/// Render headers, a dash rule, then one line per row.
///
/// Cells are left-aligned and padded to `COLUMN_WIDTH`; longer values are
/// printed in full and push the rest of the line right.
pub fn render_table(data: &TableData) -> String {
    let mut out = String::new();

    for header in &data.headers {
        out.push_str(&format!("{header:<COLUMN_WIDTH$}"));
    }
    out.push('\n');
    out.push_str(&"-".repeat(COLUMN_WIDTH * data.headers.len()));
    out.push('\n');

    for row in &data.rows {
        for cell in row {
            out.push_str(&format!("{:<COLUMN_WIDTH$}", cell.to_string()));
        }
        out.push('\n');
    }
    out
}

pub fn render_json(data: &TableData) -> serde_json::Result<String> {
    serde_json::to_string_pretty(data)
}
