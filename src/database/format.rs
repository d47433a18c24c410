//! Format database contents as text tables.

use crate::results::ResultRecord;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

fn file_list(record: &ResultRecord, inputs: bool) -> String {
    let files = if inputs {
        record.inputs()
    } else {
        record.outputs()
    };
    files
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format indexed results as a table
pub fn format_results_table<'a>(rows: impl IntoIterator<Item = (usize, &'a ResultRecord)>) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Index", "Job ID", "Plugin", "Name", "Time", "Inputs", "Outputs",
    ]);
    let mut count = 0usize;
    for (index, record) in rows {
        count += 1;
        table.add_row(vec![
            index.to_string(),
            record
                .job_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.plugin().to_string(),
            record.name().to_string(),
            record.time().format("%Y-%m-%d %H:%M:%S").to_string(),
            file_list(record, true),
            file_list(record, false),
        ]);
    }
    if count == 0 {
        return "No results.\n".to_string();
    }
    format!("{}\n\nTotal: {} results.\n", table, count)
}
