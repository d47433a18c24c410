//! Tabular summary of a parameter store.

use super::value::total_cmp;
use super::{ParamMetadata, ParamValue, Parameters};
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

/// Column width at which value strings are wrapped
pub const SUMMARY_WRAP_WIDTH: usize = 40;

/// Column a summary can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryField {
    #[default]
    Key,
    Value,
    Author,
    Timestamp,
}

enum Predicate {
    Key(Box<dyn Fn(&str) -> bool>),
    Value(Box<dyn Fn(&ParamValue) -> bool>),
    Author(Box<dyn Fn(&str) -> bool>),
    Timestamp(Box<dyn Fn(&DateTime<Utc>) -> bool>),
}

/// Row predicate over one field; rows failing it are left out of the summary
pub struct SummaryFilter(Predicate);

impl SummaryFilter {
    pub fn key(pred: impl Fn(&str) -> bool + 'static) -> Self {
        Self(Predicate::Key(Box::new(pred)))
    }

    pub fn value(pred: impl Fn(&ParamValue) -> bool + 'static) -> Self {
        Self(Predicate::Value(Box::new(pred)))
    }

    pub fn author(pred: impl Fn(&str) -> bool + 'static) -> Self {
        Self(Predicate::Author(Box::new(pred)))
    }

    pub fn timestamp(pred: impl Fn(&DateTime<Utc>) -> bool + 'static) -> Self {
        Self(Predicate::Timestamp(Box::new(pred)))
    }

    pub fn field(&self) -> SummaryField {
        match self.0 {
            Predicate::Key(_) => SummaryField::Key,
            Predicate::Value(_) => SummaryField::Value,
            Predicate::Author(_) => SummaryField::Author,
            Predicate::Timestamp(_) => SummaryField::Timestamp,
        }
    }

    fn accepts(&self, key: &str, value: &ParamValue, meta: &ParamMetadata) -> bool {
        match &self.0 {
            Predicate::Key(f) => f(key),
            Predicate::Value(f) => f(value),
            Predicate::Author(f) => f(&meta.author),
            Predicate::Timestamp(f) => f(&meta.timestamp),
        }
    }
}

impl std::fmt::Debug for SummaryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SummaryFilter({:?})", self.field())
    }
}

#[derive(Debug, Default)]
pub struct SummaryOptions {
    pub show_metadata: bool,
    pub sort_by: SummaryField,
    pub filters: Vec<SummaryFilter>,
}

/// Break `text` into lines of at most `width` characters
fn wrap(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(text.len());
    for (n, line) in text.lines().enumerate() {
        if n > 0 {
            out.push('\n');
        }
        let chars: Vec<char> = line.chars().collect();
        for (i, chunk) in chars.chunks(width.max(1)).enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.extend(chunk);
        }
    }
    out
}

impl Parameters {
    /// Render the store as a table; a read-only diagnostic
    pub fn summary(&self, options: &SummaryOptions) -> String {
        let mut rows: Vec<(&str, &ParamValue, &ParamMetadata)> = self
            .iter_with_metadata()
            .filter(|(k, v, m)| options.filters.iter().all(|f| f.accepts(k, v, m)))
            .collect();

        match options.sort_by {
            SummaryField::Key => rows.sort_by(|a, b| a.0.cmp(b.0)),
            SummaryField::Value => rows.sort_by(|a, b| total_cmp(a.1, b.1)),
            SummaryField::Author => rows.sort_by(|a, b| a.2.author.cmp(&b.2.author)),
            SummaryField::Timestamp => rows.sort_by(|a, b| a.2.timestamp.cmp(&b.2.timestamp)),
        }

        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        if options.show_metadata {
            table.set_header(vec!["PARAMETER", "VALUE", "ADDED BY", "TIMESTAMP"]);
        } else {
            table.set_header(vec!["PARAMETER", "VALUE"]);
        }
        for (key, value, meta) in rows {
            let value = wrap(&value.to_string(), SUMMARY_WRAP_WIDTH);
            if options.show_metadata {
                table.add_row(vec![
                    key.to_string(),
                    value,
                    meta.author.clone(),
                    meta.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]);
            } else {
                table.add_row(vec![key.to_string(), value]);
            }
        }
        table.to_string()
    }
}
