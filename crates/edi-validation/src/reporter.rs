//! Validation reporter

use crate::{Error, Result};
use edi_ir::{DocumentError, DocumentErrors, Offender, Severity};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Output format of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
        })
    }
}

/// Record counts per severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub structural: usize,
    pub integrity: usize,
    pub requirement: usize,
    /// Records dropped by the error limit
    pub dropped: usize,
}

impl Summary {
    #[must_use]
    pub fn of(errors: &DocumentErrors) -> Self {
        Self {
            total: errors.len(),
            structural: errors.count(Severity::Structural),
            integrity: errors.count(Severity::Integrity),
            requirement: errors.count(Severity::Requirement),
            dropped: errors.dropped(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s): {} structural, {} integrity, {} requirement",
            self.total, self.structural, self.integrity, self.requirement
        )?;
        if self.dropped > 0 {
            write!(f, " ({} more dropped)", self.dropped)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Report<'a> {
    summary: Summary,
    errors: &'a [DocumentError],
}

/// Renders error records for people and for tools
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationReporter;

impl ValidationReporter {
    /// Create a new validation reporter
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn summary(&self, errors: &DocumentErrors) -> Summary {
        Summary::of(errors)
    }

    /// Render in `format`
    ///
    /// # Errors
    ///
    /// Fails only when JSON serialization fails.
    pub fn render(&self, format: ReportFormat, errors: &DocumentErrors) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(self.text(errors)),
            ReportFormat::Json => self.json(errors),
        }
    }

    /// Plain text table followed by the summary line
    #[must_use]
    pub fn text(&self, errors: &DocumentErrors) -> String {
        let header = ["SEVERITY", "CODE", "SEG", "ID", "AT", "MESSAGE"];
        let rows: Vec<[String; 6]> = errors
            .iter()
            .map(|e| {
                [
                    e.severity.to_string(),
                    e.code.value().to_string(),
                    e.position.to_string(),
                    e.id.clone(),
                    location(e.offender.as_ref()),
                    e.message.clone(),
                ]
            })
            .collect();

        let mut widths = header.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        if !rows.is_empty() {
            push_row(&mut out, &header.map(String::from), &widths);
            for row in &rows {
                push_row(&mut out, row, &widths);
            }
        }
        let _ = writeln!(out, "{}", Summary::of(errors));
        out
    }

    /// Pretty JSON object with `summary` and `errors`
    ///
    /// # Errors
    ///
    /// Fails when serialization fails.
    pub fn json(&self, errors: &DocumentErrors) -> Result<String> {
        let report = Report {
            summary: Summary::of(errors),
            errors: errors.as_slice(),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

fn push_row(out: &mut String, row: &[String; 6], widths: &[usize; 6]) {
    let last = row.len() - 1;
    for (i, (cell, width)) in row.iter().zip(widths).enumerate() {
        if i == last {
            out.push_str(cell);
        } else {
            let _ = write!(out, "{cell:<width$}  ");
        }
    }
    out.push('\n');
}

fn location(offender: Option<&Offender>) -> String {
    match offender {
        None => String::new(),
        Some(Offender::Container(id)) => id.to_string(),
        Some(Offender::Token { offset }) => format!("@{offset}"),
        Some(Offender::Element {
            field,
            component,
            occurrence,
            ..
        }) => {
            let mut at = format!("{field:02}");
            if let Some(component) = component {
                let _ = write!(at, ".{component}");
            }
            if *occurrence > 0 {
                let _ = write!(at, "[{occurrence}]");
            }
            at
        }
    }
}
