//! `kb validate`: check every ticket file against the schema.

use crate::cmd::Context;
use crate::output::render;
use kanban_core::KanbanError;
use kanban_core::store::{FileValidation, TicketStore};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub valid: usize,
    pub invalid: usize,
    pub files: Vec<FileValidation>,
}

impl ValidationReport {
    fn new(files: Vec<FileValidation>) -> Self {
        let valid = files.iter().filter(|f| f.valid).count();
        Self {
            valid,
            invalid: files.len() - valid,
            files,
        }
    }
}

fn write_report(report: &ValidationReport, w: &mut dyn Write) -> io::Result<()> {
    for file in &report.files {
        if file.valid {
            writeln!(w, "ok    {}", file.file)?;
        } else {
            writeln!(w, "FAIL  {}", file.file)?;
            for error in &file.errors {
                writeln!(w, "      {error}")?;
            }
        }
    }
    writeln!(w, "{} valid, {} invalid", report.valid, report.invalid)
}

/// Fails when any file is invalid, after the full report is printed.
pub fn run_validate(ctx: &Context) -> anyhow::Result<()> {
    let report = ValidationReport::new(ctx.store()?.validate_all()?);
    render(ctx.output, &report, write_report)?;
    if report.invalid > 0 {
        return Err(KanbanError::invalid_field(
            "",
            format!("{} ticket file(s) failed validation", report.invalid),
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ValidationReport, write_report};
    use kanban_core::store::FileValidation;

    #[test]
    fn report_counts_and_lists_errors() {
        let report = ValidationReport::new(vec![
            FileValidation {
                file: "T-0001.yml".into(),
                valid: true,
                errors: vec![],
            },
            FileValidation {
                file: "T-0002.yml".into(),
                valid: false,
                errors: vec!["status: unknown value 'DOING'".into()],
            },
        ]);
        assert_eq!((report.valid, report.invalid), (1, 1));

        let mut buf = Vec::new();
        write_report(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("FAIL  T-0002.yml\n      status: unknown value 'DOING'"));
        assert!(text.ends_with("1 valid, 1 invalid\n"));
    }
}
