//! CLI output formatting.
//!
//! Each report has a `format_*` function returning `Vec<String>` for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure.
//!
//! # Output Format
//!
//! ## Run
//!
//! ```text
//! photos/cat.jpg → photos/batch_cat.png (50x100 L, PNG)
//!     001 rotate: ok
//!         original_width: 100
//!         rotated_width: 50
//!     002 sharpen: skipped
//!         Error: Unknown operation: sharpen
//!     003 grayscale: ok
//!         original_mode: RGB
//!     URL: file:///srv/photos/batch_cat.png?expires_in=3600 (expires in 3600s)
//!     Cold start
//!
//! Processed 1 job, 0 failed
//! ```
//!
//! ## Details
//!
//! ```text
//! photos/cat.jpg
//!     width: 640
//!     height: 480
//!     mode: RGB
//! ```

use crate::job::JobReport;
use crate::ops::Attributes;
use crate::pipeline::{StepResult, StepStatus};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_attributes(attributes: &Attributes, depth: usize) -> Vec<String> {
    attributes
        .iter()
        .map(|(key, value)| format!("{}{key}: {value}", indent(depth)))
        .collect()
}

fn format_step(result: &StepResult) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{} {}: {}",
        indent(1),
        format_index(result.index + 1),
        result.operation,
        result.status
    )];
    match (&result.error, result.status) {
        (Some(error), _) => lines.push(format!("{}Error: {error}", indent(2))),
        (None, StepStatus::Ok) => lines.extend(format_attributes(&result.attributes, 2)),
        (None, _) => {}
    }
    lines
}

/// Format a finished job.
pub fn format_job_report(source: &str, report: &JobReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{source} → {} ({}x{} {}, {})",
        report.destination,
        report.final_width,
        report.final_height,
        report.final_mode,
        report.output_format
    )];
    lines.extend(report.operation_outputs.iter().flat_map(format_step));
    lines.push(format!(
        "{}URL: {} (expires in {}s)",
        indent(1),
        report.image_url,
        report.image_url_expires_in
    ));
    if report.cold_start {
        lines.push(format!("{}Cold start", indent(1)));
    }
    lines
}

/// Format a job that stopped before producing a report.
pub fn format_job_error(label: &str, error: &dyn std::error::Error) -> Vec<String> {
    vec![format!("{label} ✗"), format!("{}Error: {error}", indent(1))]
}

/// Format the closing summary line of a batch run.
pub fn format_batch_summary(succeeded: usize, failed: usize) -> Vec<String> {
    let total = succeeded + failed;
    let noun = if total == 1 { "job" } else { "jobs" };
    vec![String::new(), format!("Processed {total} {noun}, {failed} failed")]
}

/// Format the attributes of a single inspected image.
pub fn format_details(label: &str, attributes: &Attributes) -> Vec<String> {
    let mut lines = vec![label.to_string()];
    lines.extend(format_attributes(attributes, 1));
    lines
}

/// Format the result of an ad-hoc `apply` run.
pub fn format_apply(input: &str, output: &str, results: &[StepResult]) -> Vec<String> {
    let mut lines = vec![format!("{input} → {output}")];
    lines.extend(results.iter().flat_map(format_step));
    lines
}

pub fn print_job_report(source: &str, report: &JobReport) {
    for line in format_job_report(source, report) {
        println!("{}", line);
    }
}

pub fn print_job_error(label: &str, error: &dyn std::error::Error) {
    for line in format_job_error(label, error) {
        println!("{}", line);
    }
}

pub fn print_batch_summary(succeeded: usize, failed: usize) {
    for line in format_batch_summary(succeeded, failed) {
        println!("{}", line);
    }
}

pub fn print_details(label: &str, attributes: &Attributes) {
    for line in format_details(label, attributes) {
        println!("{}", line);
    }
}

pub fn print_apply(input: &str, output: &str, results: &[StepResult]) {
    for line in format_apply(input, output, results) {
        println!("{}", line);
    }
}
