//! Score tables printed at the end of a grading run.

use crate::grader::score::{Category, Score};
use std::io::{self, Write};

const MIN_NAME_WIDTH: usize = 5;

/// Writes one table per non-empty category, in [`Category::ALL`] order.
///
/// A total row is added only when more than one group contributed to a category.
pub fn write_report(scores: &[Score], out: &mut dyn Write) -> io::Result<()> {
    let width = scores
        .iter()
        .map(|s| s.group.chars().count())
        .max()
        .unwrap_or(0)
        .max(MIN_NAME_WIDTH);

    for category in Category::ALL {
        let rows: Vec<&Score> = scores.iter().filter(|s| s.category == category).collect();
        if rows.is_empty() {
            continue;
        }

        writeln!(out)?;
        writeln!(out, "{category}")?;
        writeln!(out, "{:width$} Score   Max", " ")?;
        for score in &rows {
            writeln!(out, "{:width$} {:5.1} {:5.1}", score.group, score.given, score.points)?;
        }

        if rows.len() > 1 {
            let given: f64 = rows.iter().map(|s| s.given).sum();
            let points: f64 = rows.iter().map(|s| s.points).sum();
            writeln!(out, "{} ----- -----", "-".repeat(width))?;
            writeln!(out, "{:width$} {given:5.1} {points:5.1}", "Total")?;
        }
    }
    Ok(())
}
