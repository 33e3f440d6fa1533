//! Output sinks. A reporter receives ordered `(name, value, unit)` rows per
//! named group, e.g. one group per batch work item.

use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

impl ReportRow {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    #[error("could not write group `{group}`: {reason}")]
    Write { group: String, reason: String },
}

impl ReportError {
    pub fn write(group: &str, reason: impl ToString) -> Self {
        ReportError::Write {
            group: group.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub trait Reporter {
    /// Writes `rows` as the content of `group`. Writing a group again
    /// replaces its earlier content where the sink supports it.
    fn write_group(&mut self, group: &str, rows: &[ReportRow]) -> Result<(), ReportError>;
}

/// Keeps groups in memory, in first-write order.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    groups: Vec<(String, Vec<ReportRow>)>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, name: &str) -> Option<&[ReportRow]> {
        self.groups
            .iter()
            .find(|(g, _)| g == name)
            .map(|(_, rows)| rows.as_slice())
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|(g, _)| g.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Reporter for MemoryReporter {
    fn write_group(&mut self, group: &str, rows: &[ReportRow]) -> Result<(), ReportError> {
        // get-or-create: an existing group is overwritten in place
        match self.groups.iter_mut().find(|(g, _)| g == group) {
            Some((_, existing)) => *existing = rows.to_vec(),
            None => self.groups.push((group.to_string(), rows.to_vec())),
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ToonGroup<'r> {
    group: &'r str,
    rows: &'r [ReportRow],
}

/// Appends each group to `out` as a TOON document with a tabular
/// `rows[N]{name,value,unit}` block.
pub struct ToonReporter<W: Write> {
    out: W,
}

impl<W: Write> ToonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ToonReporter<W> {
    fn write_group(&mut self, group: &str, rows: &[ReportRow]) -> Result<(), ReportError> {
        let doc = toon_format::encode_default(&ToonGroup { group, rows })
            .map_err(|e| ReportError::write(group, e))?;
        writeln!(self.out, "{doc}").map_err(|e| ReportError::write(group, e))?;
        self.out.flush().map_err(|e| ReportError::write(group, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_rows() -> Vec<ReportRow> {
        vec![
            ReportRow::new("Climate change", 1.25, "kg CO2 eq"),
            ReportRow::new("Acidification", 0.5, "mol H+ eq"),
        ]
    }

    #[test]
    fn memory_reporter_overwrites_existing_group() {
        let mut r = MemoryReporter::new();
        r.write_group("kettle", &mk_rows()).unwrap();
        r.write_group("grid", &mk_rows()[..1]).unwrap();
        r.write_group("kettle", &mk_rows()[1..]).unwrap();

        assert_eq!(r.group_names(), vec!["kettle", "grid"]);
        assert_eq!(r.group("kettle").unwrap(), &mk_rows()[1..]);
        assert!(r.group("coal").is_none());
    }

    #[test]
    fn toon_reporter_writes_one_document_per_group() {
        let mut r = ToonReporter::new(Vec::new());
        r.write_group("kettle", &mk_rows()).unwrap();

        let text = String::from_utf8(r.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        assert_eq!(lines[0], "group: kettle");
        assert_eq!(lines[1], "rows[2]{name,value,unit}:");
        assert_eq!(lines[2], "Climate change,1.25,kg CO2 eq");
        assert_eq!(lines[3], "Acidification,0.5,mol H+ eq");
        assert_eq!(lines.len(), 4);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn toon_reporter_surfaces_io_failures_as_write_errors() {
        let mut r = ToonReporter::new(BrokenPipe);
        let err = r.write_group("kettle", &mk_rows()).unwrap_err();
        match err {
            ReportError::Write { group, .. } => assert_eq!(group, "kettle"),
        }
    }
}
