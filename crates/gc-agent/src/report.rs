// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Column names of the report table, in order.
pub const REPORT_HEADER: [&str; 5] = [
    "index",
    "meanActionProbability",
    "meanTimeInterval",
    "meanTimeRatio",
    "meanAbsoluteTdError",
];

/// Periodic summary of the controller's recent behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub index: u64,
    pub mean_action_probability: f32,
    pub mean_time_interval: f32,
    pub mean_time_ratio: f32,
    pub mean_absolute_td_error: f32,
}

impl ReportRow {
    fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.index,
            self.mean_action_probability,
            self.mean_time_interval,
            self.mean_time_ratio,
            self.mean_absolute_td_error
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
}

/// Sink for report rows.
pub trait Reporter {
    fn write_row(&mut self, row: &ReportRow) -> Result<(), ReportError>;
}

impl<T: Reporter + ?Sized> Reporter for Box<T> {
    fn write_row(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        (**self).write_row(row)
    }
}

/// Comma-separated report file. Rows are kept in memory and the whole file is
/// rewritten on every write.
#[derive(Clone, Debug)]
pub struct ReportTable {
    path: PathBuf,
    rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Rewrites the file with the header and every row recorded so far.
    pub fn flush(&self) -> Result<(), ReportError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        writeln!(writer, "{}", REPORT_HEADER.join(","))?;
        for row in &self.rows {
            writeln!(writer, "{}", row.to_csv())?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Reporter for ReportTable {
    fn write_row(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        self.rows.push(*row);
        self.flush()
    }
}

/// Reporter that only keeps rows in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryReporter {
    rows: Vec<ReportRow>,
}

impl MemoryReporter {
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }
}

impl Reporter for MemoryReporter {
    fn write_row(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        self.rows.push(*row);
        Ok(())
    }
}
