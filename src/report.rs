use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::Path;

use crate::record::{FileRecord, RunResults, non_finite_text};

pub const COLUMNS: [&str; 7] = [
    "fname",
    "size_MB",
    "compressed_MB",
    "time_s",
    "mse",
    "nrmse",
    "id",
];

/// Six decimals like `%f`, with lowercase non-finite values.
fn fixed(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.6}")
    } else {
        non_finite_text(value)
    }
}

/// Text of one report: a header line plus one line per non-empty record.
#[derive(Debug, Clone)]
pub struct ReportTable {
    text: String,
}

impl Default for ReportTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportTable {
    #[must_use]
    pub fn new() -> Self {
        let [fname, size, compressed, time, mse, nrmse, id] = COLUMNS;
        Self {
            text: format!(
                "{fname:>30} {size:>20} {compressed:>20} {time:>20} {mse:>20} {nrmse:>20} {id:>20}\n"
            ),
        }
    }

    pub fn from_results(results: &RunResults) -> Result<Self, fmt::Error> {
        let mut table = Self::new();
        for (path, record) in results.iter() {
            table.push(path, record)?;
        }
        Ok(table)
    }

    /// Records without any field add nothing.
    pub fn push(&mut self, path: &Path, record: &FileRecord) -> fmt::Result {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        if let Some((sample, mse, nrmse, id)) = record.full_row() {
            return writeln!(
                self.text,
                "{name:>30} {:>20} {:>20} {:>20} {:>20} {:>20} {id:>20}",
                sample.original_mb,
                fixed(sample.compressed_mb),
                fixed(sample.seconds),
                fixed(mse),
                fixed(nrmse),
            );
        }

        let fields = record.fields();
        if fields.is_empty() {
            return Ok(());
        }
        write!(self.text, "{name}")?;
        for field in &fields {
            write!(self.text, "\t{field}")?;
        }
        writeln!(self.text)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of lines including the header.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// Append to `path`, creating it if needed; earlier reports are kept.
    pub fn append_to(&self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.text.as_bytes())?;
        file.flush()
    }
}
