use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fmt, fmt::Display};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Whole megabytes, rounded down.
#[must_use]
pub fn whole_mb(bytes: u64) -> u64 {
    bytes / BYTES_PER_MB
}

#[must_use]
pub fn fractional_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSample {
    pub original_mb: u64,
    pub compressed_mb: f64,
    pub seconds: f64,
}

/// How far one input file got through the round trip.
///
/// Each state carries exactly the measurements that exist once that stage
/// has succeeded; a failed stage leaves the record in the previous state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FileRecord {
    #[default]
    NotStarted,
    Converted,
    Sized {
        original_mb: u64,
    },
    Compressed(CompressionSample),
    Decompressed(CompressionSample),
    RoundTripped(CompressionSample),
    Compared {
        sample: CompressionSample,
        metrics: Vec<f64>,
        shorthand: String,
    },
}

impl FileRecord {
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        match self {
            Self::NotStarted | Self::Converted => Vec::new(),
            Self::Sized { original_mb } => vec![Field::Int(*original_mb)],
            Self::Compressed(sample) | Self::Decompressed(sample) | Self::RoundTripped(sample) => {
                sample_fields(sample)
            }
            Self::Compared {
                sample,
                metrics,
                shorthand,
            } => {
                let mut fields = sample_fields(sample);
                fields.extend(metrics.iter().copied().map(Field::Float));
                fields.push(Field::Text(shorthand.clone()));
                fields
            }
        }
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        match self {
            Self::NotStarted | Self::Converted => 0,
            Self::Sized { .. } => 1,
            Self::Compressed(_) | Self::Decompressed(_) | Self::RoundTripped(_) => 3,
            Self::Compared { metrics, .. } => 4 + metrics.len(),
        }
    }

    /// Compared with exactly the two metrics the report has columns for.
    #[must_use]
    pub fn full_row(&self) -> Option<(&CompressionSample, f64, f64, &str)> {
        match self {
            Self::Compared {
                sample,
                metrics,
                shorthand,
            } => match metrics.as_slice() {
                [mse, nrmse] => Some((sample, *mse, *nrmse, shorthand.as_str())),
                _ => None,
            },
            _ => None,
        }
    }

    #[must_use]
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Converted => "converted",
            Self::Sized { .. } => "sized",
            Self::Compressed(_) => "compressed",
            Self::Decompressed(_) => "decompressed",
            Self::RoundTripped(_) => "roundtripped",
            Self::Compared { .. } => "compared",
        }
    }
}

fn sample_fields(sample: &CompressionSample) -> Vec<Field> {
    vec![
        Field::Int(sample.original_mb),
        Field::Float(sample.compressed_mb),
        Field::Float(sample.seconds),
    ]
}

/// One reported measurement.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write_float_repr(f, *value),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Twelve significant digits, like `%.12g`, keeping `.0` on plain whole numbers.
fn write_float_repr(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if !value.is_finite() {
        return f.write_str(&non_finite_text(value));
    }
    if value == 0.0 {
        return f.write_str(if value.is_sign_negative() { "-0.0" } else { "0.0" });
    }

    // `{:.11e}` rounds to 12 significant digits, so the exponent already
    // reflects any carry such as 9.99999999999951 -> 10.
    let scientific = format!("{value:.11e}");
    let (mantissa, exponent) = scientific.split_once('e').ok_or(fmt::Error)?;
    let exponent: i32 = exponent.parse().map_err(|_| fmt::Error)?;

    if !(-4..12).contains(&exponent) {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return write!(f, "{mantissa}e{sign}{:02}", exponent.abs());
    }

    let precision = usize::try_from(11 - exponent).map_err(|_| fmt::Error)?;
    let fixed = format!("{value:.precision$}");
    let fixed = trim_fraction(&fixed);
    if fixed.contains('.') {
        f.write_str(fixed)
    } else {
        write!(f, "{fixed}.0")
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Lowercase `nan`, `inf` and `-inf`.
pub(crate) fn non_finite_text(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}

/// Records in input order; a repeated path replaces its earlier record in place.
#[derive(Debug, Clone, Default)]
pub struct RunResults {
    entries: Vec<(PathBuf, FileRecord)>,
    index: HashMap<PathBuf, usize>,
}

impl RunResults {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathBuf, record: FileRecord) {
        match self.index.get(&path) {
            Some(&position) => self.entries[position].1 = record,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, record));
            }
        }
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.index
            .get(path)
            .map(|&position| &self.entries[position].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &FileRecord)> {
        self.entries
            .iter()
            .map(|(path, record)| (path.as_path(), record))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, record)| matches!(record, FileRecord::Compared { .. }))
            .count()
    }
}
