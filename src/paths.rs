use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const INTERMEDIATE_EXTENSION: &str = ".y4m";
pub const LOOKUP_EXTENSION: &str = ".lut";
pub const BITSTREAM_EXTENSION: &str = ".hevc";
pub const IMAGE_EXTENSION: &str = ".tif";

/// Files derived from one input image for one shorthand tag.
///
/// Untagged files (`<base>.y4m`, `<base>.lut`) are shared between runs with
/// different codec arguments; everything the compressor or later stages
/// produce carries the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundtripPaths {
    pub input: PathBuf,
    pub intermediate: PathBuf,
    pub lookup: PathBuf,
    pub tagged_lookup: PathBuf,
    pub bitstream: PathBuf,
    pub roundtrip_intermediate: PathBuf,
    pub roundtrip_image: PathBuf,
}

impl RoundtripPaths {
    #[must_use]
    pub fn new(input: &Path, shorthand: &str) -> Self {
        let base = strip_extension(input);
        Self {
            input: input.to_path_buf(),
            intermediate: with_suffix(&base, INTERMEDIATE_EXTENSION),
            lookup: with_suffix(&base, LOOKUP_EXTENSION),
            tagged_lookup: with_suffix(&base, &format!("{shorthand}{LOOKUP_EXTENSION}")),
            bitstream: with_suffix(&base, &format!("{shorthand}{BITSTREAM_EXTENSION}")),
            roundtrip_intermediate: with_suffix(
                &base,
                &format!("{shorthand}{INTERMEDIATE_EXTENSION}"),
            ),
            roundtrip_image: with_suffix(&base, &format!("{shorthand}{IMAGE_EXTENSION}")),
        }
    }
}

/// `dir/name.ext` -> `dir/name`; leading-dot names such as `.hidden` are kept whole.
#[must_use]
pub fn strip_extension(path: &Path) -> PathBuf {
    match (path.extension(), path.file_stem()) {
        (Some(_), Some(stem)) => path.with_file_name(stem),
        _ => path.to_path_buf(),
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = base.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}
