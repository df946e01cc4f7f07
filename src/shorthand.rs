/// Tag used when no codec arguments are given.
pub const DEFAULT_SHORTHAND: &str = "_drt";

/// Derive the filename tag for a codec-argument string.
///
/// `--lossless --preset ultrafast` becomes `_lpurt`: the first character of
/// every whitespace-separated token with its leading and trailing dashes
/// removed, framed by `_` and `rt`.
#[must_use]
pub fn derive_shorthand(codec_args: &str) -> String {
    if codec_args.is_empty() {
        return DEFAULT_SHORTHAND.to_string();
    }

    let mut tag = String::from("_");
    tag.extend(
        codec_args
            .split_whitespace()
            .filter_map(|token| token.trim_matches('-').chars().next()),
    );
    tag.push_str("rt");
    tag
}

/// An explicit, non-empty override wins verbatim over the derived tag.
#[must_use]
pub fn resolve_shorthand(override_tag: Option<&str>, codec_args: &str) -> String {
    match override_tag {
        Some(tag) if !tag.is_empty() => tag.to_string(),
        _ => derive_shorthand(codec_args),
    }
}
