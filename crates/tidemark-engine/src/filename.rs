//! Filename codec: `{direction}-{version}-{label}.sql`.

use std::path::Path;

use tidemark_common::{Error, Result};

use crate::migration::{Direction, Migration, Version};

pub const DELIMITER: char = '-';
pub const EXTENSION: &str = "sql";

/// Encode a migration identity as a canonical filename. `version` goes
/// through [`Version::normalize`], and the direction is always written with
/// its canonical token.
pub fn encode(version: &str, direction: Direction, label: &str) -> Result<String> {
    encode_with_token(version, direction.as_str(), label)
}

/// Like [`encode`] but writes `token` as the direction, which must be one of
/// the recognized aliases so the result still decodes.
pub fn encode_with_token(version: &str, token: &str, label: &str) -> Result<String> {
    if Direction::from_token(token).is_none() {
        return Err(Error::invalid_filename(
            token,
            "direction token is not a known alias",
        ));
    }
    let version = Version::normalize(version)?;
    validate_label(label)?;
    Ok(render(token, &version, label))
}

pub(crate) fn render(token: &str, version: &Version, label: &str) -> String {
    format!("{token}{DELIMITER}{version}{DELIMITER}{label}.{EXTENSION}")
}

/// Decode a filename (or a path, whose final component is used) into a
/// [`Migration`]. The label keeps any delimiters it contains.
pub fn decode(filename: &str) -> Result<Migration> {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::invalid_filename(filename, "not a file name"))?;
    let stem = strip_extension(base).ok_or_else(|| {
        Error::invalid_filename(filename, format!("expected a .{EXTENSION} file"))
    })?;

    let mut parts = stem.splitn(3, DELIMITER);
    let (Some(direction), Some(version), Some(label)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::invalid_filename(
            filename,
            "expected {direction}-{version}-{label}",
        ));
    };

    let direction = Direction::from_token(direction).ok_or_else(|| {
        Error::invalid_filename(filename, format!("unknown direction {direction:?}"))
    })?;
    let version = Version::parse(version)
        .map_err(|_| Error::invalid_filename(filename, format!("bad version {version:?}")))?;
    if label.is_empty() {
        return Err(Error::invalid_filename(filename, "empty label"));
    }

    Ok(Migration::new(direction, version, label))
}

fn strip_extension(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .filter(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(EXTENSION))
        .map(|(stem, _)| stem)
}

fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::invalid_filename(label, "label must not be empty"));
    }
    if label.contains(['/', '\\']) {
        return Err(Error::invalid_filename(
            label,
            "label must not contain path separators",
        ));
    }
    // A label such as `up-...` would read like a second direction prefix.
    if let Some((head, _)) = label.split_once(DELIMITER)
        && Direction::from_token(head).is_some()
    {
        return Err(Error::invalid_filename(
            label,
            "label must not start with a direction token",
        ));
    }
    Ok(())
}
