use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use tidemark_common::{Error, Result};

/// Layout of a canonical version token (`YYYYMMDDHHmmss`, UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Width in characters of a canonical version token.
pub const TIMESTAMP_WIDTH: usize = 14;

/// Whether a migration introduces a change or undoes its forward sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub const FORWARD_ALIASES: &'static [&'static str] = &["forward", "migrate", "up"];
    pub const REVERSE_ALIASES: &'static [&'static str] = &["reverse", "rollback", "down"];

    /// Canonical lowercase token used in encoded filenames.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }

    /// Resolve a direction token or one of its aliases, ignoring ASCII case.
    pub fn from_token(token: &str) -> Option<Self> {
        let lower = token.to_ascii_lowercase();
        if Self::FORWARD_ALIASES.contains(&lower.as_str()) {
            Some(Direction::Forward)
        } else if Self::REVERSE_ALIASES.contains(&lower.as_str()) {
            Some(Direction::Reverse)
        } else {
            None
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Direction::from_token(s).ok_or_else(|| {
            format!(
                "unknown direction {s:?}, expected one of {:?} or {:?}",
                Self::FORWARD_ALIASES,
                Self::REVERSE_ALIASES
            )
        })
    }
}

/// Position of a migration in history.
///
/// Stored as the canonical fixed-width timestamp token. Versions order by that
/// token, which for fixed-width digits is also chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    token: String,
    unix: i64,
}

impl Version {
    /// Parse a version as it appears inside a filename or the bookkeeping
    /// table: either exactly [`TIMESTAMP_WIDTH`] digits forming a valid
    /// timestamp, or a shorter unix-epoch integer that is normalized to one.
    ///
    /// Digit strings longer than the canonical width are rejected rather than
    /// truncated.
    pub fn parse(token: &str) -> Result<Self> {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidVersion(token.to_string()));
        }

        match token.len() {
            TIMESTAMP_WIDTH => Self::from_timestamp(token),
            n if n < TIMESTAMP_WIDTH => {
                let secs: i64 = token
                    .parse()
                    .map_err(|_| Error::InvalidVersion(token.to_string()))?;
                Self::from_unix(secs)
            }
            _ => Err(Error::InvalidVersion(token.to_string())),
        }
    }

    /// Normalize a caller-supplied timestamp for encoding. Input longer than
    /// the canonical width is truncated to it (so `20191118121314.123` or a
    /// nanosecond-suffixed stamp is accepted); shorter input is rejected.
    pub fn normalize(input: &str) -> Result<Self> {
        let head = input
            .get(..TIMESTAMP_WIDTH)
            .ok_or_else(|| Error::InvalidVersion(input.to_string()))?;
        if !head.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidVersion(input.to_string()));
        }
        Self::from_timestamp(head).map_err(|_| Error::InvalidVersion(input.to_string()))
    }

    pub fn from_unix(secs: i64) -> Result<Self> {
        let dt = DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| Error::InvalidVersion(secs.to_string()))?;
        let token = dt.format(TIMESTAMP_FORMAT).to_string();
        // Years past 9999 or before 1000 do not fit the fixed width.
        if token.len() != TIMESTAMP_WIDTH {
            return Err(Error::InvalidVersion(secs.to_string()));
        }
        Ok(Self { token, unix: secs })
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Result<Self> {
        Self::from_unix(dt.timestamp())
    }

    fn from_timestamp(token: &str) -> Result<Self> {
        let naive = NaiveDateTime::parse_from_str(token, TIMESTAMP_FORMAT)
            .map_err(|_| Error::InvalidVersion(token.to_string()))?;
        Ok(Self {
            token: token.to_string(),
            unix: naive.and_utc().timestamp(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Seconds since the unix epoch for this version's timestamp.
    pub fn unix(&self) -> i64 {
        self.unix
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.token)
    }
}

/// Identity of one migration file. Built by decoding a filename and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Migration {
    direction: Direction,
    version: Version,
    label: String,
}

impl Migration {
    pub fn new(direction: Direction, version: Version, label: impl Into<String>) -> Self {
        Self {
            direction,
            version,
            label: label.into(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Canonical filename for this migration.
    pub fn filename(&self) -> String {
        crate::filename::render(self.direction.as_str(), &self.version, &self.label)
    }

    /// The migration with the same version and label in the other direction.
    pub fn sibling(&self) -> Migration {
        Migration {
            direction: self.direction.opposite(),
            version: self.version.clone(),
            label: self.label.clone(),
        }
    }

    /// Forward/reverse siblings share version and label.
    pub fn is_paired_with(&self, other: &Migration) -> bool {
        self.direction != other.direction
            && self.version == other.version
            && self.label == other.label
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.direction, self.version, self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_aliases_resolve_case_insensitively() {
        for alias in ["forward", "migrate", "up", "UP", "Migrate"] {
            assert_eq!(Direction::from_token(alias), Some(Direction::Forward));
        }
        for alias in ["reverse", "rollback", "down", "DOWN"] {
            assert_eq!(Direction::from_token(alias), Some(Direction::Reverse));
        }
        assert_eq!(Direction::from_token("sideways"), None);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn canonical_timestamp_parses() {
        let v = Version::parse("20191118121314").unwrap();
        assert_eq!(v.as_str(), "20191118121314");
        assert_eq!(v.unix(), 1_574_079_194);
    }

    #[test]
    fn unix_epoch_normalizes_to_timestamp() {
        let epoch = Version::parse("1574079194").unwrap();
        let stamp = Version::parse("20191118121314").unwrap();
        assert_eq!(epoch, stamp);
        assert_eq!(Version::parse("100").unwrap().as_str(), "19700101000140");
    }

    #[test]
    fn parse_rejects_overlong_and_malformed_tokens() {
        assert!(matches!(
            Version::parse("201911181213149"),
            Err(Error::InvalidVersion(_))
        ));
        assert!(Version::parse("").is_err());
        assert!(Version::parse("2019-11-18").is_err());
        assert!(Version::parse("20191399121314").is_err());
        assert!(Version::parse("-5").is_err());
    }

    #[test]
    fn normalize_truncates_long_input_and_rejects_short() {
        let v = Version::normalize("20191118121314123456").unwrap();
        assert_eq!(v.as_str(), "20191118121314");
        assert!(matches!(
            Version::normalize("2019111812"),
            Err(Error::InvalidVersion(_))
        ));
        assert!(Version::normalize("2019111812131x").is_err());
    }

    #[test]
    fn versions_order_chronologically() {
        let a = Version::parse("100").unwrap();
        let b = Version::parse("200").unwrap();
        let c = Version::parse("20191118121314").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn siblings_pair_by_version_and_label() {
        let v = Version::parse("20191118121314").unwrap();
        let fwd = Migration::new(Direction::Forward, v.clone(), "add_users");
        let rev = fwd.sibling();
        assert_eq!(rev.direction(), Direction::Reverse);
        assert!(fwd.is_paired_with(&rev));
        assert!(!fwd.is_paired_with(&fwd));

        let other = Migration::new(Direction::Reverse, v, "drop_users");
        assert!(!fwd.is_paired_with(&other));
    }
}
