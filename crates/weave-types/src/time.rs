//! Dense ordering keys for timeline entries.
//!
//! Backend ids are `@da` values: 128-bit integers counting 2^-64 seconds from
//! the Urbit epoch. Two coarse server clocks can hand out the same value, and a
//! locally-sent entry sometimes needs a key strictly between two neighbours, so
//! a `Timestamp` carries an optional fractional tail of base-2^32 digits. The
//! tail never ends in a zero digit, which makes the derived lexicographic order
//! equal to numeric order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `@da` value of 1970-01-01T00:00:00Z.
pub const DA_UNIX_EPOCH: u128 = 170_141_184_475_152_167_957_503_069_145_530_368_000;

/// One second in `@da` units.
pub const DA_SECOND: u128 = 1 << 64;

/// Exclusive upper bound of a single fractional digit.
const DIGIT_SPAN: u64 = 1 << 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampParseError {
    #[error("timestamp is empty")]
    Empty,
    #[error("invalid timestamp digits: {0}")]
    InvalidWhole(String),
    #[error("invalid timestamp fraction: {0}")]
    InvalidFraction(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    whole: u128,
    frac: Vec<u32>,
}

impl Timestamp {
    pub const fn new(whole: u128) -> Self {
        Self {
            whole,
            frac: Vec::new(),
        }
    }

    /// The current instant at millisecond resolution.
    pub fn now() -> Self {
        Self::from_unix_millis(Utc::now().timestamp_millis())
    }

    /// Convert unix milliseconds to `@da`. Instants before 1970 clamp to the epoch.
    pub fn from_unix_millis(ms: i64) -> Self {
        let ms = u128::try_from(ms).unwrap_or(0);
        Self::new(DA_UNIX_EPOCH + ms * DA_SECOND / 1000)
    }

    pub fn to_unix_millis(&self) -> i64 {
        let since = self.whole.saturating_sub(DA_UNIX_EPOCH);
        // Nearest millisecond; `from_unix_millis` truncates.
        let frac = ((since % DA_SECOND) * 1000 + DA_SECOND / 2) / DA_SECOND;
        let ms = since / DA_SECOND * 1000 + frac;
        i64::try_from(ms).unwrap_or(i64::MAX)
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.to_unix_millis())
    }

    pub fn whole(&self) -> u128 {
        self.whole
    }

    /// True when this key came straight from the backend (no subdivision).
    pub fn is_whole(&self) -> bool {
        self.frac.is_empty()
    }

    /// A key strictly greater than `self`.
    pub fn after(&self) -> Self {
        match self.whole.checked_add(1) {
            Some(whole) => Self::new(whole),
            None => Self {
                whole: self.whole,
                frac: midpoint(&self.frac, None),
            },
        }
    }

    /// A key strictly between `self` and `other`, or `None` if they are equal.
    pub fn between(&self, other: &Self) -> Option<Self> {
        let (lo, hi) = match self.cmp(other) {
            std::cmp::Ordering::Equal => return None,
            std::cmp::Ordering::Less => (self, other),
            std::cmp::Ordering::Greater => (other, self),
        };

        let gap = hi.whole - lo.whole;
        let key = if gap > 1 {
            Self::new(lo.whole + gap / 2)
        } else if gap == 1 {
            Self {
                whole: lo.whole,
                frac: midpoint(&lo.frac, None),
            }
        } else {
            Self {
                whole: lo.whole,
                frac: midpoint(&lo.frac, Some(&hi.frac)),
            }
        };
        Some(key)
    }

    /// Dotted `@ud` rendering of the whole part, as used in scry paths.
    pub fn to_ud(&self) -> String {
        let digits = self.whole.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        let lead = digits.len() % 3;
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (i + 3 - lead) % 3 == 0 {
                out.push('.');
            }
            out.push(ch);
        }
        out
    }
}

/// Digits strictly between `lo` and `hi` (or above `lo` when `hi` is `None`).
/// Callers guarantee `lo < hi`.
fn midpoint(lo: &[u32], hi: Option<&[u32]>) -> Vec<u32> {
    let mut out = Vec::with_capacity(lo.len() + 1);
    let mut hi = hi;
    let mut i = 0;
    loop {
        let l = u64::from(lo.get(i).copied().unwrap_or(0));
        let h = match hi {
            Some(digits) => u64::from(digits.get(i).copied().unwrap_or(0)),
            None => DIGIT_SPAN,
        };
        if h > l + 1 {
            out.push((l + (h - l) / 2) as u32);
            return out;
        }
        out.push(l as u32);
        if h == l + 1 {
            // Any continuation of this prefix is already below `hi`.
            hi = None;
        }
        i += 1;
    }
}

impl From<u128> for Timestamp {
    fn from(whole: u128) -> Self {
        Self::new(whole)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.whole)?;
        if let Some((first, rest)) = self.frac.split_first() {
            write!(f, "+{}", first)?;
            for digit in rest {
                write!(f, ".{}", digit)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TimestampParseError::Empty);
        }

        let (whole_part, frac_part) = match s.split_once('+') {
            Some((w, f)) => (w, Some(f)),
            None => (s, None),
        };

        let digits: String = whole_part.chars().filter(|c| *c != '.').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(TimestampParseError::InvalidWhole(whole_part.to_string()));
        }
        let whole = digits
            .parse::<u128>()
            .map_err(|_| TimestampParseError::InvalidWhole(whole_part.to_string()))?;

        let mut frac = Vec::new();
        if let Some(part) = frac_part {
            for digit in part.split('.') {
                let d = digit
                    .parse::<u32>()
                    .map_err(|_| TimestampParseError::InvalidFraction(part.to_string()))?;
                frac.push(d);
            }
            while frac.last() == Some(&0) {
                frac.pop();
            }
        }

        Ok(Self { whole, frac })
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl Visitor<'_> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal or @ud timestamp")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Timestamp, E> {
                Ok(Timestamp::new(u128::from(v)))
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}
