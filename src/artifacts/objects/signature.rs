//! Author, committer and tagger identities
//!
//! Text form: `Name <email> 1700000000 +0130`

use crate::errors::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeZone};
use std::borrow::Cow;

/// Name and email are kept as stored; old objects may use a legacy encoding
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Signature {
    name: Bytes,
    email: Bytes,
    when: DateTime<FixedOffset>,
    /// Written as `-0000` rather than `+0000`
    negative_utc: bool,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<FixedOffset>) -> Self {
        Signature {
            name: Bytes::from(name.into()),
            email: Bytes::from(email.into()),
            when,
            negative_utc: false,
        }
    }

    /// Signature at `seconds` since the epoch, in a zone `offset_minutes` east of UTC
    pub fn at(
        name: impl Into<String>,
        email: impl Into<String>,
        seconds: i64,
        offset_minutes: i32,
    ) -> Result<Self> {
        Ok(Self::new(name, email, timestamp_at(seconds, offset_minutes)?))
    }

    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, chrono::Local::now().fixed_offset())
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn email(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.email)
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    pub fn email_bytes(&self) -> &[u8] {
        &self.email
    }

    pub fn when(&self) -> DateTime<FixedOffset> {
        self.when
    }

    pub fn seconds(&self) -> i64 {
        self.when.timestamp()
    }

    pub fn offset_minutes(&self) -> i32 {
        self.when.offset().local_minus_utc() / 60
    }

    /// "Name <email@example.com>"
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name(), self.email())
    }

    /// "Mon Jan 1 12:34:56 2024 +0000"
    pub fn readable_timestamp(&self) -> String {
        self.when.format("%a %b %-d %H:%M:%S %Y %z").to_string()
    }

    pub fn parse(value: &str) -> Result<Self> {
        Self::parse_bytes(value.as_bytes())
    }

    /// Parse the stored form, where the name and email may be in any encoding
    pub fn parse_bytes(value: &[u8]) -> Result<Self> {
        let malformed = || Error::malformed("signature", String::from_utf8_lossy(value));

        // split from the right: timezone and timestamp never contain spaces
        let mut parts = value.rsplitn(3, |&byte| byte == b' ');
        let timezone = parts
            .next()
            .and_then(|timezone| std::str::from_utf8(timezone).ok())
            .ok_or_else(malformed)?;
        let seconds = parts
            .next()
            .and_then(|seconds| std::str::from_utf8(seconds).ok())
            .and_then(|seconds| seconds.parse::<i64>().ok())
            .ok_or_else(malformed)?;
        let identity = parts.next().ok_or_else(malformed)?;

        let email_start = identity.iter().position(|&b| b == b'<').ok_or_else(malformed)?;
        let email_end = identity.iter().rposition(|&b| b == b'>').ok_or_else(malformed)?;
        if email_end < email_start {
            return Err(malformed());
        }

        let name = identity[..email_start].trim_ascii_end();
        let email = &identity[email_start + 1..email_end];
        let offset_minutes = parse_timezone(timezone).ok_or_else(malformed)?;

        Ok(Signature {
            name: Bytes::copy_from_slice(name),
            email: Bytes::copy_from_slice(email),
            when: timestamp_at(seconds, offset_minutes).map_err(|_| malformed())?,
            negative_utc: timezone == "-0000",
        })
    }

    /// Append the stored form, `Name <email> <seconds> <+hhmm>`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(format!("{} {}", self.seconds(), self.timezone()).as_bytes());
    }

    fn timezone(&self) -> String {
        let offset = self.offset_minutes();
        let sign = if offset < 0 || (offset == 0 && self.negative_utc) { '-' } else { '+' };
        let offset = offset.abs();

        format!("{sign}{:02}{:02}", offset / 60, offset % 60)
    }
}

fn timestamp_at(seconds: i64, offset_minutes: i32) -> Result<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .ok_or_else(|| Error::invalid("timezone offset", offset_minutes.to_string()))?;

    offset
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| Error::invalid("timestamp", seconds.to_string()))
}

/// Parse `+hhmm` / `-hhmm` into minutes east of UTC
fn parse_timezone(timezone: &str) -> Option<i32> {
    let (sign, digits) = match timezone.as_bytes().first()? {
        b'+' => (1, &timezone[1..]),
        b'-' => (-1, &timezone[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;

    Some(sign * (hours * 60 + minutes))
}

/// Parse a date given through the environment
///
/// Accepts the raw `<seconds> <+hhmm>` form, RFC 2822 and `%Y-%m-%d %H:%M:%S %z`.
pub fn parse_date(date: &str) -> Result<DateTime<FixedOffset>> {
    if let Some((seconds, timezone)) = date.trim().split_once(' ')
        && let (Ok(seconds), Some(offset)) = (seconds.parse::<i64>(), parse_timezone(timezone))
    {
        return timestamp_at(seconds, offset);
    }

    DateTime::parse_from_rfc2822(date)
        .or_else(|_| DateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S %z"))
        .map_err(|_| Error::invalid("date", date))
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name(),
            self.email(),
            self.seconds(),
            self.timezone()
        )
    }
}

impl TryFrom<&str> for Signature {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Signature::parse(value)
    }
}
