//! Unit-suffixed duration strings (`"30s"`, `"1m30s"`, `"250ms"`).
//!
//! Durations cross the API and storage boundary as strings; internally they
//! are always [`Duration`]. A bare integer is read as seconds.

use std::time::Duration;

/// Parse a duration string such as `"30s"`, `"5m"`, `"1h30m"`, `"750ms"` or `"45"`.
pub fn parse(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("Invalid duration '{input}': expected a number"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("Invalid duration '{input}': number out of range"))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            "" => return Err(format!("Invalid duration '{input}': missing unit")),
            unit => return Err(format!("Invalid duration '{input}': unknown unit '{unit}'")),
        };
        rest = &rest[unit_len..];
        total = total.saturating_add(part);
    }

    Ok(total)
}

/// Format a duration with the largest whole units, e.g. `90s` becomes `"1m30s"`.
pub fn format(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs == 0 {
        return if millis == 0 { "0s".to_string() } else { format!("{millis}ms") };
    }

    let mut out = String::new();
    let hours = secs / 3600;
    secs %= 3600;
    let minutes = secs / 60;
    secs %= 60;
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if secs > 0 {
        out.push_str(&format!("{secs}s"));
    }
    if millis > 0 {
        out.push_str(&format!("{millis}ms"));
    }
    out
}

/// Serde adapter for `Duration` fields stored as strings.
pub mod serde_str {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = DurationRepr::deserialize(deserializer)?;
        raw.into_duration().map_err(de::Error::custom)
    }

    /// Accept both `"30s"` and a plain number of seconds.
    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(super) enum DurationRepr {
        Text(String),
        Seconds(u64),
    }

    impl DurationRepr {
        pub(super) fn into_duration(self) -> Result<Duration, String> {
            match self {
                DurationRepr::Text(s) => super::parse(&s),
                DurationRepr::Seconds(secs) => Ok(Duration::from_secs(secs)),
            }
        }
    }
}

/// Serde adapter for `Option<Duration>` fields stored as strings.
pub mod serde_str_opt {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    use super::serde_str::DurationRepr;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&super::format(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<DurationRepr>::deserialize(deserializer)?
            .map(|raw| raw.into_duration().map_err(de::Error::custom))
            .transpose()
    }
}

/// Serde adapter exposing `Option<Duration>` as integer milliseconds.
pub mod millis_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
