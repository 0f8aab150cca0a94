use serde::Deserialize;
use serde::{de::Error, Deserializer};

/// A duration written as `<n>s`, `<n>m`, `<n>h` or `<n>d`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Seconds(u32),
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl Interval {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let (num, unit) = match s.char_indices().last() {
            Some((index, _)) if index > 0 => s.split_at(index),
            _ => return Err(format!("Invalid interval '{}'", s)),
        };
        let num: u32 = num
            .parse()
            .map_err(|e| format!("Invalid interval '{}': {}", s, e))?;

        match unit {
            "s" => Ok(Interval::Seconds(num)),
            "m" => Ok(Interval::Minutes(num)),
            "h" => Ok(Interval::Hours(num)),
            "d" => Ok(Interval::Days(num)),
            _ => Err(format!("Invalid time unit in '{}'", s)),
        }
    }

    pub fn as_secs(&self) -> u64 {
        match *self {
            Interval::Seconds(s) => s as u64,
            Interval::Minutes(m) => m as u64 * 60,
            Interval::Hours(h) => h as u64 * 60 * 60,
            Interval::Days(d) => d as u64 * 24 * 60 * 60,
        }
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Interval::parse(&s).map_err(D::Error::custom)
    }
}

impl From<Interval> for clokwerk::Interval {
    fn from(val: Interval) -> Self {
        match val {
            Interval::Seconds(s) => clokwerk::Interval::Seconds(s),
            Interval::Minutes(m) => clokwerk::Interval::Minutes(m),
            Interval::Hours(h) => clokwerk::Interval::Hours(h),
            Interval::Days(d) => clokwerk::Interval::Days(d),
        }
    }
}

impl From<Interval> for chrono::Duration {
    fn from(val: Interval) -> Self {
        chrono::Duration::seconds(val.as_secs() as i64)
    }
}

impl From<Interval> for std::time::Duration {
    fn from(val: Interval) -> Self {
        std::time::Duration::from_secs(val.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(Interval::parse("30s"), Ok(Interval::Seconds(30)));
        assert_eq!(Interval::parse("5m"), Ok(Interval::Minutes(5)));
        assert_eq!(Interval::parse("1h"), Ok(Interval::Hours(1)));
        assert_eq!(Interval::parse("7d"), Ok(Interval::Days(7)));
        assert!(Interval::parse("7w").is_err());
        assert!(Interval::parse("m").is_err());
        assert!(Interval::parse("").is_err());
    }

    #[test]
    fn test_multibyte_unit_is_an_error() {
        assert!(Interval::parse("5€").is_err());
        assert!(Interval::parse("€").is_err());
        assert!(Interval::parse("€5m").is_err());
    }

    #[test]
    fn test_conversions() {
        let week = Interval::Days(7);
        assert_eq!(chrono::Duration::from(week), chrono::Duration::days(7));
        assert_eq!(
            std::time::Duration::from(Interval::Minutes(5)),
            std::time::Duration::from_secs(300)
        );
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let interval: Interval = serde_norway::from_str("\"15m\"").unwrap();
        assert_eq!(interval, Interval::Minutes(15));
    }
}
