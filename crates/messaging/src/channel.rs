use std::fmt;
use std::str::FromStr;

use crate::error::ArgumentError;

/// Separator between channel segments.
pub const SEPARATOR: char = '/';

/// Segments matching exactly one segment of a channel name.
const SINGLE_LEVEL_WILDCARDS: [&str; 2] = ["*", "+"];

/// Segments matching all remaining segments (including none). Only valid last.
const MULTI_LEVEL_WILDCARDS: [&str; 2] = ["#", ">"];

/// A validated channel name or subscription pattern, e.g. `local/sensor/data`
/// or `local/alerts/*`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(String);

impl Channel {
    /// Validates and creates a channel.
    ///
    /// # Errors
    ///
    /// Returns an [`ArgumentError`] if the name is empty, has an empty segment, or
    /// uses a multi-level wildcard before the final segment.
    pub fn new(name: impl Into<String>) -> Result<Self, ArgumentError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ArgumentError::EmptyChannel);
        }

        let segments: Vec<&str> = name.split(SEPARATOR).collect();
        let last = segments.len() - 1;
        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(ArgumentError::EmptySegment(name.clone()));
            }
            if index != last && MULTI_LEVEL_WILDCARDS.contains(segment) {
                return Err(ArgumentError::MisplacedWildcard(name.clone()));
            }
        }

        Ok(Self(name))
    }

    /// Validates a channel that messages will be published to.
    ///
    /// # Errors
    ///
    /// Same as [`Channel::new`], plus [`ArgumentError::WildcardPublish`] for patterns.
    pub fn publishable(name: impl Into<String>) -> Result<Self, ArgumentError> {
        let channel = Self::new(name)?;
        if channel.is_pattern() {
            return Err(ArgumentError::WildcardPublish(channel.0));
        }
        Ok(channel)
    }

    /// Returns the channel as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Whether any segment is a wildcard.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.segments()
            .any(|s| SINGLE_LEVEL_WILDCARDS.contains(&s) || MULTI_LEVEL_WILDCARDS.contains(&s))
    }

    /// Whether `channel` is matched by this pattern.
    ///
    /// A concrete channel only matches itself.
    #[must_use]
    pub fn matches(&self, channel: &Self) -> bool {
        let mut pattern = self.segments();
        let mut name = channel.segments();

        loop {
            match (pattern.next(), name.next()) {
                (Some(p), _) if MULTI_LEVEL_WILDCARDS.contains(&p) => return true,
                (Some(p), Some(n)) => {
                    if !SINGLE_LEVEL_WILDCARDS.contains(&p) && p != n {
                        return false;
                    }
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Channel {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Channel {
    type Error = ArgumentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for Channel {
    type Error = ArgumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    fn channel(name: &str) -> Channel {
        Channel::new(name).unwrap()
    }

    #[test]
    fn test_rejects_malformed_names() {
        assert_matches!(Channel::new(""), Err(ArgumentError::EmptyChannel));
        assert_matches!(Channel::new("a//b"), Err(ArgumentError::EmptySegment(_)));
        assert_matches!(Channel::new("/a"), Err(ArgumentError::EmptySegment(_)));
        assert_matches!(Channel::new("a/#/b"), Err(ArgumentError::MisplacedWildcard(_)));
    }

    #[test]
    fn test_publishable_rejects_patterns() {
        assert!(Channel::publishable("local/sensor/data").is_ok());
        assert_matches!(
            Channel::publishable("local/alerts/*"),
            Err(ArgumentError::WildcardPublish(name)) if name == "local/alerts/*"
        );
        assert_matches!(
            Channel::publishable("telemetry/#"),
            Err(ArgumentError::WildcardPublish(_))
        );
    }

    #[test]
    fn test_exact_match() {
        let pattern = channel("sensors/temperature");
        assert!(pattern.matches(&channel("sensors/temperature")));
        assert!(!pattern.matches(&channel("sensors/humidity")));
        assert!(!pattern.matches(&channel("sensors/temperature/raw")));
        assert!(!pattern.matches(&channel("sensors")));
    }

    #[test]
    fn test_single_level_wildcard() {
        let pattern = channel("local/alerts/*");
        assert!(pattern.matches(&channel("local/alerts/high")));
        assert!(!pattern.matches(&channel("local/alerts")));
        assert!(!pattern.matches(&channel("local/alerts/high/temp")));

        let pattern = channel("commands/+/reboot");
        assert!(pattern.matches(&channel("commands/device1/reboot")));
        assert!(!pattern.matches(&channel("commands/device1/status")));
    }

    #[test]
    fn test_multi_level_wildcard() {
        let pattern = channel("telemetry/#");
        assert!(pattern.matches(&channel("telemetry")));
        assert!(pattern.matches(&channel("telemetry/device1")));
        assert!(pattern.matches(&channel("telemetry/device1/status")));
        assert!(!pattern.matches(&channel("commands/device1")));

        assert!(channel(">").matches(&channel("anything/at/all")));
    }
}
