mod error;

pub use error::Error;

use edgelink_messaging::Channel;

const SUBJECT_SEPARATOR: char = '.';

/// Maps a channel or pattern onto a NATS subject.
///
/// `/` becomes `.`, single-level wildcards become `*` and multi-level wildcards
/// become `>`.
///
/// # Errors
///
/// Returns [`Error::Unrepresentable`] if a segment contains `.` or whitespace.
pub fn to_subject(channel: &Channel) -> Result<String, Error> {
    let mut segments = Vec::new();
    for segment in channel.segments() {
        let mapped = match segment {
            "*" | "+" => "*",
            "#" | ">" => ">",
            other if other.contains(SUBJECT_SEPARATOR) || other.contains(char::is_whitespace) => {
                return Err(Error::Unrepresentable(channel.to_string()));
            }
            other => other,
        };
        segments.push(mapped);
    }
    Ok(segments.join("."))
}

/// Maps an inbound NATS subject back to a channel.
///
/// # Errors
///
/// Returns [`Error::InvalidSubject`] if the result is not a publishable channel.
pub fn from_subject(subject: &str) -> Result<Channel, Error> {
    let name = subject.replace(SUBJECT_SEPARATOR, "/");
    Channel::publishable(name).map_err(|_| Error::InvalidSubject(subject.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: &str) -> Channel {
        Channel::new(name).unwrap()
    }

    #[test]
    fn test_to_subject() {
        assert_eq!(to_subject(&channel("local/sensor/data")).unwrap(), "local.sensor.data");
        assert_eq!(to_subject(&channel("local/alerts/*")).unwrap(), "local.alerts.*");
        assert_eq!(to_subject(&channel("local/+/data")).unwrap(), "local.*.data");
        assert_eq!(to_subject(&channel("commands/#")).unwrap(), "commands.>");
        assert_eq!(to_subject(&channel("commands/>")).unwrap(), "commands.>");
    }

    #[test]
    fn test_to_subject_rejects_dots() {
        assert_eq!(
            to_subject(&channel("device.1/status")),
            Err(Error::Unrepresentable("device.1/status".to_string()))
        );
        assert!(to_subject(&channel("device 1/status")).is_err());
    }

    #[test]
    fn test_from_subject() {
        assert_eq!(from_subject("telemetry.device1").unwrap(), channel("telemetry/device1"));
        assert_eq!(
            from_subject("telemetry..device1"),
            Err(Error::InvalidSubject("telemetry..device1".to_string()))
        );
    }
}
