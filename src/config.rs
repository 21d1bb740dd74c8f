//! Run configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options recognised by a run.
///
/// Deserializes from `{"timeout": <milliseconds>}`; a missing or zero
/// timeout disables supervision.
///
/// # Examples
///
/// ```
/// use stepwise::SequenceConfig;
/// use std::time::Duration;
///
/// let config: SequenceConfig = serde_json::from_str(r#"{"timeout": 250}"#).unwrap();
/// assert_eq!(config.timeout, Some(Duration::from_millis(250)));
///
/// assert_eq!(SequenceConfig::with_timeout_ms(0).armed_timeout(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Per-step timeout. `None` means no timeout. Default: none.
    #[serde(default, with = "millis")]
    pub timeout: Option<Duration>,
}

impl SequenceConfig {
    /// Creates a configuration with the given per-step timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout).filter(|t| !t.is_zero()),
        }
    }

    /// Creates a configuration from a timeout in milliseconds; 0 disables it.
    pub fn with_timeout_ms(ms: u64) -> Self {
        Self::with_timeout(Duration::from_millis(ms))
    }

    /// Returns the timeout the run loop should arm, if any.
    pub fn armed_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms = Option::<u64>::deserialize(d)?;
        Ok(ms.filter(|&ms| ms > 0).map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_timeout() {
        let config = SequenceConfig::default();
        assert_eq!(config.timeout, None);
        assert_eq!(config.armed_timeout(), None);
    }

    #[test]
    fn test_deserialize() {
        let config: SequenceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.timeout, None);

        let config: SequenceConfig = serde_json::from_str(r#"{"timeout": 0}"#).unwrap();
        assert_eq!(config.timeout, None);

        let config: SequenceConfig = serde_json::from_str(r#"{"timeout": null}"#).unwrap();
        assert_eq!(config.timeout, None);

        let config: SequenceConfig = serde_json::from_str(r#"{"timeout": 1500}"#).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&SequenceConfig::with_timeout_ms(20)).unwrap();
        assert_eq!(json, r#"{"timeout":20}"#);
    }

    #[test]
    fn test_serialize_saturates_huge_timeout() {
        let config = SequenceConfig {
            timeout: Some(Duration::MAX),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, format!(r#"{{"timeout":{}}}"#, u64::MAX));
    }

    #[test]
    fn test_zero_duration_is_disarmed() {
        let config = SequenceConfig {
            timeout: Some(Duration::ZERO),
        };
        assert_eq!(config.armed_timeout(), None);
    }
}
