//! Per-job policy switches.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How long the mixed narration + music track lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MixDuration {
    /// Ends when the narration ends; music is looped underneath.
    #[default]
    First,
    /// Ends when the longer of narration and music ends.
    Longest,
}

impl MixDuration {
    /// Value for the `duration` option of the `amix` filter.
    pub fn as_amix_arg(&self) -> &'static str {
        match self {
            MixDuration::First => "first",
            MixDuration::Longest => "longest",
        }
    }
}

impl std::str::FromStr for MixDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" | "narration" => Ok(MixDuration::First),
            "longest" => Ok(MixDuration::Longest),
            other => Err(format!("unknown mix duration: {}", other)),
        }
    }
}

/// What to do when the first image cannot be probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormatFallback {
    /// Render at the default vertical format and record a warning.
    #[default]
    Warn,
    /// Fail the job.
    Abort,
}

impl std::str::FromStr for FormatFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(FormatFallback::Warn),
            "abort" => Ok(FormatFallback::Abort),
            other => Err(format!("unknown format fallback policy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_duration_parse() {
        assert_eq!("first".parse::<MixDuration>().unwrap(), MixDuration::First);
        assert_eq!("LONGEST".parse::<MixDuration>().unwrap(), MixDuration::Longest);
        assert!("shortest".parse::<MixDuration>().is_err());
        assert_eq!(MixDuration::default().as_amix_arg(), "first");
    }

    #[test]
    fn test_format_fallback_serde() {
        let policy: FormatFallback = serde_json::from_str("\"abort\"").unwrap();
        assert_eq!(policy, FormatFallback::Abort);
        assert_eq!(FormatFallback::default(), FormatFallback::Warn);
    }
}
