//! Canonical output resolutions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the fixed output geometries a job can render at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalFormat {
    /// 1080x1920 (9:16)
    Vertical,
    /// 1920x1080 (16:9)
    Horizontal,
    /// 1080x1080 (1:1)
    Square,
}

impl CanonicalFormat {
    pub fn width(&self) -> u32 {
        match self {
            CanonicalFormat::Vertical | CanonicalFormat::Square => 1080,
            CanonicalFormat::Horizontal => 1920,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            CanonicalFormat::Vertical => 1920,
            CanonicalFormat::Horizontal | CanonicalFormat::Square => 1080,
        }
    }

    /// `(width, height)` pair.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

impl fmt::Display for CanonicalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width(), self.height())
    }
}

/// Resolution as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl From<CanonicalFormat> for Resolution {
    fn from(format: CanonicalFormat) -> Self {
        Self {
            width: format.width(),
            height: format.height(),
        }
    }
}
