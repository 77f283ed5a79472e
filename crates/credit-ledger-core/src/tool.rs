//! Paid tools and their credit costs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A paid tool that consumes credits.
///
/// The set of tools is fixed configuration, not runtime data. Each tool has a
/// static cost in credits, looked up via [`Tool::cost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// AI review of an uploaded CV.
    CvReview,

    /// AI-assisted CV creation.
    CvCreate,

    /// Job matching against the CV profile.
    JobMatch,
}

impl Tool {
    /// All tools, in display order.
    pub const ALL: [Self; 3] = [Self::CvReview, Self::CvCreate, Self::JobMatch];

    /// Credits required per use of this tool.
    ///
    /// Every tool currently costs one credit; the per-tool lookup exists so a
    /// cost change never requires touching the reservation path.
    #[must_use]
    pub const fn cost(self) -> i64 {
        match self {
            Self::CvReview | Self::CvCreate | Self::JobMatch => 1,
        }
    }

    /// Stable string name, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CvReview => "cv_review",
            Self::CvCreate => "cv_create",
            Self::JobMatch => "job_match",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cv_review" => Ok(Self::CvReview),
            "cv_create" => Ok(Self::CvCreate),
            "job_match" => Ok(Self::JobMatch),
            other => Err(UnknownTool(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized tool name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool: {0}")]
pub struct UnknownTool(pub String);
