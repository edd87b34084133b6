/// Terminal reasons and run status definitions
///
/// `StopReason` is what the traversal engine reports when it stops on its own;
/// `RunStatus` is what gets persisted in the run record.
use std::fmt;

/// Why the traversal engine stopped by itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The end of the corpus was observed
    BookComplete,

    /// The API refused further pages for this account; needs operator action
    QuotaExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BookComplete => write!(f, "book complete"),
            Self::QuotaExhausted => write!(f, "quota exhausted"),
        }
    }
}

/// Status of a harvest run as stored in the run record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    // ===== Active =====
    /// Run is in progress (or the process died while it was)
    Running,

    // ===== Terminal =====
    /// Run reached the end of the corpus
    BookComplete,

    /// Run stopped because the account ran out of quota
    QuotaExhausted,

    /// Run honored an external stop signal
    Interrupted,

    /// Run ended on a local (storage) failure
    Failed,
}

impl RunStatus {
    /// Returns true if the run can no longer make progress by itself
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns true if resuming requires operator action first
    pub fn needs_operator(&self) -> bool {
        matches!(self, Self::QuotaExhausted | Self::Failed)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::BookComplete => "book_complete",
            Self::QuotaExhausted => "quota_exhausted",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "book_complete" => Some(Self::BookComplete),
            "quota_exhausted" => Some(Self::QuotaExhausted),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl From<StopReason> for RunStatus {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::BookComplete => Self::BookComplete,
            StopReason::QuotaExhausted => Self::QuotaExhausted,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
