use std::fmt;

/// Machine-readable error codes covering the ingestion and moderation
/// pipeline failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    EmptySubmission,
    NoItemName,
    NotInitialized,
    ItemNotFound,
    SubmissionNotFound,
    DuplicateItem,
    CacheUnavailable,
    StoreFailure,
    ReparseLocked,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::EmptySubmission => "E1001",
            Self::NoItemName => "E1002",
            Self::NotInitialized => "E1003",
            Self::ItemNotFound => "E2001",
            Self::SubmissionNotFound => "E2002",
            Self::DuplicateItem => "E3001",
            Self::CacheUnavailable => "E4001",
            Self::StoreFailure => "E5001",
            Self::ReparseLocked => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptySubmission => "Submission text is empty",
            Self::NoItemName => "No item name could be extracted",
            Self::NotInitialized => "Project not initialized",
            Self::ItemNotFound => "Canonical item not found",
            Self::SubmissionNotFound => "Raw submission not found",
            Self::DuplicateItem => "Canonical item already exists",
            Self::CacheUnavailable => "Dedup cache backend unavailable",
            Self::StoreFailure => "Durable store operation failed",
            Self::ReparseLocked => "Another reparse is already running",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::EmptySubmission => Some("Paste the full identify text before submitting."),
            Self::NoItemName => {
                Some("Check that the first line follows the `.., <name>, <category>,` template.")
            }
            Self::NotInitialized => Some("Run `relic init` to initialize this directory."),
            Self::ItemNotFound | Self::SubmissionNotFound => None,
            Self::DuplicateItem => None,
            Self::CacheUnavailable => {
                Some("Ingestion continued uncached; check the cache backend and retry later.")
            }
            Self::StoreFailure => Some("Check the database file and disk permissions."),
            Self::ReparseLocked => Some("Wait for the running reparse to finish, then retry."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
