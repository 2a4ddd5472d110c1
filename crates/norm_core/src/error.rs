//! Storage-independent error vocabulary.
//!
//! # Responsibility
//! - Name every pipeline stage that can fail (compile, prepare, execute, scan).
//! - Keep the expected outcomes (`NotFound`, `NotAffected`) distinguishable
//!   from opaque backend failures, even after wrapping.
//!
//! # Invariants
//! - Errors are returned as soon as a stage fails; nothing here retries.
//! - `Fetch` wrapping never hides the kind of the wrapped error from
//!   `is_not_found`/`is_not_affected`/`is_cancelled`.

use crate::scan::ScanError;
use crate::template::TemplateError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type NormResult<T> = Result<T, NormError>;

/// Which aggregation input failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSide {
    /// Left input of `lookup`.
    Left,
    /// Right input of `lookup`.
    Right,
    /// The only input of `group`.
    Single,
}

impl FetchSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Single => "single",
        }
    }
}

/// Flat classification of a [`NormError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotAffected,
    TemplateCompile,
    Prepare,
    Execution,
    Scan,
    Cancelled,
    LeftFetch,
    RightFetch,
    Fetch,
    Source,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotAffected => "not_affected",
            Self::TemplateCompile => "template_compile",
            Self::Prepare => "prepare",
            Self::Execution => "execution",
            Self::Scan => "scan",
            Self::Cancelled => "cancelled",
            Self::LeftFetch => "left_fetch",
            Self::RightFetch => "right_fetch",
            Self::Fetch => "fetch",
            Self::Source => "source",
        }
    }
}

/// Error returned by every capability and aggregation operation.
#[derive(Debug)]
pub enum NormError {
    /// A single-row read matched zero rows.
    NotFound,
    /// A write affected zero rows.
    NotAffected,
    /// The query template could not be compiled against its envelope.
    Template(TemplateError),
    /// The backend rejected the compiled statement.
    Prepare(rusqlite::Error),
    /// The statement failed while running.
    Execute(rusqlite::Error),
    /// Result rows could not be mapped into the model.
    Scan(ScanError),
    /// The execution scope was cancelled.
    Cancelled,
    /// An aggregation input failed to load.
    Fetch {
        side: FetchSide,
        source: Box<NormError>,
    },
    /// Failure reported by an application-defined capability.
    Source(Box<dyn Error + Send + Sync>),
}

impl NormError {
    /// Wraps a failure raised by application code implementing a capability.
    pub fn source_error(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Source(err.into())
    }

    pub(crate) fn fetch(side: FetchSide, err: NormError) -> Self {
        Self::Fetch {
            side,
            source: Box::new(err),
        }
    }

    /// Maps a statement failure, keeping SQLite interrupts as cancellation.
    pub(crate) fn execute(err: rusqlite::Error) -> Self {
        if is_interrupt(&err) {
            return Self::Cancelled;
        }
        Self::Execute(err)
    }

    pub(crate) fn prepare(err: rusqlite::Error) -> Self {
        if is_interrupt(&err) {
            return Self::Cancelled;
        }
        Self::Prepare(err)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::NotAffected => ErrorKind::NotAffected,
            Self::Template(_) => ErrorKind::TemplateCompile,
            Self::Prepare(_) => ErrorKind::Prepare,
            Self::Execute(_) => ErrorKind::Execution,
            Self::Scan(_) => ErrorKind::Scan,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Fetch { side, .. } => match side {
                FetchSide::Left => ErrorKind::LeftFetch,
                FetchSide::Right => ErrorKind::RightFetch,
                FetchSide::Single => ErrorKind::Fetch,
            },
            Self::Source(_) => ErrorKind::Source,
        }
    }

    /// Innermost error below any `Fetch` wrapping.
    pub fn root(&self) -> &NormError {
        let mut current = self;
        while let Self::Fetch { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound)
    }

    pub fn is_not_affected(&self) -> bool {
        matches!(self.root(), Self::NotAffected)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }
}

impl Display for NormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::NotAffected => write!(f, "not affected by create/update/delete"),
            Self::Template(err) => write!(f, "compile query template: {err}"),
            Self::Prepare(err) => write!(f, "prepare query: {err}"),
            Self::Execute(err) => write!(f, "run query: {err}"),
            Self::Scan(err) => write!(f, "scan rows: {err}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Fetch { side, source } => {
                write!(f, "fetch {} input: {source}", side.as_str())
            }
            Self::Source(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NormError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound | Self::NotAffected | Self::Cancelled => None,
            Self::Template(err) => Some(err),
            Self::Prepare(err) => Some(err),
            Self::Execute(err) => Some(err),
            Self::Scan(err) => Some(err),
            Self::Fetch { source, .. } => Some(source.as_ref()),
            Self::Source(err) => Some(err.as_ref()),
        }
    }
}

impl From<TemplateError> for NormError {
    fn from(value: TemplateError) -> Self {
        Self::Template(value)
    }
}

impl From<ScanError> for NormError {
    fn from(value: ScanError) -> Self {
        match value {
            ScanError::Sqlite(err) if is_interrupt(&err) => Self::Cancelled,
            other => Self::Scan(other),
        }
    }
}

fn is_interrupt(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::OperationInterrupted
    )
}
