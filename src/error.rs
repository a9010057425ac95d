//! Error taxonomy and the error-handler/recovery substrate.
//!
//! Mirrors the shape of upstream logging engines: a stable error code per
//! failure class, enough context to act on it (operation, path, destination
//! name), and a pluggable handler that every dispatcher/worker error is
//! routed through before it feeds the recovery policy.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// Stable error classification. Used both for display and for routing into
/// the recovery policy (§4.5) and the retryable predicate (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FileOpen,
    FileWrite,
    FileFlush,
    FileLock,
    FileRotate,
    ChannelFull,
    ChannelClosed,
    DestinationNotFound,
    DestinationDisabled,
    DestinationNil,
    CompressionFailed,
    CompressionQueueFull,
    SyslogConnection,
    SyslogWrite,
    ShutdownTimeout,
    AlreadyClosed,
    InvalidConfig,
    InvalidLevel,
    InvalidFormat,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::FileOpen => "file_open",
            ErrorCode::FileWrite => "file_write",
            ErrorCode::FileFlush => "file_flush",
            ErrorCode::FileLock => "file_lock",
            ErrorCode::FileRotate => "file_rotate",
            ErrorCode::ChannelFull => "channel_full",
            ErrorCode::ChannelClosed => "channel_closed",
            ErrorCode::DestinationNotFound => "destination_not_found",
            ErrorCode::DestinationDisabled => "destination_disabled",
            ErrorCode::DestinationNil => "destination_nil",
            ErrorCode::CompressionFailed => "compression_failed",
            ErrorCode::CompressionQueueFull => "compression_queue_full",
            ErrorCode::SyslogConnection => "syslog_connection",
            ErrorCode::SyslogWrite => "syslog_write",
            ErrorCode::ShutdownTimeout => "shutdown_timeout",
            ErrorCode::AlreadyClosed => "already_closed",
            ErrorCode::InvalidConfig => "invalid_config",
            ErrorCode::InvalidLevel => "invalid_level",
            ErrorCode::InvalidFormat => "invalid_format",
        }
    }

    /// §7 retryable predicate: queue-full, compression-queue-full, lock
    /// contention, and OS errors whose text indicates transient exhaustion.
    pub fn is_retryable(self, cause_text: Option<&str>) -> bool {
        match self {
            ErrorCode::ChannelFull | ErrorCode::CompressionQueueFull | ErrorCode::FileLock => true,
            _ => cause_text.is_some_and(|text| {
                let text = text.to_ascii_lowercase();
                text.contains("resource temporarily unavailable")
                    || text.contains("too many open files")
                    || text.contains("no space left on device")
            }),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single logging-engine error: a stable code plus enough context to log,
/// count, and route it.
#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub operation: &'static str,
    pub path: Option<PathBuf>,
    pub destination: Option<String>,
    pub at: SystemTime,
    pub context: String,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(code: ErrorCode, operation: &'static str) -> Self {
        Error {
            code,
            operation,
            path: None,
            destination: None,
            at: SystemTime::now(),
            context: String::new(),
            cause: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_destination(mut self, name: impl Into<String>) -> Self {
        self.destination = Some(name.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn from_io(code: ErrorCode, operation: &'static str, err: std::io::Error) -> Self {
        let context = err.to_string();
        Error::new(code, operation)
            .with_context(context)
            .with_cause(err)
    }

    pub fn cause_text(&self) -> Option<String> {
        self.cause.as_ref().map(|c| c.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable(self.cause_text().as_deref())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.operation)?;
        if let Some(path) = &self.path {
            write!(f, " path={}", path.display())?;
        }
        if let Some(dest) = &self.destination {
            write!(f, " destination={}", dest)?;
        }
        if !self.context.is_empty() {
            write!(f, ": {}", self.context)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A user-installable error handler. The default is silent.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Combine multiple handlers into one that calls each in turn.
pub fn fan_out(handlers: Vec<ErrorHandler>) -> ErrorHandler {
    Arc::new(move |err| {
        for h in &handlers {
            h(err);
        }
    })
}

/// Wrap a handler so it only fires for errors whose code is in `codes`.
pub fn filter_codes(codes: Vec<ErrorCode>, inner: ErrorHandler) -> ErrorHandler {
    Arc::new(move |err| {
        if codes.contains(&err.code) {
            inner(err);
        }
    })
}

/// Wrap a handler so it forwards errors onto a channel instead of calling
/// `inner` directly; useful for tests that want to assert on errors.
pub fn to_channel(sender: crossbeam_channel::Sender<Error>) -> ErrorHandler {
    Arc::new(move |err| {
        let _ = sender.send(err.clone());
    })
}
