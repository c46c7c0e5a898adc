use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Stable numeric result codes. Zero is success, failures are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum ResultCode {
    Ok = 0,
    Unexpected = -3,
    InvalidArg = -5,
    InvalidIndex = -10,
    Memory = -12,
    NotSupported = -19,
    NotFound = -20,
    NotInitialized = -37,
    Failed = -38,
    InvalidState = -40,
    InvalidType = -42,
    OutOfRange = -49,
}

impl ResultCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        const ALL: [ResultCode; 12] = [
            ResultCode::Ok,
            ResultCode::Unexpected,
            ResultCode::InvalidArg,
            ResultCode::InvalidIndex,
            ResultCode::Memory,
            ResultCode::NotSupported,
            ResultCode::NotFound,
            ResultCode::NotInitialized,
            ResultCode::Failed,
            ResultCode::InvalidState,
            ResultCode::InvalidType,
            ResultCode::OutOfRange,
        ];
        ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultCode::Ok => "ok",
            ResultCode::Unexpected => "unexpected",
            ResultCode::InvalidArg => "invalid argument",
            ResultCode::InvalidIndex => "invalid index",
            ResultCode::Memory => "memory",
            ResultCode::NotSupported => "not supported",
            ResultCode::NotFound => "not found",
            ResultCode::NotInitialized => "not initialized",
            ResultCode::Failed => "failed",
            ResultCode::InvalidState => "invalid state",
            ResultCode::InvalidType => "invalid type",
            ResultCode::OutOfRange => "out of range",
        }
    }
}

/// Detailed description attached to a failed [`Status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: i32,
    pub message: String,
    /// Operation or path the failure belongs to.
    pub context: Option<String>,
}

/// Outcome of a codec or mapping call at an outer boundary.
///
/// Either a bare code or a shared detail record. Cloning a detailed status
/// shares the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Code(i32),
    Detail(Arc<ErrorDetail>),
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl Status {
    pub const OK: Status = Status::Code(0);

    pub fn with_detail(code: ResultCode, message: impl Into<String>) -> Self {
        Status::Detail(Arc::new(ErrorDetail {
            code: code.code(),
            message: message.into(),
            context: None,
        }))
    }

    /// Attach a context string, keeping code and message.
    pub fn context(self, context: impl Into<String>) -> Self {
        let context = Some(context.into());
        match self {
            Status::Code(code) => Status::Detail(Arc::new(ErrorDetail {
                code,
                message: ResultCode::from_code(code)
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default(),
                context,
            })),
            Status::Detail(detail) => Status::Detail(Arc::new(ErrorDetail {
                context,
                ..ErrorDetail::clone(&detail)
            })),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Status::Code(code) => *code,
            Status::Detail(detail) => detail.code,
        }
    }

    pub fn result_code(&self) -> Option<ResultCode> {
        ResultCode::from_code(self.code())
    }

    pub fn is_ok(&self) -> bool {
        self.code() >= 0
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Status::Code(_) => None,
            Status::Detail(detail) => Some(detail.message.as_str()),
        }
    }

    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Status::Code(_) => None,
            Status::Detail(detail) => Some(detail),
        }
    }
}

impl From<ResultCode> for Status {
    fn from(code: ResultCode) -> Self {
        Status::Code(code.code())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Code(code) => match ResultCode::from_code(*code) {
                Some(known) => write!(f, "{} ({code})", known.as_str()),
                None => write!(f, "result code {code}"),
            },
            Status::Detail(detail) => {
                write!(f, "{} ({})", detail.message, detail.code)?;
                if let Some(context) = &detail.context {
                    write!(f, " in {context}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_and_detailed_codes() {
        assert!(Status::OK.is_ok());
        let bare = Status::from(ResultCode::InvalidIndex);
        assert_eq!(bare.code(), -10);
        assert!(bare.message().is_none());

        let detailed = Status::with_detail(ResultCode::NotFound, "no element 'z'");
        assert!(!detailed.is_ok());
        assert_eq!(detailed.result_code(), Some(ResultCode::NotFound));
        assert_eq!(detailed.to_string(), "no element 'z' (-20)");
    }

    #[test]
    fn clones_share_detail() {
        let status = Status::with_detail(ResultCode::Failed, "boom");
        let copy = status.clone();
        match (&status, &copy) {
            (Status::Detail(a), Status::Detail(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected detailed status"),
        }
    }

    #[test]
    fn context_keeps_code() {
        let status = Status::from(ResultCode::InvalidState).context("start");
        assert_eq!(status.code(), -40);
        assert_eq!(status.detail().unwrap().context.as_deref(), Some("start"));
        assert_eq!(status.message(), Some("invalid state"));
    }
}
