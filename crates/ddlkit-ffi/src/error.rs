use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use ddlkit_codec::CodecError;
use ddlkit_model::ModelError;

use crate::types::DdlResult;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let message = message.into();
    let sanitized = message.replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> DdlResult {
    set_error_message(message);
    DdlResult::InvalidArgument
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_codec_error(err: &CodecError) -> DdlResult {
    set_error_message(err.to_string());
    DdlResult::from(err.result_code())
}

pub(crate) fn map_model_error(err: &ModelError) -> DdlResult {
    set_error_message(err.to_string());
    match err {
        ModelError::NotFound { .. } => DdlResult::NotFound,
        ModelError::Io(_) => DdlResult::Failed,
        _ => DdlResult::InvalidArgument,
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
