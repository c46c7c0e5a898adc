use ddlkit_model::{DdlReader, ReaderConfig, ValidationLevel};

use crate::args;
use crate::error;
use crate::types::{DdlDefinitionHandle, DdlResult, DefinitionHandle};

pub(crate) fn with_definition<T>(
    handle: DdlDefinitionHandle,
    on_error: T,
    f: impl FnOnce(&DefinitionHandle) -> T,
) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("definition handle cannot be null");
        return on_error;
    }

    let definition = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &*(handle as *mut DefinitionHandle) }
    };

    f(definition)
}

pub(crate) fn level_code(level: ValidationLevel) -> i32 {
    match level {
        ValidationLevel::Unknown => 0,
        ValidationLevel::Invalid => 1,
        ValidationLevel::GoodEnough => 2,
        ValidationLevel::Valid => 3,
    }
}

/// Load and validate a definition from schema document text. Predefined
/// scalar types and units are available to the document.
///
/// Returns null on failure; see `ddl_last_error`.
///
/// # Safety
/// `xml` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn ddl_definition_from_xml(
    xml: *const std::os::raw::c_char,
) -> DdlDefinitionHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let text = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(xml, "xml") } {
                Some(v) => v,
                None => return std::ptr::null_mut(),
            }
        };

        let reader = DdlReader::with_config(ReaderConfig {
            merge_predefined: true,
            ..ReaderConfig::default()
        });
        match reader.read_str(text) {
            Ok(loaded) => {
                let handle = DefinitionHandle {
                    problem_count: loaded.problems.len() + loaded.definition.problems().len(),
                    definition: loaded.definition,
                };
                Box::into_raw(Box::new(handle)) as DdlDefinitionHandle
            }
            Err(err) => {
                let _ = error::map_model_error(&err);
                std::ptr::null_mut()
            }
        }
    })
}

/// Overall validation level: 0 unknown, 1 invalid, 2 good enough, 3 valid.
/// Negative on error.
///
/// # Safety
/// `definition` must be a handle returned by `ddl_definition_from_xml`.
#[no_mangle]
pub unsafe extern "C" fn ddl_definition_validation_level(definition: DdlDefinitionHandle) -> i32 {
    crate::ffi_boundary(DdlResult::Internal as i32, || {
        error::clear_error_state();
        with_definition(definition, DdlResult::InvalidArgument as i32, |handle| {
            level_code(handle.definition.validation_level())
        })
    })
}

/// Number of skipped document fragments plus validation problems.
///
/// # Safety
/// `definition` must be a handle returned by `ddl_definition_from_xml`;
/// `out_count` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn ddl_definition_problem_count(
    definition: DdlDefinitionHandle,
    out_count: *mut usize,
) -> DdlResult {
    crate::ffi_boundary(DdlResult::Internal, || {
        error::clear_error_state();
        with_definition(definition, DdlResult::InvalidArgument, |handle| {
            // SAFETY: Caller guarantees `out_count` is null or writable.
            unsafe { args::write_out(out_count, handle.problem_count, "out_count") }
        })
    })
}

/// Free a definition handle.
///
/// # Safety
/// `definition` must be null or a handle returned by `ddl_definition_from_xml`.
#[no_mangle]
pub unsafe extern "C" fn ddl_definition_free(definition: DdlDefinitionHandle) {
    crate::ffi_boundary((), || {
        if definition.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by ddl_definition_from_xml.
        unsafe {
            drop(Box::from_raw(definition as *mut DefinitionHandle));
        }
    });
}
