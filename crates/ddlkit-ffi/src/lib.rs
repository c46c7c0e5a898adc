//! ddlkit-ffi: C-ABI exports for ddlkit definitions and codecs.

mod args;
mod codec;
mod definition;
mod error;
mod types;

use std::panic::AssertUnwindSafe;

pub use codec::{
    ddl_buffer_size, ddl_factory_create, ddl_factory_element_count, ddl_factory_free,
    ddl_factory_resolve, ddl_factory_static_size, ddl_get_f64, ddl_reset_defaults, ddl_set_f64,
};
pub use definition::{
    ddl_definition_free, ddl_definition_from_xml, ddl_definition_problem_count,
    ddl_definition_validation_level,
};
pub use types::{
    DdlDefinitionHandle, DdlElementInfo, DdlFactoryHandle, DdlResult, DDL_DESERIALIZED,
    DDL_ERR_INTERNAL, DDL_ERR_INVALID_ARGUMENT, DDL_ERR_INVALID_INDEX, DDL_ERR_INVALID_TYPE,
    DDL_ERR_NOT_FOUND, DDL_ERR_NOT_INITIALIZED, DDL_ERR_OUT_OF_RANGE, DDL_OK, DDL_SERIALIZED,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

#[no_mangle]
pub extern "C" fn ddl_init() -> DdlResult {
    ffi_boundary(DdlResult::Internal, || {
        error::clear_error_state();
        DdlResult::Ok
    })
}

#[no_mangle]
pub extern "C" fn ddl_cleanup() {
    ffi_boundary((), || {
        error::clear_error_state();
    });
}

#[no_mangle]
pub extern "C" fn ddl_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};

    use super::*;

    const SCHEMA: &str = r#"<ddl>
      <header><language_version>4.1</language_version></header>
      <structs>
        <struct name="Sample" version="1">
          <element name="count" type="tUInt16" arraysize="1"><serialized bytepos="0" byteorder="BE"/><deserialized alignment="2"/></element>
          <element name="ok" type="tBool" arraysize="1" default="1"><serialized bytepos="2" byteorder="LE"/><deserialized alignment="1"/></element>
          <element name="level" type="tFloat32" arraysize="1"><serialized bytepos="3" byteorder="LE"/><deserialized alignment="4"/></element>
        </struct>
      </structs>
    </ddl>"#;

    fn last_error() -> String {
        // SAFETY: ddl_last_error returns a pointer to a thread-local CString.
        unsafe { CStr::from_ptr(ddl_last_error()).to_str().unwrap().to_string() }
    }

    fn cstr(text: &str) -> CString {
        CString::new(text).unwrap()
    }

    #[test]
    fn init_and_cleanup_are_ok() {
        assert_eq!(ddl_init(), DdlResult::Ok);
        ddl_cleanup();
        assert!(last_error().is_empty());
    }

    #[test]
    fn definition_factory_and_values() {
        let schema = cstr(SCHEMA);
        // SAFETY: All pointers below come from live locals or this library.
        unsafe {
            let definition = ddl_definition_from_xml(schema.as_ptr());
            assert!(!definition.is_null(), "{}", last_error());
            assert_eq!(ddl_definition_validation_level(definition), 3);
            let mut problems = usize::MAX;
            assert_eq!(ddl_definition_problem_count(definition, &mut problems), DdlResult::Ok);
            assert_eq!(problems, 0);

            let name = cstr("Sample");
            let factory = ddl_factory_create(definition, name.as_ptr());
            ddl_definition_free(definition);
            assert!(!factory.is_null(), "{}", last_error());

            let mut count = 0usize;
            assert_eq!(ddl_factory_element_count(factory, &mut count), DdlResult::Ok);
            assert_eq!(count, 3);
            let mut size = 0usize;
            assert_eq!(ddl_factory_static_size(factory, DDL_SERIALIZED, &mut size), DdlResult::Ok);
            assert_eq!(size, 7);
            assert_eq!(ddl_factory_static_size(factory, DDL_DESERIALIZED, &mut size), DdlResult::Ok);
            assert_eq!(size, 8);

            let mut info = DdlElementInfo::default();
            let level = cstr("level");
            assert_eq!(ddl_factory_resolve(factory, level.as_ptr(), &mut info), DdlResult::Ok);
            assert_eq!(info.serialized_bit_offset, 24);
            assert_eq!(info.deserialized_offset, 4);
            assert_eq!(info.scalar_type, 10);

            let mut wire = [0u8; 7];
            assert_eq!(ddl_reset_defaults(factory, wire.as_mut_ptr(), wire.len(), DDL_SERIALIZED), DdlResult::Ok);
            assert_eq!(wire[2], 1);
            let count_path = cstr("count");
            assert_eq!(
                ddl_set_f64(factory, wire.as_mut_ptr(), wire.len(), DDL_SERIALIZED, count_path.as_ptr(), 258.0),
                DdlResult::Ok
            );
            assert_eq!(&wire[..2], &[1, 2]);
            let mut value = 0.0f64;
            assert_eq!(
                ddl_get_f64(factory, wire.as_ptr(), wire.len(), DDL_SERIALIZED, count_path.as_ptr(), &mut value),
                DdlResult::Ok
            );
            assert_eq!(value, 258.0);

            let mut host_size = 0usize;
            assert_eq!(
                ddl_buffer_size(factory, wire.as_ptr(), wire.len(), DDL_SERIALIZED, DDL_DESERIALIZED, &mut host_size),
                DdlResult::Ok
            );
            assert_eq!(host_size, 8);

            ddl_factory_free(factory);
        }
    }

    #[test]
    fn failures_report_codes_and_messages() {
        let broken = cstr("<mapping/>");
        let schema = cstr(SCHEMA);
        // SAFETY: All pointers below come from live locals or this library.
        unsafe {
            assert!(ddl_definition_from_xml(broken.as_ptr()).is_null());
            assert!(!last_error().is_empty());
            assert!(ddl_definition_from_xml(std::ptr::null()).is_null());
            assert_eq!(last_error(), "xml cannot be null");

            let definition = ddl_definition_from_xml(schema.as_ptr());
            let missing = cstr("Missing");
            assert!(ddl_factory_create(definition, missing.as_ptr()).is_null());
            assert!(last_error().contains("Missing"));

            let name = cstr("Sample");
            let factory = ddl_factory_create(definition, name.as_ptr());
            let mut info = DdlElementInfo::default();
            let bad = cstr("nope");
            assert_eq!(ddl_factory_resolve(factory, bad.as_ptr(), &mut info), DdlResult::NotFound);

            let short = [0u8; 3];
            let mut value = 0.0;
            let path = cstr("count");
            assert_eq!(
                ddl_get_f64(factory, short.as_ptr(), short.len(), DDL_SERIALIZED, path.as_ptr(), &mut value),
                DdlResult::OutOfRange
            );
            assert_eq!(
                ddl_factory_static_size(factory, 7, &mut 0usize),
                DdlResult::InvalidArgument
            );
            assert_eq!(
                ddl_factory_element_count(std::ptr::null_mut(), &mut 0usize),
                DdlResult::InvalidArgument
            );

            ddl_factory_free(factory);
            ddl_definition_free(definition);
        }
    }
}
