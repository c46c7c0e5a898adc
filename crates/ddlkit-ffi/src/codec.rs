use std::os::raw::c_char;

use ddlkit_codec::{CodecFactory, CodecIndex, Value};
use ddlkit_layout::ScalarType;

use crate::args;
use crate::definition::with_definition;
use crate::error;
use crate::types::{
    representation_arg, scalar_code, DdlDefinitionHandle, DdlElementInfo, DdlFactoryHandle,
    DdlResult, FactoryHandle,
};

fn with_factory<T>(handle: DdlFactoryHandle, on_error: T, f: impl FnOnce(&CodecFactory) -> T) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("factory handle cannot be null");
        return on_error;
    }

    let factory_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &*(handle as *mut FactoryHandle) }
    };

    f(&factory_handle.factory)
}

fn element_info(index: &CodecIndex) -> DdlElementInfo {
    DdlElementInfo {
        serialized_bit_offset: index.serialized_bit_offset,
        serialized_bit_count: index.serialized_bit_count,
        deserialized_offset: index.deserialized_offset,
        deserialized_size: index.deserialized_size,
        scalar_type: scalar_code(index.scalar),
        is_enum: i32::from(index.enum_name.is_some()),
    }
}

/// Create a codec factory for `struct_name`.
///
/// Returns null when the struct is unknown or not usable.
///
/// # Safety
/// `definition` must be a handle returned by `ddl_definition_from_xml` and
/// `struct_name` a valid NUL-terminated C string. The factory does not
/// borrow the definition, which may be freed first.
#[no_mangle]
pub unsafe extern "C" fn ddl_factory_create(
    definition: DdlDefinitionHandle,
    struct_name: *const c_char,
) -> DdlFactoryHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();
        let name = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(struct_name, "struct_name") } {
                Some(v) => v,
                None => return std::ptr::null_mut(),
            }
        };
        with_definition(definition, std::ptr::null_mut(), |handle| {
            match CodecFactory::try_new(&handle.definition, name) {
                Ok(factory) => Box::into_raw(Box::new(FactoryHandle { factory })) as DdlFactoryHandle,
                Err(err) => {
                    let _ = error::map_codec_error(&err);
                    std::ptr::null_mut()
                }
            }
        })
    })
}

/// Free a factory handle.
///
/// # Safety
/// `factory` must be null or a handle returned by `ddl_factory_create`.
#[no_mangle]
pub unsafe extern "C" fn ddl_factory_free(factory: DdlFactoryHandle) {
    crate::ffi_boundary((), || {
        if factory.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by ddl_factory_create.
        unsafe {
            drop(Box::from_raw(factory as *mut FactoryHandle));
        }
    });
}

/// Number of leaf elements before the first dynamic array.
///
/// # Safety
/// `factory` must be a valid handle; `out_count` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn ddl_factory_element_count(
    factory: DdlFactoryHandle,
    out_count: *mut usize,
) -> DdlResult {
    crate::ffi_boundary(DdlResult::Internal, || {
        error::clear_error_state();
        with_factory(factory, DdlResult::InvalidArgument, |factory| {
            // SAFETY: Caller guarantees `out_count` is null or writable.
            unsafe { args::write_out(out_count, factory.element_count(), "out_count") }
        })
    })
}

/// Buffer size of a struct without dynamic arrays.
///
/// # Safety
/// `factory` must be a valid handle; `out_size` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn ddl_factory_static_size(
    factory: DdlFactoryHandle,
    representation: i32,
    out_size: *mut usize,
) -> DdlResult {
    crate::ffi_boundary(DdlResult::Internal, || {
        error::clear_error_state();
        let Some(representation) = representation_arg(representation) else {
            return error::set_invalid_argument("unknown representation");
        };
        with_factory(factory, DdlResult::InvalidArgument, |factory| {
            match factory.static_buffer_size(representation) {
                // SAFETY: Caller guarantees `out_size` is null or writable.
                Some(size) => unsafe { args::write_out(out_size, size, "out_size") },
                None => {
                    error::set_error_message("struct size depends on dynamic array content");
                    DdlResult::NotSupported
                }
            }
        })
    })
}

/// Resolve an element path such as `a.b[2].c`.
///
/// # Safety
/// `factory` must be a valid handle, `path` a valid NUL-terminated C string
/// and `out_info` null or writable.
#[no_mangle]
pub unsafe extern "C" fn ddl_factory_resolve(
    factory: DdlFactoryHandle,
    path: *const c_char,
    out_info: *mut DdlElementInfo,
) -> DdlResult {
    crate::ffi_boundary(DdlResult::Internal, || {
        error::clear_error_state();
        let path = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(path, "path") } {
                Some(v) => v,
                None => return DdlResult::InvalidArgument,
            }
        };
        with_factory(factory, DdlResult::InvalidArgument, |factory| {
            match factory.resolve(path) {
                // SAFETY: Caller guarantees `out_info` is null or writable.
                Ok(index) => unsafe { args::write_out(out_info, element_info(&index), "out_info") },
                Err(err) => error::map_codec_error(&err),
            }
        })
    })
}

/// Size of `data` in `representation`, honoring its dynamic arrays.
///
/// # Safety
/// `factory` must be a valid handle, `data` readable for `len` bytes and
/// `out_size` null or writable.
#[no_mangle]
pub unsafe extern "C" fn ddl_buffer_size(
    factory: DdlFactoryHandle,
    data: *const u8,
    len: usize,
    data_representation: i32,
    representation: i32,
    out_size: *mut usize,
) -> DdlResult {
    crate::ffi_boundary(DdlResult::Internal, || {
        error::clear_error_state();
        let (Some(data_representation), Some(representation)) = (
            representation_arg(data_representation),
            representation_arg(representation),
        ) else {
            return error::set_invalid_argument("unknown representation");
        };
        let buffer = {
            // SAFETY: We validate pointer/length pairing in helper.
            match unsafe { args::bytes_arg(data, len, "data") } {
                Some(v) => v,
                None => return DdlResult::InvalidArgument,
            }
        };
        with_factory(factory, DdlResult::InvalidArgument, |factory| {
            match factory.make_decoder(buffer, data_representation) {
                Ok(decoder) => {
                    let size = decoder.buffer_size(representation);
                    // SAFETY: Caller guarantees `out_size` is null or writable.
                    unsafe { args::write_out(out_size, size, "out_size") }
                }
                Err(err) => error::map_codec_error(&err),
            }
        })
    })
}

/// Read the element at `path` as `f64`.
///
/// # Safety
/// `factory` must be a valid handle, `data` readable for `len` bytes, `path`
/// a valid NUL-terminated C string and `out_value` null or writable.
#[no_mangle]
pub unsafe extern "C" fn ddl_get_f64(
    factory: DdlFactoryHandle,
    data: *const u8,
    len: usize,
    representation: i32,
    path: *const c_char,
    out_value: *mut f64,
) -> DdlResult {
    crate::ffi_boundary(DdlResult::Internal, || {
        error::clear_error_state();
        let Some(representation) = representation_arg(representation) else {
            return error::set_invalid_argument("unknown representation");
        };
        let (buffer, path) = {
            // SAFETY: We validate pointers in the helpers.
            match unsafe { (args::bytes_arg(data, len, "data"), args::required_str_arg(path, "path")) } {
                (Some(buffer), Some(path)) => (buffer, path),
                _ => return DdlResult::InvalidArgument,
            }
        };
        with_factory(factory, DdlResult::InvalidArgument, |factory| {
            let value = factory
                .make_decoder(buffer, representation)
                .and_then(|decoder| decoder.get_by_path(path));
            match value {
                // SAFETY: Caller guarantees `out_value` is null or writable.
                Ok(value) => unsafe { args::write_out(out_value, value.as_f64(), "out_value") },
                Err(err) => error::map_codec_error(&err),
            }
        })
    })
}

/// Write `value` into the element at `path`, cast to the element type.
/// Boolean elements take `value != 0`.
///
/// # Safety
/// `factory` must be a valid handle, `data` writable for `len` bytes and
/// `path` a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn ddl_set_f64(
    factory: DdlFactoryHandle,
    data: *mut u8,
    len: usize,
    representation: i32,
    path: *const c_char,
    value: f64,
) -> DdlResult {
    crate::ffi_boundary(DdlResult::Internal, || {
        error::clear_error_state();
        let Some(representation) = representation_arg(representation) else {
            return error::set_invalid_argument("unknown representation");
        };
        let path = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(path, "path") } {
                Some(v) => v,
                None => return DdlResult::InvalidArgument,
            }
        };
        let buffer = {
            // SAFETY: We validate pointer/length pairing in helper.
            match unsafe { args::bytes_arg_mut(data, len, "data") } {
                Some(v) => v,
                None => return DdlResult::InvalidArgument,
            }
        };
        with_factory(factory, DdlResult::InvalidArgument, |factory| {
            let result = factory.make_codec(buffer, representation).and_then(|mut codec| {
                let index = codec.resolve(path)?;
                let value = match index.scalar {
                    ScalarType::Bool => Value::Bool(value != 0.0),
                    _ => Value::Float(value),
                };
                codec.set_value(&index, value)
            });
            match result {
                Ok(()) => DdlResult::Ok,
                Err(err) => error::map_codec_error(&err),
            }
        })
    })
}

/// Write defaults and constants into every element of `data`.
///
/// # Safety
/// `factory` must be a valid handle and `data` writable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn ddl_reset_defaults(
    factory: DdlFactoryHandle,
    data: *mut u8,
    len: usize,
    representation: i32,
) -> DdlResult {
    crate::ffi_boundary(DdlResult::Internal, || {
        error::clear_error_state();
        let Some(representation) = representation_arg(representation) else {
            return error::set_invalid_argument("unknown representation");
        };
        let buffer = {
            // SAFETY: We validate pointer/length pairing in helper.
            match unsafe { args::bytes_arg_mut(data, len, "data") } {
                Some(v) => v,
                None => return DdlResult::InvalidArgument,
            }
        };
        with_factory(factory, DdlResult::InvalidArgument, |factory| {
            let result = factory
                .make_codec(buffer, representation)
                .and_then(|mut codec| codec.reset_to_defaults());
            match result {
                Ok(()) => DdlResult::Ok,
                Err(err) => error::map_codec_error(&err),
            }
        })
    })
}
