//! Bit and byte level element access shared by decoders, codecs and the
//! mapping runtime.

use ddlkit_layout::{Representation, ScalarType};
use ddlkit_model::ByteOrder;

use crate::error::{CodecError, Result};
use crate::index::CodecIndex;
use crate::value::{CodecScalar, Value};

fn ensure_fits(buffer_len: usize, index: &CodecIndex, representation: Representation) -> Result<()> {
    let required = index.end(representation);
    if required > buffer_len {
        return Err(CodecError::BufferTooSmall {
            required,
            actual: buffer_len,
        });
    }
    Ok(())
}

/// Stored bits of an element, zero extended.
pub fn read_raw(buffer: &[u8], index: &CodecIndex, representation: Representation) -> Result<u64> {
    ensure_fits(buffer.len(), index, representation)?;
    Ok(match representation {
        Representation::Serialized => {
            let bits = index.serialized_bit_count;
            let raw = read_bits(buffer, index.serialized_bit_offset, bits);
            match index.byte_order {
                ByteOrder::BigEndian if bits % 8 == 0 && bits > 8 => swap_low_bytes(raw, bits),
                _ => raw,
            }
        }
        Representation::Deserialized => {
            let start = index.deserialized_offset;
            read_native(&buffer[start..start + index.deserialized_size])
        }
    })
}

/// Store the low bits of `raw` into an element.
pub fn write_raw(
    buffer: &mut [u8],
    index: &CodecIndex,
    representation: Representation,
    raw: u64,
) -> Result<()> {
    ensure_fits(buffer.len(), index, representation)?;
    match representation {
        Representation::Serialized => {
            let bits = index.serialized_bit_count;
            let raw = match index.byte_order {
                ByteOrder::BigEndian if bits % 8 == 0 && bits > 8 => swap_low_bytes(raw, bits),
                _ => raw,
            };
            write_bits(buffer, index.serialized_bit_offset, bits, raw);
        }
        Representation::Deserialized => {
            let start = index.deserialized_offset;
            write_native(&mut buffer[start..start + index.deserialized_size], raw);
        }
    }
    Ok(())
}

pub fn read_value(buffer: &[u8], index: &CodecIndex, representation: Representation) -> Result<Value> {
    let raw = read_raw(buffer, index, representation)?;
    let bits = match representation {
        Representation::Serialized => index.serialized_bit_count,
        Representation::Deserialized => index.deserialized_size as u64 * 8,
    };
    Ok(decode(index.scalar, raw, bits))
}

/// Write `value` after casting it to the element type.
pub fn write_value(
    buffer: &mut [u8],
    index: &CodecIndex,
    representation: Representation,
    value: Value,
) -> Result<()> {
    let cast = value.cast(index.scalar).ok_or_else(|| CodecError::TypeMismatch {
        path: index.path.clone(),
        reason: format!("cannot store {value} in a {} element", index.scalar),
    })?;
    write_raw(buffer, index, representation, encode(index.scalar, cast))
}

/// Whether `index` is stored exactly like a native `T` in `representation`.
pub(crate) fn is_native<T: CodecScalar>(index: &CodecIndex, representation: Representation) -> bool {
    if index.enum_name.is_some() || index.scalar != T::SCALAR {
        return false;
    }
    match representation {
        Representation::Deserialized => index.deserialized_size == std::mem::size_of::<T>(),
        Representation::Serialized => {
            index.serialized_bit_offset % 8 == 0
                && index.serialized_bit_count == std::mem::size_of::<T>() as u64 * 8
                && (index.byte_order == ByteOrder::native() || index.serialized_bit_count == 8)
        }
    }
}

/// Byte range of a natively stored element.
pub(crate) fn native_range(index: &CodecIndex, representation: Representation) -> std::ops::Range<usize> {
    match representation {
        Representation::Deserialized => {
            index.deserialized_offset..index.deserialized_offset + index.deserialized_size
        }
        Representation::Serialized => {
            let start = (index.serialized_bit_offset / 8) as usize;
            start..start + (index.serialized_bit_count / 8) as usize
        }
    }
}

pub fn read<T: CodecScalar>(buffer: &[u8], index: &CodecIndex, representation: Representation) -> Result<T> {
    if is_native::<T>(index, representation) {
        ensure_fits(buffer.len(), index, representation)?;
        return Ok(T::read_ne(&buffer[native_range(index, representation)]));
    }
    let value = read_value(buffer, index, representation)?;
    T::from_value(value).ok_or_else(|| CodecError::TypeMismatch {
        path: index.path.clone(),
        reason: format!("cannot read a {} element as {}", index.scalar, T::SCALAR),
    })
}

pub fn write<T: CodecScalar>(
    buffer: &mut [u8],
    index: &CodecIndex,
    representation: Representation,
    value: T,
) -> Result<()> {
    if is_native::<T>(index, representation) {
        ensure_fits(buffer.len(), index, representation)?;
        value.write_ne(&mut buffer[native_range(index, representation)]);
        return Ok(());
    }
    write_value(buffer, index, representation, value.into_value())
}

fn decode(scalar: ScalarType, raw: u64, bits: u64) -> Value {
    match scalar {
        ScalarType::Bool => Value::Bool(raw != 0),
        ScalarType::Float32 => Value::Float(f64::from(f32::from_bits(raw as u32))),
        ScalarType::Float64 => Value::Float(f64::from_bits(raw)),
        scalar if scalar.is_signed() || scalar == ScalarType::Char => {
            let width = bits.min(u64::from(scalar.bit_size())).clamp(1, 64) as u32;
            let shift = 64 - width;
            Value::Int(((raw << shift) as i64) >> shift)
        }
        _ => Value::UInt(raw),
    }
}

fn encode(scalar: ScalarType, value: Value) -> u64 {
    match (scalar, value) {
        (ScalarType::Float32, v) => u64::from((v.as_f64() as f32).to_bits()),
        (ScalarType::Float64, v) => v.as_f64().to_bits(),
        (_, v) => v.as_u64(),
    }
}

fn read_bits(buffer: &[u8], bit_offset: u64, bits: u64) -> u64 {
    if bit_offset % 8 == 0 && bits % 8 == 0 {
        let start = (bit_offset / 8) as usize;
        return buffer[start..start + (bits / 8) as usize]
            .iter()
            .rev()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    }
    let mut value = 0u64;
    for bit in 0..bits {
        let position = bit_offset + bit;
        let set = (buffer[(position / 8) as usize] >> (position % 8)) & 1;
        value |= u64::from(set) << bit;
    }
    value
}

fn write_bits(buffer: &mut [u8], bit_offset: u64, bits: u64, value: u64) {
    for bit in 0..bits {
        let position = bit_offset + bit;
        let byte = &mut buffer[(position / 8) as usize];
        let mask = 1u8 << (position % 8);
        if (value >> bit) & 1 == 1 {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
}

fn swap_low_bytes(value: u64, bits: u64) -> u64 {
    value.swap_bytes() >> (64 - bits)
}

fn read_native(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    let len = bytes.len().min(8);
    if cfg!(target_endian = "little") {
        raw[..len].copy_from_slice(&bytes[..len]);
        u64::from_le_bytes(raw)
    } else {
        raw[8 - len..].copy_from_slice(&bytes[..len]);
        u64::from_be_bytes(raw)
    }
}

fn write_native(out: &mut [u8], value: u64) {
    let len = out.len().min(8);
    if cfg!(target_endian = "little") {
        out[..len].copy_from_slice(&value.to_le_bytes()[..len]);
    } else {
        out[..len].copy_from_slice(&value.to_be_bytes()[8 - len..]);
    }
}
