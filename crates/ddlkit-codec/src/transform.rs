use bytes::BytesMut;
use ddlkit_layout::Representation;
use tracing::trace;

use crate::access::{read_value, write_value};
use crate::codec::Decoder;
use crate::error::Result;

/// Copy the content of `decoder` into a new buffer of the other (or the
/// same) representation.
pub fn transform(decoder: &Decoder<'_>, representation: Representation) -> Result<BytesMut> {
    let size = decoder.buffer_size(representation);
    let mut out = BytesMut::zeroed(size);
    for index in decoder.elements() {
        let value = read_value(decoder.buffer(), index, decoder.representation())?;
        write_value(&mut out, index, representation, value)?;
    }
    trace!(
        from = ?decoder.representation(),
        to = ?representation,
        size,
        "buffer transformed"
    );
    Ok(out)
}
