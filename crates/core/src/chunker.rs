//! Splits audio buffers into fixed-size frames.

use bytes::Bytes;

/// Yields `frame_size`-byte slices of `buffer`; the last one may be shorter.
///
/// A `frame_size` of zero is treated as one byte per frame.
pub fn chunk(buffer: &[u8], frame_size: usize) -> std::slice::Chunks<'_, u8> {
    buffer.chunks(frame_size.max(1))
}

/// Same as [`chunk`] but yields reference-counted views into `buffer`
/// instead of borrowed slices, so frames can outlive the caller's stack.
pub fn chunk_bytes(buffer: Bytes, frame_size: usize) -> impl Iterator<Item = Bytes> {
    let frame_size = frame_size.max(1);
    let len = buffer.len();
    (0..len)
        .step_by(frame_size)
        .map(move |start| buffer.slice(start..(start + frame_size).min(len)))
}
