//! Stream compression for content, font and image streams

use std::borrow::Cow;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Zlib-compress `data` for a `/FlateDecode` stream
pub fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Stream payload plus whether it needs a `/FlateDecode` filter entry
pub struct EncodedStream<'a> {
    pub data: Cow<'a, [u8]>,
    pub deflated: bool,
}

/// Compress `data` when `enabled`, otherwise pass it through untouched
pub fn encode_stream(data: &[u8], enabled: bool) -> std::io::Result<EncodedStream<'_>> {
    if enabled {
        Ok(EncodedStream {
            data: Cow::Owned(deflate(data)?),
            deflated: true,
        })
    } else {
        Ok(EncodedStream {
            data: Cow::Borrowed(data),
            deflated: false,
        })
    }
}
