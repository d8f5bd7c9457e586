use std::io;

pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

pub fn compress_zstd(data: &[u8], level: i32) -> io::Result<Vec<u8>> {
    zstd::stream::encode_all(data, level)
}

pub fn decompress_zstd(data: &[u8]) -> io::Result<Vec<u8>> {
    zstd::stream::decode_all(data)
}
