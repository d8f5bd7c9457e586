use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use strata_shared::coords::GridPos;
use strata_shared::heightfield::Heightfield;
use strata_shared::items::WorldItem;
use tracing::{debug, warn};

use crate::compression::{compress_zstd, decompress_zstd, DEFAULT_ZSTD_LEVEL};

const HASH_EXTENSION: &str = "crc";

/// Per-chunk disk cache: a quantized heightfield file and an item list file,
/// each paired with a CRC32 sidecar.
#[derive(Debug, Clone)]
pub struct ChunkCodec {
    dir: PathBuf,
    lowest: f32,
    highest: f32,
}

impl ChunkCodec {
    pub const HEIGHTFIELD_MAGIC: [u8; 4] = *b"STHF";
    pub const ITEMS_MAGIC: [u8; 4] = *b"STIT";
    const HEIGHTFIELD_WIRE_VERSION: u8 = 1;
    const ITEMS_WIRE_VERSION_UNCOMPRESSED: u8 = 1;
    const ITEMS_WIRE_VERSION_ZSTD: u8 = 2;
    const HEIGHTFIELD_HEADER_LEN: usize = 4 + 1 + 2;

    /// `lowest`/`highest` bound the elevation range mapped onto `i16`.
    pub fn open(dir: impl AsRef<Path>, lowest: f32, highest: f32) -> io::Result<Self> {
        if !(lowest.is_finite() && highest.is_finite() && lowest < highest) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid elevation range [{lowest}, {highest}]"),
            ));
        }
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lowest,
            highest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn heightfield_path(&self, pos: GridPos) -> PathBuf {
        self.dir.join(format!("chunk.{}.{}.hf", pos.x, pos.z))
    }

    pub fn items_path(&self, pos: GridPos) -> PathBuf {
        self.dir.join(format!("chunk.{}.{}.items", pos.x, pos.z))
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        self.heightfield_path(pos).exists()
    }

    pub fn save(&self, pos: GridPos, heightfield: &Heightfield, items: &[WorldItem]) -> io::Result<()> {
        let heightfield_bytes = self.encode_heightfield(heightfield)?;
        let items_bytes = encode_items(items)?;

        write_with_hash(&self.items_path(pos), &items_bytes)?;
        // The heightfield is written last; its presence marks the entry as complete.
        write_with_hash(&self.heightfield_path(pos), &heightfield_bytes)?;
        debug!(
            "Cached chunk {pos} ({} heightfield bytes, {} items)",
            heightfield_bytes.len(),
            items.len()
        );
        Ok(())
    }

    /// `Ok(None)` when nothing is cached; `InvalidData` when a file is corrupt or fails its hash.
    pub fn load(&self, pos: GridPos) -> io::Result<Option<(Heightfield, Vec<WorldItem>)>> {
        let heightfield_path = self.heightfield_path(pos);
        if !heightfield_path.exists() {
            return Ok(None);
        }

        let heightfield_bytes = read_verified(&heightfield_path)?;
        let heightfield = self.decode_heightfield(&heightfield_bytes)?;
        let items_bytes = read_verified(&self.items_path(pos))?;
        let items = decode_items(&items_bytes)?;
        Ok(Some((heightfield, items)))
    }

    /// Deletes both files and their sidecars. Missing files are not an error.
    pub fn remove(&self, pos: GridPos) -> io::Result<()> {
        for path in [self.heightfield_path(pos), self.items_path(pos)] {
            for target in [hash_sidecar_path(&path), path] {
                match fs::remove_file(&target) {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    pub fn quantize(&self, height: f32) -> i16 {
        let t = ((height - self.lowest) / (self.highest - self.lowest)).clamp(0.0, 1.0);
        let scaled = i16::MIN as f32 + t * (i16::MAX as f32 - i16::MIN as f32);
        scaled.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }

    pub fn dequantize(&self, sample: i16) -> f32 {
        let t = (sample as f32 - i16::MIN as f32) / (i16::MAX as f32 - i16::MIN as f32);
        self.lowest + t * (self.highest - self.lowest)
    }

    /// Elevation distance between adjacent quantized levels.
    pub fn quantization_step(&self) -> f32 {
        (self.highest - self.lowest) / (i16::MAX as f32 - i16::MIN as f32)
    }

    pub fn encode_heightfield(&self, heightfield: &Heightfield) -> io::Result<Vec<u8>> {
        let size = u16::try_from(heightfield.size()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("heightfield side {} does not fit in u16", heightfield.size()),
            )
        })?;

        let mut bytes =
            Vec::with_capacity(Self::HEIGHTFIELD_HEADER_LEN + heightfield.samples().len() * 2);
        bytes.extend_from_slice(&Self::HEIGHTFIELD_MAGIC);
        bytes.push(Self::HEIGHTFIELD_WIRE_VERSION);
        bytes.extend_from_slice(&size.to_le_bytes());
        for sample in heightfield.samples() {
            bytes.extend_from_slice(&self.quantize(*sample).to_le_bytes());
        }
        Ok(bytes)
    }

    pub fn decode_heightfield(&self, bytes: &[u8]) -> io::Result<Heightfield> {
        let header = parse_heightfield_header(bytes)?;
        let samples = bytes[Self::HEIGHTFIELD_HEADER_LEN..]
            .chunks_exact(2)
            .map(|pair| self.dequantize(i16::from_le_bytes([pair[0], pair[1]])))
            .collect();
        Heightfield::from_samples(header.size, samples).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "heightfield sample count mismatch")
        })
    }
}

/// Header of a heightfield file, readable without knowing the elevation range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeightfieldHeader {
    pub wire_version: u8,
    pub size: usize,
}

pub fn parse_heightfield_header(bytes: &[u8]) -> io::Result<HeightfieldHeader> {
    if bytes.len() < ChunkCodec::HEIGHTFIELD_HEADER_LEN
        || bytes[..4] != ChunkCodec::HEIGHTFIELD_MAGIC[..]
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid heightfield file magic; expected STHF",
        ));
    }
    let wire_version = bytes[4];
    if wire_version != ChunkCodec::HEIGHTFIELD_WIRE_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported heightfield wire format version {wire_version}; expected 1"),
        ));
    }
    let size = u16::from_le_bytes([bytes[5], bytes[6]]) as usize;
    let expected = ChunkCodec::HEIGHTFIELD_HEADER_LEN + size * size * 2;
    if bytes.len() != expected {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("heightfield file is {} bytes, expected {expected}", bytes.len()),
        ));
    }
    Ok(HeightfieldHeader { wire_version, size })
}

pub fn encode_items(items: &[WorldItem]) -> io::Result<Vec<u8>> {
    let encoded = bincode::serialize(items).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to encode item payload: {err}"),
        )
    })?;
    let compressed = compress_zstd(&encoded, DEFAULT_ZSTD_LEVEL)?;
    let mut bytes = Vec::with_capacity(ChunkCodec::ITEMS_MAGIC.len() + 1 + compressed.len());
    bytes.extend_from_slice(&ChunkCodec::ITEMS_MAGIC);
    bytes.push(ChunkCodec::ITEMS_WIRE_VERSION_ZSTD);
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

pub fn decode_items(bytes: &[u8]) -> io::Result<Vec<WorldItem>> {
    if bytes.len() < ChunkCodec::ITEMS_MAGIC.len() || bytes[..4] != ChunkCodec::ITEMS_MAGIC[..] {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid item file magic; expected STIT",
        ));
    }
    let (wire_version, payload) = bytes[4..].split_first().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "missing item wire format version")
    })?;

    let decoded = match *wire_version {
        ChunkCodec::ITEMS_WIRE_VERSION_UNCOMPRESSED => payload.to_vec(),
        ChunkCodec::ITEMS_WIRE_VERSION_ZSTD => decompress_zstd(payload).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to decompress item payload: {err}"),
            )
        })?,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported item wire format version {other}; expected 1 or 2"),
            ))
        }
    };

    bincode::deserialize(&decoded).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to decode item payload: {err}"),
        )
    })
}

pub fn hash_sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(HASH_EXTENSION);
    PathBuf::from(name)
}

pub fn content_hash(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

fn write_with_hash(path: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::write(path, bytes)?;
    fs::write(hash_sidecar_path(path), format!("{:08x}", content_hash(bytes)))
}

/// Reads a file and checks it against its sidecar hash.
pub fn read_verified(path: &Path) -> io::Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    let sidecar = hash_sidecar_path(path);
    let recorded = fs::read_to_string(&sidecar).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("missing hash sidecar {}: {err}", sidecar.display()),
        )
    })?;
    let recorded = u32::from_str_radix(recorded.trim(), 16).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed hash sidecar {}: {err}", sidecar.display()),
        )
    })?;
    let actual = content_hash(&bytes);
    if recorded != actual {
        warn!(
            "Hash mismatch for {}: recorded {recorded:08x}, actual {actual:08x}",
            path.display()
        );
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("content hash mismatch for {}", path.display()),
        ));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use glam::{Vec2, Vec3};
    use strata_shared::coords::GridPos;
    use strata_shared::heightfield::Heightfield;
    use strata_shared::items::{ModelHandle, WorldItem};
    use strata_shared::settings::ItemCategory;

    use super::{decode_items, encode_items, hash_sidecar_path, parse_heightfield_header, ChunkCodec};

    fn temp_cache_dir(tag: &str) -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("strata_codec_{tag}_{}_{id}", std::process::id()))
    }

    fn sample_items() -> Vec<WorldItem> {
        let mut item = WorldItem {
            rule_index: 2,
            rule_name: "bush_berries".to_owned(),
            model: "static/bush_berries".to_owned(),
            category: ItemCategory::Static,
            grid_location: Vec2::new(10.5, 31.25),
            scale: Vec3::splat(1.2),
            rotation: Vec3::new(0.01, 2.0, 0.03),
            levitation: 0.0,
            content_hash: 0,
            model_handle: Some(ModelHandle(9)),
        };
        item.refresh_content_hash();
        vec![item]
    }

    fn wavy(size: usize) -> Heightfield {
        let samples = (0..size * size)
            .map(|i| ((i as f32) * 0.37).sin() * 180.0)
            .collect();
        Heightfield::from_samples(size, samples).expect("sample count matches")
    }

    #[test]
    fn save_then_load_restores_within_quantization() {
        let dir = temp_cache_dir("roundtrip");
        let codec = ChunkCodec::open(&dir, -200.0, 200.0).expect("open cache");
        let pos = GridPos::new(-4, 7);
        let field = wavy(53);
        let items = sample_items();

        codec.save(pos, &field, &items).expect("save chunk");
        assert!(codec.contains(pos));
        let (loaded_field, loaded_items) = codec.load(pos).expect("load chunk").expect("chunk cached");

        assert_eq!(loaded_field.size(), 53);
        let tolerance = codec.quantization_step();
        for (a, b) in field.samples().iter().zip(loaded_field.samples()) {
            assert!((a - b).abs() <= tolerance, "{a} vs {b}");
        }
        assert_eq!(loaded_items.len(), 1);
        assert_eq!(loaded_items[0].rule_name, "bush_berries");
        assert_eq!(loaded_items[0].grid_location, items[0].grid_location);
        assert_eq!(loaded_items[0].content_hash, items[0].content_hash);
        assert!(loaded_items[0].model_handle.is_none());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_chunk_is_not_found() {
        let dir = temp_cache_dir("missing");
        let codec = ChunkCodec::open(&dir, -200.0, 200.0).expect("open cache");
        assert!(codec.load(GridPos::new(1, 1)).expect("load succeeds").is_none());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn tampered_file_fails_hash_check() {
        let dir = temp_cache_dir("tamper");
        let codec = ChunkCodec::open(&dir, -200.0, 200.0).expect("open cache");
        let pos = GridPos::new(0, 0);
        codec.save(pos, &wavy(53), &sample_items()).expect("save chunk");

        let path = codec.heightfield_path(pos);
        let mut bytes = fs::read(&path).expect("read heightfield");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).expect("rewrite heightfield");

        let err = codec.load(pos).expect_err("hash mismatch must fail");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_sidecar_is_invalid_data() {
        let dir = temp_cache_dir("sidecar");
        let codec = ChunkCodec::open(&dir, -200.0, 200.0).expect("open cache");
        let pos = GridPos::new(3, -3);
        codec.save(pos, &wavy(53), &[]).expect("save chunk");
        fs::remove_file(hash_sidecar_path(&codec.items_path(pos))).expect("remove sidecar");

        let err = codec.load(pos).expect_err("missing sidecar must fail");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

        codec.remove(pos).expect("remove entry");
        assert!(!codec.contains(pos));
        codec.remove(pos).expect("removing twice is fine");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn quantization_maps_range_endpoints() {
        let dir = temp_cache_dir("quant");
        let codec = ChunkCodec::open(&dir, -200.0, 200.0).expect("open cache");
        assert_eq!(codec.quantize(-200.0), i16::MIN);
        assert_eq!(codec.quantize(200.0), i16::MAX);
        assert_eq!(codec.quantize(-500.0), i16::MIN);
        assert_eq!(codec.quantize(900.0), i16::MAX);
        assert_eq!(codec.dequantize(i16::MIN), -200.0);
        assert_eq!(codec.dequantize(i16::MAX), 200.0);
        fs::remove_dir_all(&dir).ok();

        assert!(ChunkCodec::open(&dir, 5.0, 5.0).is_err());
    }

    #[test]
    fn header_and_item_blobs_validate_magic() {
        let dir = temp_cache_dir("header");
        let codec = ChunkCodec::open(&dir, -10.0, 10.0).expect("open cache");
        let bytes = codec.encode_heightfield(&wavy(9)).expect("encode");
        let header = parse_heightfield_header(&bytes).expect("valid header");
        assert_eq!(header.size, 9);
        assert!(parse_heightfield_header(&bytes[..bytes.len() - 1]).is_err());
        assert!(parse_heightfield_header(b"NOPE\x01\x00\x00").is_err());

        let blob = encode_items(&sample_items()).expect("encode items");
        assert_eq!(decode_items(&blob).expect("decode items").len(), 1);
        assert!(decode_items(b"STIT\x07").is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn uncompressed_item_blobs_still_decode() {
        let items = sample_items();
        let mut blob = ChunkCodec::ITEMS_MAGIC.to_vec();
        blob.push(1);
        blob.extend(bincode::serialize(&items).expect("serialize items"));

        let decoded = decode_items(&blob).expect("decode version 1 blob");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].rule_name, items[0].rule_name);
        assert_eq!(decoded[0].grid_location, items[0].grid_location);
        assert_eq!(decoded[0].content_hash, items[0].content_hash);

        let compressed = encode_items(&items).expect("encode items");
        assert_eq!(compressed[4], 2);
        assert_ne!(compressed, blob);
        assert!(decode_items(b"STIT\x01\xff").is_err());
    }
}
