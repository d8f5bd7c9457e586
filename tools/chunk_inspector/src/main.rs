use std::env;
use std::path::{Path, PathBuf};

use strata_persist::codec::{decode_items, parse_heightfield_header, read_verified, ChunkCodec};

const USAGE: &str = "Usage: chunk_inspector <path/to/chunk.X.Z.hf> [--range <lowest> <highest>]";
const PREVIEW_STRIDE: usize = 8;

fn main() {
    let mut path = None;
    let mut range = (-200.0_f32, 200.0_f32);

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--range" => {
                let (Some(lowest), Some(highest)) = (args.next(), args.next()) else {
                    eprintln!("--range expects two numeric arguments");
                    std::process::exit(2);
                };
                match (lowest.parse::<f32>(), highest.parse::<f32>()) {
                    (Ok(lowest), Ok(highest)) => range = (lowest, highest),
                    _ => {
                        eprintln!("invalid range '{lowest} {highest}'");
                        std::process::exit(2);
                    }
                }
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return;
            }
            other if path.is_none() => path = Some(PathBuf::from(other)),
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let Some(path) = path else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    if let Err(err) = run(&path, range) {
        eprintln!("chunk_inspector error: {err}");
        std::process::exit(1);
    }
}

fn run(path: &Path, (lowest, highest): (f32, f32)) -> Result<(), String> {
    let bytes = read_verified(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let header = parse_heightfield_header(&bytes).map_err(|err| err.to_string())?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let codec = ChunkCodec::open(dir, lowest, highest).map_err(|err| err.to_string())?;
    let heightfield = codec.decode_heightfield(&bytes).map_err(|err| err.to_string())?;

    println!("Heightfield: {}", path.display());
    println!("Magic: {:?}", String::from_utf8_lossy(&ChunkCodec::HEIGHTFIELD_MAGIC));
    println!("Wire version: {}", header.wire_version);
    println!("Side: {} ({} samples)", header.size, heightfield.samples().len());
    println!("Quantization step: {:.4}", codec.quantization_step());
    match heightfield.min_max() {
        Some((min, max)) => println!("Height range: {min:.2} .. {max:.2}"),
        None => println!("Height range: no defined samples"),
    }

    println!("Preview (every {PREVIEW_STRIDE}th sample):");
    for y in (0..header.size).step_by(PREVIEW_STRIDE) {
        let row: Vec<String> = (0..header.size)
            .step_by(PREVIEW_STRIDE)
            .map(|x| format!("{:>8.1}", heightfield.at(x, y)))
            .collect();
        println!("  {}", row.join(""));
    }

    let items_path = path.with_extension("items");
    if !items_path.exists() {
        println!("Items: no item file at {}", items_path.display());
        return Ok(());
    }
    let item_bytes = read_verified(&items_path)
        .map_err(|err| format!("failed to read {}: {err}", items_path.display()))?;
    let items = decode_items(&item_bytes).map_err(|err| err.to_string())?;

    println!("Items: {}", items.len());
    for item in &items {
        let hash_state = if item.content_hash == item.compute_content_hash() {
            "ok"
        } else {
            "MISMATCH"
        };
        println!(
            "  {} ({:?}) @ ({:.2}, {:.2}) scale {:.2} levitation {:.2} hash {:08x} {hash_state}",
            item.rule_name,
            item.category,
            item.grid_location.x,
            item.grid_location.y,
            item.scale.x,
            item.levitation,
            item.content_hash,
        );
    }

    Ok(())
}
