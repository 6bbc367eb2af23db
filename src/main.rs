use std::fs::{self, File};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use memmap2::Mmap;
use rayon::prelude::*;
use tracing::{info, warn};

use bglunpack::bgl::placement::{AglAdjust, PlacementConfig, ScaleBias};
use bglunpack::error::IResult;
use bglunpack::export::{self, JoinOutput};
use bglunpack::geo::{self, NullElevation};
use bglunpack::glb::RepackOptions;
use bglunpack::pipeline::{ScanConfig, ScanResult, scan_file};

/// Extract scenery placements and 3D models from BGL scenery databases.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory scanned recursively for .bgl scenery files
    input: PathBuf,

    /// Output directory for per-tile scenery
    output: PathBuf,

    /// Write everything into the output directory root instead of per-tile
    /// subdirectories
    #[clap(long)]
    flat: bool,

    /// Keep vendor extension subtrees in transcoded assets
    #[clap(long)]
    keep_extensions: bool,

    /// Store the placement scale field as-is instead of raw + 1
    #[clap(long)]
    scale_raw: bool,

    /// When to add terrain elevation to placement altitudes
    #[clap(long, value_enum, default_value_t = AglArg::Absent)]
    agl: AglArg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum AglArg {
    /// Adjust when the IsAboveAgl flag is absent
    Absent,
    /// Adjust when the IsAboveAgl flag is set
    Set,
    /// Never adjust
    Never,
}

fn scan_config(args: &Args) -> ScanConfig {
    ScanConfig {
        placement: PlacementConfig {
            scale_bias: if args.scale_raw {
                ScaleBias::Raw
            } else {
                ScaleBias::RawPlusOne
            },
            agl: match args.agl {
                AglArg::Absent => AglAdjust::WhenFlagAbsent,
                AglArg::Set => AglAdjust::WhenFlagSet,
                AglArg::Never => AglAdjust::Never,
            },
        },
        repack: RepackOptions {
            strip_vendor_extensions: !args.keep_extensions,
        },
    }
}

fn scan_one(path: &PathBuf, config: &ScanConfig) -> Option<ScanResult> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to open file, skipping");
            return None;
        }
    };
    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(mmap) => mmap,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to map file, skipping");
            return None;
        }
    };
    match scan_file(&mmap, config, &NullElevation) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unparsable file");
            None
        }
    }
}

fn write_output(output: &JoinOutput, out_dir: &PathBuf, flat: bool) -> IResult<()> {
    fs::create_dir_all(out_dir)?;
    for file in &output.files {
        fs::write(out_dir.join(&file.name), &file.data)?;
    }
    for (tile, bucket) in &output.tiles {
        let dir = if flat {
            out_dir.clone()
        } else {
            out_dir.join(geo::tile_directory(bucket.latitude, bucket.longitude))
        };
        fs::create_dir_all(&dir)?;
        let mut contents = bucket.lines.join("\n");
        contents.push('\n');
        fs::write(dir.join(format!("{tile}.stg")), contents)?;
    }
    Ok(())
}

fn run(args: Args) -> IResult<ExitCode> {
    let pattern = args.input.join("**").join("*.bgl");
    let paths: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .map_err(|e| std::io::Error::other(e.to_string()))?
        .filter_map(Result::ok)
        .collect();
    info!(count = paths.len(), input = %args.input.display(), "found scenery files");
    if paths.is_empty() {
        warn!("no .bgl files found under input directory");
        return Ok(ExitCode::FAILURE);
    }

    let config = scan_config(&args);
    let results: Vec<ScanResult> = paths
        .par_iter()
        .filter_map(|path| scan_one(path, &config))
        .collect();
    let parsed = results.len();

    let mut merged = ScanResult::default();
    for result in results {
        merged.merge(result);
    }
    info!(
        files = parsed,
        placements = merged.placement_count(),
        models = merged.models.len(),
        "scan complete"
    );

    let output = export::join(&merged.models, &merged.placements);
    write_output(&output, &args.output, args.flat)?;
    info!(out = %args.output.display(), "wrote output");

    if parsed == 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            warn!(error = %e, "conversion failed");
            ExitCode::FAILURE
        }
    }
}
