use anyhow::{Context, Result};
use clap::Parser;
use edgeweave::config::{
    DEFAULT_ATTRIBUTE_BUFFER, DEFAULT_CONNECTION_TOLERANCE, DEFAULT_INTERMEDIATE_CRS,
    DEFAULT_MIN_EDGE_LENGTH, DEFAULT_OVERSHOOT,
};
use edgeweave::{ConversionConfig, Crs, ExportOptions, convert_ways_file, write_result};
use log::info;
use std::path::PathBuf;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GeoJSON file of ways (lines and optional area polygons)
    input: PathBuf,

    /// Where to write the edges. Nodes and orphans are written next to it
    /// as <name>_vertices and <name>_orphans.
    output: PathBuf,

    /// Largest gap a dangling line end is extended across, in intermediate CRS units
    #[arg(long, env = "WEAVE_CONNECTION_TOLERANCE", default_value_t = DEFAULT_CONNECTION_TOLERANCE)]
    connection_tolerance: f64,

    /// Edges shorter than this are dropped
    #[arg(long, env = "WEAVE_MIN_EDGE_LENGTH", default_value_t = DEFAULT_MIN_EDGE_LENGTH)]
    min_edge_length: f64,

    /// Warn about orphan lines instead of failing
    #[arg(long, env = "WEAVE_ALLOW_ORPHANS")]
    allow_orphans: bool,

    #[arg(long, env = "WEAVE_INTERMEDIATE_CRS", default_value = DEFAULT_INTERMEDIATE_CRS)]
    intermediate_crs: String,

    /// CRS of the input, for files that do not declare one
    #[arg(long, env = "WEAVE_INPUT_CRS")]
    input_crs: Option<String>,

    #[arg(long, env = "WEAVE_OVERSHOOT", default_value_t = DEFAULT_OVERSHOOT)]
    overshoot: f64,

    #[arg(long, env = "WEAVE_ATTRIBUTE_BUFFER", default_value_t = DEFAULT_ATTRIBUTE_BUFFER)]
    attribute_buffer: f64,

    /// Also write the node table
    #[arg(long, env = "WEAVE_WRITE_NODES")]
    write_nodes: bool,

    /// Also write the orphan lines
    #[arg(long, env = "WEAVE_WRITE_ORPHANS")]
    write_orphans: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let input_crs = args
        .input_crs
        .as_deref()
        .map(str::parse::<Crs>)
        .transpose()
        .context("invalid --input-crs")?;

    let config = ConversionConfig {
        connection_tolerance: args.connection_tolerance,
        min_edge_length: args.min_edge_length,
        suppress_orphans: !args.allow_orphans,
        intermediate_crs: args.intermediate_crs,
        overshoot: args.overshoot,
        attribute_buffer: args.attribute_buffer,
    };

    let result = convert_ways_file(&args.input, input_crs.as_ref(), &config)
        .with_context(|| format!("failed to convert {}", args.input.display()))?;

    let written = write_result(
        &result,
        &args.output,
        ExportOptions {
            write_nodes: args.write_nodes,
            write_orphans: args.write_orphans,
        },
    )?;

    info!(
        "Repair: {} invalid, {} repaired, {} dropped",
        result.repair.invalid, result.repair.repaired, result.repair.dropped
    );
    println!(
        "Wrote {} edges to {}",
        result.edges.len(),
        written.edges.display()
    );

    Ok(())
}
