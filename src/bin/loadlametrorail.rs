use clap::Parser;
use std::path::Path;

use metro_rail_service::load::pipeline::{self, LoadOptions};
use metro_rail_service::load::source;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory (or zip archive) holding the agency layers and crosswalk
    #[arg(long)]
    source_path: String,

    #[arg(long)]
    db_path: String,

    /// Simplification tolerance for display geometry, in Web Mercator meters
    #[arg(long, default_value_t = 500.0)]
    simplify_tolerance: f64,

    /// Endpoint snapping distance for segment stitching, in source feet
    #[arg(long, default_value_t = 1.0)]
    stitch_tolerance: f64,

    /// Print facts about the source layers instead of loading them
    #[arg(long)]
    describe: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.describe {
        let layers = source::describe_source(Path::new(&args.source_path)).unwrap();
        for layer in layers {
            println!("{}", layer.file);
            println!("  Fields: {:?}", layer.properties);
            println!("  Number of features: {}", layer.features);
            println!("  Geometry Type: {}", layer.geometry_type);
        }
        return;
    }

    println!("Loading data for L.A. Metro Rail lines");
    let options = LoadOptions {
        simplify_tolerance: args.simplify_tolerance,
        stitch_tolerance: args.stitch_tolerance,
    };
    let summary =
        pipeline::load_all(Path::new(&args.source_path), &args.db_path, &options).unwrap();
    summary.print_stats();
    println!("Successfully loaded data");
}
