//! `atlas-run`: execute one prospectivity run from the command line.
//!
//! Reads an AOI (GeoJSON) and an optional parameter file, runs the pipeline
//! against synthetic or file-backed data and writes the artifacts as JSON and
//! GeoJSON into the output directory.

mod files;
mod output;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};

use atlas_core::geo::geojson::parse_first_polygon;
use atlas_core::params::SyntheticGrid;
use atlas_core::pipeline::StepState;
use atlas_core::{
    Aoi, DataSources, Mode, Pipeline, ProgressObserver, RunParameters, RunRequest, Settings, Step,
};

use files::FileSource;
use output::DirectorySink;

#[derive(Parser, Debug)]
#[command(name = "atlas-run", about = "Run the prospectivity pipeline over one area of interest")]
struct Args {
    /// AOI as a GeoJSON Polygon, Feature or FeatureCollection.
    #[arg(short, long)]
    aoi: PathBuf,

    /// Scoring mode: coastal or hardrock.
    #[arg(short, long, default_value = "coastal")]
    mode: String,

    /// Run parameters as JSON. Defaults apply to every missing key.
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Use synthetic data of the given grid size, e.g. `256x256`.
    #[arg(long, value_parser = parse_grid)]
    synthetic: Option<SyntheticGrid>,

    /// Directory with `scenes.json`, `dem.json` and `vectors.json`.
    #[arg(short, long)]
    data: Option<PathBuf>,

    #[arg(long, default_value = "run")]
    run_id: String,

    /// Where the artifacts are written.
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_grid(s: &str) -> std::result::Result<SyntheticGrid, String> {
    let (w, h) = s.split_once(['x', 'X']).ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
    let dim = |v: &str| v.trim().parse::<usize>().map_err(|e| format!("bad dimension `{v}`: {e}"));
    Ok(SyntheticGrid { width: dim(w)?, height: dim(h)? })
}

/// Logs each step transition.
struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_step(&self, step: Step, state: StepState) {
        info!(%step, %state, "progress");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env();

    let aoi_text = fs::read_to_string(&args.aoi).with_context(|| format!("reading {}", args.aoi.display()))?;
    let aoi_doc: serde_json::Value = serde_json::from_str(&aoi_text).context("AOI is not valid JSON")?;
    let aoi = Aoi::new(parse_first_polygon(&aoi_doc)?).context("invalid AOI")?;

    let mode: Mode = args.mode.parse()?;

    let mut params = match &args.params {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let doc: serde_json::Value = serde_json::from_str(&text).context("parameters are not valid JSON")?;
            RunParameters::from_json(&doc)?
        }
        None => RunParameters::default(),
    };
    if args.synthetic.is_some() {
        params.synthetic = args.synthetic;
    }

    let files = match (&args.data, params.synthetic) {
        (Some(dir), _) => FileSource::load(dir)?,
        (None, Some(_)) => FileSource::default(),
        (None, None) => bail!("either --data or --synthetic is required"),
    };

    fs::create_dir_all(&args.output).with_context(|| format!("creating {}", args.output.display()))?;
    let sink = DirectorySink::new(&args.output);
    let sources = DataSources::new(&files).with_sink(&sink);

    let request = RunRequest { run_id: args.run_id.clone(), aoi, mode, params };
    info!(run_id = %request.run_id, %mode, area_km2 = request.aoi.area_km2(), "starting run");
    let result = Pipeline::new(settings).execute(&request, &sources, &LogProgress);

    let path = args.output.join("result.json");
    let summary = output::summary(&result);
    fs::write(&path, serde_json::to_string_pretty(&summary)?).with_context(|| format!("writing {}", path.display()))?;

    match result.failure() {
        Some(f) => bail!("run failed: {}", f.error),
        None => {
            info!(output = %args.output.display(), "done");
            Ok(())
        }
    }
}
