mod algebra;
mod config;
mod data;
mod drift;
mod error;
mod export;
mod instrument;
mod mask;
mod region;
mod samples;
mod state;
mod stitch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use config::RunConfig;
use drift::Correction;
use mask::EdgeShape;
use region::MeasurementMode;
use samples::SampleList;
use state::RunState;

/// Temperature span in °C above which a run is flagged.
const TEMPERATURE_DRIFT_WARNING: f64 = 1.0;

/// Stitch filter-band acquisitions of a photometer run into transmission spectra.
#[derive(Parser)]
#[command(name = "spectral-stitch", version)]
struct Cli {
    /// Raw acquisition file (.parquet, .json or .csv).
    input: PathBuf,

    /// Directory for the result files.
    #[arg(short = 'o', long, default_value = ".")]
    out: PathBuf,

    /// Sample list: one `name;description` per line.
    #[arg(long)]
    samples: Option<PathBuf>,

    /// Run configuration as JSON; command line options are ignored when given.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Band layout: 1 single pass, 2 two pass, 3 three pass, 4 four pass, 5 five pass.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
    mode: u8,

    /// Lower bound of the output window, in nm.
    #[arg(long, default_value_t = 400.0)]
    low: f64,

    /// Upper bound of the output window, in nm.
    #[arg(long, default_value_t = 1000.0)]
    high: f64,

    /// Wavelength step of the output grid, in nm.
    #[arg(long, default_value_t = 1.0)]
    step: f64,

    /// Number of spectra averaged per acquisition.
    #[arg(short = 'a', long, default_value_t = 10)]
    average: u32,

    /// Upper bound for the integration time, in s.
    #[arg(short = 'm', long = "max-int-time", default_value_t = 1.0)]
    max_int_time: f64,

    /// Process blocked and open control measurements.
    #[arg(long)]
    control: bool,

    /// Reference and samples were acquired as ABBA sequences.
    #[arg(long)]
    abba: bool,

    /// Edge shape of the band transitions (step or cubic).
    #[arg(long, default_value = "cubic")]
    edge: EdgeShape,

    /// Width of each band transition ramp, in nm.
    #[arg(long, default_value_t = region::COMMON_TRANSITION_WIDTH)]
    transition_width: f64,

    /// Free text stored with every result.
    #[arg(long, default_value = "---")]
    comment: String,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        if let Some(path) = &self.config {
            return RunConfig::from_json_file(path);
        }
        Ok(RunConfig {
            mode: MeasurementMode::try_from(self.mode).map_err(anyhow::Error::msg)?,
            lower_bound: self.low,
            upper_bound: self.high,
            step: self.step,
            number_of_averages: self.average,
            max_integration_time: self.max_int_time,
            control_measurements: self.control,
            correction: if self.abba {
                Correction::Abba
            } else {
                Correction::Dark
            },
            edge_shape: self.edge,
            transition_width: self.transition_width,
            comment: self.comment.clone(),
        })
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.run_config()?;
    info!("measurement mode: {}", config.mode);
    info!("correction: {}, edges: {}", config.correction, config.edge_shape);
    info!("user comment: {}", config.comment);
    debug!("run configuration:\n{}", config.to_json()?);

    let log = data::loader::load_file(&cli.input)?;
    let samples = match &cli.samples {
        Some(path) => SampleList::from_file(path)?,
        None => SampleList::numbered(log.sample_count()),
    };
    if samples.is_empty() {
        warn!("no samples in {}, only controls can be stitched", cli.input.display());
    }
    for (i, sample) in samples.iter().enumerate() {
        info!("sample {}: {} ({})", i + 1, sample.name, sample.description);
    }

    let mut state = RunState::new(config, samples)?;
    state.ingest(&log)?;

    std::fs::create_dir_all(&cli.out)
        .with_context(|| format!("creating output directory {}", cli.out.display()))?;
    let written = write_results(&state, &cli.out)?;

    if let Some(temps) = state.temperature.log() {
        info!("instrument temperature: {temps}");
        if temps.range() > TEMPERATURE_DRIFT_WARNING {
            warn!(
                "instrument temperature drifted by {:.2} °C during the run",
                temps.range()
            );
        }
    }
    info!("run complete, {written} result file(s) in {}", cli.out.display());
    Ok(())
}

/// Write one file per sample and control; a sample that cannot be stitched
/// is reported and skipped.
fn write_results(state: &RunState, dir: &Path) -> Result<usize> {
    let mut written = 0;
    for (index, sample) in state.samples.iter().enumerate() {
        match state.sample_transmission(index) {
            Ok(Some(spectrum)) => {
                export::write_result_csv(&spectrum, &export::sample_file_name(dir, index, &sample.name))?;
                written += 1;
            }
            Ok(None) => warn!("sample {}: no spectral region inside the output window", index + 1),
            Err(e) => warn!("sample {} ({}): {e:#}", index + 1, sample.name),
        }
    }

    if let Some((blocked, open)) = state.control_transmissions()? {
        for (spectrum, file) in [
            (blocked, "SampleControl_Blocked.csv"),
            (open, "SampleControl_Open.csv"),
        ] {
            if let Some(spectrum) = spectrum {
                export::write_result_csv(&spectrum, &dir.join(file))?;
                written += 1;
            }
        }
    }
    Ok(written)
}
