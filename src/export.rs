use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::data::model::Spectrum;

/// Write a result file: `# key: value` metadata lines, then
/// `wavelength,transmission` rows.
pub fn write_result_csv(spectrum: &Spectrum, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for (key, value) in spectrum.metadata.iter() {
        writeln!(out, "# {}: {}", single_line(key), single_line(value))?;
    }

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["wavelength", "transmission"])?;
    for (lambda, value) in spectrum.points() {
        writer.write_record([format!("{lambda:.2}"), format!("{value:.4}")])?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    info!(
        "wrote {} to {} ({} points)",
        spectrum.metadata.get("SampleName").unwrap_or("spectrum"),
        path.display(),
        spectrum.len()
    );
    Ok(())
}

/// Line breaks would end a `# key: value` record early.
fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// File name of a sample's result, `Sample{n}_{name}.csv`.
pub fn sample_file_name(dir: &Path, index: usize, name: &str) -> PathBuf {
    dir.join(format!("Sample{}_{name}.csv", index + 1))
}
