use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeListArray, ListArray,
};
use arrow::datatypes::DataType;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Acquisition, AcquisitionLog, MetadataValue, RowMetadata, Spectrum, Target};
use crate::drift::Phase;
use crate::region::FilterBand;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a run's raw acquisitions from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – Parquet file with `x` and `y` list columns (recommended)
/// * `.json`    – `[{ "x": [...], "y": [...], ...meta }, ...]`
/// * `.csv`     – columns `x` and `y` containing semicolon-separated floats
///
/// Every row is one acquisition. Metadata columns read:
/// `band`, `target` (`reference`, `dark`, `sample`, `blocked`, `open`),
/// `sample` (0-based, for sample rows), and the optional `phase`
/// (`a1`, `b1`, `b2`, `a2`), `temperature` and `integration_time`.
pub fn load_file(path: &Path) -> Result<AcquisitionLog> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let rows = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    let acquisitions = rows
        .into_iter()
        .enumerate()
        .map(|(row, (x, y, metadata))| {
            acquisition_from_row(x, y, &metadata).with_context(|| format!("Row {row}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let log = AcquisitionLog::new(acquisitions);
    info!(
        "loaded {} acquisitions ({} bands, {} samples) from {}",
        log.len(),
        log.bands().len(),
        log.sample_count(),
        path.display()
    );
    Ok(log)
}

type Row = (Vec<f64>, Vec<f64>, RowMetadata);

// ---------------------------------------------------------------------------
// Row interpretation
// ---------------------------------------------------------------------------

fn acquisition_from_row(x: Vec<f64>, y: Vec<f64>, metadata: &RowMetadata) -> Result<Acquisition> {
    let band: FilterBand = metadata
        .get("band")
        .and_then(MetadataValue::as_str)
        .context("missing 'band' column")?
        .parse()
        .map_err(anyhow::Error::msg)?;

    let target_name = metadata
        .get("target")
        .and_then(MetadataValue::as_str)
        .context("missing 'target' column")?;
    let target = match target_name.trim().to_ascii_lowercase().as_str() {
        "reference" => Target::Reference,
        "dark" => Target::Dark,
        "blocked" => Target::Blocked,
        "open" => Target::Open,
        "sample" => Target::Sample(
            metadata
                .get("sample")
                .and_then(MetadataValue::as_index)
                .context("sample row without a valid 'sample' index")?,
        ),
        other => bail!("unknown target '{other}'"),
    };

    let phase = match metadata.get("phase") {
        None | Some(MetadataValue::Null) => None,
        Some(MetadataValue::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some(
            value
                .to_string()
                .parse::<Phase>()
                .map_err(anyhow::Error::msg)?,
        ),
    };

    let mut spectrum = Spectrum::new(x, y)?;
    for (key, value) in metadata.iter() {
        if *value != MetadataValue::Null {
            spectrum.metadata.insert(key.clone(), value.to_string());
        }
    }

    Ok(Acquisition {
        band,
        target,
        phase,
        temperature: metadata.get("temperature").and_then(MetadataValue::as_f64),
        integration_time: metadata
            .get("integration_time")
            .and_then(MetadataValue::as_f64),
        spectrum,
    })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   {
///     "x": [350.0, 350.5, ...],
///     "y": [812.0, 815.5, ...],
///     "band": "violet",
///     "target": "sample",
///     "sample": 0
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<Row>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let x = json_array_to_f64(obj.get("x"), i, "x")?;
        let y = json_array_to_f64(obj.get("y"), i, "y")?;

        if x.len() != y.len() {
            bail!("Row {i}: x has {} values but y has {}", x.len(), y.len());
        }

        let mut metadata = RowMetadata::new();
        for (key, val) in obj {
            if key == "x" || key == "y" {
                continue;
            }
            metadata.insert(key.clone(), json_to_metadata(val));
        }

        rows.push((x, y, metadata));
    }

    Ok(rows)
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with column names.
/// `x` and `y` columns contain semicolon-separated floats:
///   `"350.0;350.5;351.0"`, `"812.0;815.5;820.1"`
/// All other columns are treated as metadata.
fn load_csv(path: &Path) -> Result<Vec<Row>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let x_idx = headers
        .iter()
        .position(|h| h == "x")
        .context("CSV missing 'x' column")?;
    let y_idx = headers
        .iter()
        .position(|h| h == "y")
        .context("CSV missing 'y' column")?;

    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let x = parse_semicolon_floats(record.get(x_idx).unwrap_or(""), row_no, "x")?;
        let y = parse_semicolon_floats(record.get(y_idx).unwrap_or(""), row_no, "y")?;

        if x.len() != y.len() {
            bail!(
                "CSV row {row_no}: x has {} values but y has {}",
                x.len(),
                y.len()
            );
        }

        let mut metadata = RowMetadata::new();
        for (col_idx, value) in record.iter().enumerate() {
            if col_idx == x_idx || col_idx == y_idx {
                continue;
            }
            metadata.insert(headers[col_idx].clone(), guess_metadata_type(value));
        }

        rows.push((x, y, metadata));
    }

    Ok(rows)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of acquisitions.
///
/// Expected schema:
/// - `x`: List<Float64> or LargeList<Float64> – wavelength arrays
/// - `y`: List<Float64> or LargeList<Float64> – intensity arrays
/// - Any other columns are treated as metadata (strings, ints, floats, bools)
fn load_parquet(path: &Path) -> Result<Vec<Row>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();
        debug!("parquet batch with {n_rows} rows");

        let x_idx = schema
            .index_of("x")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'x' column"))?;
        let y_idx = schema
            .index_of("y")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'y' column"))?;

        let x_col = batch.column(x_idx);
        let y_col = batch.column(y_idx);

        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != x_idx && *i != y_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        for row in 0..n_rows {
            let x = extract_f64_list(x_col, row)
                .with_context(|| format!("Row {row}: failed to read 'x'"))?;
            let y = extract_f64_list(y_col, row)
                .with_context(|| format!("Row {row}: failed to read 'y'"))?;

            if x.len() != y.len() {
                bail!("Row {row}: x has {} values but y has {}", x.len(), y.len());
            }

            let mut metadata = RowMetadata::new();
            for (col_idx, col_name) in &meta_cols {
                let value = extract_metadata_value(batch.column(*col_idx), row)?;
                metadata.insert(col_name.clone(), value);
            }

            rows.push((x, y, metadata));
        }
    }

    Ok(rows)
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> Result<MetadataValue> {
    if col.is_null(row) {
        return Ok(MetadataValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => {
            MetadataValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("expected Int32Array")?;
            MetadataValue::Integer(arr.value(row) as i64)
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("expected Int64Array")?;
            MetadataValue::Integer(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            MetadataValue::Float(arr.value(row) as f64)
        }
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            MetadataValue::Float(arr.value(row))
        }
        DataType::Boolean => {
            let arr = col
                .as_any()
                .downcast_ref::<BooleanArray>()
                .context("expected BooleanArray")?;
            MetadataValue::Bool(arr.value(row))
        }
        other => MetadataValue::String(format!("{other:?}")),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("spectral-stitch-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_json_acquisitions() {
        let path = temp_file(
            "run.json",
            r#"[
                {"x": [400, 401, 402], "y": [10, 11, 12], "band": "violet", "target": "reference", "temperature": 24.5},
                {"x": [400, 401, 402], "y": [1, 1, 1], "band": "violet", "target": "dark"},
                {"x": [400, 401, 402], "y": [5, 6, 7], "band": "violet", "target": "sample", "sample": 2, "phase": "a1"}
            ]"#,
        );
        let log = load_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(log.len(), 3);
        assert_eq!(log.sample_count(), 3);
        assert_eq!(log.bands(), vec![FilterBand::Violet]);
        assert_eq!(log.temperatures(), vec![24.5]);

        let sample = &log.acquisitions[2];
        assert_eq!(sample.target, Target::Sample(2));
        assert_eq!(sample.phase, Some(Phase::A1));
        assert_eq!(sample.spectrum.signal, vec![5.0, 6.0, 7.0]);
        assert_eq!(sample.spectrum.metadata.get("band"), Some("violet"));
    }

    #[test]
    fn loads_csv_acquisitions() {
        let path = temp_file(
            "run.csv",
            "x,y,band,target,sample\n\
             400;401,10;12,nir,sample,0\n\
             400;401,3;3,nir,blocked,\n",
        );
        let log = load_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(log.acquisitions[0].target, Target::Sample(0));
        assert_eq!(log.acquisitions[1].target, Target::Blocked);
        assert_eq!(log.acquisitions[1].phase, None);
        assert_eq!(log.wavelength_range(), Some((400.0, 401.0)));
    }

    #[test]
    fn metadata_follows_column_order() {
        let csv_path = temp_file(
            "order.csv",
            "target,x,sample,band,y,operator
             sample,400;401,0,red,10;12,jd
",
        );
        let json_path = temp_file(
            "order.json",
            r#"[{"target": "sample", "x": [400, 401], "sample": 0, "band": "red", "y": [10, 12], "operator": "jd"}]"#,
        );
        for path in [&csv_path, &json_path] {
            let log = load_file(path).unwrap();
            let keys: Vec<_> = log.acquisitions[0]
                .spectrum
                .metadata
                .iter()
                .map(|(k, _)| k)
                .collect();
            assert_eq!(keys, vec!["target", "sample", "band", "operator"]);
        }
        std::fs::remove_file(csv_path).ok();
        std::fs::remove_file(json_path).ok();
    }

    #[test]
    fn rejects_bad_rows() {
        let unknown_band = temp_file(
            "band.json",
            r#"[{"x": [1, 2], "y": [1, 2], "band": "ultraviolet", "target": "dark"}]"#,
        );
        let missing_index = temp_file(
            "index.json",
            r#"[{"x": [1, 2], "y": [1, 2], "band": "red", "target": "sample"}]"#,
        );
        let unsorted = temp_file(
            "sorted.json",
            r#"[{"x": [2, 1], "y": [1, 2], "band": "red", "target": "dark"}]"#,
        );
        assert!(load_file(&unknown_band).is_err());
        assert!(load_file(&missing_index).is_err());
        assert!(load_file(&unsorted).is_err());
        assert!(load_file(Path::new("run.txt")).is_err());
        for p in [unknown_band, missing_index, unsorted] {
            std::fs::remove_file(p).ok();
        }
    }
}
