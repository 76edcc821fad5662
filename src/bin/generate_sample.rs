//! Writes a synthetic photometer run (`sample_run.parquet`) for trying out
//! the stitcher without hardware.
//!
//! Usage: `generate_sample [MODE 1-5] [abba]`

use std::sync::Arc;

use arrow::array::{Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const DARK_LEVEL: f64 = 800.0;
const NOISE: f64 = 4.0;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Halogen-like lamp spectrum in counts.
fn lamp(wl: f64) -> f64 {
    gaussian(wl, 800.0, 260.0, 30000.0) + 1500.0
}

/// Filter transmission: passes its band with a margin, leaks a little elsewhere.
fn filter_transmission(wl: f64, low: f64, high: f64) -> f64 {
    if low <= 100.0 && high >= 2000.0 {
        return 1.0;
    }
    0.9 * logistic((wl - (low - 25.0)) / 4.0) * logistic(((high + 25.0) - wl) / 4.0) + 0.005
}

/// Sample transmission: broad plateau with one absorption band.
fn sample_transmission(wl: f64, index: usize) -> f64 {
    let centre = 480.0 + 160.0 * index as f64;
    0.85 - gaussian(wl, centre, 35.0, 0.6)
}

/// (band, cutoff_low, cutoff_high) per measurement mode.
fn layout(mode: u8) -> Vec<(&'static str, f64, f64)> {
    match mode {
        1 => vec![("open", 100.0, 2000.0)],
        2 => vec![("violet", 100.0, 464.0), ("open", 464.0, 2000.0)],
        3 => vec![("violet", 100.0, 464.0), ("open", 464.0, 875.0), ("nir", 875.0, 2000.0)],
        5 => vec![
            ("violet", 100.0, 464.0),
            ("blue", 464.0, 545.0),
            ("yellow", 545.0, 685.0),
            ("red", 685.0, 875.0),
            ("nir", 875.0, 2000.0),
        ],
        _ => vec![
            ("violet", 100.0, 464.0),
            ("blue", 464.0, 545.0),
            ("yellow", 545.0, 685.0),
            ("red", 685.0, 2000.0),
        ],
    }
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One generated acquisition row.
struct Row {
    y: Vec<f64>,
    band: &'static str,
    target: &'static str,
    sample: Option<i64>,
    phase: Option<&'static str>,
    temperature: f64,
}

struct Generator {
    wavelengths: Vec<f64>,
    rng: SimpleRng,
    /// Acquisition counter; lamp intensity and temperature drift with it.
    tick: u64,
    rows: Vec<Row>,
}

impl Generator {
    /// Acquire: `transmission = None` means the shutter is closed.
    fn acquire(
        &mut self,
        band: (&'static str, f64, f64),
        target: &'static str,
        sample: Option<i64>,
        phase: Option<&'static str>,
        transmission: Option<&dyn Fn(f64) -> f64>,
    ) {
        let drift = 1.0 + 2e-4 * self.tick as f64;
        let dark = DARK_LEVEL + 0.5 * self.tick as f64;
        let (name, low, high) = band;
        let y = self
            .wavelengths
            .iter()
            .map(|&wl| {
                let light = match transmission {
                    Some(t) => lamp(wl) * drift * filter_transmission(wl, low, high) * t(wl),
                    None => 0.0,
                };
                light + dark + self.rng.gauss(0.0, NOISE)
            })
            .collect();
        self.rows.push(Row {
            y,
            band: name,
            target,
            sample,
            phase,
            temperature: 24.0 + 0.01 * self.tick as f64,
        });
        self.tick += 1;
    }

    /// Plain acquisition, or the four acquisitions of an ABBA sequence.
    fn measure(
        &mut self,
        band: (&'static str, f64, f64),
        target: &'static str,
        sample: Option<i64>,
        abba: bool,
        transmission: &dyn Fn(f64) -> f64,
    ) {
        if abba {
            self.acquire(band, target, sample, Some("a1"), Some(transmission));
            self.acquire(band, target, sample, Some("b1"), None);
            self.acquire(band, target, sample, Some("b2"), None);
            self.acquire(band, target, sample, Some("a2"), Some(transmission));
        } else {
            self.acquire(band, target, sample, None, Some(transmission));
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode: u8 = args.first().and_then(|a| a.parse().ok()).unwrap_or(4);
    let abba = args.iter().any(|a| a.eq_ignore_ascii_case("abba"));
    let n_samples = 3usize;

    // Wavelengths: 350 → 1100 nm, step 0.5
    let wavelengths: Vec<f64> = (0..1501).map(|i| 350.0 + i as f64 * 0.5).collect();
    let mut generator = Generator {
        wavelengths,
        rng: SimpleRng::new(42),
        tick: 0,
        rows: Vec::new(),
    };

    let open = |_: f64| 1.0;
    let blocked = |_: f64| 0.0;
    for band in layout(mode) {
        generator.measure(band, "reference", None, abba, &open);
        if !abba {
            generator.acquire(band, "dark", None, None, None);
        }
        for index in 0..n_samples {
            let t = move |wl: f64| sample_transmission(wl, index);
            generator.measure(band, "sample", Some(index as i64), abba, &t);
        }
        generator.measure(band, "blocked", None, abba, &blocked);
        generator.measure(band, "open", None, abba, &open);
    }

    let rows = &generator.rows;

    // Build Arrow arrays
    let mut x_builder = ListBuilder::new(Float64Builder::new());
    for _ in rows {
        let values = x_builder.values();
        for &v in &generator.wavelengths {
            values.append_value(v);
        }
        x_builder.append(true);
    }
    let x_array = x_builder.finish();

    let mut y_builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = y_builder.values();
        for &v in &row.y {
            values.append_value(v);
        }
        y_builder.append(true);
    }
    let y_array = y_builder.finish();

    let band_array = StringArray::from(rows.iter().map(|r| r.band).collect::<Vec<_>>());
    let target_array = StringArray::from(rows.iter().map(|r| r.target).collect::<Vec<_>>());
    let sample_array = Int64Array::from(rows.iter().map(|r| r.sample).collect::<Vec<_>>());
    let phase_array = StringArray::from(rows.iter().map(|r| r.phase).collect::<Vec<_>>());
    let temperature_array = Float64Array::from(rows.iter().map(|r| r.temperature).collect::<Vec<_>>());

    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::List(Arc::new(Field::new("item", DataType::Float64, true))), false),
        Field::new("y", DataType::List(Arc::new(Field::new("item", DataType::Float64, true))), false),
        Field::new("band", DataType::Utf8, false),
        Field::new("target", DataType::Utf8, false),
        Field::new("sample", DataType::Int64, true),
        Field::new("phase", DataType::Utf8, true),
        Field::new("temperature", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(x_array),
            Arc::new(y_array),
            Arc::new(band_array),
            Arc::new(target_array),
            Arc::new(sample_array),
            Arc::new(phase_array),
            Arc::new(temperature_array),
        ],
    )
    .expect("Failed to create RecordBatch");

    // Write Parquet
    let output_path = "sample_run.parquet";
    let file = std::fs::File::create(output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!(
        "Wrote {} acquisitions (mode {mode}, {}, {} samples) to {output_path}",
        rows.len(),
        if abba { "ABBA" } else { "single dark" },
        n_samples
    );
}
