use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

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

/// Cell population of one synthetic measurement.
struct Population {
    name: &'static str,
    events: usize,
    /// Mean cell area in µm².
    area: f64,
    /// Mean deformation.
    defo: f64,
    flow_rate: f64,
}

const POPULATIONS: [Population; 3] = [
    Population {
        name: "M1",
        events: 5000,
        area: 60.0,
        defo: 0.05,
        flow_rate: 0.04,
    },
    Population {
        name: "M2",
        events: 4000,
        area: 75.0,
        defo: 0.08,
        flow_rate: 0.04,
    },
    Population {
        name: "M3",
        events: 3000,
        area: 90.0,
        defo: 0.12,
        flow_rate: 0.12,
    },
];

const FRAME_RATE: f64 = 2000.0;

fn generate_events(pop: &Population, rng: &mut SimpleRng) -> Vec<(&'static str, Vec<f64>)> {
    let n = pop.events;
    let mut area = Vec::with_capacity(n);
    let mut defo = Vec::with_capacity(n);
    let mut brightness = Vec::with_capacity(n);
    let mut pos_x = Vec::with_capacity(n);
    let mut frame = Vec::with_capacity(n);
    let mut time = Vec::with_capacity(n);

    let mut current = 0.0;
    for _ in 0..n {
        let a = rng.gauss(pop.area, pop.area * 0.15).max(5.0);
        let d = rng.gauss(pop.defo, pop.defo * 0.4).clamp(0.0, 1.0);
        current += 1.0 + (rng.next_f64() * 20.0).floor();
        area.push(a);
        defo.push(d);
        brightness.push(rng.gauss(120.0, 8.0));
        pos_x.push(rng.next_f64() * 200.0);
        frame.push(current);
        time.push(current / FRAME_RATE);
    }

    let area_pix: Vec<f64> = area.iter().map(|a| (a / 0.34_f64.powi(2)).round()).collect();
    let circ: Vec<f64> = defo.iter().map(|d| 1.0 - d).collect();

    vec![
        ("area", area),
        ("area_pix", area_pix),
        ("defo", defo),
        ("circ", circ),
        ("brightness", brightness),
        ("pos_x", pos_x),
        ("frame", frame),
        ("time", time),
    ]
}

fn write_parquet(path: &Path, columns: Vec<(&'static str, Vec<f64>)>) -> Result<()> {
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Float64, false))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|(_, values)| Arc::new(Float64Array::from(values)) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .context("Failed to create RecordBatch")?;

    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;
    Ok(())
}

fn write_companions(dir: &Path, pop: &Population) -> Result<()> {
    fs::write(
        dir.join(format!("{}_camera.ini", pop.name)),
        format!("[Image]\nFrame Rate = {FRAME_RATE}\nPix Size = 0.34\nExposure Time = 2.0\n"),
    )?;
    fs::write(
        dir.join(format!("{}_para.ini", pop.name)),
        format!(
            "[General]\nFlow Rate [ul/s] = {}\nChannel Width = 20\nRegion = Channel\n",
            pop.flow_rate
        ),
    )?;
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    for pop in &POPULATIONS {
        let path = out_dir.join(format!("{}_data.parquet", pop.name));
        write_parquet(&path, generate_events(pop, &mut rng))?;
        write_companions(&out_dir, pop)?;
        println!("Wrote {} events to {}", pop.events, path.display());
    }
    Ok(())
}
