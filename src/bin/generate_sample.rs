use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
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

/// Temperature (°C) at depth: warm mixed layer, tanh thermocline, cold deep water.
fn temperature_profile(depth: f64, surface: f64, mld: f64) -> f64 {
    let deep = 2.0 + 2.5 * (-depth / 1500.0).exp();
    let drop = 0.5 * (1.0 + ((depth - mld - 40.0) / 25.0).tanh());
    surface - (surface - deep) * drop
}

/// Salinity rising from the surface minimum toward deep-water values.
fn salinity_profile(depth: f64, surface: f64) -> f64 {
    surface + (34.6 - surface) * (1.0 - (-depth / 400.0).exp())
}

fn main() {
    let mut rng = SimpleRng::new(42);

    let depths: Vec<f64> = [
        0.0, 10.0, 20.0, 30.0, 50.0, 75.0, 100.0, 125.0, 150.0, 200.0, 250.0, 300.0, 400.0,
        500.0, 600.0, 800.0, 1000.0, 1200.0, 1500.0, 2000.0, 2500.0, 3000.0,
    ]
    .to_vec();

    // (station id, surface temperature, mixed-layer depth, surface salinity)
    let stations = [
        ("080.0 051.0", 16.5, 30.0, 33.4),
        ("080.0 060.0", 17.2, 45.0, 33.3),
        ("090.0 070.0", 18.1, 60.0, 33.2),
        ("093.3 026.7", 15.4, 20.0, 33.6),
        ("060.0 080.0", 14.8, 35.0, 33.5),
    ];

    let mut all_cast: Vec<i64> = Vec::new();
    let mut all_station: Vec<String> = Vec::new();
    let mut all_depth: Vec<Option<f64>> = Vec::new();
    let mut all_temp: Vec<Option<f64>> = Vec::new();
    let mut all_sal: Vec<Option<f64>> = Vec::new();
    let mut all_o2: Vec<Option<f64>> = Vec::new();

    let mut cast: i64 = 0;
    for &(station, surface_t, mld, surface_s) in &stations {
        for _ in 0..3 {
            cast += 1;
            let surface_t = surface_t + rng.gauss(0.0, 0.6);
            for &depth in &depths {
                let depth = (depth + rng.gauss(0.0, 1.0)).max(0.0).round();
                let mut t = Some(temperature_profile(depth, surface_t, mld) + rng.gauss(0.0, 0.05));
                let mut s = Some(salinity_profile(depth, surface_s) + rng.gauss(0.0, 0.01));
                let o2 = Some((6.0 - depth / 600.0).max(0.4) + rng.gauss(0.0, 0.1));

                // Sensor dropouts and spikes.
                let roll = rng.next_f64();
                if roll < 0.03 {
                    t = None;
                } else if roll < 0.05 {
                    s = None;
                } else if roll < 0.06 {
                    t = t.map(|v| v + 25.0);
                } else if roll < 0.07 {
                    s = s.map(|v| v - 8.0);
                }

                all_cast.push(cast);
                all_station.push(station.to_string());
                all_depth.push(Some(depth));
                all_temp.push(t);
                all_sal.push(s);
                all_o2.push(o2);
            }
        }
    }

    // CSV, bottle-file column names
    let csv_path = "sample_bottle.csv";
    let mut writer = csv::Writer::from_path(csv_path).expect("Failed to create CSV file");
    writer
        .write_record(["Cst_Cnt", "Sta_ID", "Depthm", "T_degC", "Salnty", "O2ml_L"])
        .expect("Failed to write CSV header");
    let fmt = |v: Option<f64>, digits: usize| v.map(|v| format!("{v:.digits$}")).unwrap_or_default();
    for i in 0..all_cast.len() {
        writer
            .write_record([
                all_cast[i].to_string(),
                all_station[i].clone(),
                fmt(all_depth[i], 0),
                fmt(all_temp[i], 2),
                fmt(all_sal[i], 3),
                fmt(all_o2[i], 2),
            ])
            .expect("Failed to write CSV row");
    }
    writer.flush().expect("Failed to flush CSV");

    // Parquet
    let schema = Arc::new(Schema::new(vec![
        Field::new("Cst_Cnt", DataType::Int64, false),
        Field::new("Sta_ID", DataType::Utf8, false),
        Field::new("Depthm", DataType::Float64, true),
        Field::new("T_degC", DataType::Float64, true),
        Field::new("Salnty", DataType::Float64, true),
        Field::new("O2ml_L", DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(all_cast.clone())),
            Arc::new(StringArray::from(
                all_station.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(all_depth)),
            Arc::new(Float64Array::from(all_temp)),
            Arc::new(Float64Array::from(all_sal)),
            Arc::new(Float64Array::from(all_o2)),
        ],
    )
    .expect("Failed to create RecordBatch");

    let parquet_path = "sample_bottle.parquet";
    let file = std::fs::File::create(parquet_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!(
        "Wrote {} bottle rows from {} casts to {csv_path} and {parquet_path}",
        all_cast.len(),
        cast
    );
}
