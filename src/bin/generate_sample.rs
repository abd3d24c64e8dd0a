//! Writes a directory of synthetic `*_ExperimentSummary.csv` exports.
//!
//! Usage: `generate_sample [OUTPUT_DIR]` (default `sample_exports`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::WriterBuilder;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn generate_distribution(
    bin_centers: &[f64],
    peaks: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    bin_centers
        .iter()
        .map(|&size| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(size, mu, sigma, amp))
                .sum();
            (signal + rng.gauss(0.0, noise_level)).max(0.0)
        })
        .collect()
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

/// Size value at which `fraction` of the curve's mass lies below.
fn percentile(bin_centers: &[f64], curve: &[f64], fraction: f64) -> f64 {
    let total: f64 = curve.iter().sum();
    let mut acc = 0.0;
    for (&size, &c) in bin_centers.iter().zip(curve) {
        acc += c;
        if acc >= fraction * total {
            return size;
        }
    }
    bin_centers.last().copied().unwrap_or(0.0)
}

struct Measurement {
    name: String,
    dilution: u64,
    videos: Vec<Vec<f64>>,
    particles_per_frame: Vec<f64>,
    noisy: bool,
}

fn write_export(dir: &Path, bin_centers: &[f64], m: &Measurement) -> Result<PathBuf> {
    let path = dir.join(format!("{}_ExperimentSummary.csv", m.name));
    let mut w = WriterBuilder::new()
        .flexible(true)
        .from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    let n = m.videos.len();
    let row = |key: &str, values: Vec<String>| -> Vec<String> {
        std::iter::once(key.to_string()).chain(values).collect()
    };

    w.write_record(["NanoSight NTA 3.4 Build 3.4.4", ""])?;
    w.write_record(["[Setup]", ""])?;
    w.write_record(["Sample Name", m.name.as_str()])?;
    w.write_record(["Dilution factor", &m.dilution.to_string()])?;
    w.write_record(["[Results]", ""])?;
    w.write_record(row("", (1..=n).map(|k| format!("Video {k}")).collect()))?;

    let diluted: Vec<f64> = m
        .videos
        .iter()
        .map(|v| v.iter().sum::<f64>() / m.dilution as f64)
        .collect();
    w.write_record(row(
        "Concentration (Particles / ml)",
        diluted.iter().map(|c| format!("{c:.3E}")).collect(),
    ))?;
    w.write_record(row(
        "Particles per frame",
        m.particles_per_frame.iter().map(|p| format!("{p:.1}")).collect(),
    ))?;
    let noise = if m.noisy { "Yes" } else { "No" };
    w.write_record(row("Noise level", vec![noise.to_string(); n]))?;

    w.write_record(["[Size Data]", ""])?;
    let mean: Vec<f64> = m
        .videos
        .iter()
        .map(|v| {
            let total: f64 = v.iter().sum();
            v.iter().zip(bin_centers).map(|(c, s)| c * s).sum::<f64>() / total
        })
        .collect();
    let fmt = |values: Vec<f64>| values.iter().map(|v| format!("{v:.1}")).collect::<Vec<_>>();
    w.write_record(row("Mean", fmt(mean.clone())))?;
    w.write_record(row("Mode", fmt(mean.iter().map(|v| v - 5.0).collect())))?;
    w.write_record(row("SD", fmt(vec![25.0; n])))?;
    for (key, fraction) in [("D10", 0.1), ("D50", 0.5), ("D90", 0.9)] {
        let values = m
            .videos
            .iter()
            .map(|v| percentile(bin_centers, v, fraction))
            .collect();
        w.write_record(row(key, fmt(values)))?;
    }
    w.write_record(row("Graph Data", vec![String::new(); n]))?;

    // legacy duplicate block, ignored by the reader
    w.write_record(["[Legacy Results]", ""])?;
    w.write_record(row("Particles per frame", vec!["0".to_string(); n]))?;
    w.write_record(row("Noise level", vec!["Unknown".to_string(); n]))?;

    w.write_record(["Graph Data", ""])?;
    let mut header = vec!["Bin centre (nm)".to_string()];
    header.extend(std::iter::repeat("Concentration (particles / ml)".to_string()).take(n));
    header.extend(["Concentration average".to_string(), "Standard Error".to_string(), String::new()]);
    w.write_record(&header)?;

    for (i, size) in bin_centers.iter().enumerate() {
        let values: Vec<f64> = m.videos.iter().map(|v| v[i] / m.dilution as f64).collect();
        let avg = values.iter().sum::<f64>() / n as f64;
        let mut record = vec![format!("{size}")];
        record.extend(values.iter().map(|v| format!("{v:.6E}")));
        record.extend([format!("{avg:.6E}"), "0".to_string(), String::new()]);
        w.write_record(&record)?;
    }
    w.write_record(vec![String::new(); header.len()])?;
    w.write_record(["Percentile", "10", "50", "90"])?;
    w.flush()?;
    Ok(path)
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_exports"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);

    // Bin centres: 0.5 → 999.5 nm, step 1
    let bin_centers: Vec<f64> = (0..1000).map(|i| i as f64 + 0.5).collect();

    let samples: [(&str, Vec<(f64, f64, f64)>, u64); 3] = [
        ("Exosomes", vec![(110.0, 25.0, 4.0e6), (180.0, 30.0, 1.0e6)], 100),
        ("Liposomes", vec![(140.0, 20.0, 6.0e6)], 50),
        ("Beads", vec![(100.0, 5.0, 2.0e7)], 1000),
    ];
    let replicates = 3;
    let n_videos = 5;

    let mut written = 0;
    for (s, (sample, peaks, dilution)) in samples.iter().enumerate() {
        for r in 1..=replicates {
            let videos: Vec<Vec<f64>> = (0..n_videos)
                .map(|_| generate_distribution(&bin_centers, peaks, 2.0e4, &mut rng))
                .collect();
            let particles_per_frame = (0..n_videos).map(|_| rng.gauss(45.0, 4.0)).collect();
            let measurement = Measurement {
                name: format!("{sample}_dilution{dilution}_rep{r}"),
                dilution: *dilution,
                videos,
                particles_per_frame,
                noisy: s == 2 && r == 3,
            };
            let path = write_export(&out_dir, &bin_centers, &measurement)?;
            println!("Wrote {}", path.display());
            written += 1;
        }
    }

    println!(
        "Wrote {written} exports ({n_videos} videos, {} bins each) to {}",
        bin_centers.len(),
        out_dir.display()
    );
    Ok(())
}
