//! Builders for synthetic instrument exports used by the integration tests.

use std::fs;
use std::path::Path;

/// Content of one synthetic export.
pub struct ExportSpec {
    pub bin_centers: Vec<f64>,
    /// Raw (diluted) concentration curve of every video.
    pub videos: Vec<Vec<f64>>,
    /// Mean size per video; other size keys are derived from it.
    pub mean_size: Vec<f64>,
    pub particles_per_frame: Vec<u32>,
    pub noise_levels: Vec<&'static str>,
    /// Append the legacy `Concentration average` / `Standard Error` columns.
    pub legacy_columns: bool,
}

impl ExportSpec {
    /// Two videos on the triangular curve `[0, 10, 0]` over `[0, 1, 2]`.
    pub fn triangle() -> Self {
        ExportSpec {
            bin_centers: vec![0.0, 1.0, 2.0],
            videos: vec![vec![0.0, 10.0, 0.0], vec![0.0, 30.0, 0.0]],
            mean_size: vec![100.0, 110.0],
            particles_per_frame: vec![40, 44],
            noise_levels: vec!["No", "No"],
            legacy_columns: true,
        }
    }

    pub fn render(&self) -> String {
        let n = self.videos.len();
        let join = |values: Vec<String>| values.join(",");
        let mut out = String::new();

        out.push_str("NanoSight NTA 3.4 Build 3.4.4,\n");
        out.push_str("[Setup],\nTemperature,22.1\n");
        out.push_str("[Results],\n");
        out.push_str(&format!(
            ",{}\n",
            join((1..=n).map(|k| format!("Video {k}")).collect())
        ));
        out.push_str(&format!(
            "Particles per frame,{}\n",
            join(self.particles_per_frame.iter().map(|p| p.to_string()).collect())
        ));
        out.push_str(&format!(
            "Noise level,{}\n",
            join(self.noise_levels.iter().map(|s| s.to_string()).collect())
        ));

        out.push_str("[Size Data],\n");
        let sizes = |offset: f64| join(self.mean_size.iter().map(|m| (m + offset).to_string()).collect());
        out.push_str(&format!("Mean,{}\n", sizes(0.0)));
        out.push_str(&format!("Mode,{}\n", sizes(-5.0)));
        out.push_str(&format!("SD,{}\n", sizes(-80.0)));
        out.push_str(&format!("D10,{}\n", sizes(-30.0)));
        out.push_str(&format!("D50,{}\n", sizes(-2.0)));
        out.push_str(&format!("D90,{}\n", sizes(40.0)));
        out.push_str(&format!("Graph Data,{}\n", ",".repeat(n - 1)));

        // duplicate legacy block
        out.push_str("[Legacy],\n");
        out.push_str(&format!("Particles per frame,{}\n", join(vec!["0".into(); n])));
        out.push_str(&format!("Noise level,{}\n", join(vec!["Yes".into(); n])));

        out.push_str("Graph Data,\n");
        let mut header = vec!["Bin centre (nm)".to_string()];
        header.extend(std::iter::repeat("Concentration (particles / ml)".to_string()).take(n));
        if self.legacy_columns {
            header.push("Concentration average".into());
            header.push("Standard Error".into());
        }
        header.push(String::new());
        out.push_str(&join(header.clone()));
        out.push('\n');

        for (i, bin) in self.bin_centers.iter().enumerate() {
            let mut row = vec![bin.to_string()];
            row.extend(self.videos.iter().map(|v| v[i].to_string()));
            if self.legacy_columns {
                row.push("0".into());
                row.push("0".into());
            }
            row.push(String::new());
            out.push_str(&join(row));
            out.push('\n');
        }
        out.push_str(&",".repeat(header.len() - 1));
        out.push('\n');
        out.push_str("Percentile,10,50,90\n");
        out
    }

    pub fn write(&self, dir: &Path, filename_key: &str) {
        let path = dir.join(format!("{filename_key}_ExperimentSummary.csv"));
        fs::write(path, self.render()).unwrap();
    }
}
