use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;

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

    /// Index drawn with probability proportional to `weights`.
    fn pick(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        let mut r = self.next_f64() * total;
        for (i, w) in weights.iter().enumerate() {
            if r < *w {
                return i;
            }
            r -= w;
        }
        weights.len() - 1
    }

    /// Poisson draw by inversion; fine for the small means used here.
    fn poisson(&mut self, mean: f64) -> u32 {
        let limit = (-mean).exp();
        let mut k = 0;
        let mut p = self.next_f64();
        while p > limit {
            k += 1;
            p *= self.next_f64();
        }
        k
    }
}

const CELL_TYPES: [&str; 6] = ["HSC", "Prog", "GMP", "Mono", "T", "B"];
const N_GENES: usize = 40;

fn write_gz(path: &Path, text: &str) {
    let file = File::create(path).expect("Failed to create output file");
    let mut enc = GzEncoder::new(file, Compression::default());
    enc.write_all(text.as_bytes()).expect("Failed to write gzip data");
    enc.finish().expect("Failed to finish gzip stream");
}

fn main() {
    let mut rng = SimpleRng::new(42);
    let out_dir = Path::new("sample_data");
    std::fs::create_dir_all(out_dir).expect("Failed to create sample_data/");

    // (GEO sample, donor tag, cells, cell type weights)
    let samples: Vec<(&str, &str, usize, [f64; 6])> = vec![
        ("GSM3587923", "AML1012-D0", 120, [0.4, 0.3, 0.1, 0.1, 0.05, 0.05]),
        ("GSM3587954", "AML419A-D0", 90, [0.5, 0.2, 0.1, 0.1, 0.05, 0.05]),
        ("GSM3588002", "BM1", 150, [0.05, 0.1, 0.2, 0.3, 0.25, 0.1]),
        ("GSM3588003", "BM2", 110, [0.05, 0.15, 0.2, 0.25, 0.2, 0.15]),
        ("GSM3588004", "BM5-34p", 80, [0.3, 0.5, 0.15, 0.05, 0.0, 0.0]),
        ("GSM3588005", "BM5-34p38n", 60, [0.6, 0.4, 0.0, 0.0, 0.0, 0.0]),
    ];

    let mut written = 0;
    for (gsm, donor, n_cells, weights) in &samples {
        let mut anno = String::from("Cell\tNumberOfReads\tCellType\tPredictionRF2\n");
        let mut types = Vec::with_capacity(*n_cells);
        for c in 0..*n_cells {
            let t = rng.pick(weights);
            types.push(t);
            let reads = 2000 + (rng.next_f64() * 8000.0) as u32;
            let predicted = CELL_TYPES[rng.pick(weights)];
            anno.push_str(&format!(
                "{donor}_{c:04}\t{reads}\t{}\t{predicted}\n",
                CELL_TYPES[t]
            ));
        }
        write_gz(&out_dir.join(format!("{gsm}_{donor}.anno.txt.gz")), &anno);

        // Matching expression matrix: each cell type lifts its own block of genes.
        let mut dem = String::from("Gene");
        for c in 0..*n_cells {
            dem.push_str(&format!("\t{donor}_{c:04}"));
        }
        dem.push('\n');
        for g in 0..N_GENES {
            dem.push_str(&format!("GENE{g:03}"));
            for t in &types {
                let boosted = g / (N_GENES / CELL_TYPES.len()) == *t;
                let count = rng.poisson(if boosted { 6.0 } else { 0.5 });
                dem.push_str(&format!("\t{count}"));
            }
            dem.push('\n');
        }
        write_gz(&out_dir.join(format!("{gsm}_{donor}.dem.txt.gz")), &dem);
        written += 1;
    }

    let config = json!({
        "loader": {
            "directory": "sample_data",
            "include_keywords": ["BM", "AML"],
            "exclude_keyword": "38n",
            "suffix": ".anno.txt.gz",
            "required_keywords": []
        },
        "output_dir": "sample_output",
        "expression": {
            "dem_file": "sample_data/GSM3587923_AML1012-D0.dem.txt.gz",
            "anno_file": "sample_data/GSM3587923_AML1012-D0.anno.txt.gz"
        }
    });
    let config_path = out_dir.join("run.json");
    std::fs::write(
        &config_path,
        serde_json::to_string_pretty(&config).expect("Failed to serialize config"),
    )
    .expect("Failed to write config");

    println!(
        "Wrote {written} samples ({N_GENES} genes each) to {}; config at {}",
        out_dir.display(),
        config_path.display()
    );
}
