//! Standard scaling and two-dimensional embeddings of cell-by-gene rows.
//!
//! `pca_2d` keeps the two leading principal components, found by power
//! iteration on `XᵀX` with deflation. `umap_2d` starts from that layout and
//! refines it with UMAP: a k-nearest-neighbour graph with smoothed
//! distances, a fuzzy union of the directed memberships, and seeded
//! stochastic gradient descent with negative sampling. Inputs are small
//! (one sample's cells), so dense `Vec` rows and brute-force neighbours are
//! enough.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

const MAX_ITER: usize = 500;
const TOLERANCE: f64 = 1e-10;

/// Centre each feature and divide by its population standard deviation.
/// Constant features are only centred.
pub fn standard_scale(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let Some(n_features) = rows.first().map(Vec::len) else {
        return Vec::new();
    };
    let n = rows.len() as f64;

    let mut mean = vec![0.0; n_features];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let mut scale = vec![0.0; n_features];
    for row in rows {
        for ((s, v), m) in scale.iter_mut().zip(row).zip(&mean) {
            *s += (v - m).powi(2) / n;
        }
    }
    for s in &mut scale {
        *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
    }

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&mean)
                .zip(&scale)
                .map(|((v, m), s)| (v - m) / s)
                .collect()
        })
        .collect()
}

/// Project rows onto their two leading principal directions. Rows are
/// expected to be centred (see [`standard_scale`]).
pub fn pca_2d(rows: &[Vec<f64>]) -> Vec<[f64; 2]> {
    let n_features = rows.first().map_or(0, Vec::len);
    let mut components: Vec<Vec<f64>> = Vec::with_capacity(2);
    for k in 0..2 {
        let v = leading_direction(rows, n_features, &components, k as u64 + 1);
        components.push(v);
    }
    rows.iter()
        .map(|row| [dot(row, &components[0]), dot(row, &components[1])])
        .collect()
}

fn leading_direction(rows: &[Vec<f64>], p: usize, previous: &[Vec<f64>], seed: u64) -> Vec<f64> {
    let mut v = start_vector(p, seed);
    orthogonalize(&mut v, previous);
    if normalize(&mut v) == 0.0 {
        return vec![0.0; p];
    }

    for _ in 0..MAX_ITER {
        // w = Xᵀ (X v)
        let mut w = vec![0.0; p];
        for row in rows {
            let s = dot(row, &v);
            for (wj, xj) in w.iter_mut().zip(row) {
                *wj += s * xj;
            }
        }
        orthogonalize(&mut w, previous);
        if normalize(&mut w) == 0.0 {
            return vec![0.0; p];
        }
        let delta: f64 = w.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
        v = w;
        if delta < TOLERANCE {
            break;
        }
    }

    // Fix the sign so repeated runs agree: largest loading positive.
    let pivot = v
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if pivot < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
    v
}

/// Deterministic, non-degenerate starting point for power iteration.
fn start_vector(p: usize, seed: u64) -> Vec<f64> {
    let mut x = seed;
    (0..p)
        .map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (x >> 11) as f64 / (1u64 << 53) as f64 + 0.5
        })
        .collect()
}

fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let proj = dot(v, b);
        for (vi, bi) in v.iter_mut().zip(b) {
            *vi -= proj * bi;
        }
    }
}

/// Scale `v` to unit length, returning its former norm.
fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    norm
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ---------------------------------------------------------------------------
// UMAP
// ---------------------------------------------------------------------------

/// Low-dimensional membership curve `1 / (1 + a d^2b)` fitted for
/// `min_dist = 0.1`, `spread = 1.0`.
const CURVE_A: f64 = 1.577;
const CURVE_B: f64 = 0.8951;
/// Per-coordinate gradient clip.
const CLIP: f64 = 4.0;
/// The PCA layout is rescaled so its largest coordinate has this size.
const INIT_EXTENT: f64 = 10.0;

/// Tuning for [`umap_2d`]. Defaults follow the reference UMAP settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmapParams {
    /// Neighbourhood size, counting the point itself.
    pub n_neighbors: usize,
    pub n_epochs: usize,
    pub learning_rate: f64,
    /// Repulsive samples drawn per attractive update.
    pub negative_sample_rate: usize,
    pub seed: u64,
}

impl Default for UmapParams {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            n_epochs: 200,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            seed: 42,
        }
    }
}

struct Edge {
    i: usize,
    j: usize,
    weight: f64,
}

/// xorshift64; drives negative sampling.
struct Xorshift64(u64);

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Xorshift64(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

/// Embed rows in two dimensions with UMAP, initialised from [`pca_2d`].
/// The result depends only on `rows` and `params`.
pub fn umap_2d(rows: &[Vec<f64>], params: &UmapParams) -> Vec<[f64; 2]> {
    let n = rows.len();
    let mut embedding = pca_2d(rows);
    if n < 2 {
        return embedding;
    }

    let k = params.n_neighbors.clamp(2, n) - 1;
    if k + 1 < params.n_neighbors {
        warn!(
            "n_neighbors {} exceeds the {n} cells; using {}",
            params.n_neighbors,
            k + 1
        );
    }

    let neighbors = nearest_neighbors(rows, k);
    let edges = fuzzy_union(&neighbors, (k as f64 + 1.0).log2());
    debug!("UMAP graph: {n} cells, {} edges", edges.len());

    let extent = embedding
        .iter()
        .flatten()
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    if extent > 0.0 {
        let scale = INIT_EXTENT / extent;
        embedding.iter_mut().flatten().for_each(|v| *v *= scale);
    }

    optimize(&mut embedding, &edges, params);
    embedding
}

/// The `k` nearest other rows of each row as `(index, distance)`, closest
/// first. Ties keep index order.
fn nearest_neighbors(rows: &[Vec<f64>], k: usize) -> Vec<Vec<(usize, f64)>> {
    rows.iter()
        .enumerate()
        .map(|(i, a)| {
            let mut dists: Vec<(usize, f64)> = rows
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, b)| (j, euclidean(a, b)))
                .collect();
            dists.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
            dists.truncate(k);
            dists
        })
        .collect()
}

/// Directed memberships `exp(-(d - rho) / sigma)`, with `rho` the distance to
/// the nearest neighbour and `sigma` chosen so each row's memberships sum to
/// `target`; then symmetrized as `a + b - ab`.
fn fuzzy_union(neighbors: &[Vec<(usize, f64)>], target: f64) -> Vec<Edge> {
    let mut pairs: BTreeMap<(usize, usize), (f64, f64)> = BTreeMap::new();
    for (i, row) in neighbors.iter().enumerate() {
        let rho = row.first().map_or(0.0, |(_, d)| *d);
        let sigma = smooth_sigma(row, rho, target);
        for &(j, d) in row {
            let w = (-(d - rho).max(0.0) / sigma).exp();
            if i < j {
                pairs.entry((i, j)).or_default().0 = w;
            } else {
                pairs.entry((j, i)).or_default().1 = w;
            }
        }
    }
    pairs
        .into_iter()
        .map(|((i, j), (a, b))| Edge {
            i,
            j,
            weight: a + b - a * b,
        })
        .filter(|e| e.weight > 0.0)
        .collect()
}

/// Bisection for the bandwidth giving `sum exp(-(d - rho) / sigma) = target`.
fn smooth_sigma(row: &[(usize, f64)], rho: f64, target: f64) -> f64 {
    let (mut lo, mut hi) = (1e-10_f64, 1e4_f64);
    let mut sigma = 1.0;
    for _ in 0..64 {
        sigma = (lo + hi) / 2.0;
        let sum: f64 = row
            .iter()
            .map(|(_, d)| (-(d - rho).max(0.0) / sigma).exp())
            .sum();
        if (sum - target).abs() < 1e-5 {
            break;
        }
        if sum > target {
            hi = sigma;
        } else {
            lo = sigma;
        }
    }
    sigma
}

/// Stochastic gradient descent on the cross-entropy between the graph and
/// the embedding. Edges are sampled in proportion to their weight and the
/// learning rate decays linearly to zero.
fn optimize(embedding: &mut [[f64; 2]], edges: &[Edge], params: &UmapParams) {
    let max_weight = edges.iter().fold(0.0_f64, |m, e| m.max(e.weight));
    if edges.is_empty() || params.n_epochs == 0 || max_weight <= 0.0 {
        return;
    }
    let n = embedding.len();
    let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_weight / e.weight).collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut rng = Xorshift64::new(params.seed);

    for epoch in 0..params.n_epochs {
        let lr = params.learning_rate * (1.0 - epoch as f64 / params.n_epochs as f64);
        for (e, edge) in edges.iter().enumerate() {
            if next_sample[e] > epoch as f64 {
                continue;
            }
            let (i, j) = (edge.i, edge.j);

            let d2 = squared_distance(&embedding[i], &embedding[j]);
            if d2 > 0.0 {
                let coeff = -2.0 * CURVE_A * CURVE_B * d2.powf(CURVE_B - 1.0)
                    / (1.0 + CURVE_A * d2.powf(CURVE_B));
                for d in 0..2 {
                    let grad = (coeff * (embedding[i][d] - embedding[j][d])).clamp(-CLIP, CLIP);
                    embedding[i][d] += lr * grad;
                    embedding[j][d] -= lr * grad;
                }
            }

            for _ in 0..params.negative_sample_rate {
                let other = rng.below(n);
                if other == i {
                    continue;
                }
                let d2 = squared_distance(&embedding[i], &embedding[other]);
                if d2 <= 0.0 {
                    continue;
                }
                let coeff = 2.0 * CURVE_B / ((0.001 + d2) * (1.0 + CURVE_A * d2.powf(CURVE_B)));
                for d in 0..2 {
                    let grad =
                        (coeff * (embedding[i][d] - embedding[other][d])).clamp(-CLIP, CLIP);
                    embedding[i][d] += lr * grad;
                }
            }
            next_sample[e] += epochs_per_sample[e];
        }
    }
}

fn squared_distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_features_have_zero_mean_unit_variance() {
        let rows = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0], vec![6.0, 5.0]];
        let scaled = standard_scale(&rows);
        let n = scaled.len() as f64;
        let mean: f64 = scaled.iter().map(|r| r[0]).sum::<f64>() / n;
        let var: f64 = scaled.iter().map(|r| (r[0] - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
        assert!(scaled.iter().all(|r| r[1] == 0.0));
        assert!(standard_scale(&[]).is_empty());
    }

    #[test]
    fn first_axis_follows_dominant_direction() {
        // Points along (1, 2, 0) with a small wobble on the third feature.
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let t = i as f64 - 9.5;
                let wobble = if i % 4 == 0 || i % 4 == 3 { 0.1 } else { -0.1 };
                vec![t, 2.0 * t, wobble]
            })
            .collect();
        let points = pca_2d(&rows);
        assert_eq!(points.len(), 20);

        // Scores along the first axis are |t| * sqrt(5), ordered with t.
        for (i, w) in points.windows(2).enumerate() {
            assert!(w[1][0] > w[0][0], "not monotone at {i}");
        }
        assert!((points[19][0] - 9.5 * 5f64.sqrt()).abs() < 1e-6);
        // The second axis only carries the wobble.
        assert!(points.iter().all(|p| (p[1].abs() - 0.1).abs() < 1e-6));
    }

    #[test]
    fn projection_is_deterministic() {
        let rows = vec![
            vec![0.5, -1.0, 0.2],
            vec![-0.3, 0.4, 1.1],
            vec![-0.2, 0.6, -1.3],
        ];
        assert_eq!(pca_2d(&rows), pca_2d(&rows));
    }

    #[test]
    fn constant_input_embeds_at_origin() {
        let rows = vec![vec![0.0, 0.0]; 3];
        assert!(pca_2d(&rows).iter().all(|p| *p == [0.0, 0.0]));
        let params = UmapParams::default();
        assert!(umap_2d(&rows, &params).iter().all(|p| *p == [0.0, 0.0]));
    }

    /// Two tight groups of ten cells, far apart in five dimensions.
    fn two_groups() -> Vec<Vec<f64>> {
        (0..20)
            .map(|i| {
                let base = if i < 10 { 0.0 } else { 8.0 };
                let jitter = (i % 10) as f64 * 0.05;
                vec![base + jitter, base - jitter, base, base + 0.5 * jitter, base]
            })
            .collect()
    }

    fn centroid(points: &[[f64; 2]]) -> [f64; 2] {
        let n = points.len() as f64;
        let sum = points.iter().fold([0.0, 0.0], |c, p| [c[0] + p[0], c[1] + p[1]]);
        [sum[0] / n, sum[1] / n]
    }

    #[test]
    fn umap_keeps_groups_apart() {
        let params = UmapParams {
            n_neighbors: 6,
            n_epochs: 100,
            ..UmapParams::default()
        };
        let points = umap_2d(&standard_scale(&two_groups()), &params);
        assert_eq!(points.len(), 20);
        assert!(points.iter().flatten().all(|v| v.is_finite()));

        let a = centroid(&points[..10]);
        let b = centroid(&points[10..]);
        for (i, p) in points.iter().enumerate() {
            let (own, other) = if i < 10 { (a, b) } else { (b, a) };
            assert!(
                squared_distance(p, &own) < squared_distance(p, &other),
                "cell {i} drifted to the other group"
            );
        }
    }

    #[test]
    fn umap_is_seeded() {
        let rows = standard_scale(&two_groups());
        let params = UmapParams::default();
        let first = umap_2d(&rows, &params);
        assert_eq!(first, umap_2d(&rows, &params));

        let reseeded = UmapParams { seed: 7, ..params };
        assert_ne!(first, umap_2d(&rows, &reseeded));
    }

    #[test]
    fn umap_handles_fewer_cells_than_neighbors() {
        let rows = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 2.0]];
        let points = umap_2d(&standard_scale(&rows), &UmapParams::default());
        assert_eq!(points.len(), 3);
        assert!(points.iter().flatten().all(|v| v.is_finite()));

        assert_eq!(umap_2d(&[vec![1.0, 2.0]], &UmapParams::default()), vec![[0.0, 0.0]]);
        assert!(umap_2d(&[], &UmapParams::default()).is_empty());
    }

    #[test]
    fn neighbor_graph_is_symmetric_union() {
        let rows = vec![vec![0.0], vec![1.0], vec![3.0]];
        let neighbors = nearest_neighbors(&rows, 1);
        assert_eq!(neighbors[0][0].0, 1);
        assert_eq!(neighbors[2][0].0, 1);

        let edges = fuzzy_union(&neighbors, 1.0);
        let pairs: Vec<(usize, usize)> = edges.iter().map(|e| (e.i, e.j)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2)]);
        assert!(edges.iter().all(|e| (e.weight - 1.0).abs() < 1e-12));
    }
}
