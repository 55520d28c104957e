//! # AGMS Sketch
//!
//! A randomized linear projection of a keyed update stream into a
//! `depth × width` matrix of real accumulators.
//!
//! ## Hash families
//!
//! Every row `d` owns six seeds drawn once at construction:
//!
//! - `a_d, b_d` (families 0, 1): pairwise-independent bucket hash
//!   `bucket(d, x) = mix31(a_d·x + b_d) mod width`
//! - `s1_d..s4_d` (families 2..5): sign hash. Three nested `mix31`
//!   rounds keyed by `x`; bit 15 of the result picks `+1`, otherwise `-1`.
//!
//! where `mix31(h) = ((h >> 31) ^ h) & 0x7FFF_FFFF` on 64-bit wrapping
//! arithmetic.
//!
//! ## Update rule
//!
//! ```text
//! for d in 0..depth:  M[d][bucket(d, x)] += v · sign(d, x)
//! ```
//!
//! The projection is linear: two updates of the same key add exactly like a
//! single update with the summed value. For a frequency vector `f`,
//! `Σ_w M[d][w]²` is an unbiased estimate of the self-join size `Σ f²`, and
//! the median over rows concentrates it (see [`crate::array_ops::median`]).
//!
//! Seed tables can be shared between sketches with [`AgmsSketch::with_seeds`];
//! only sketches with the same seeds (same [`SeedTable::fingerprint`]) are
//! column-compatible.

use std::fmt;

use rand::RngCore;

use crate::metrics::{self, SketchMetrics};

/// Number of seed families per row: two bucket seeds and four sign seeds.
pub const SEED_FAMILIES: usize = 6;

const BUCKET_A: usize = 0;
const BUCKET_B: usize = 1;
const SIGN_S1: usize = 2;
const SIGN_S2: usize = 3;
const SIGN_S3: usize = 4;
const SIGN_S4: usize = 5;

/// 31-bit fold mask.
const MASK31: i64 = 0x7FFF_FFFF;

/// Bit of the mixed sign hash that selects `+1`.
const SIGN_BIT: i64 = 1 << 15;

/// `a·x + b`, folded to 31 bits.
#[inline]
fn hash31(a: i64, b: i64, x: i64) -> i64 {
    let h = a.wrapping_mul(x).wrapping_add(b);
    ((h >> 31) ^ h) & MASK31
}

/// Immutable per-row hash seeds (`6 × depth` non-negative integers).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedTable {
    depth: usize,
    /// Family-major: `seeds[family * depth + row]`.
    seeds: Vec<i64>,
}

impl SeedTable {
    /// Draw a fresh seed table from `rng`.
    ///
    /// Seeds are the top 63 bits of successive `next_u64` draws, so every
    /// seed is non-negative. Families are drawn in order, row by row.
    ///
    /// # Panics
    ///
    /// Panics if `depth == 0`.
    pub fn generate<R: RngCore + ?Sized>(depth: usize, rng: &mut R) -> Self {
        assert!(depth >= 1, "sketch depth must be at least 1");
        let seeds = (0..SEED_FAMILIES * depth)
            .map(|_| (rng.next_u64() >> 1) as i64)
            .collect();
        Self { depth, seeds }
    }

    /// Build a seed table from explicit family rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows are empty, of unequal length, or contain a
    /// negative seed.
    #[must_use]
    pub fn from_rows(rows: [Vec<i64>; SEED_FAMILIES]) -> Self {
        let depth = rows[0].len();
        assert!(depth >= 1, "sketch depth must be at least 1");
        assert!(
            rows.iter().all(|r| r.len() == depth),
            "all seed families must have the same length"
        );
        assert!(
            rows.iter().flatten().all(|&s| s >= 0),
            "seeds must be non-negative"
        );
        Self {
            depth,
            seeds: rows.concat(),
        }
    }

    /// Number of rows covered.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Seed of `family` (0..6) for `row`.
    #[must_use]
    pub fn get(&self, family: usize, row: usize) -> i64 {
        assert!(family < SEED_FAMILIES, "seed family {family} out of range");
        assert!(row < self.depth, "row {row} out of range for depth {}", self.depth);
        self.seeds[family * self.depth + row]
    }

    /// BLAKE3 digest of the table; equal fingerprints mean column-compatible sketches.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.depth as u64).to_le_bytes());
        for seed in &self.seeds {
            hasher.update(&seed.to_le_bytes());
        }
        hasher.finalize().into()
    }
}

/// AGMS sketch with an exclusively owned accumulator matrix.
#[derive(Debug, Clone)]
pub struct AgmsSketch {
    width: usize,
    seeds: SeedTable,
    /// Row-major `depth × width`.
    cells: Vec<f64>,
    metrics: SketchMetrics,
}

impl AgmsSketch {
    /// Zero sketch with seeds drawn from `rng`.
    ///
    /// # Panics
    ///
    /// Panics if `depth` or `width` is zero.
    pub fn new<R: RngCore + ?Sized>(depth: usize, width: usize, rng: &mut R) -> Self {
        Self::with_seeds(width, SeedTable::generate(depth, rng))
    }

    /// Zero sketch sharing an existing seed table.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero.
    #[must_use]
    pub fn with_seeds(width: usize, seeds: SeedTable) -> Self {
        assert!(width >= 1, "sketch width must be at least 1");
        let cells = vec![0.0; seeds.depth() * width];
        Self {
            width,
            seeds,
            cells,
            metrics: SketchMetrics::new(),
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.seeds.depth()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Total number of cells (`depth × width`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn seeds(&self) -> &SeedTable {
        &self.seeds
    }

    #[must_use]
    pub fn seed_fingerprint(&self) -> [u8; 32] {
        self.seeds.fingerprint()
    }

    #[must_use]
    pub fn metrics(&self) -> &SketchMetrics {
        &self.metrics
    }

    /// Bucket of `key` in `row`, always in `[0, width)`.
    #[must_use]
    pub fn bucket(&self, row: usize, key: i64) -> usize {
        let h = hash31(
            self.seeds.get(BUCKET_A, row),
            self.seeds.get(BUCKET_B, row),
            key,
        );
        // h is in [0, 2^31), so the remainder is non-negative.
        (h % self.width as i64) as usize
    }

    /// Sign of `key` in `row`, always `+1` or `-1`.
    #[must_use]
    pub fn sign(&self, row: usize, key: i64) -> i8 {
        let s1 = self.seeds.get(SIGN_S1, row);
        let s2 = self.seeds.get(SIGN_S2, row);
        let s3 = self.seeds.get(SIGN_S3, row);
        let s4 = self.seeds.get(SIGN_S4, row);
        let h = hash31(hash31(hash31(key, s1, s2), key, s3), key, s4);
        if h & SIGN_BIT != 0 { 1 } else { -1 }
    }

    /// Add `value · sign(d, key)` to cell `(d, bucket(d, key))` of every row.
    pub fn update(&mut self, key: i64, value: f64) {
        for d in 0..self.depth() {
            let w = self.bucket(d, key);
            let xi = f64::from(self.sign(d, key));
            self.cells[d * self.width + w] += value * xi;
        }
        metrics::inc(&self.metrics.updates);
    }

    /// `Σ_w M[row][w]²`.
    #[must_use]
    pub fn row_sum_of_squares(&self, row: usize) -> f64 {
        self.row(row).iter().map(|v| v * v).sum()
    }

    /// One row of the matrix.
    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        assert!(row < self.depth(), "row {row} out of range for depth {}", self.depth());
        &self.cells[row * self.width..(row + 1) * self.width]
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.cells.chunks_exact(self.width)
    }

    /// Single cell `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(col < self.width, "column {col} out of range for width {}", self.width);
        self.row(row)[col]
    }

    /// Copy of column `w` (`depth` entries, top to bottom).
    #[must_use]
    pub fn column(&self, w: usize) -> Vec<f64> {
        assert!(w < self.width, "column {w} out of range for width {}", self.width);
        self.cells.iter().skip(w).step_by(self.width).copied().collect()
    }

    /// Overwrite column `w` with `values` (`depth` entries).
    pub fn set_column(&mut self, w: usize, values: &[f64]) {
        assert!(w < self.width, "column {w} out of range for width {}", self.width);
        assert_eq!(values.len(), self.depth(), "column length must equal sketch depth");
        for (cell, &v) in self.cells.iter_mut().skip(w).step_by(self.width).zip(values) {
            *cell = v;
        }
        metrics::inc(&self.metrics.column_writes);
    }
}

impl fmt::Display for AgmsSketch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            f.write_str("[")?;
            for (i, v) in row.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{v}")?;
            }
            f.write_str("]\n")?;
        }
        Ok(())
    }
}
