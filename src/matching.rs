//! Score every spectrum of a container against a library of descriptor sets.
//!
//! ```text
//!   Spectra (rows)  ×  [DescriptorSet]  ──►  MatchTable
//!        row i          set j                rows[i][j] = SetScore
//! ```
//!
//! Rows are scored in parallel; descriptors are only read, so no state is
//! shared between workers beyond the immutable inputs.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::data::model::Spectra;
use crate::descriptor::SpectralDescriptor;
use crate::descriptor::set::{DescriptorSet, Reduction, SetScore};

/// Per-row, per-set scores.
#[derive(Debug, Clone)]
pub struct MatchTable {
    materials: Vec<String>,
    rows: Vec<Vec<SetScore>>,
}

/// Aggregate over all rows for one material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialSummary {
    pub material: String,
    /// Rows where the set produced a reduced score.
    pub scored: usize,
    /// Mean reduced score over the scored rows.
    pub mean_score: Option<f64>,
    /// Rows where this material had the highest reduced score.
    pub wins: usize,
}

/// Score all rows of `spectra` against every set.
pub fn match_spectra<D>(spectra: &Spectra, sets: &[DescriptorSet<D>], reduction: Reduction) -> MatchTable
where
    D: SpectralDescriptor + Sync,
{
    let axis = spectra.wavelengths();
    let rows: Vec<Vec<SetScore>> = (0..spectra.len())
        .into_par_iter()
        .map(|i| {
            let row = spectra.row(i);
            let values: Cow<'_, [f64]> = match row.as_slice() {
                Some(slice) => Cow::Borrowed(slice),
                None => Cow::Owned(row.to_vec()),
            };
            sets.iter()
                .map(|set| set.score(&values, axis, reduction))
                .collect()
        })
        .collect();

    let failures: usize = rows.iter().flatten().map(SetScore::failures).sum();
    log::info!(
        "Matched {} spectra against {} descriptor sets ({reduction:?}), {failures} descriptor failures",
        rows.len(),
        sets.len()
    );
    if failures > 0 {
        log::warn!("{failures} descriptor comparisons could not be scored");
    }

    MatchTable {
        materials: sets.iter().map(|s| s.material().to_string()).collect(),
        rows,
    }
}

impl MatchTable {
    /// Number of scored spectra.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Set materials, in column order.
    pub fn materials(&self) -> &[String] {
        &self.materials
    }

    pub fn row(&self, index: usize) -> &[SetScore] {
        &self.rows[index]
    }

    /// Column with the highest reduced score for `row`, first on ties.
    pub fn best_column(&self, row: usize) -> Option<(usize, f64)> {
        self.rows[row]
            .iter()
            .enumerate()
            .filter_map(|(col, s)| s.reduced.map(|score| (col, score)))
            .fold(None, |best, (col, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((col, score)),
            })
    }

    /// Material with the highest reduced score for `row`, first on ties.
    pub fn best_material(&self, row: usize) -> Option<(&str, f64)> {
        self.best_column(row)
            .map(|(col, score)| (self.materials[col].as_str(), score))
    }

    /// One summary per set, in column order.
    pub fn summary(&self) -> Vec<MaterialSummary> {
        let mut wins = vec![0usize; self.materials.len()];
        for row in 0..self.rows.len() {
            if let Some((col, _)) = self.best_column(row) {
                wins[col] += 1;
            }
        }

        self.materials
            .iter()
            .enumerate()
            .map(|(col, material)| {
                let scores: Vec<f64> = self.rows.iter().filter_map(|r| r[col].reduced).collect();
                let mean_score =
                    (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);
                MaterialSummary {
                    material: material.clone(),
                    scored: scores.len(),
                    mean_score,
                    wins: wins[col],
                }
            })
            .collect()
    }

    /// Write `row,material,score,failures` records; unscored cells are empty.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer
            .write_record(["row", "material", "score", "failures"])
            .context("writing CSV header")?;
        for (i, row) in self.rows.iter().enumerate() {
            for set in row {
                let score = set.reduced.map(|s| s.to_string()).unwrap_or_default();
                writer
                    .write_record([
                        i.to_string(),
                        set.material.clone(),
                        score,
                        set.failures().to_string(),
                    ])
                    .with_context(|| format!("writing CSV row {i}"))?;
            }
        }
        writer.flush().context("flushing CSV")?;
        log::info!("Wrote match table ({} rows) to {}", self.rows.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::WavelengthVector;
    use crate::descriptor::triangle::TriangleDescriptor;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use tempfile::TempDir;

    fn bump(center: f64, i: usize) -> f64 {
        let d = (i as f64 - center).abs();
        if d < 8.0 { 1.0 - d / 8.0 } else { 0.0 }
    }

    /// Row 0 peaks at 20, row 1 at 60, row 2 is flat.
    fn spectra() -> Spectra {
        let data = Array2::from_shape_fn((3, 80), |(r, i)| match r {
            0 => bump(20.0, i),
            1 => bump(60.0, i),
            _ => 0.25,
        });
        let wlv = WavelengthVector::new((0..80).map(f64::from).collect()).unwrap();
        Spectra::new(data, wlv, None).unwrap()
    }

    fn library() -> Vec<DescriptorSet> {
        let mut a = DescriptorSet::new("alpha");
        a.push(TriangleDescriptor::new("alpha", 12, 20, 28).unwrap());
        let mut b = DescriptorSet::new("beta");
        b.push(TriangleDescriptor::new("beta", 52, 60, 68).unwrap());
        b.push(TriangleDescriptor::new("beta", 100, 110, 120).unwrap());
        vec![a, b]
    }

    #[test]
    fn test_best_material_per_row() {
        let table = match_spectra(&spectra(), &library(), Reduction::Max);
        assert_eq!(table.len(), 3);
        assert_eq!(table.materials(), &["alpha".to_string(), "beta".to_string()]);

        let (material, score) = table.best_material(0).unwrap();
        assert_eq!(material, "alpha");
        assert_relative_eq!(score, 1.0, epsilon = 1e-12);
        assert_eq!(table.best_material(1).unwrap().0, "beta");
        assert_eq!(table.best_material(2), None);
        // beta's second descriptor is out of range on every row
        assert_eq!(table.row(1)[1].failures(), 1);
    }

    #[test]
    fn test_summary_counts_wins() {
        let table = match_spectra(&spectra(), &library(), Reduction::Mean);
        let summary = table.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].material, "alpha");
        assert_eq!(summary[0].scored, 1);
        assert_eq!(summary[0].wins, 1);
        assert_eq!(summary[1].wins, 1);
    }

    #[test]
    fn test_wins_go_to_the_winning_set_when_labels_repeat() {
        let mut coarse = DescriptorSet::new("alpha");
        coarse.push(TriangleDescriptor::new("alpha", 4, 20, 36).unwrap());
        let mut exact = DescriptorSet::new("alpha");
        exact.push(TriangleDescriptor::new("alpha", 12, 20, 28).unwrap());

        let table = match_spectra(&spectra(), &[coarse, exact], Reduction::Max);
        assert_eq!(table.best_column(0).unwrap().0, 1);
        assert_eq!(table.best_material(0).unwrap().0, "alpha");

        let summary = table.summary();
        assert_eq!(summary[0].wins, 0);
        assert_eq!(summary[1].wins, 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let spectra = spectra();
        let sets = library();
        let table = match_spectra(&spectra, &sets, Reduction::Max);
        for i in 0..spectra.len() {
            let row = spectra.row(i).to_vec();
            for (j, set) in sets.iter().enumerate() {
                assert_eq!(table.row(i)[j], set.score(&row, spectra.wavelengths(), Reduction::Max));
            }
        }
    }

    #[test]
    fn test_write_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("matches.csv");
        let table = match_spectra(&spectra(), &library(), Reduction::Max);
        table.write_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 6);
        assert_eq!(&records[0][1], "alpha");
        assert_eq!(&records[5][2], "");
        assert_eq!(&records[5][3], "2");
    }
}
