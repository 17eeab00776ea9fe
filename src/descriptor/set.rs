use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::triangle::TriangleDescriptor;
use super::{MatchError, SpectralDescriptor};
use crate::data::model::WavelengthVector;

// ---------------------------------------------------------------------------
// Reduction – how per-descriptor scores become one per-material score
// ---------------------------------------------------------------------------

/// Rule for reducing the successful descriptor scores of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    /// Best single descriptor.
    Max,
    /// Average over all descriptors that could be scored.
    Mean,
    /// Average of the `k` best scores (fewer if fewer succeeded).
    TopKMean(usize),
}

impl Reduction {
    /// `None` when there is nothing to reduce.
    pub fn apply(self, scores: &[f64]) -> Option<f64> {
        if scores.is_empty() {
            return None;
        }
        match self {
            Reduction::Max => scores.iter().copied().reduce(f64::max),
            Reduction::Mean => Some(scores.iter().sum::<f64>() / scores.len() as f64),
            Reduction::TopKMean(0) => None,
            Reduction::TopKMean(k) => {
                let mut sorted = scores.to_vec();
                sorted.sort_by(|a, b| b.total_cmp(a));
                let best = &sorted[..k.min(sorted.len())];
                Some(best.iter().sum::<f64>() / best.len() as f64)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DescriptorSet
// ---------------------------------------------------------------------------

/// Ordered descriptors grouped under one material label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSet<D = TriangleDescriptor> {
    material: String,
    descriptors: Vec<D>,
}

/// Result of scoring one spectrum against every descriptor of a set.
#[derive(Debug, Clone, PartialEq)]
pub struct SetScore {
    pub material: String,
    /// One outcome per descriptor, in set order.
    pub outcomes: Vec<Result<f64, MatchError>>,
    /// Reduced score over the successful outcomes.
    pub reduced: Option<f64>,
}

impl SetScore {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }
}

impl<D: SpectralDescriptor> DescriptorSet<D> {
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            descriptors: Vec::new(),
        }
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    /// Append a descriptor. No deduplication.
    pub fn push(&mut self, descriptor: D) {
        self.descriptors.push(descriptor);
    }

    /// Material name of every contained descriptor, in order.
    pub fn materials(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.material()).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, D> {
        self.descriptors.iter()
    }

    /// Score `spectrum` against every descriptor; failures are kept per
    /// descriptor and never abort the set.
    pub fn score(&self, spectrum: &[f64], axis: &WavelengthVector, reduction: Reduction) -> SetScore {
        let outcomes: Vec<Result<f64, MatchError>> = self
            .descriptors
            .iter()
            .map(|d| d.score(spectrum, axis))
            .collect();
        let successes: Vec<f64> = outcomes.iter().filter_map(|o| o.as_ref().ok().copied()).collect();
        SetScore {
            material: self.material.clone(),
            reduced: reduction.apply(&successes),
            outcomes,
        }
    }
}

impl<D> Extend<D> for DescriptorSet<D> {
    fn extend<I: IntoIterator<Item = D>>(&mut self, iter: I) {
        self.descriptors.extend(iter);
    }
}

// ---------------------------------------------------------------------------
// Descriptor library (JSON)
// ---------------------------------------------------------------------------

/// Read a JSON array of triangle descriptor sets.
pub fn load_library(path: &Path) -> Result<Vec<DescriptorSet>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading descriptor library {}", path.display()))?;
    let sets: Vec<DescriptorSet> = serde_json::from_str(&text).context("parsing descriptor library")?;
    log::info!(
        "Loaded {} descriptor sets ({} descriptors) from {}",
        sets.len(),
        sets.iter().map(DescriptorSet::len).sum::<usize>(),
        path.display()
    );
    Ok(sets)
}

/// Write descriptor sets as pretty-printed JSON.
pub fn save_library(sets: &[DescriptorSet], path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(sets).context("serializing descriptor library")?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
