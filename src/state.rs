use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusty_hsi::config::AnalysisConfig;
use rusty_hsi::data::filter::{MaterialFilter, filtered_indices, init_material_filter, mask_spectra};
use rusty_hsi::data::mask::RegionMask;
use rusty_hsi::data::model::Spectra;
use rusty_hsi::descriptor::set::DescriptorSet;
use rusty_hsi::matching::{MatchTable, match_spectra};

use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
///
/// The plotted container is derived: `source` → region mask → subsample.
#[derive(Default)]
pub struct AppState {
    pub config: AnalysisConfig,

    /// Spectra as loaded (None until user loads a file).
    pub source: Option<Spectra>,

    /// Display name of the loaded file.
    pub source_name: Option<String>,

    /// Active region mask, applied to `source`.
    pub mask: Option<RegionMask>,

    /// Whether the view is a seeded random subsample.
    pub subsampled: bool,

    /// The container currently shown and matched.
    pub view: Option<Spectra>,

    /// Loaded descriptor library.
    pub library: Vec<DescriptorSet>,

    /// Per-material selection.
    pub material_filter: MaterialFilter,

    /// Indices of `view` rows passing the material filter (cached).
    pub visible_indices: Vec<usize>,

    /// Colours per material (spectrum labels and library sets).
    pub color_map: Option<ColorMap>,

    /// Result of the last matching run over `view`.
    pub matches: Option<MatchTable>,

    /// Draw library descriptors on top of the spectra.
    pub show_descriptors: bool,

    /// Scale each spectrum to [0, 1] before plotting.
    pub minmax_scaling: bool,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            show_descriptors: true,
            ..Default::default()
        }
    }

    /// Ingest newly loaded spectra; drops any mask that no longer fits.
    pub fn set_source(&mut self, spectra: Spectra, name: String) {
        self.source = Some(spectra);
        self.source_name = Some(name);
        self.mask = None;
        self.subsampled = false;
        self.status_message = None;
        self.rebuild_view();
    }

    /// Apply a region mask to the loaded spectra.
    pub fn set_mask(&mut self, mask: RegionMask) -> Result<()> {
        let source = self.source.as_ref().context("load a cube before applying a mask")?;
        if mask.full_vector().len() != source.len() {
            anyhow::bail!(
                "mask covers {} pixels but the cube has {} spectra",
                mask.full_vector().len(),
                source.len()
            );
        }
        self.mask = Some(mask);
        self.rebuild_view();
        Ok(())
    }

    pub fn clear_mask(&mut self) {
        self.mask = None;
        self.rebuild_view();
    }

    pub fn toggle_subsample(&mut self) {
        self.subsampled = !self.subsampled;
        self.rebuild_view();
    }

    pub fn set_library(&mut self, library: Vec<DescriptorSet>) {
        self.library = library;
        self.matches = None;
        self.rebuild_color_map();
    }

    /// Recompute `view` from `source`, the mask and the subsample flag.
    pub fn rebuild_view(&mut self) {
        self.matches = None;
        let Some(source) = &self.source else {
            self.view = None;
            self.visible_indices.clear();
            return;
        };

        let masked = match self.mask.as_ref().map(|mask| mask_spectra(source, mask)) {
            Some(Ok(masked)) => masked,
            Some(Err(e)) => {
                log::error!("Dropping mask: {e}");
                self.status_message = Some(format!("Error: {e}"));
                self.mask = None;
                source.clone()
            }
            None => source.clone(),
        };
        let view = if self.subsampled {
            let sub = self.config.subsample;
            masked.random_subsample(sub.n, sub.seed)
        } else {
            masked
        };

        self.material_filter = init_material_filter(&view);
        self.visible_indices = filtered_indices(&view, &self.material_filter);
        self.view = Some(view);
        self.rebuild_color_map();
    }

    /// Rebuild the colour map over spectrum labels and library materials.
    pub fn rebuild_color_map(&mut self) {
        let mut materials: BTreeSet<String> = self
            .view
            .as_ref()
            .map(Spectra::unique_materials)
            .unwrap_or_default();
        materials.extend(self.library.iter().map(|s| s.material().to_string()));
        self.color_map = (!materials.is_empty()).then(|| ColorMap::new(&materials));
    }

    /// Recompute `visible_indices` after filter change.
    pub fn refilter(&mut self) {
        if let Some(view) = &self.view {
            self.visible_indices = filtered_indices(view, &self.material_filter);
        }
    }

    /// Toggle one material in the filter.
    pub fn toggle_material(&mut self, material: &str) {
        if !self.material_filter.remove(material) {
            self.material_filter.insert(material.to_string());
        }
        self.refilter();
    }

    pub fn select_all(&mut self) {
        if let Some(view) = &self.view {
            self.material_filter = init_material_filter(view);
            self.refilter();
        }
    }

    pub fn select_none(&mut self) {
        self.material_filter.clear();
        self.refilter();
    }

    /// Score the current view against the library.
    pub fn run_matching(&mut self) -> Result<()> {
        let view = self.view.as_ref().context("no spectra loaded")?;
        if self.library.is_empty() {
            anyhow::bail!("no descriptor library loaded");
        }
        self.matches = Some(match_spectra(view, &self.library, self.config.reduction));
        Ok(())
    }

    pub fn export_view(&self, path: &Path) -> Result<()> {
        let view = self.view.as_ref().context("no spectra loaded")?;
        rusty_hsi::data::export::export_parquet(view, path)
    }

    pub fn export_matches(&self, path: &Path) -> Result<()> {
        self.matches
            .as_ref()
            .context("run matching first")?
            .write_csv(path)
    }

    /// Rows actually drawn: visible rows, capped by the config.
    pub fn plotted_indices(&self) -> &[usize] {
        let n = self.visible_indices.len().min(self.config.max_plotted);
        &self.visible_indices[..n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use rusty_hsi::data::cube::unfold_cube;
    use rusty_hsi::data::model::WavelengthVector;
    use rusty_hsi::descriptor::triangle::TriangleDescriptor;

    fn cube_spectra() -> Spectra {
        // 2 x 2 image, 5 bands, each pixel a peak at band 2
        let cube = Array3::from_shape_fn((2, 2, 5), |(_, _, b)| [0.0, 0.5, 1.0, 0.5, 0.0][b]);
        Spectra::new(
            unfold_cube(&cube),
            WavelengthVector::new(vec![400.0, 410.0, 420.0, 430.0, 440.0]).unwrap(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_mask_then_subsample() {
        let mut state = AppState::new(AnalysisConfig::default());
        state.set_source(cube_spectra(), "cube".into());
        assert_eq!(state.visible_indices.len(), 4);

        let mask = RegionMask::from_channel(&ndarray::array![[1.0, 0.0], [0.0, 1.0]], "leaf");
        state.set_mask(mask).unwrap();
        assert_eq!(state.view.as_ref().unwrap().len(), 2);
        assert!(state.material_filter.contains("leaf"));

        state.toggle_material("leaf");
        assert!(state.visible_indices.is_empty());
        state.select_all();
        assert_eq!(state.visible_indices.len(), 2);

        state.clear_mask();
        assert_eq!(state.view.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_wrong_size_mask_is_rejected() {
        let mut state = AppState::new(AnalysisConfig::default());
        state.set_source(cube_spectra(), "cube".into());
        let mask = RegionMask::from_channel(&Array2::from_elem((3, 3), 1.0), "leaf");
        let err = state.set_mask(mask).unwrap_err();
        assert!(err.to_string().contains("9 pixels"));
        assert!(state.mask.is_none());
        assert_eq!(state.view.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_run_matching() {
        let mut state = AppState::new(AnalysisConfig::default());
        assert!(state.run_matching().is_err());
        state.set_source(cube_spectra(), "cube".into());

        let mut set = DescriptorSet::new("peak");
        set.push(TriangleDescriptor::new("peak", 400, 420, 440).unwrap());
        state.set_library(vec![set]);
        state.run_matching().unwrap();

        let matches = state.matches.as_ref().unwrap();
        assert_eq!(matches.len(), 4);
        assert_eq!(matches.best_material(0).unwrap().0, "peak");
    }
}
