use std::collections::BTreeSet;

use super::mask::RegionMask;
use super::model::{ModelError, Spectra};

// ---------------------------------------------------------------------------
// Region filter: keep only the rows inside a mask
// ---------------------------------------------------------------------------

/// Rows of an unfolded cube that lie inside `mask`, labelled with the
/// mask's material.
///
/// The container must hold exactly one row per mask pixel, in the same
/// row-major order (see [`unfold_cube`](super::cube::unfold_cube)).
pub fn mask_spectra(spectra: &Spectra, mask: &RegionMask) -> Result<Spectra, ModelError> {
    if mask.full_vector().len() != spectra.len() {
        let (rows, cols) = mask.shape();
        return Err(ModelError::ShapeMismatch(format!(
            "mask '{}' covers {rows}x{cols} = {} pixels but there are {} spectra",
            mask.material(),
            rows * cols,
            spectra.len()
        )));
    }
    let masked = spectra
        .select_rows(mask.index_vector())?
        .with_material(mask.material());
    log::info!(
        "Mask '{}' kept {} of {} spectra",
        mask.material(),
        masked.len(),
        spectra.len()
    );
    Ok(masked)
}

/// Per-material selection state for the viewer.
/// An empty set means nothing is selected; rows without a label always pass.
pub type MaterialFilter = BTreeSet<String>;

/// Initialise a [`MaterialFilter`] with every material selected.
pub fn init_material_filter(spectra: &Spectra) -> MaterialFilter {
    spectra.unique_materials()
}

/// Return indices of spectra whose material is selected.
pub fn filtered_indices(spectra: &Spectra, selected: &MaterialFilter) -> Vec<usize> {
    (0..spectra.len())
        .filter(|&row| match spectra.material(row) {
            Some(material) => selected.contains(material),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cube::unfold_cube;
    use crate::data::model::WavelengthVector;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_mask_selects_matching_pixels() {
        // 2 x 3 image, 2 bands; band 0 stores the flat pixel index.
        let cube = Array3::from_shape_fn((2, 3, 2), |(x, y, b)| if b == 0 { (x * 3 + y) as f64 } else { -1.0 });
        let spectra = Spectra::new(
            unfold_cube(&cube),
            WavelengthVector::new(vec![500.0, 600.0]).unwrap(),
            None,
        )
        .unwrap();
        let channel = ndarray::array![[0.0, 1.0, 0.0], [0.0, 0.0, 0.8]];
        let mask = RegionMask::from_channel(&channel, "In");

        let masked = mask_spectra(&spectra, &mask).unwrap();
        assert_eq!(masked.len(), 2);
        assert_eq!(masked.row(0)[0], 1.0);
        assert_eq!(masked.row(1)[0], 5.0);
        assert_eq!(masked.material(1), Some("In"));
    }

    #[test]
    fn test_mask_size_mismatch_fails() {
        let spectra = Spectra::new(
            Array2::zeros((5, 1)),
            WavelengthVector::new(vec![1.0]).unwrap(),
            None,
        )
        .unwrap();
        let mask = RegionMask::from_channel(&Array2::from_elem((2, 2), 1.0), "In");
        assert!(matches!(
            mask_spectra(&spectra, &mask),
            Err(ModelError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_material_filter() {
        let labels = vec!["leaf".to_string(), "pill".to_string(), "leaf".to_string()];
        let spectra = Spectra::new(
            Array2::zeros((3, 1)),
            WavelengthVector::new(vec![1.0]).unwrap(),
            Some(labels),
        )
        .unwrap();
        let mut selected = init_material_filter(&spectra);
        assert_eq!(filtered_indices(&spectra, &selected), vec![0, 1, 2]);
        selected.remove("leaf");
        assert_eq!(filtered_indices(&spectra, &selected), vec![1]);
        selected.clear();
        assert!(filtered_indices(&spectra, &selected).is_empty());
    }
}
