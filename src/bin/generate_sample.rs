//! Writes a synthetic hyperspectral scene into the current directory:
//! `sample_cube.hdr` + `sample_cube.img` (ENVI), `sample_cube_MASK.png`
//! and `sample_descriptors.json`.

use std::path::Path;

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use ndarray::Array3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rusty_hsi::data::cube::HyperCube;
use rusty_hsi::data::export::export_envi;
use rusty_hsi::data::model::WavelengthVector;
use rusty_hsi::descriptor::set::{DescriptorSet, save_library};
use rusty_hsi::descriptor::triangle::TriangleDescriptor;

const LINES: usize = 60;
const SAMPLES: usize = 80;

/// Region of a pixel in the synthetic scene.
#[derive(Clone, Copy, PartialEq)]
enum Region {
    Background,
    Leaf,
    Pill,
}

fn region(line: usize, sample: usize) -> Region {
    let (dl, ds) = (line as f64 - 30.0, sample as f64 - 58.0);
    if (dl * dl + ds * ds).sqrt() < 12.0 {
        Region::Pill
    } else if sample < 35 && (10..50).contains(&line) {
        Region::Leaf
    } else {
        Region::Background
    }
}

/// Triangular absorption feature of unit height.
fn triangle(wl: f64, start: f64, peak: f64, stop: f64) -> f64 {
    if wl <= start || wl >= stop {
        0.0
    } else if wl <= peak {
        (wl - start) / (peak - start)
    } else {
        (stop - wl) / (stop - peak)
    }
}

fn spectrum_value(region: Region, wl: f64) -> f64 {
    match region {
        Region::Background => 0.05,
        Region::Leaf => 0.1 + 0.6 * triangle(wl, 500.0, 550.0, 620.0) + 0.3 * triangle(wl, 700.0, 760.0, 820.0),
        Region::Pill => 0.2 + 0.8 * triangle(wl, 780.0, 850.0, 900.0),
    }
}

fn write_mask(path: &Path) -> Result<()> {
    let mut img = GrayImage::new(SAMPLES as u32, LINES as u32);
    for line in 0..LINES {
        for sample in 0..SAMPLES {
            let value = if region(line, sample) == Region::Pill { 255 } else { 0 };
            img.put_pixel(sample as u32, line as u32, Luma([value]));
        }
    }
    img.save(path)
        .with_context(|| format!("writing {}", path.display()))
}

fn library() -> Result<Vec<DescriptorSet>> {
    let mut leaf = DescriptorSet::new("leaf");
    leaf.push(TriangleDescriptor::new("leaf", 500, 550, 620)?);
    leaf.push(TriangleDescriptor::new("leaf", 700, 760, 820)?);

    let mut pill = DescriptorSet::new("pill");
    pill.push(TriangleDescriptor::new("pill", 780, 850, 900)?);
    Ok(vec![leaf, pill])
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, 0.01).context("noise distribution")?;

    // 400 nm → 995 nm, step 5
    let wavelengths: Vec<f64> = (0..120).map(|i| 400.0 + i as f64 * 5.0).collect();

    let mut data = Array3::zeros((LINES, SAMPLES, wavelengths.len()));
    for ((line, sample, band), value) in data.indexed_iter_mut() {
        *value = spectrum_value(region(line, sample), wavelengths[band]) + noise.sample(&mut rng);
    }
    let cube = HyperCube::new(data, WavelengthVector::new(wavelengths)?)?;

    export_envi(&cube, Path::new("sample_cube.hdr"))?;
    write_mask(Path::new("sample_cube_MASK.png"))?;
    save_library(&library()?, Path::new("sample_descriptors.json"))?;

    println!(
        "Wrote {LINES}x{SAMPLES} cube with {} bands, mask and descriptor library",
        cube.wavelengths().len()
    );
    Ok(())
}
