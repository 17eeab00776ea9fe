use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::cube::HyperCube;
use super::loader::EnviDataType;
use super::model::Spectra;

// ---------------------------------------------------------------------------
// Parquet export
// ---------------------------------------------------------------------------

/// Write spectra to Parquet, one row per spectrum.
///
/// Schema: `x` List<Float64> (wavelengths), `y` List<Float64> (intensities),
/// `material` nullable Utf8. [`load_file`](super::loader::load_file) reads it
/// back bit-for-bit.
pub fn export_parquet(spectra: &Spectra, path: &Path) -> Result<()> {
    if spectra.is_empty() {
        bail!("refusing to export an empty container: no row would carry the wavelength axis");
    }
    let wavelengths = spectra.wavelengths().as_slice();

    let mut x_builder = ListBuilder::new(Float64Builder::new());
    let mut y_builder = ListBuilder::new(Float64Builder::new());
    for row in spectra.intensities().rows() {
        x_builder.values().append_slice(wavelengths);
        x_builder.append(true);
        let values = y_builder.values();
        for &v in row.iter() {
            values.append_value(v);
        }
        y_builder.append(true);
    }
    let x_array = x_builder.finish();
    let y_array = y_builder.finish();
    let material_array: StringArray = (0..spectra.len())
        .map(|row| spectra.material(row))
        .collect();

    let item = || Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::List(item()), false),
        Field::new("y", DataType::List(item()), false),
        Field::new("material", DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(x_array), Arc::new(y_array), Arc::new(material_array)],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    log::info!("Exported {} spectra to {}", spectra.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// ENVI export
// ---------------------------------------------------------------------------

/// Write a cube as an ENVI header plus a little-endian BSQ `.img` file.
///
/// Values are stored as 64-bit floats so a reload is exact.
pub fn export_envi(cube: &HyperCube, header_path: &Path) -> Result<()> {
    let (lines, samples, bands) = cube.dim();
    let data_type = EnviDataType::F64;

    let mut header = String::from("ENVI\n");
    writeln!(header, "samples = {samples}")?;
    writeln!(header, "lines = {lines}")?;
    writeln!(header, "bands = {bands}")?;
    writeln!(header, "header offset = 0")?;
    writeln!(header, "file type = ENVI Standard")?;
    writeln!(header, "data type = {}", data_type.code())?;
    writeln!(header, "interleave = bsq")?;
    writeln!(header, "byte order = 0")?;
    let centers: Vec<String> = cube
        .wavelengths()
        .as_slice()
        .iter()
        .map(|w| format!("{w:?}"))
        .collect();
    writeln!(header, "wavelength = {{ {} }}", centers.join(", "))?;

    std::fs::write(header_path, header)
        .with_context(|| format!("writing {}", header_path.display()))?;

    let mut bytes = Vec::with_capacity(lines * samples * bands * data_type.size());
    for b in 0..bands {
        for l in 0..lines {
            for s in 0..samples {
                bytes.extend_from_slice(&cube.data()[[l, s, b]].to_le_bytes());
            }
        }
    }
    let data_path = header_path.with_extension("img");
    std::fs::write(&data_path, bytes)
        .with_context(|| format!("writing {}", data_path.display()))?;

    log::info!(
        "Exported {lines}x{samples}x{bands} cube to {}",
        header_path.display()
    );
    Ok(())
}
