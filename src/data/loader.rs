use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray, Float32Array, Float64Array, LargeListArray, ListArray, StringArray};
use arrow::datatypes::DataType;
use ndarray::{Array2, Array3};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::cube::HyperCube;
use super::model::{Spectra, WavelengthVector};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load spectra from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.hdr`     – ENVI header next to its raw data file; the cube is unfolded
/// * `.parquet` – `x` / `y` list columns plus optional `material` (export format)
/// * `.json`    – `[{ "x": [...], "y": [...], "material": "..." }, ...]`
pub fn load_file(path: &Path) -> Result<Spectra> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let spectra = match ext.as_str() {
        "hdr" => load_envi(path)?.unfold(),
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    log::info!(
        "Loaded {} spectra x {} bands from {}",
        spectra.len(),
        spectra.n_bands(),
        path.display()
    );
    Ok(spectra)
}

/// One parsed row before the shared axis is established.
struct RawRow {
    x: Vec<f64>,
    y: Vec<f64>,
    material: Option<String>,
}

/// Check every row shares the first row's axis and build the container.
fn assemble(rows: Vec<RawRow>) -> Result<Spectra> {
    let Some(first) = rows.first() else {
        bail!("file contains no spectra");
    };
    let wavelengths = WavelengthVector::new(first.x.clone()).context("row 0: invalid 'x' axis")?;
    let bands = wavelengths.len();

    let mut values = Vec::with_capacity(rows.len() * bands);
    let mut labels = Vec::with_capacity(rows.len());
    let any_label = rows.iter().any(|r| r.material.is_some());

    for (i, row) in rows.into_iter().enumerate() {
        if row.x.len() != row.y.len() {
            bail!("Row {i}: x has {} values but y has {}", row.x.len(), row.y.len());
        }
        if row.x.as_slice() != wavelengths.as_slice() {
            bail!("Row {i}: wavelength axis differs from row 0");
        }
        values.extend_from_slice(&row.y);
        labels.push(row.material.unwrap_or_default());
    }

    let n_rows = labels.len();
    let intensities = Array2::from_shape_vec((n_rows, bands), values)
        .context("assembling intensity matrix")?;
    let materials = any_label.then_some(labels);
    Ok(Spectra::from_shared(
        intensities,
        Arc::new(wavelengths),
        materials.map(Arc::new),
    )?)
}

// ---------------------------------------------------------------------------
// ENVI loader
// ---------------------------------------------------------------------------

/// Band interleave of the raw data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    Bsq,
    Bil,
    Bip,
}

/// ENVI numeric type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnviDataType {
    U8,
    I16,
    I32,
    F32,
    F64,
    U16,
    U32,
    I64,
    U64,
}

impl EnviDataType {
    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            1 => Self::U8,
            2 => Self::I16,
            3 => Self::I32,
            4 => Self::F32,
            5 => Self::F64,
            12 => Self::U16,
            13 => Self::U32,
            14 => Self::I64,
            15 => Self::U64,
            other => bail!("unsupported ENVI data type {other}"),
        })
    }

    pub fn code(self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I32 => 3,
            Self::F32 => 4,
            Self::F64 => 5,
            Self::U16 => 12,
            Self::U32 => 13,
            Self::I64 => 14,
            Self::U64 => 15,
        }
    }

    /// Bytes per element.
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 | Self::I64 | Self::U64 => 8,
        }
    }

    fn decode(self, b: &[u8], big_endian: bool) -> f64 {
        macro_rules! read {
            ($t:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(&b[..$n]);
                if big_endian {
                    <$t>::from_be_bytes(buf) as f64
                } else {
                    <$t>::from_le_bytes(buf) as f64
                }
            }};
        }
        match self {
            Self::U8 => b[0] as f64,
            Self::I16 => read!(i16, 2),
            Self::U16 => read!(u16, 2),
            Self::I32 => read!(i32, 4),
            Self::U32 => read!(u32, 4),
            Self::F32 => read!(f32, 4),
            Self::F64 => read!(f64, 8),
            Self::I64 => read!(i64, 8),
            Self::U64 => read!(u64, 8),
        }
    }
}

/// The subset of an ENVI header needed to read a cube.
#[derive(Debug, Clone, PartialEq)]
pub struct EnviHeader {
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub header_offset: usize,
    pub data_type: EnviDataType,
    pub interleave: Interleave,
    pub big_endian: bool,
    /// Band centers; `None` when the header has no `wavelength` field.
    pub wavelength: Option<Vec<f64>>,
}

impl EnviHeader {
    /// Parse header text. `{ … }` values may span several lines.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        match lines.next() {
            Some(magic) if magic.trim() == "ENVI" => {}
            _ => bail!("not an ENVI header (first line must be 'ENVI')"),
        }

        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        let mut pending: Option<(String, String)> = None;
        for line in lines {
            if let Some((key, mut value)) = pending.take() {
                value.push(' ');
                value.push_str(line.trim());
                if line.contains('}') {
                    fields.insert(key, value);
                } else {
                    pending = Some((key, value));
                }
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                log::debug!("ENVI header: skipping line '{trimmed}'");
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            if value.starts_with('{') && !value.contains('}') {
                pending = Some((key, value));
            } else {
                fields.insert(key, value);
            }
        }
        if let Some((key, _)) = pending {
            bail!("unterminated '{{' in ENVI header field '{key}'");
        }

        let required = |key: &str| -> Result<usize> {
            fields
                .get(key)
                .with_context(|| format!("ENVI header missing '{key}'"))?
                .parse::<usize>()
                .with_context(|| format!("ENVI header '{key}' is not an integer"))
        };
        let optional = |key: &str, default: usize| -> Result<usize> {
            match fields.get(key) {
                Some(v) => v
                    .parse::<usize>()
                    .with_context(|| format!("ENVI header '{key}' is not an integer")),
                None => Ok(default),
            }
        };

        let interleave = match fields
            .get("interleave")
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("bsq") => Interleave::Bsq,
            Some("bil") => Interleave::Bil,
            Some("bip") => Interleave::Bip,
            Some(other) => bail!("unsupported interleave '{other}'"),
        };

        let wavelength = fields
            .get("wavelength")
            .map(|raw| parse_brace_list(raw))
            .transpose()
            .context("parsing ENVI 'wavelength' list")?;

        Ok(EnviHeader {
            samples: required("samples")?,
            lines: required("lines")?,
            bands: required("bands")?,
            header_offset: optional("header offset", 0)?,
            data_type: EnviDataType::from_code(required("data type")? as u32)?,
            interleave,
            big_endian: optional("byte order", 0)? == 1,
            wavelength,
        })
    }

    /// Offset (in elements) of `(line, sample, band)` in the data file.
    fn element_index(&self, line: usize, sample: usize, band: usize) -> usize {
        match self.interleave {
            Interleave::Bsq => (band * self.lines + line) * self.samples + sample,
            Interleave::Bil => (line * self.bands + band) * self.samples + sample,
            Interleave::Bip => (line * self.samples + sample) * self.bands + band,
        }
    }
}

fn parse_brace_list(raw: &str) -> Result<Vec<f64>> {
    raw.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(str::trim)
        .filter(|tok| !tok.is_empty())
        .enumerate()
        .map(|(j, tok)| {
            tok.parse::<f64>()
                .with_context(|| format!("[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

/// Locate the raw data file belonging to an ENVI header.
fn find_data_file(header_path: &Path) -> Result<PathBuf> {
    const EXTENSIONS: [&str; 7] = ["img", "raw", "dat", "bsq", "bil", "bip", ""];
    EXTENSIONS
        .iter()
        .map(|ext| header_path.with_extension(ext))
        .find(|candidate| candidate.is_file())
        .with_context(|| format!("no data file found next to {}", header_path.display()))
}

/// Load an ENVI cube as `(lines, samples, bands)`.
pub fn load_envi(header_path: &Path) -> Result<HyperCube> {
    let text = std::fs::read_to_string(header_path)
        .with_context(|| format!("reading ENVI header {}", header_path.display()))?;
    let header = EnviHeader::parse(&text)?;
    log::debug!("ENVI header {}: {header:?}", header_path.display());

    let data_path = find_data_file(header_path)?;
    let bytes = std::fs::read(&data_path)
        .with_context(|| format!("reading ENVI data {}", data_path.display()))?;

    let size = header.data_type.size();
    let needed = header
        .lines
        .checked_mul(header.samples)
        .and_then(|n| n.checked_mul(header.bands))
        .and_then(|n| n.checked_mul(size))
        .and_then(|n| n.checked_add(header.header_offset))
        .with_context(|| {
            format!(
                "ENVI header dimensions overflow: {} lines × {} samples × {} bands",
                header.lines, header.samples, header.bands
            )
        })?;
    if bytes.len() < needed {
        bail!(
            "{} holds {} bytes but the header describes {needed}",
            data_path.display(),
            bytes.len()
        );
    }
    let payload = &bytes[header.header_offset..];

    let data = Array3::from_shape_fn((header.lines, header.samples, header.bands), |(l, s, b)| {
        let at = header.element_index(l, s, b) * size;
        header.data_type.decode(&payload[at..at + size], header.big_endian)
    });

    let wavelengths = match &header.wavelength {
        Some(centers) => WavelengthVector::new(centers.clone()).context("ENVI band centers")?,
        None => {
            log::warn!(
                "{} has no wavelength field; using band indices",
                header_path.display()
            );
            WavelengthVector::from_band_indices(header.bands)?
        }
    };
    Ok(HyperCube::new(data, wavelengths)?)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "x": [400.0, 410.0, ...], "y": [0.12, 0.14, ...], "material": "leaf" },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Spectra> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let x = json_array_to_f64(obj.get("x"), i, "x")?;
        let y = json_array_to_f64(obj.get("y"), i, "y")?;
        let material = obj
            .get("material")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        rows.push(RawRow { x, y, material });
    }

    assemble(rows)
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file written by [`export_parquet`](super::export::export_parquet).
///
/// Expected schema:
/// - `x`: List<Float64> or LargeList<Float64> – wavelength arrays (identical per row)
/// - `y`: List<Float64> or LargeList<Float64> – intensity arrays
/// - `material` (optional): Utf8 label
fn load_parquet(path: &Path) -> Result<Spectra> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let x_idx = schema
            .index_of("x")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'x' column"))?;
        let y_idx = schema
            .index_of("y")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'y' column"))?;
        let material_col = schema.index_of("material").ok().map(|i| batch.column(i));

        let x_col = batch.column(x_idx);
        let y_col = batch.column(y_idx);

        for row in 0..batch.num_rows() {
            let x = extract_f64_list(x_col, row)
                .with_context(|| format!("Row {row}: failed to read 'x'"))?;
            let y = extract_f64_list(y_col, row)
                .with_context(|| format!("Row {row}: failed to read 'y'"))?;
            let material = material_col.and_then(|col| extract_string(col, row));
            rows.push(RawRow { x, y, material });
        }
    }

    assemble(rows)
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Read a Utf8 / LargeUtf8 cell; nulls and other types yield `None`.
fn extract_string(col: &Arc<dyn Array>, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    match col.data_type() {
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|s| s.value(row).to_string()),
        DataType::LargeUtf8 => Some(col.as_string::<i64>().value(row).to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "ENVI
description = {
  synthetic test cube }
samples = 3
lines = 2
bands = 4
header offset = 0
file type = ENVI Standard
data type = 4
interleave = bil
byte order = 0
wavelength units = Nanometers
wavelength = {
 500.0, 510.0,
 520.0, 530.0 }
";

    #[test]
    fn test_parse_header() {
        let header = EnviHeader::parse(HEADER).unwrap();
        assert_eq!((header.samples, header.lines, header.bands), (3, 2, 4));
        assert_eq!(header.data_type, EnviDataType::F32);
        assert_eq!(header.interleave, Interleave::Bil);
        assert!(!header.big_endian);
        assert_eq!(header.wavelength, Some(vec![500.0, 510.0, 520.0, 530.0]));
    }

    #[test]
    fn test_parse_header_rejects_garbage() {
        assert!(EnviHeader::parse("not envi\nsamples = 1").is_err());
        assert!(EnviHeader::parse("ENVI\nsamples = 1\nlines = 1").is_err());
        assert!(EnviHeader::parse("ENVI\nwavelength = { 1, 2").is_err());
    }

    #[test]
    fn test_load_bil_cube() {
        let dir = TempDir::new().unwrap();
        let hdr = dir.path().join("cube.hdr");
        std::fs::write(&hdr, HEADER).unwrap();

        // value = line * 100 + sample * 10 + band, written in BIL order
        let mut bytes = Vec::new();
        for l in 0..2 {
            for b in 0..4 {
                for s in 0..3 {
                    let v = (l * 100 + s * 10 + b) as f32;
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        std::fs::write(dir.path().join("cube.img"), bytes).unwrap();

        let cube = load_envi(&hdr).unwrap();
        assert_eq!(cube.dim(), (2, 3, 4));
        assert_eq!(cube.data()[[1, 2, 3]], 123.0);
        assert_eq!(cube.wavelengths().as_slice(), &[500.0, 510.0, 520.0, 530.0]);

        let spectra = load_file(&hdr).unwrap();
        assert_eq!(spectra.len(), 6);
        assert_eq!(spectra.row(5)[3], 123.0);
    }

    #[test]
    fn test_short_data_file_fails() {
        let dir = TempDir::new().unwrap();
        let hdr = dir.path().join("cube.hdr");
        std::fs::write(&hdr, HEADER).unwrap();
        std::fs::write(dir.path().join("cube.raw"), [0u8; 10]).unwrap();
        assert!(load_envi(&hdr).is_err());
    }

    #[test]
    fn test_oversized_dimensions_fail_cleanly() {
        let dir = TempDir::new().unwrap();
        let hdr = dir.path().join("huge.hdr");
        std::fs::write(
            &hdr,
            "ENVI\nsamples = 4294967296\nlines = 4294967296\nbands = 2\ndata type = 4\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("huge.img"), [0u8; 16]).unwrap();

        let err = load_envi(&hdr).unwrap_err();
        assert!(format!("{err:#}").contains("overflow"));
    }

    #[test]
    fn test_load_bip_big_endian_i16() {
        let dir = TempDir::new().unwrap();
        let hdr = dir.path().join("bip.hdr");
        std::fs::write(
            &hdr,
            "ENVI\nsamples = 2\nlines = 2\nbands = 3\nheader offset = 4\n\
             data type = 2\ninterleave = bip\nbyte order = 1\n",
        )
        .unwrap();

        // value = -(line * 100 + sample * 10 + band), written in BIP order
        let mut bytes = vec![0xAA; 4];
        for l in 0..2i16 {
            for s in 0..2i16 {
                for b in 0..3i16 {
                    bytes.extend_from_slice(&(-(l * 100 + s * 10 + b)).to_be_bytes());
                }
            }
        }
        std::fs::write(dir.path().join("bip.bip"), bytes).unwrap();

        let cube = load_envi(&hdr).unwrap();
        assert_eq!(cube.dim(), (2, 2, 3));
        assert_eq!(cube.data()[[1, 0, 2]], -102.0);
        assert_eq!(cube.data()[[0, 1, 1]], -11.0);
        // No wavelength field: band indices stand in.
        assert_eq!(cube.wavelengths().as_slice(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_load_json_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spectra.json");
        std::fs::write(
            &path,
            r#"[{"x": [1, 2, 3], "y": [0.1, 0.2, 0.3], "material": "leaf"},
                {"x": [1, 2, 3], "y": [0.4, 0.5, 0.6]}]"#,
        )
        .unwrap();
        let spectra = load_file(&path).unwrap();
        assert_eq!(spectra.len(), 2);
        assert_eq!(spectra.material(0), Some("leaf"));
        assert_eq!(spectra.material(1), Some(""));
        assert_eq!(spectra.row(1)[2], 0.6);
    }

    #[test]
    fn test_json_rows_must_share_axis() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spectra.json");
        std::fs::write(
            &path,
            r#"[{"x": [1, 2], "y": [0, 0]}, {"x": [1, 3], "y": [0, 0]}]"#,
        )
        .unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("differs"));
    }

    #[test]
    fn test_unknown_extension() {
        assert!(load_file(Path::new("cube.tiff")).is_err());
    }
}
