/// Data layer: core types, loading, masking and export.
///
/// Architecture:
/// ```text
///  .hdr + raw       .parquet / .json
///        │                │
///        ▼                ▼
///   ┌──────────┐    ┌──────────┐
///   │   cube    │    │  loader   │  parse file → Spectra
///   └──────────┘    └──────────┘
///        │ unfold         │
///        ▼                ▼
///   ┌─────────────────────────┐
///   │ Spectra                  │  Array2 rows × bands, shared WavelengthVector
///   └─────────────────────────┘
///        │                ▲
///        ▼                │
///   ┌──────────┐    ┌──────────┐
///   │  filter   │◄───│   mask    │  PNG → binary grid → in-region indices
///   └──────────┘    └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  Spectra → .parquet
///   └──────────┘
/// ```

pub mod cube;
pub mod export;
pub mod filter;
pub mod loader;
pub mod mask;
pub mod model;
