//! Hyperspectral image toolkit: cube loading and unfolding, region masks,
//! and triangle-descriptor spectral matching.

pub mod config;
pub mod data;
pub mod descriptor;
pub mod matching;

pub use config::AnalysisConfig;
pub use data::cube::{HyperCube, unfold_cube};
pub use data::mask::RegionMask;
pub use data::model::{ModelError, Spectra, WavelengthVector};
pub use descriptor::set::{DescriptorSet, Reduction, SetScore};
pub use descriptor::triangle::{DescriptorError, TriangleDescriptor, TriangleMatch};
pub use descriptor::{MatchError, SpectralDescriptor};
pub use matching::{MatchTable, match_spectra};
