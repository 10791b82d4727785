//! Interface to the optical model that computes the PSF grids

use std::{collections::BTreeMap, fmt::Display};

use crate::{mirror::MirrorState, segment::SegmentId};

/// Error returned by a [`PsfEngine`]
#[derive(Debug, thiserror::Error)]
#[error("PSF grid computation failed")]
pub struct EngineError(#[source] pub Box<dyn std::error::Error + Send + Sync>);
impl EngineError {
    pub fn new<E: Into<Box<dyn std::error::Error + Send + Sync>>>(error: E) -> Self {
        Self(error.into())
    }
}

/// PSF grid metadata value
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Logical(bool),
    /// List of `(x,y)` positions, e.g. the PSF grid points
    Points(Vec<(f64, f64)>),
}
impl Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(val) => write!(f, "{val}"),
            Self::Float(val) => write!(f, "{val}"),
            Self::Text(val) => write!(f, "{val:?}"),
            Self::Logical(val) => write!(f, "{}", if *val { "T" } else { "F" }),
            Self::Points(val) => write!(f, "{val:?}"),
        }
    }
}
impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}
impl From<usize> for MetaValue {
    fn from(value: usize) -> Self {
        Self::Integer(value as i64)
    }
}
impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}
impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Logical(value)
    }
}

/// Metadata entry: a value and its comment
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub value: MetaValue,
    pub comment: String,
}
impl Card {
    pub fn new<V: Into<MetaValue>>(value: V, comment: &str) -> Self {
        Self {
            value: value.into(),
            comment: comment.into(),
        }
    }
}

/// Metadata of a PSF grid, sorted by key
pub type Meta = BTreeMap<String, Card>;

/// PSF grid computed by a [`PsfEngine`]
#[derive(Debug, Clone, Default)]
pub struct PsfGrid {
    /// Pixel values, row major
    pub data: Vec<f64>,
    /// Image `(rows,columns)`
    pub shape: (usize, usize),
    pub meta: Meta,
}
impl PsfGrid {
    pub fn new(data: Vec<f64>, shape: (usize, usize)) -> Self {
        Self {
            data,
            shape,
            ..Default::default()
        }
    }
    /// Adds a metadata entry, replacing any previous entry with the same key
    pub fn insert_meta<V: Into<MetaValue>>(&mut self, key: &str, value: V, comment: &str) {
        self.meta.insert(key.to_string(), Card::new(value, comment));
    }
}

/// Instrument configuration the PSF grid is computed for
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConfig {
    pub detector: String,
    pub filter: String,
    /// The pupil is restricted to this segment
    pub pupil_segment: SegmentId,
    /// Optical model options
    pub options: toml::Table,
}

/// PSF grid computation options
#[derive(Debug, Clone, PartialEq)]
pub struct GridOptions {
    pub num_psfs: usize,
    pub save: bool,
    pub all_detectors: bool,
    pub use_detsampled_psf: bool,
    pub fov_pixels: usize,
    pub oversample: usize,
    pub overwrite: bool,
    pub add_distortion: bool,
    pub nlambda: usize,
    pub verbose: bool,
}
/// Default: a single detector sampled PSF of 1024x1024 pixels over 10 wavelengths without distortion
impl Default for GridOptions {
    fn default() -> Self {
        Self {
            num_psfs: 1,
            save: false,
            all_detectors: false,
            use_detsampled_psf: true,
            fov_pixels: 1024,
            oversample: 1,
            overwrite: false,
            add_distortion: false,
            nlambda: 10,
            verbose: false,
        }
    }
}

/// PSF grid request
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    pub instrument: InstrumentConfig,
    pub mirror_state: MirrorState,
    pub options: GridOptions,
}

/// Optical model computing polychromatic PSF grids
///
/// The returned metadata is expected to contain the grid point positions (`grid_xypos`)
/// and the oversampling factor (`oversampling`), other entries are written into the library headers.
pub trait PsfEngine: Sync {
    fn psf_grid(&self, request: &GridRequest) -> std::result::Result<PsfGrid, EngineError>;
}

impl<T: PsfEngine> PsfEngine for &T {
    fn psf_grid(&self, request: &GridRequest) -> std::result::Result<PsfGrid, EngineError> {
        (*self).psf_grid(request)
    }
}
