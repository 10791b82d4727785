//! Segment PSF libraries lookup and loading

use std::path::{Path, PathBuf};

use crate::{
    artifact::{artifact_filename, ArtifactError, SegmentMetadata},
    fits::{read_primary, FitsError, Header},
    segment::SegmentId,
};

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("cannot read segment PSF library")]
    Fits(#[from] FitsError),
    #[error("invalid segment PSF library header in {1}")]
    Header(#[source] ArtifactError, PathBuf),
}
pub type Result<T> = std::result::Result<T, LibraryError>;

/// PSF library lookup parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryQuery {
    pub instrument: String,
    pub detector: String,
    pub filter: String,
    pub pupil: String,
    pub extra: String,
    pub grid_index: usize,
    pub library_path: PathBuf,
}
impl LibraryQuery {
    /// Creates a new query with a `CLEAR` pupil
    pub fn new<P: AsRef<Path>>(instrument: &str, detector: &str, filter: &str, library_path: P) -> Self {
        Self {
            instrument: instrument.into(),
            detector: detector.into(),
            filter: filter.into(),
            pupil: "CLEAR".into(),
            extra: String::new(),
            grid_index: 0,
            library_path: library_path.as_ref().to_path_buf(),
        }
    }
    /// Sets the pupil wheel element
    pub fn pupil(self, pupil: &str) -> Self {
        Self {
            pupil: pupil.into(),
            ..self
        }
    }
    /// Returns the paths to the libraries of the 18 segments, ordered by segment ID
    ///
    /// The files are not checked for existence.
    pub fn segment_library_list<L: LibraryFileLocator>(&self, locator: &L) -> Vec<PathBuf> {
        SegmentId::all()
            .map(|sid| locator.locate(self, sid))
            .collect()
    }
    /// Loads the libraries of the 18 segments, ordered by segment ID
    pub fn gridded_segment_psf_library_list<L: LibraryFileLocator>(
        &self,
        locator: &L,
    ) -> Result<Vec<GriddedPsfModel>> {
        let library_list = self.segment_library_list(locator);
        log::info!("Segment PSFs will be generated using:");
        for path in &library_list {
            log::info!(
                " - {}",
                path.file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_default()
            );
        }
        library_list.iter().map(GriddedPsfModel::from_fits).collect()
    }
}

/// Segment PSF library file locator
pub trait LibraryFileLocator {
    /// Returns the path to the library of a segment
    fn locate(&self, query: &LibraryQuery, sid: SegmentId) -> PathBuf;
}

/// Locates the segment libraries by their canonical file names
///
/// The pupil is not part of the file names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalLocator {
    pub fov_pixels: usize,
}
/// Default: 1024 pixels field of view
impl Default for CanonicalLocator {
    fn default() -> Self {
        Self { fov_pixels: 1024 }
    }
}
impl CanonicalLocator {
    pub fn new(fov_pixels: usize) -> Self {
        Self { fov_pixels }
    }
}
impl LibraryFileLocator for CanonicalLocator {
    fn locate(&self, query: &LibraryQuery, sid: SegmentId) -> PathBuf {
        query.library_path.join(artifact_filename(
            &query.instrument,
            &query.detector,
            &query.filter,
            self.fov_pixels,
            sid,
        ))
    }
}

/// Returns the paths to the libraries of the 18 segments, ordered by segment ID
pub fn get_segment_library_list<P: AsRef<Path>>(
    instrument: &str,
    detector: &str,
    filter: &str,
    library_path: P,
    pupil: &str,
) -> Vec<PathBuf> {
    LibraryQuery::new(instrument, detector, filter, library_path)
        .pupil(pupil)
        .segment_library_list(&CanonicalLocator::default())
}

/// Loads the libraries of the 18 segments, ordered by segment ID
pub fn get_gridded_segment_psf_library_list<P: AsRef<Path>>(
    instrument: &str,
    detector: &str,
    filter: &str,
    library_path: P,
    pupil: &str,
) -> crate::Result<Vec<GriddedPsfModel>> {
    Ok(LibraryQuery::new(instrument, detector, filter, library_path)
        .pupil(pupil)
        .gridded_segment_psf_library_list(&CanonicalLocator::default())?)
}

/// Gridded PSF model of a segment PSF library
#[derive(Debug, Clone)]
pub struct GriddedPsfModel {
    /// PSF pixel values, row major
    pub data: Vec<f64>,
    /// PSF `(rows,columns)`
    pub shape: (usize, usize),
    /// `(x,y)` detector positions of the PSFs in the grid
    pub grid_xypos: Vec<(f64, f64)>,
    pub oversampling: usize,
    pub segment: SegmentMetadata,
}
impl GriddedPsfModel {
    /// Loads a segment PSF library
    ///
    /// The grid positions are read from the `DET_YX{n}` keywords and default to the center of the image,
    /// the oversampling is read from the `OVERSAMP` keyword and defaults to 1.
    pub fn from_fits<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut image = read_primary(&path)?;
        let segment = SegmentMetadata::from_header(&mut image.header)
            .map_err(|e| LibraryError::Header(e, path.as_ref().to_path_buf()))?;
        let mut grid_xypos = grid_positions(&mut image.header);
        if grid_xypos.is_empty() {
            let (n_row, n_col) = image.shape;
            grid_xypos.push(((n_col as f64 - 1.) / 2., (n_row as f64 - 1.) / 2.));
        }
        let oversampling = image
            .header
            .integer("OVERSAMP")
            .map(|o| o as usize)
            .unwrap_or(1);
        Ok(Self {
            data: image.data,
            shape: image.shape,
            grid_xypos,
            oversampling,
            segment,
        })
    }
    /// Number of PSFs in the grid
    pub fn n_psf(&self) -> usize {
        self.grid_xypos.len()
    }
}

/// Reads the `(x,y)` positions from the `DET_YX{n} = '(y, x)'` keywords
fn grid_positions(header: &mut Header) -> Vec<(f64, f64)> {
    (0..)
        .map_while(|i| header.text(&format!("DET_YX{i}")))
        .filter_map(|yx| {
            let yx: Vec<f64> = yx
                .trim_matches(|c| c == '(' || c == ')')
                .split(',')
                .filter_map(|v| v.trim().parse().ok())
                .collect();
            match yx[..] {
                [y, x] => Some((x, y)),
                _ => None,
            }
        })
        .collect()
}
