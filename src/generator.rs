//! Segment PSF libraries generation
//!
//! The PSF libraries of the segments are computed in parallel, one segment per worker.
//! For each segment, the pupil is restricted to the segment and a PSF grid is computed
//! for all the pairs of detector and filter that belong to the same wavelength regime.

use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    artifact::{artifact_filename, SegmentMetadata},
    engine::{EngineError, GridOptions, GridRequest, InstrumentConfig, PsfEngine},
    fits::{self, FitsError},
    instrument::{is_compatible, Detectors, Filters, InstrumentError, INSTRUMENT},
    mirror::MirrorState,
    segment::{SegmentError, SegmentId, N_SEGMENT},
    Builder, FromBuilder,
};

/// Named coarse pointing jitter models
pub const JITTER_PRESETS: [&str; 2] = ["PCS=Coarse_Like_ITM", "PCS=Coarse"];

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("invalid detectors or filters")]
    Instrument(#[from] InstrumentError),
    #[error("invalid segment selection")]
    Segment(#[from] SegmentError),
    #[error("the PSF field of view must be at least 1 pixel")]
    FovPixels,
    #[error("no matching filters and detectors given for segment {0}: all filters are longwave but detectors are shortwave, or vice versa")]
    NoMatch(SegmentId),
    #[error("PSF grid computation failed for segment {sid} with {detector}/{filter}")]
    Engine {
        sid: SegmentId,
        detector: String,
        filter: String,
        #[source]
        source: EngineError,
    },
    #[error("cannot save segment PSF library")]
    Fits(#[from] FitsError),
    #[error("cannot create the pool of workers")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("cannot open segment PSFs builder toml file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create segment PSFs builder toml file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read segment PSFs builder toml file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write segment PSFs builder toml file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize segment PSFs builder from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize segment PSFs builder into toml")]
    Save(#[from] toml::ser::Error),
}
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Telescope pointing jitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Jitter {
    /// Gaussian jitter with the given radial sigma in arcseconds
    Gaussian(f64),
    /// Named jitter model, one of [`JITTER_PRESETS`]
    Named(String),
}
impl From<f64> for Jitter {
    fn from(sigma: f64) -> Self {
        Self::Gaussian(sigma)
    }
}
impl From<&str> for Jitter {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}
impl Jitter {
    /// Sets the jitter options of the optical model
    ///
    /// An unknown jitter model is ignored and the model default jitter is kept
    pub fn apply(&self, options: &mut toml::Table) {
        match self {
            Self::Gaussian(sigma) => {
                options.insert("jitter".into(), "gaussian".into());
                options.insert("jitter_sigma".into(), (*sigma).into());
                log::info!("Adding jitter {sigma}");
            }
            Self::Named(name) if JITTER_PRESETS.contains(&name.as_str()) => {
                options.insert("jitter".into(), name.as_str().into());
                log::info!("Adding {name} jitter");
            }
            Self::Named(name) => {
                log::warn!(
                    "Invalid jitter {name:?}, must be one of: {JITTER_PRESETS:?}. Ignoring and using defaults."
                );
            }
        }
    }
}

/// Segment PSF libraries builder
///
/// Default properties:
///  * mirror state : aligned segments
///  * output directory : current directory
///  * filters : F212N, F480M
///  * detectors : all
///  * field of view : 1024 pixels
///  * boresight offset : none
///  * overwrite : false
///  * segments : all
///  * jitter : optical model default
///  * # of wavelengths : 10
///  * optical model options : none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentPsfsBuilder {
    pub output_dir: PathBuf,
    pub filters: Filters,
    pub detectors: Detectors,
    pub fov_pixels: usize,
    pub boresight: Option<(f64, f64)>,
    pub overwrite: bool,
    pub segments: Option<Vec<usize>>,
    pub jitter: Option<Jitter>,
    pub nlambda: usize,
    pub mirror_state: MirrorState,
    pub options: Option<toml::Table>,
}
impl Default for SegmentPsfsBuilder {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            filters: Default::default(),
            detectors: Default::default(),
            fov_pixels: 1024,
            boresight: None,
            overwrite: false,
            segments: None,
            jitter: None,
            nlambda: 10,
            mirror_state: Default::default(),
            options: None,
        }
    }
}
impl SegmentPsfsBuilder {
    /// Load the builder from a toml file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(&path)
            .map_err(|e| GeneratorError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| GeneratorError::Read(e, path.as_ref().to_path_buf()))?;
        let builder: SegmentPsfsBuilder = toml::from_str(&toml)?;
        Ok(builder)
    }
    /// Save the builder into a toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        let mut file = File::create(&path)
            .map_err(|e| GeneratorError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# ::segment_psfs::SegmentPsfsBuilder\n\n{}", toml)
            .map_err(|e| GeneratorError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    /// Sets the segments tip-tilt and the secondary mirror piston
    pub fn mirror_state(self, mirror_state: MirrorState) -> Self {
        Self {
            mirror_state,
            ..self
        }
    }
    /// Sets the directory the libraries are written to
    pub fn output_dir<P: AsRef<Path>>(self, output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            ..self
        }
    }
    /// Sets the filter or the list of filters
    pub fn filters<F: Into<Filters>>(self, filters: F) -> Self {
        Self {
            filters: filters.into(),
            ..self
        }
    }
    /// Sets the detector, the list of detectors or `"all"`
    pub fn detectors<D: Into<Detectors>>(self, detectors: D) -> Self {
        Self {
            detectors: detectors.into(),
            ..self
        }
    }
    /// Sets the size of the PSFs in pixels
    pub fn fov_pixels(self, fov_pixels: usize) -> Self {
        Self { fov_pixels, ..self }
    }
    /// Sets the telescope boresight `(V2,V3)` offset in arcminutes
    ///
    /// The offset is added on top of the segment tip-tilt
    pub fn boresight(self, v2: f64, v3: f64) -> Self {
        Self {
            boresight: Some((v2, v3)),
            ..self
        }
    }
    /// Overwrites existing libraries
    pub fn overwrite(self, overwrite: bool) -> Self {
        Self { overwrite, ..self }
    }
    /// Restricts the computation to a single segment
    pub fn segment(self, segment_id: usize) -> Self {
        Self {
            segments: Some(vec![segment_id]),
            ..self
        }
    }
    /// Restricts the computation to a subset of segments
    pub fn segments(self, segment_ids: Vec<usize>) -> Self {
        Self {
            segments: Some(segment_ids),
            ..self
        }
    }
    /// Sets the telescope pointing jitter
    pub fn jitter<J: Into<Jitter>>(self, jitter: J) -> Self {
        Self {
            jitter: Some(jitter.into()),
            ..self
        }
    }
    /// Sets the number of wavelengths of the polychromatic PSFs
    pub fn nlambda(self, nlambda: usize) -> Self {
        Self { nlambda, ..self }
    }
    /// Sets additional options of the optical model
    ///
    /// The options are applied after the jitter options
    pub fn options(self, options: toml::Table) -> Self {
        Self {
            options: Some(options),
            ..self
        }
    }
}

impl Builder for SegmentPsfsBuilder {
    type Component = SegmentPsfs;

    fn build(self) -> crate::Result<SegmentPsfs> {
        let filters = self.filters.resolve().map_err(GeneratorError::from)?;
        let detectors = self.detectors.resolve().map_err(GeneratorError::from)?;
        if self.fov_pixels == 0 {
            return Err(GeneratorError::FovPixels.into());
        }
        let segments = match self.segments {
            Some(ids) => ids
                .into_iter()
                .map(|id| SegmentId::new(id as i64))
                .collect::<std::result::Result<Vec<_>, SegmentError>>()
                .map_err(GeneratorError::from)?,
            None => SegmentId::all().collect(),
        };
        let mut options = toml::Table::new();
        if let Some(jitter) = &self.jitter {
            jitter.apply(&mut options);
        }
        if let Some(extra) = self.options {
            for (key, value) in extra {
                options.insert(key, value);
            }
        }
        Ok(SegmentPsfs {
            mirror_state: self.mirror_state,
            output_dir: self.output_dir,
            filters,
            detectors,
            segments,
            boresight: self.boresight,
            options,
            grid: GridOptions {
                fov_pixels: self.fov_pixels,
                overwrite: self.overwrite,
                nlambda: self.nlambda,
                ..Default::default()
            },
        })
    }
}

/// Segment PSF libraries generator
#[derive(Debug, Clone)]
pub struct SegmentPsfs {
    mirror_state: MirrorState,
    output_dir: PathBuf,
    filters: Vec<String>,
    detectors: Vec<String>,
    segments: Vec<SegmentId>,
    boresight: Option<(f64, f64)>,
    options: toml::Table,
    grid: GridOptions,
}
impl FromBuilder for SegmentPsfs {
    type ComponentBuilder = SegmentPsfsBuilder;
}

/// Number of workers: half the available cores up to the number of segments
pub fn worker_count() -> usize {
    let n_core = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (n_core / 2).clamp(1, N_SEGMENT)
}

impl SegmentPsfs {
    /// Returns the segments the libraries are computed for
    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }
    /// Returns the optical model options
    pub fn options(&self) -> &toml::Table {
        &self.options
    }
    /// Returns the paths of the libraries that are written by [`SegmentPsfs::generate`]
    pub fn library_files(&self) -> Vec<PathBuf> {
        self.segments
            .iter()
            .flat_map(|&sid| {
                self.matching_pairs()
                    .into_iter()
                    .map(move |(detector, filter)| self.library_file(detector, filter, sid))
            })
            .collect()
    }
    fn library_file(&self, detector: &str, filter: &str, sid: SegmentId) -> PathBuf {
        self.output_dir.join(artifact_filename(
            INSTRUMENT,
            detector,
            filter,
            self.grid.fov_pixels,
            sid,
        ))
    }
    /// Pairs of detector and filter in the same wavelength regime
    fn matching_pairs(&self) -> Vec<(&str, &str)> {
        self.detectors
            .iter()
            .flat_map(|detector| {
                self.filters
                    .iter()
                    .map(move |filter| (detector.as_str(), filter.as_str()))
            })
            .filter(|(detector, filter)| is_compatible(detector, filter))
            .collect()
    }
    fn task(&self, sid: SegmentId) -> SegmentTask {
        SegmentTask {
            metadata: SegmentMetadata::new(
                sid,
                self.mirror_state.segment_tilt(sid),
                Some(self.mirror_state.secondary_mirror_piston()),
                self.boresight,
            ),
            pairs: self
                .matching_pairs()
                .into_iter()
                .map(|(detector, filter)| {
                    (
                        detector.to_string(),
                        filter.to_string(),
                        self.library_file(detector, filter, sid),
                    )
                })
                .collect(),
            instrument: InstrumentConfig {
                detector: String::new(),
                filter: String::new(),
                pupil_segment: sid,
                options: self.options.clone(),
            },
            mirror_state: self.mirror_state.clone(),
            grid: self.grid.clone(),
        }
    }
    /// Computes and saves the PSF libraries of the segments
    ///
    /// All the segments are computed even if some of them fail,
    /// the error of the first failed segment is returned once all the segments are done.
    pub fn generate<E: PsfEngine>(&self, engine: &E) -> Result<()> {
        let tasks: Vec<_> = self.segments.iter().map(|&sid| self.task(sid)).collect();

        let n_worker = worker_count();
        log::info!("Will perform parallelized calculation using {n_worker} workers");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_worker)
            .build()?;

        let pb = ProgressBar::new(tasks.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{msg} [{eta_precise}] {bar:50.cyan/blue} {pos:>3}/{len:3}")
        {
            pb.set_style(style);
        }
        pb.set_message("Segment PSFs");

        let now = Instant::now();
        let results: Vec<Result<()>> = pool.install(|| {
            tasks
                .into_par_iter()
                .progress_with(pb)
                .map(|task| task.run(engine))
                .collect()
        });
        log::info!("Elapsed time (all segments): {:?}", now.elapsed());

        let n_failed = results.iter().filter(|result| result.is_err()).count();
        if n_failed > 0 {
            log::error!("{n_failed}/{} segments failed", results.len());
        }
        results.into_iter().collect()
    }
}

/// Computation of the libraries of one segment
///
/// A task owns its copy of the instrument configuration and of the mirror state.
struct SegmentTask {
    metadata: SegmentMetadata,
    /// Detector, filter and library path
    pairs: Vec<(String, String, PathBuf)>,
    instrument: InstrumentConfig,
    mirror_state: MirrorState,
    grid: GridOptions,
}
impl SegmentTask {
    fn run<E: PsfEngine>(self, engine: &E) -> Result<()> {
        let sid = self.metadata.sid;
        log::info!("GENERATING SEGMENT {sid} DATA");
        if self.pairs.is_empty() {
            return Err(GeneratorError::NoMatch(sid));
        }
        let mut request = GridRequest {
            instrument: self.instrument,
            mirror_state: self.mirror_state,
            options: self.grid,
        };
        for (detector, filter, path) in self.pairs {
            request.instrument.detector = detector;
            request.instrument.filter = filter;
            let mut grid = engine
                .psf_grid(&request)
                .map_err(|source| GeneratorError::Engine {
                    sid,
                    detector: request.instrument.detector.clone(),
                    filter: request.instrument.filter.clone(),
                    source,
                })?;
            grid.meta.remove("grid_xypos");
            grid.meta.remove("oversampling");
            self.metadata.annotate(&mut grid);
            fits::write_primary(&path, &grid, request.options.overwrite)?;
            log::info!("Saved gridded library file to {}", path.display());
        }
        Ok(())
    }
}

/// Computes and saves the PSF libraries of the segments
pub fn generate_segment_psfs<E: PsfEngine>(engine: &E, psfs: &SegmentPsfs) -> crate::Result<()> {
    Ok(psfs.generate(engine)?)
}
