//!
//! # NIRCam segment PSF libraries
//!
//! The crate generates, locates and interprets the PSF libraries of the 18 individual mirror
//! segments as seen by the NIRCam detectors.
//! A segment PSF library is a FITS file with the PSF of a single segment and, in its header,
//! the segment tip-tilt in the segment control frame.
//!
//! The libraries are generated with a [`PsfEngine`], an optical model provided by the caller:
//! ```no_run
//! use segment_psfs::{generate_segment_psfs, Builder, FromBuilder, MirrorState, SegmentPsfs};
//! # fn example<E: segment_psfs::PsfEngine>(engine: impl Fn() -> E) -> Result<(), segment_psfs::SegmentPsfError> {
//! let psfs = SegmentPsfs::builder()
//!     .mirror_state(MirrorState::default())
//!     .output_dir("libraries")
//!     .filters("F212N")
//!     .detectors("NRCA3")
//!     .build()?;
//! generate_segment_psfs(&engine(), &psfs)?;
//! # Ok(())
//! # }
//! # fn main() {}
//! ```
//! and the segment PSF offsets on the detector are derived from the libraries headers:
//! ```no_run
//! use segment_psfs::{get_segment_library_list, get_segment_offset};
//! let libraries = get_segment_library_list("NIRCam", "NRCA3", "F212N", "libraries", "CLEAR");
//! let offset = get_segment_offset(7, "NRCA3", &libraries)?;
//! println!("Segment #7 offset: {offset}");
//! # Ok::<(), segment_psfs::SegmentPsfError>(())
//! ```

pub mod artifact;
pub mod engine;
pub mod error;
pub mod fits;
pub mod generator;
pub mod instrument;
pub mod library;
pub mod mirror;
pub mod offset;
pub mod segment;

#[doc(inline)]
pub use self::artifact::{artifact_filename, SegmentMetadata};
#[doc(inline)]
pub use self::engine::{GridOptions, GridRequest, InstrumentConfig, MetaValue, PsfEngine, PsfGrid};
#[doc(inline)]
pub use self::error::SegmentPsfError;
#[doc(inline)]
pub use self::generator::{generate_segment_psfs, Jitter, SegmentPsfs, SegmentPsfsBuilder};
#[doc(inline)]
pub use self::instrument::{Detectors, Filters, WavelengthRegime};
#[doc(inline)]
pub use self::library::{
    get_gridded_segment_psf_library_list, get_segment_library_list, CanonicalLocator,
    GriddedPsfModel, LibraryFileLocator, LibraryQuery,
};
#[doc(inline)]
pub use self::mirror::MirrorState;
#[doc(inline)]
pub use self::offset::{get_segment_offset, segment_offsets, SegmentOffset};
#[doc(inline)]
pub use self::segment::{SegmentGroup, SegmentId, N_SEGMENT};

pub type Result<T> = std::result::Result<T, SegmentPsfError>;

/// Builder type trait
pub trait Builder: Default {
    type Component;
    fn new() -> Self {
        Default::default()
    }
    fn build(self) -> Result<Self::Component>;
}

/// Gives access to the builder of a component
pub trait FromBuilder {
    type ComponentBuilder: Builder;
    fn builder() -> Self::ComponentBuilder {
        Default::default()
    }
}
