//! Segment PSF library files naming and header content

use crate::{
    engine::PsfGrid,
    fits::Header,
    segment::{SegmentError, SegmentId},
};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("missing {0} keyword in segment PSF library header")]
    MissingKey(&'static str),
    #[error("invalid segment in library header")]
    Segment(#[from] SegmentError),
}
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Segment PSF library file name
///
/// The name is `{instrument}_{detector}_{filter}_fovp{fov_pixels}_samp1_npsf1_seg{segment:02}.fits`
/// with instrument, detector and filter in lower case.
pub fn artifact_filename(
    instrument: &str,
    detector: &str,
    filter: &str,
    fov_pixels: usize,
    sid: SegmentId,
) -> String {
    format!(
        "{}_{}_{}_fovp{}_samp1_npsf1_seg{:02}.fits",
        instrument.to_lowercase(),
        detector.to_lowercase(),
        filter.to_lowercase(),
        fov_pixels,
        sid.id()
    )
}

/// Rounds to 2 decimals, halves to even
fn round2(x: f64) -> f64 {
    (x * 100.).round_ties_even() / 100.
}

/// Segment metadata written into the header of a segment PSF library
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMetadata {
    pub sid: SegmentId,
    /// Segment name, e.g. `A1`
    pub name: String,
    /// `(x,y)` tilts in the segment control coordinates in micro-radians
    pub tilt: (f64, f64),
    /// Secondary mirror piston in microns
    pub sm_piston: Option<f64>,
    /// Telescope boresight offset `(V2,V3)` in arcminutes
    ///
    /// A header with `BSOFF_V2` but without `BSOFF_V3` gives a `(V2,0)` offset,
    /// a header without `BSOFF_V2` gives no offset.
    pub boresight: Option<(f64, f64)>,
}

impl SegmentMetadata {
    /// Creates the segment metadata, the tilts are rounded to 2 decimals
    pub fn new(
        sid: SegmentId,
        tilt: [f64; 2],
        sm_piston: Option<f64>,
        boresight: Option<(f64, f64)>,
    ) -> Self {
        Self {
            sid,
            name: sid.name().to_string(),
            tilt: (round2(tilt[0]), round2(tilt[1])),
            sm_piston,
            boresight,
        }
    }
    /// Adds the segment metadata to the PSF grid metadata
    pub fn annotate(&self, grid: &mut PsfGrid) {
        grid.insert_meta("SEGID", self.sid.id(), "ID of the mirror segment");
        grid.insert_meta("SEGNAME", self.name.as_str(), "Name of the mirror segment");
        grid.insert_meta(
            "XTILT",
            self.tilt.0,
            "X tilt of the segment in micro radians",
        );
        grid.insert_meta(
            "YTILT",
            self.tilt.1,
            "Y tilt of the segment in micro radians",
        );
        if let Some(sm_piston) = self.sm_piston {
            grid.insert_meta(
                "SMPISTON",
                sm_piston,
                "Secondary mirror piston (defocus) in microns",
            );
        }
        if let Some((v2, v3)) = self.boresight {
            grid.insert_meta(
                "BSOFF_V2",
                v2,
                "Telescope boresight offset in V2 in arcminutes",
            );
            grid.insert_meta(
                "BSOFF_V3",
                v3,
                "Telescope boresight offset in V3 in arcminutes",
            );
        }
    }
    /// Reads the segment metadata from a segment PSF library header
    ///
    /// The secondary mirror piston and the boresight offset are optional
    pub fn from_header(header: &mut Header) -> Result<Self> {
        let id = header
            .integer("SEGID")
            .ok_or(ArtifactError::MissingKey("SEGID"))?;
        let name = header
            .text("SEGNAME")
            .ok_or(ArtifactError::MissingKey("SEGNAME"))?;
        let xtilt = header
            .float("XTILT")
            .ok_or(ArtifactError::MissingKey("XTILT"))?;
        let ytilt = header
            .float("YTILT")
            .ok_or(ArtifactError::MissingKey("YTILT"))?;
        let boresight = match (header.float("BSOFF_V2"), header.float("BSOFF_V3")) {
            (Some(v2), Some(v3)) => Some((v2, v3)),
            (Some(v2), None) => {
                log::warn!("BSOFF_V2 without BSOFF_V3 in segment {name} library, V3 offset set to 0");
                Some((v2, 0.))
            }
            (None, _) => None,
        };
        Ok(Self {
            sid: SegmentId::new(id)?,
            name,
            tilt: (xtilt, ytilt),
            sm_piston: header.float("SMPISTON"),
            boresight,
        })
    }
}
