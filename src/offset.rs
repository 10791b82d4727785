//! Segment PSF offsets on the detector
//!
//! The tip-tilt of a segment is given in the segment control coordinate system.
//! The control coordinate systems of the 18 segments are rotated with respect to each other,
//! the segment tilts are rotated into the telescope coordinate system and converted into
//! angular offsets of the segment PSF on the sky.

use std::{fmt::Display, path::Path};

use nalgebra as na;
use skyangle::Conversion;

use crate::{
    artifact::{ArtifactError, SegmentMetadata},
    fits::{FitsError, Header},
    segment::{control_xaxis_rotation, SegmentError, SegmentGroup, SegmentId, N_SEGMENT},
};

#[derive(Debug, thiserror::Error)]
pub enum OffsetError {
    #[error("expected {N_SEGMENT} segment PSF libraries, found {0}")]
    LibraryCount(usize),
    #[error("invalid segment")]
    Segment(#[from] SegmentError),
    #[error("the segment ID ({found}) of the library does not match the requested segment ({expected}): the library list was not assembled correctly")]
    Inconsistent { expected: usize, found: usize },
    #[error("cannot read segment PSF library header")]
    Header(#[from] FitsError),
    #[error("invalid segment PSF library header")]
    Metadata(#[from] ArtifactError),
    #[error("no control axis rotation for segment {0}")]
    Rotation(String),
}
pub type Result<T> = std::result::Result<T, OffsetError>;

/// Segment PSF offset on the detector in arcseconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentOffset {
    pub x_arcsec: f64,
    pub y_arcsec: f64,
}
impl Display for SegmentOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:+.3},{:+.3})arcsec", self.x_arcsec, self.y_arcsec)
    }
}
impl From<SegmentOffset> for (f64, f64) {
    fn from(offset: SegmentOffset) -> Self {
        (offset.x_arcsec, offset.y_arcsec)
    }
}

impl SegmentMetadata {
    /// Computes the segment PSF offset
    ///
    /// The secondary mirror piston adds a tilt to the segments, it is added to the tilt of the
    /// segment along one of the control axis depending on the segment group.
    /// A tilt along the control x-axis moves the PSF along the telescope y-axis and vice versa.
    /// The tilts are doubled by the reflection on the mirror.
    /// The telescope boresight offset is applied last.
    pub fn offset(&self) -> Result<SegmentOffset> {
        let name = self.name.get(..2).unwrap_or(&self.name);
        let (mut xtilt, mut ytilt) = self.tilt;
        if let Some(group) = SegmentGroup::from_name(name) {
            (xtilt, ytilt) = group.sm_piston_coupling(xtilt, ytilt, self.sm_piston.unwrap_or(0.));
        }

        let x_rot = control_xaxis_rotation(name)
            .ok_or_else(|| OffsetError::Rotation(name.to_string()))?;
        let rotation = na::Rotation2::new(x_rot.to_radians());
        let tilt = rotation * na::Vector2::new(xtilt, ytilt);
        let (tilt_onto_y, tilt_onto_x) = (tilt.x, tilt.y);

        let mut x_arcsec = 2. * (tilt_onto_x * 1e-6).to_arcsec();
        let mut y_arcsec = 2. * (tilt_onto_y * 1e-6).to_arcsec();

        if let Some((v2, v3)) = self.boresight {
            x_arcsec -= v2 * 60.;
            y_arcsec += v3 * 60.;
            log::info!(
                "Added a telescope boresight offset ({v2},{v3})arcmin to segment {}",
                self.name
            );
        }
        Ok(SegmentOffset { x_arcsec, y_arcsec })
    }
}

/// Computes the PSF offset of a segment on a detector from the header of the segment PSF library
///
/// `library_list` is the list of the 18 segment PSF libraries ordered by segment ID,
/// the library of the segment is checked to belong to the requested segment.
/// The offset does not depend on the detector.
pub fn get_segment_offset<P: AsRef<Path>>(
    segment_id: usize,
    detector: &str,
    library_list: &[P],
) -> crate::Result<SegmentOffset> {
    let sid = SegmentId::new(segment_id as i64).map_err(OffsetError::from)?;
    let path = library_list
        .get(sid.index())
        .ok_or(OffsetError::LibraryCount(library_list.len()))?;
    log::debug!(
        "segment {sid} offset on {detector} from {:?}",
        path.as_ref()
    );
    Ok(library_offset(sid, path)?)
}

fn library_offset<P: AsRef<Path>>(sid: SegmentId, path: P) -> Result<SegmentOffset> {
    let mut header = Header::read(path)?;
    let found = header
        .integer("SEGID")
        .ok_or(ArtifactError::MissingKey("SEGID"))?;
    if found != sid.id() as i64 {
        return Err(OffsetError::Inconsistent {
            expected: sid.id(),
            found: found as usize,
        });
    }
    SegmentMetadata::from_header(&mut header)?.offset()
}

/// Computes the PSF offsets of the 18 segments on a detector
pub fn segment_offsets<P: AsRef<Path>>(
    detector: &str,
    library_list: &[P],
) -> crate::Result<Vec<SegmentOffset>> {
    if library_list.len() != N_SEGMENT {
        return Err(OffsetError::LibraryCount(library_list.len()).into());
    }
    SegmentId::all()
        .map(|sid| get_segment_offset(sid.id(), detector, library_list))
        .collect()
}
