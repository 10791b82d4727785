use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Number of primary mirror segments
pub const N_SEGMENT: usize = 18;

/// Segment names ordered by segment ID
const SEGMENT_NAMES: [&str; N_SEGMENT] = [
    "A1", "A2", "A3", "A4", "A5", "A6", "B1", "C1", "B2", "C2", "B3", "C3", "B4", "C4", "B5", "C5",
    "B6", "C6",
];

/// Rotation of the segment control x-axis with respect to the telescope x-axis in degrees
const CONTROL_XAXIS_ROTATIONS: [(&str, f64); N_SEGMENT] = [
    ("A1", 180.),
    ("A2", 120.),
    ("A3", 60.),
    ("A4", 0.),
    ("A5", -60.),
    ("A6", -120.),
    ("B1", 0.),
    ("C1", 60.),
    ("B2", -60.),
    ("C2", 0.),
    ("B3", -120.),
    ("C3", -60.),
    ("B4", -180.),
    ("C4", -120.),
    ("B5", -240.),
    ("C5", -180.),
    ("B6", -300.),
    ("C6", -240.),
];

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("segment ID must be in the range [1,{N_SEGMENT}], found {0}")]
    Id(i64),
    #[error("unknown segment name: {0:?}")]
    Name(String),
}
pub type Result<T> = std::result::Result<T, SegmentError>;

/// Mirror segment ID in the range `[1,18]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SegmentId(u8);

impl SegmentId {
    /// Creates a segment ID, checking that it is in the range `[1,18]`
    pub fn new(id: i64) -> Result<Self> {
        if (1..=N_SEGMENT as i64).contains(&id) {
            Ok(Self(id as u8))
        } else {
            Err(SegmentError::Id(id))
        }
    }
    /// Iterator over the 18 segment IDs in ascending order
    pub fn all() -> impl Iterator<Item = SegmentId> {
        (1..=N_SEGMENT as u8).map(SegmentId)
    }
    /// Segment ID
    pub fn id(&self) -> usize {
        self.0 as usize
    }
    /// Zero based segment index
    pub fn index(&self) -> usize {
        self.0 as usize - 1
    }
    /// Segment name, e.g. `A1`
    pub fn name(&self) -> &'static str {
        SEGMENT_NAMES[self.index()]
    }
    /// Segment control group
    pub fn group(&self) -> SegmentGroup {
        match &self.name()[..1] {
            "A" => SegmentGroup::A,
            "B" => SegmentGroup::B,
            _ => SegmentGroup::C,
        }
    }
    /// Rotation of the segment control x-axis in degrees
    pub fn control_xaxis_rotation(&self) -> f64 {
        CONTROL_XAXIS_ROTATIONS[self.index()].1
    }
    /// Segment ID from the segment name
    ///
    /// Only the first 2 characters are considered, so both `A1` and `A1-1` are accepted
    pub fn from_name(name: &str) -> Result<Self> {
        let key = name.get(..2).ok_or_else(|| SegmentError::Name(name.to_string()))?;
        SEGMENT_NAMES
            .iter()
            .position(|&n| n == key)
            .map(|i| Self(i as u8 + 1))
            .ok_or_else(|| SegmentError::Name(name.to_string()))
    }
}

impl TryFrom<i64> for SegmentId {
    type Error = SegmentError;
    fn try_from(id: i64) -> Result<Self> {
        Self::new(id)
    }
}
impl From<SegmentId> for i64 {
    fn from(sid: SegmentId) -> Self {
        sid.0 as i64
    }
}
impl Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Segment control groups
///
/// The 3 groups of segments are controlled by 3 subsystems rotated by 60 degrees from each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentGroup {
    A,
    B,
    C,
}
impl SegmentGroup {
    /// Segment group from the first letter of a segment name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.chars().next() {
            Some('A') => Some(Self::A),
            Some('B') => Some(Self::B),
            Some('C') => Some(Self::C),
            _ => None,
        }
    }
    /// Adds the tilt induced by the secondary mirror piston (micron) to the segment `(x,y)` tilts (micro-radian)
    ///
    /// The coefficients are derived from the influence functions of the wavefront sensing control.
    pub fn sm_piston_coupling(&self, xtilt: f64, ytilt: f64, sm_piston: f64) -> (f64, f64) {
        match self {
            Self::A => (xtilt + sm_piston * 0.010502, ytilt),
            Self::B => (xtilt + sm_piston * -0.020093, ytilt),
            Self::C => (xtilt, ytilt + sm_piston * 0.017761),
        }
    }
}

/// Rotation of the control x-axis in degrees of the segment with the given name
pub fn control_xaxis_rotation(name: &str) -> Option<f64> {
    CONTROL_XAXIS_ROTATIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, rot)| *rot)
}
