use std::{
    fmt::Display,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::segment::{SegmentId, N_SEGMENT};

#[derive(Debug, thiserror::Error)]
pub enum MirrorStateError {
    #[error("expected the tip-tilt of {N_SEGMENT} segments, found {0}")]
    SegmentCount(usize),
    #[error("cannot open mirror state toml file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create mirror state toml file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read mirror state toml file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write mirror state toml file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize the mirror state from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize the mirror state into toml")]
    Save(#[from] toml::ser::Error),
}
pub type Result<T> = std::result::Result<T, MirrorStateError>;

/// Primary mirror segments tip-tilt and secondary mirror piston
///
/// The segment tilts are given in the segment control coordinate system
/// and the secondary mirror piston is in microns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorState {
    segment_tilts: Vec<[f64; 2]>,
    #[serde(default)]
    sm_piston: f64,
}
/// Default: all segments aligned and no secondary mirror piston
impl Default for MirrorState {
    fn default() -> Self {
        Self {
            segment_tilts: vec![[0f64; 2]; N_SEGMENT],
            sm_piston: 0f64,
        }
    }
}
impl MirrorState {
    /// Creates a new mirror state from the `(x,y)` tilts of the 18 segments in micro-radians
    pub fn new(segment_tilts: Vec<[f64; 2]>) -> Result<Self> {
        if segment_tilts.len() != N_SEGMENT {
            return Err(MirrorStateError::SegmentCount(segment_tilts.len()));
        }
        Ok(Self {
            segment_tilts,
            ..Default::default()
        })
    }
    /// Sets the secondary mirror piston in microns
    pub fn sm_piston(self, sm_piston: f64) -> Self {
        Self { sm_piston, ..self }
    }
    /// Returns the secondary mirror piston in microns
    pub fn secondary_mirror_piston(&self) -> f64 {
        self.sm_piston
    }
    /// Returns the `(x,y)` tilts in micro-radians of a segment
    pub fn segment_tilt(&self, sid: SegmentId) -> [f64; 2] {
        self.segment_tilts[sid.index()]
    }
    /// Returns the `(x,y)` tilts in micro-radians of all the segments
    pub fn segment_tilts(&self) -> &[[f64; 2]] {
        &self.segment_tilts
    }
    /// Load the mirror state from a toml file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(&path)
            .map_err(|e| MirrorStateError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| MirrorStateError::Read(e, path.as_ref().to_path_buf()))?;
        let state: MirrorState = toml::from_str(&toml)?;
        if state.segment_tilts.len() != N_SEGMENT {
            return Err(MirrorStateError::SegmentCount(state.segment_tilts.len()));
        }
        Ok(state)
    }
    /// Save the mirror state into a toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        let mut file = File::create(&path)
            .map_err(|e| MirrorStateError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# ::segment_psfs::MirrorState\n\n{}", toml)
            .map_err(|e| MirrorStateError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
}

impl Display for MirrorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mirror state (SM piston: {:+.3}micron):", self.sm_piston)?;
        writeln!(f, " {:^7}  {:^10}  {:^10}", "SEGMENT", "XTILT", "YTILT")?;
        for sid in SegmentId::all() {
            let [x, y] = self.segment_tilt(sid);
            writeln!(f, " {:^7}  {:>+10.2}  {:>+10.2}", sid.to_string(), x, y)?;
        }
        Ok(())
    }
}
