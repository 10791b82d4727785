//! FITS primary image I/O

use std::path::{Path, PathBuf};

use fitsio::{
    hdu::FitsHdu,
    headers::{HeaderValue, ReadsKey},
    images::{ImageDescription, ImageType},
    FitsFile,
};

use crate::engine::{MetaValue, PsfGrid};

/// Maximum length of a FITS header keyword
const KEYWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum FitsError {
    #[error("{0} already exists and overwriting is disabled")]
    Exists(PathBuf),
    #[error("cannot create FITS file: {1}")]
    Create(#[source] fitsio::errors::Error, PathBuf),
    #[error("cannot open FITS file: {1}")]
    Open(#[source] fitsio::errors::Error, PathBuf),
    #[error("cannot write into FITS file: {1}")]
    Write(#[source] fitsio::errors::Error, PathBuf),
    #[error("cannot read the primary image of {1}")]
    Read(#[source] fitsio::errors::Error, PathBuf),
    #[error("the primary HDU of {0} is not a 2D image")]
    NotAnImage(PathBuf),
}
pub type Result<T> = std::result::Result<T, FitsError>;

/// Primary HDU header
pub struct Header {
    fits: FitsFile,
    hdu: FitsHdu,
}
impl Header {
    /// Opens the primary HDU header of a FITS file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut fits = FitsFile::open(path).map_err(|e| FitsError::Open(e, path.to_path_buf()))?;
        let hdu = fits
            .primary_hdu()
            .map_err(|e| FitsError::Open(e, path.to_path_buf()))?;
        Ok(Self { fits, hdu })
    }
    fn key<T: ReadsKey>(&mut self, key: &str) -> Option<T> {
        self.hdu.read_key(&mut self.fits, key).ok()
    }
    /// Returns `true` if the header has the keyword
    pub fn contains(&mut self, key: &str) -> bool {
        self.float(key).is_some() || self.text(key).is_some()
    }
    /// Integer value of a keyword
    pub fn integer(&mut self, key: &str) -> Option<i64> {
        self.key(key)
    }
    /// Floating point value of a keyword, integers are converted
    pub fn float(&mut self, key: &str) -> Option<f64> {
        self.key(key)
    }
    /// String value of a keyword
    pub fn text(&mut self, key: &str) -> Option<String> {
        self.key::<String>(key).map(|val| val.trim_end().to_string())
    }
    /// Comment of a keyword
    pub fn comment(&mut self, key: &str) -> Option<String> {
        self.key::<HeaderValue<f64>>(key)
            .map(|card| card.comment)
            .or_else(|| self.key::<HeaderValue<String>>(key).map(|card| card.comment))
            .flatten()
    }
}

/// Writes a PSF grid into the primary image of a new FITS file
///
/// The grid metadata become the header cards with their comments, in the order of the keys.
/// Logical values are written as 0 or 1.
/// Entries that cannot be represented in a FITS header are skipped.
pub fn write_primary<P: AsRef<Path>>(path: P, grid: &PsfGrid, overwrite: bool) -> Result<()> {
    let path = path.as_ref();
    if path.exists() && !overwrite {
        return Err(FitsError::Exists(path.to_path_buf()));
    }
    let (n_row, n_col) = grid.shape;
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[n_row, n_col],
    };
    let new_file = FitsFile::create(path).with_custom_primary(&description);
    let new_file = if overwrite {
        new_file.overwrite()
    } else {
        new_file
    };
    let mut fits = new_file
        .open()
        .map_err(|e| FitsError::Create(e, path.to_path_buf()))?;
    let write_error = |e| FitsError::Write(e, path.to_path_buf());
    let hdu = fits.primary_hdu().map_err(write_error)?;
    hdu.write_image(&mut fits, &grid.data).map_err(write_error)?;

    for (key, card) in grid.meta.iter() {
        if key.len() > KEYWORD_LEN {
            log::warn!("skipping header keyword {key} longer than {KEYWORD_LEN} characters");
            continue;
        }
        let name = key.to_uppercase();
        let comment = card.comment.as_str();
        let written = match &card.value {
            MetaValue::Integer(val) => hdu.write_key(&mut fits, &name, (*val, comment)),
            MetaValue::Float(val) => hdu.write_key(&mut fits, &name, (*val, comment)),
            MetaValue::Text(val) => hdu.write_key(&mut fits, &name, (val.as_str(), comment)),
            MetaValue::Logical(val) => {
                hdu.write_key(&mut fits, &name, (i64::from(*val), comment))
            }
            MetaValue::Points(_) => {
                log::warn!("skipping header keyword {key} with a list of points");
                continue;
            }
        };
        written.map_err(write_error)?;
    }
    Ok(())
}

/// Primary image of a FITS file
pub struct Image {
    pub data: Vec<f64>,
    /// Image `(rows,columns)`
    pub shape: (usize, usize),
    pub header: Header,
}

/// Reads the primary image of a FITS file
pub fn read_primary<P: AsRef<Path>>(path: P) -> Result<Image> {
    let path = path.as_ref();
    let mut header = Header::read(path)?;
    let shape = match (
        header.integer("NAXIS"),
        header.integer("NAXIS1"),
        header.integer("NAXIS2"),
    ) {
        (Some(2), Some(n_col), Some(n_row)) => (n_row as usize, n_col as usize),
        _ => return Err(FitsError::NotAnImage(path.to_path_buf())),
    };
    let data: Vec<f64> = header
        .hdu
        .read_image(&mut header.fits)
        .map_err(|e| FitsError::Read(e, path.to_path_buf()))?;
    Ok(Image {
        data,
        shape,
        header,
    })
}
