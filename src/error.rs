#[derive(Debug, thiserror::Error)]
pub enum SegmentPsfError {
    #[error("invalid segment")]
    Segment(#[from] crate::segment::SegmentError),
    #[error("invalid mirror state")]
    MirrorState(#[from] crate::mirror::MirrorStateError),
    #[error("segment PSF libraries generation failed")]
    Generator(#[from] crate::generator::GeneratorError),
    #[error("cannot load segment PSF libraries")]
    Library(#[from] crate::library::LibraryError),
    #[error("cannot compute segment offset")]
    Offset(#[from] crate::offset::OffsetError),
    #[error("FITS file I/O failed")]
    Fits(#[from] crate::fits::FitsError),
}
