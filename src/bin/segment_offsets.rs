use segment_psfs::{segment_offsets, CanonicalLocator, LibraryQuery, SegmentId};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "segment-offsets",
    about = "Segment PSF offsets from the NIRCam segment PSF libraries"
)]
struct Opt {
    /// Path to the segment PSF libraries directory
    #[structopt(long, default_value = ".")]
    path: String,
    /// NIRCam detector
    #[structopt(short, long)]
    detector: String,
    /// NIRCam filter
    #[structopt(short, long)]
    filter: String,
    /// PSF field of view in pixels
    #[structopt(long, default_value = "1024")]
    fov_pixels: usize,
    /// Pupil wheel element
    #[structopt(long, default_value = "CLEAR")]
    pupil: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let opt = Opt::from_args();

    let library_list = LibraryQuery::new("NIRCam", &opt.detector, &opt.filter, &opt.path)
        .pupil(&opt.pupil)
        .segment_library_list(&CanonicalLocator::new(opt.fov_pixels));
    let offsets = segment_offsets(&opt.detector, &library_list)?;

    println!(
        "Segment PSF offsets on {} with {}:",
        opt.detector.to_uppercase(),
        opt.filter.to_uppercase()
    );
    println!(" {:^7}  {:^10}  {:^10}", "SEGMENT", "X [\"]", "Y [\"]");
    for (sid, offset) in SegmentId::all().zip(offsets) {
        println!(
            " {:^7}  {:>+10.3}  {:>+10.3}",
            sid.to_string(),
            offset.x_arcsec,
            offset.y_arcsec
        );
    }
    Ok(())
}
