use std::{f64::consts::PI, path::Path, sync::Mutex};

use rand::Rng;
use segment_psfs::{
    engine::{EngineError, MetaValue},
    error::SegmentPsfError,
    generator::GeneratorError,
    get_gridded_segment_psf_library_list, get_segment_library_list, get_segment_offset,
    offset::OffsetError,
    segment_offsets, Builder, CanonicalLocator, FromBuilder, GridRequest, LibraryQuery,
    MirrorState, PsfEngine, PsfGrid, SegmentId, SegmentPsfs,
};

const UMRAD_TO_ARCSEC: f64 = 1e-6 * (180. / PI) * 3600.;

/// Gaussian PSF with some noise
#[derive(Default)]
struct GaussianPsf {
    requests: Mutex<Vec<GridRequest>>,
}
impl PsfEngine for GaussianPsf {
    fn psf_grid(&self, request: &GridRequest) -> Result<PsfGrid, EngineError> {
        self.requests.lock().unwrap().push(request.clone());
        let n = request.options.fov_pixels;
        let c = (n as f64 - 1.) / 2.;
        let mut rng = rand::thread_rng();
        let data: Vec<f64> = (0..n * n)
            .map(|k| {
                let (i, j) = ((k / n) as f64, (k % n) as f64);
                let r2 = (i - c).powi(2) + (j - c).powi(2);
                (-r2 / 8.).exp() + 1e-6 * rng.gen::<f64>()
            })
            .collect();
        let mut grid = PsfGrid::new(data, (n, n));
        grid.insert_meta("grid_xypos", MetaValue::Points(vec![(c, c)]), "");
        grid.insert_meta("oversampling", 1usize, "Oversampling factor");
        grid.insert_meta("FILTER", request.instrument.filter.as_str(), "Filter");
        grid.insert_meta(
            "DETECTOR",
            request.instrument.detector.as_str(),
            "Detector",
        );
        grid.insert_meta("NWAVES", request.options.nlambda, "# of wavelengths");
        Ok(grid)
    }
}

struct FailingEngine;
impl PsfEngine for FailingEngine {
    fn psf_grid(&self, _request: &GridRequest) -> Result<PsfGrid, EngineError> {
        Err(EngineError::new("optical model is not available"))
    }
}

/// Fails for a single segment
struct SegmentFailure {
    sid: usize,
    psf: GaussianPsf,
}
impl PsfEngine for SegmentFailure {
    fn psf_grid(&self, request: &GridRequest) -> Result<PsfGrid, EngineError> {
        if request.instrument.pupil_segment.id() == self.sid {
            Err(EngineError::new(format!("segment #{} model failed", self.sid)))
        } else {
            self.psf.psf_grid(request)
        }
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mirror_state() -> MirrorState {
    let tilts = (0..18)
        .map(|i| [0.1 * i as f64 - 0.5, 0.05 * (17 - i) as f64])
        .collect();
    MirrorState::new(tilts).unwrap().sm_piston(2.5)
}

fn n_fits(path: &Path) -> usize {
    std::fs::read_dir(path)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |x| x == "fits"))
        .count()
}

#[test]
fn canonical_filename() -> anyhow::Result<()> {
    init_logger();
    let dir = tempfile::tempdir()?;
    let psfs = SegmentPsfs::builder()
        .mirror_state(mirror_state())
        .output_dir(dir.path())
        .detectors("NRCA1")
        .filters("F212N")
        .fov_pixels(16)
        .segment(5)
        .build()?;
    psfs.generate(&GaussianPsf::default())?;
    assert!(dir
        .path()
        .join("nircam_nrca1_f212n_fovp16_samp1_npsf1_seg05.fits")
        .is_file());
    assert_eq!(n_fits(dir.path()), 1);
    Ok(())
}

#[test]
fn no_matching_detector_filter() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let psfs = SegmentPsfs::builder()
        .output_dir(dir.path())
        .detectors("NRCA1")
        .filters(["F480M"])
        .fov_pixels(16)
        .build()?;
    let engine = GaussianPsf::default();
    let result = psfs.generate(&engine);
    assert!(matches!(result, Err(GeneratorError::NoMatch(_))));
    assert_eq!(n_fits(dir.path()), 0);
    assert!(engine.requests.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn partial_match() -> anyhow::Result<()> {
    init_logger();
    let dir = tempfile::tempdir()?;
    let psfs = SegmentPsfs::builder()
        .output_dir(dir.path())
        .detectors(["NRCA1", "NRCA5"])
        .fov_pixels(16)
        .segments(vec![1, 18])
        .build()?;
    psfs.generate(&GaussianPsf::default())?;
    assert_eq!(n_fits(dir.path()), 4);
    for name in [
        "nircam_nrca1_f212n_fovp16_samp1_npsf1_seg01.fits",
        "nircam_nrca5_f480m_fovp16_samp1_npsf1_seg01.fits",
        "nircam_nrca1_f212n_fovp16_samp1_npsf1_seg18.fits",
        "nircam_nrca5_f480m_fovp16_samp1_npsf1_seg18.fits",
    ] {
        assert!(dir.path().join(name).is_file(), "{name} is missing");
    }
    assert_eq!(psfs.library_files().len(), 4);
    Ok(())
}

#[test]
fn grid_requests() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let psfs = SegmentPsfs::builder()
        .output_dir(dir.path())
        .detectors("NRCB3")
        .filters("F150W")
        .fov_pixels(8)
        .nlambda(3)
        .jitter("PCS=Coarse")
        .segments(vec![2, 9, 14])
        .build()?;
    let engine = GaussianPsf::default();
    psfs.generate(&engine)?;
    let mut requests = engine.requests.into_inner().unwrap();
    requests.sort_by_key(|r| r.instrument.pupil_segment);
    let pupils: Vec<_> = requests
        .iter()
        .map(|r| r.instrument.pupil_segment.id())
        .collect();
    assert_eq!(pupils, vec![2, 9, 14]);
    for request in requests {
        assert_eq!(request.instrument.detector, "NRCB3");
        assert_eq!(request.instrument.filter, "F150W");
        assert_eq!(
            request
                .instrument
                .options
                .get("jitter")
                .and_then(|v| v.as_str()),
            Some("PCS=Coarse")
        );
        let options = request.options;
        assert_eq!(options.num_psfs, 1);
        assert_eq!(options.oversample, 1);
        assert_eq!(options.fov_pixels, 8);
        assert_eq!(options.nlambda, 3);
        assert!(options.use_detsampled_psf);
        assert!(!options.add_distortion);
        assert!(!options.save && !options.all_detectors && !options.verbose);
        assert_eq!(request.mirror_state, MirrorState::default());
    }
    Ok(())
}

#[test]
fn overwrite() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let builder = SegmentPsfs::builder()
        .output_dir(dir.path())
        .detectors("NRCA2")
        .filters("F200W")
        .fov_pixels(8)
        .segment(3);
    let psfs = builder.clone().build()?;
    psfs.generate(&GaussianPsf::default())?;
    assert!(matches!(
        psfs.generate(&GaussianPsf::default()),
        Err(GeneratorError::Fits(_))
    ));
    let psfs = builder.overwrite(true).build()?;
    psfs.generate(&GaussianPsf::default())?;
    Ok(())
}

#[test]
fn engine_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let psfs = SegmentPsfs::builder()
        .output_dir(dir.path())
        .detectors("NRCA2")
        .filters("F200W")
        .fov_pixels(8)
        .build()?;
    assert!(matches!(
        psfs.generate(&FailingEngine),
        Err(GeneratorError::Engine { .. })
    ));
    assert_eq!(n_fits(dir.path()), 0);
    Ok(())
}

#[test]
fn single_segment_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let psfs = SegmentPsfs::builder()
        .output_dir(dir.path())
        .detectors("NRCA1")
        .filters("F212N")
        .fov_pixels(8)
        .build()?;
    let engine = SegmentFailure {
        sid: 1,
        psf: GaussianPsf::default(),
    };
    match psfs.generate(&engine) {
        Err(GeneratorError::Engine { sid, .. }) => assert_eq!(sid.id(), 1),
        other => panic!("expected a segment #1 engine error, found {other:?}"),
    }
    assert_eq!(n_fits(dir.path()), 17);
    assert!(!dir
        .path()
        .join("nircam_nrca1_f212n_fovp8_samp1_npsf1_seg01.fits")
        .exists());
    for sid in SegmentId::all().skip(1) {
        let name = format!("nircam_nrca1_f212n_fovp8_samp1_npsf1_seg{:02}.fits", sid.id());
        assert!(dir.path().join(&name).is_file(), "{name} is missing");
    }
    assert_eq!(engine.psf.requests.lock().unwrap().len(), 17);
    Ok(())
}

#[test]
fn gridded_libraries() -> anyhow::Result<()> {
    init_logger();
    let dir = tempfile::tempdir()?;
    let state = mirror_state();
    let psfs = SegmentPsfs::builder()
        .mirror_state(state.clone())
        .output_dir(dir.path())
        .detectors("NRCA3")
        .filters("F212N")
        .fov_pixels(16)
        .build()?;
    segment_psfs::generate_segment_psfs(&GaussianPsf::default(), &psfs)?;

    // the default locator looks for 1024 pixels libraries
    assert!(
        get_gridded_segment_psf_library_list("NIRCam", "NRCA3", "F212N", dir.path(), "CLEAR")
            .is_err()
    );
    let libraries = LibraryQuery::new("NIRCam", "NRCA3", "F212N", dir.path())
        .gridded_segment_psf_library_list(&CanonicalLocator::new(16))?;
    assert_eq!(libraries.len(), 18);
    for (sid, library) in SegmentId::all().zip(&libraries) {
        assert_eq!(library.segment.sid, sid);
        assert_eq!(library.segment.name, sid.name());
        assert_eq!(library.segment.sm_piston, Some(2.5));
        assert_eq!(library.segment.boresight, None);
        let [x, y] = state.segment_tilt(sid);
        assert!((library.segment.tilt.0 - x).abs() <= 5e-3);
        assert!((library.segment.tilt.1 - y).abs() <= 5e-3);
        assert_eq!(library.shape, (16, 16));
        assert_eq!(library.data.len(), 256);
        assert_eq!(library.oversampling, 1);
        assert_eq!(library.n_psf(), 1);
        assert_eq!(library.grid_xypos[0], (7.5, 7.5));
    }
    Ok(())
}

#[test]
fn offsets_from_libraries() -> anyhow::Result<()> {
    init_logger();
    let dir = tempfile::tempdir()?;
    let psfs = SegmentPsfs::builder()
        .mirror_state(mirror_state())
        .output_dir(dir.path())
        .detectors("NRCA4")
        .filters("F212N")
        .fov_pixels(16)
        .build()?;
    psfs.generate(&GaussianPsf::default())?;

    let library_list = LibraryQuery::new("NIRCam", "NRCA4", "F212N", dir.path())
        .segment_library_list(&CanonicalLocator::new(16));
    let offsets = segment_offsets("NRCA4", &library_list)?;
    assert_eq!(offsets.len(), 18);

    // A4: control axes aligned with the telescope axes, tilts [-0.2,0.7], group A SM piston coupling
    let a4 = get_segment_offset(4, "NRCA4", &library_list)?;
    assert_eq!(a4, offsets[3]);
    let xtilt = -0.2 + 2.5 * 0.010502;
    let ytilt = 0.7;
    assert!((a4.x_arcsec - 2. * UMRAD_TO_ARCSEC * ytilt).abs() < 1e-9);
    assert!((a4.y_arcsec - 2. * UMRAD_TO_ARCSEC * xtilt).abs() < 1e-9);

    // C2: control axes aligned with the telescope axes, tilts [0.4,0.4], group C SM piston coupling
    let c2 = get_segment_offset(10, "NRCA4", &library_list)?;
    let xtilt = 0.4;
    let ytilt = 0.4 + 2.5 * 0.017761;
    assert!((c2.x_arcsec - 2. * UMRAD_TO_ARCSEC * ytilt).abs() < 1e-9);
    assert!((c2.y_arcsec - 2. * UMRAD_TO_ARCSEC * xtilt).abs() < 1e-9);
    Ok(())
}

#[test]
fn boresight_offset() -> anyhow::Result<()> {
    init_logger();
    let dir = tempfile::tempdir()?;
    let bs_dir = tempfile::tempdir()?;
    let builder = SegmentPsfs::builder()
        .mirror_state(mirror_state())
        .detectors("NRCB1")
        .filters("F212N")
        .fov_pixels(8)
        .segment(13);
    builder
        .clone()
        .output_dir(dir.path())
        .build()?
        .generate(&GaussianPsf::default())?;
    let (v2, v3) = (0.25, -0.5);
    builder
        .output_dir(bs_dir.path())
        .boresight(v2, v3)
        .build()?
        .generate(&GaussianPsf::default())?;

    let locator = CanonicalLocator::new(8);
    let offset = get_segment_offset(
        13,
        "NRCB1",
        &LibraryQuery::new("NIRCam", "NRCB1", "F212N", dir.path())
            .segment_library_list(&locator),
    )?;
    let bs_offset = get_segment_offset(
        13,
        "NRCB1",
        &LibraryQuery::new("NIRCam", "NRCB1", "F212N", bs_dir.path())
            .segment_library_list(&locator),
    )?;
    assert_eq!(bs_offset.x_arcsec, offset.x_arcsec - 60. * v2);
    assert_eq!(bs_offset.y_arcsec, offset.y_arcsec + 60. * v3);
    Ok(())
}

#[test]
fn inconsistent_library_list() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    SegmentPsfs::builder()
        .output_dir(dir.path())
        .detectors("NRCA1")
        .filters("F212N")
        .fov_pixels(16)
        .segments(vec![4, 7])
        .build()?
        .generate(&GaussianPsf::default())?;
    let mut library_list = LibraryQuery::new("NIRCam", "NRCA1", "F212N", dir.path())
        .segment_library_list(&CanonicalLocator::new(16));
    library_list.swap(3, 6);
    let result = get_segment_offset(4, "NRCA1", &library_list);
    assert!(matches!(
        result,
        Err(SegmentPsfError::Offset(OffsetError::Inconsistent {
            expected: 4,
            found: 7
        }))
    ));
    Ok(())
}

#[test]
fn missing_library() {
    let dir = tempfile::tempdir().unwrap();
    let library_list = get_segment_library_list("NIRCam", "NRCA1", "F212N", dir.path(), "CLEAR");
    assert!(get_segment_offset(1, "NRCA1", &library_list).is_err());
    assert!(get_segment_offset(19, "NRCA1", &library_list).is_err());
}
