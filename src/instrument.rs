//! NIRCam detectors and filters
//!
//! The short-wave and long-wave channels of NIRCam are fed by different detectors,
//! a detector can only be used with the filters of its channel.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Name of the instrument the segment PSFs are computed for
pub const INSTRUMENT: &str = "NIRCam";

/// NIRCam detectors, module A and B
pub const DETECTORS: [&str; 10] = [
    "NRCA1", "NRCA2", "NRCA3", "NRCA4", "NRCA5", "NRCB1", "NRCB2", "NRCB3", "NRCB4", "NRCB5",
];

const SHORT_DETECTORS: [&str; 8] = [
    "NRCA1", "NRCA2", "NRCA3", "NRCA4", "NRCB1", "NRCB2", "NRCB3", "NRCB4",
];
const LONG_DETECTORS: [&str; 2] = ["NRCA5", "NRCB5"];

const SHORT_FILTERS: [&str; 13] = [
    "F070W", "F090W", "F115W", "F140M", "F150W2", "F150W", "F162M", "F164N", "F182M", "F187N",
    "F200W", "F210M", "F212N",
];
const LONG_FILTERS: [&str; 16] = [
    "F250M", "F277W", "F300M", "F322W2", "F323N", "F335M", "F356W", "F360M", "F405N", "F410M",
    "F430M", "F444W", "F460M", "F466N", "F470N", "F480M",
];

#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("unknown NIRCam detector: {0}")]
    Detector(String),
    #[error("the list of detectors is empty")]
    NoDetector,
    #[error("the list of filters is empty")]
    NoFilter,
}
pub type Result<T> = std::result::Result<T, InstrumentError>;

/// NIRCam channels wavelength regimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavelengthRegime {
    ShortWave,
    LongWave,
}
impl WavelengthRegime {
    /// Wavelength regime of a detector
    pub fn of_detector(detector: &str) -> Option<Self> {
        let detector = detector.to_uppercase();
        if SHORT_DETECTORS.contains(&detector.as_str()) {
            Some(Self::ShortWave)
        } else if LONG_DETECTORS.contains(&detector.as_str()) {
            Some(Self::LongWave)
        } else {
            None
        }
    }
    /// Wavelength regime of a filter
    pub fn of_filter(filter: &str) -> Option<Self> {
        let filter = filter.to_uppercase();
        if SHORT_FILTERS.contains(&filter.as_str()) {
            Some(Self::ShortWave)
        } else if LONG_FILTERS.contains(&filter.as_str()) {
            Some(Self::LongWave)
        } else {
            None
        }
    }
}
impl Display for WavelengthRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShortWave => write!(f, "short-wave"),
            Self::LongWave => write!(f, "long-wave"),
        }
    }
}

/// Checks if a detector can be used with a filter
///
/// A short-wave (long-wave) detector only pairs with short-wave (long-wave) filters.
/// A detector that belongs to neither channel is paired with any filter.
pub fn is_compatible(detector: &str, filter: &str) -> bool {
    match WavelengthRegime::of_detector(detector) {
        Some(regime) => WavelengthRegime::of_filter(filter) == Some(regime),
        None => true,
    }
}

/// Single name or list of names, as found in configuration files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
#[doc(hidden)]
pub enum Names {
    One(String),
    Many(Vec<String>),
}

/// Detectors selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Names", into = "Names")]
pub enum Detectors {
    /// All the 10 NIRCam detectors
    All,
    /// A list of detectors
    List(Vec<String>),
}
impl Default for Detectors {
    fn default() -> Self {
        Self::All
    }
}
impl From<&str> for Detectors {
    fn from(detector: &str) -> Self {
        if detector.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::List(vec![detector.to_string()])
        }
    }
}
impl From<String> for Detectors {
    fn from(detector: String) -> Self {
        detector.as_str().into()
    }
}
impl From<Vec<&str>> for Detectors {
    fn from(detectors: Vec<&str>) -> Self {
        Self::List(detectors.into_iter().map(|d| d.to_string()).collect())
    }
}
impl From<Vec<String>> for Detectors {
    fn from(detectors: Vec<String>) -> Self {
        Self::List(detectors)
    }
}
impl<const N: usize> From<[&str; N]> for Detectors {
    fn from(detectors: [&str; N]) -> Self {
        detectors.to_vec().into()
    }
}
impl From<Names> for Detectors {
    fn from(names: Names) -> Self {
        match names {
            Names::One(detector) => detector.into(),
            Names::Many(detectors) => detectors.into(),
        }
    }
}
impl From<Detectors> for Names {
    fn from(detectors: Detectors) -> Self {
        match detectors {
            Detectors::All => Names::One("all".into()),
            Detectors::List(detectors) => Names::Many(detectors),
        }
    }
}
impl Detectors {
    /// Returns the sorted list of upper case detector names, checking that the detectors exist
    pub fn resolve(&self) -> Result<Vec<String>> {
        let mut detectors = match self {
            Self::All => DETECTORS.iter().map(|d| d.to_string()).collect(),
            Self::List(detectors) => detectors
                .iter()
                .map(|d| {
                    let d = d.to_uppercase();
                    if DETECTORS.contains(&d.as_str()) {
                        Ok(d)
                    } else {
                        Err(InstrumentError::Detector(d))
                    }
                })
                .collect::<Result<Vec<String>>>()?,
        };
        if detectors.is_empty() {
            return Err(InstrumentError::NoDetector);
        }
        detectors.sort();
        detectors.dedup();
        Ok(detectors)
    }
}

/// Filters selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Names", into = "Names")]
pub struct Filters(Vec<String>);
impl Default for Filters {
    fn default() -> Self {
        Self(vec!["F212N".into(), "F480M".into()])
    }
}
impl From<&str> for Filters {
    fn from(filter: &str) -> Self {
        Self(vec![filter.to_string()])
    }
}
impl From<String> for Filters {
    fn from(filter: String) -> Self {
        Self(vec![filter])
    }
}
impl From<Vec<&str>> for Filters {
    fn from(filters: Vec<&str>) -> Self {
        Self(filters.into_iter().map(|f| f.to_string()).collect())
    }
}
impl From<Vec<String>> for Filters {
    fn from(filters: Vec<String>) -> Self {
        Self(filters)
    }
}
impl<const N: usize> From<[&str; N]> for Filters {
    fn from(filters: [&str; N]) -> Self {
        filters.to_vec().into()
    }
}
impl From<Names> for Filters {
    fn from(names: Names) -> Self {
        match names {
            Names::One(filter) => filter.into(),
            Names::Many(filters) => filters.into(),
        }
    }
}
impl From<Filters> for Names {
    fn from(filters: Filters) -> Self {
        Names::Many(filters.0)
    }
}
impl Filters {
    /// Returns the upper case filter names in the given order
    pub fn resolve(&self) -> Result<Vec<String>> {
        if self.0.is_empty() {
            return Err(InstrumentError::NoFilter);
        }
        Ok(self.0.iter().map(|f| f.to_uppercase()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regimes() {
        assert_eq!(
            WavelengthRegime::of_detector("NRCA1"),
            Some(WavelengthRegime::ShortWave)
        );
        assert_eq!(
            WavelengthRegime::of_detector("nrcb5"),
            Some(WavelengthRegime::LongWave)
        );
        assert_eq!(
            WavelengthRegime::of_filter("F212N"),
            Some(WavelengthRegime::ShortWave)
        );
        assert_eq!(
            WavelengthRegime::of_filter("F480M"),
            Some(WavelengthRegime::LongWave)
        );
        assert_eq!(WavelengthRegime::of_filter("CLEAR"), None);
    }

    #[test]
    fn compatibility() {
        assert!(is_compatible("NRCA1", "F212N"));
        assert!(!is_compatible("NRCA1", "F480M"));
        assert!(is_compatible("NRCA5", "F480M"));
        assert!(!is_compatible("NRCB5", "F070W"));
        assert!(!is_compatible("NRCA3", "F999X"));
    }

    #[test]
    fn all_detectors() {
        let detectors = Detectors::from("all").resolve().unwrap();
        assert_eq!(detectors.len(), 10);
        assert_eq!(detectors[0], "NRCA1");
        assert_eq!(detectors[9], "NRCB5");
    }

    #[test]
    fn detector_list() {
        let detectors = Detectors::from(vec!["nrcb1", "NRCA2"]).resolve().unwrap();
        assert_eq!(detectors, vec!["NRCA2".to_string(), "NRCB1".to_string()]);
        assert!(Detectors::from("NRCC1").resolve().is_err());
        assert!(Detectors::List(vec![]).resolve().is_err());
    }

    #[test]
    fn filters() {
        assert_eq!(Filters::default().resolve().unwrap(), vec!["F212N", "F480M"]);
        assert_eq!(Filters::from("f200w").resolve().unwrap(), vec!["F200W"]);
        assert!(Filters::from(Vec::<String>::new()).resolve().is_err());
    }
}
