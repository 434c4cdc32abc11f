//! Chapters bundled into the binary so there is always something to type.

use include_dir::{include_dir, Dir};

static SAMPLES_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/samples");

pub const DEFAULT_SAMPLE: &str = "lighthouse";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub name: &'static str,
    pub text: &'static str,
}

/// Every bundled sample, sorted by name.
pub fn samples() -> Vec<Sample> {
    let mut samples: Vec<Sample> = SAMPLES_DIR
        .files()
        .filter_map(|file| {
            let name = file.path().file_stem()?.to_str()?;
            let text = file.contents_utf8()?;
            Some(Sample { name, text })
        })
        .collect();
    samples.sort_by_key(|s| s.name);
    samples
}

pub fn sample(name: &str) -> Option<Sample> {
    samples().into_iter().find(|s| s.name == name)
}

pub fn sample_names() -> Vec<&'static str> {
    samples().iter().map(|s| s.name).collect()
}
