use std::collections::HashMap;
use tracing::debug;

use crate::config::PlateConfig;
use crate::detection::PlateSample;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateCandidate {
    pub count: u32,
    pub max_confidence: f32,
}

/// Per-track tally of cleaned plate strings.
#[derive(Debug, Clone, Default)]
pub struct PlateCandidates {
    candidates: HashMap<String, PlateCandidate>,
}

impl PlateCandidates {
    #[inline]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    #[inline]
    pub fn get(&self, text: &str) -> Option<&PlateCandidate> {
        self.candidates.get(text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlateCandidate)> {
        self.candidates.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn record(&mut self, text: String, confidence: f32) {
        let entry = self.candidates.entry(text).or_insert(PlateCandidate {
            count: 0,
            max_confidence: confidence,
        });

        entry.count += 1;
        if confidence > entry.max_confidence {
            entry.max_confidence = confidence;
        }
    }

    /// Most frequent reading; ties go to the highest single-sample confidence,
    /// then to the lexicographically smallest string.
    pub fn best(&self) -> Option<&str> {
        self.candidates
            .iter()
            .max_by(|(a_text, a), (b_text, b)| {
                a.count
                    .cmp(&b.count)
                    .then(a.max_confidence.total_cmp(&b.max_confidence))
                    .then_with(|| b_text.cmp(a_text))
            })
            .map(|(text, _)| text.as_str())
    }
}

/// Uppercases and keeps only ASCII letters and digits.
pub fn clean_plate_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[derive(Debug, Clone)]
pub struct PlateResolver {
    config: PlateConfig,
}

impl PlateResolver {
    pub fn new(config: &PlateConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Records `sample` into `candidates`. Returns `false` when the sample was
    /// dropped (low or invalid confidence, nothing left after cleanup).
    pub fn add_sample(&self, candidates: &mut PlateCandidates, sample: &PlateSample) -> bool {
        if !sample.confidence.is_finite() || sample.confidence <= self.config.min_confidence {
            debug!(
                text = %sample.text,
                confidence = sample.confidence,
                "dropping low-confidence plate sample"
            );
            return false;
        }

        let text = clean_plate_text(&sample.text);
        if text.is_empty() || text.len() < self.config.min_len {
            debug!(text = %sample.text, "dropping unusable plate sample");
            return false;
        }

        candidates.record(text, sample.confidence);

        true
    }

    #[inline]
    pub fn resolve<'a>(&self, candidates: &'a PlateCandidates) -> Option<&'a str> {
        candidates.best()
    }
}
