use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::association::Associator;
use crate::config::{EngineConfig, SpeedConfig};
use crate::detection::Detection;
use crate::geometry::GroundMapper;
use crate::track::{Observation, Track, TrackId};

/// Association result for one frame, ready to be applied with [`Scene::update`].
#[derive(Debug, Clone)]
pub struct DetectionsMapping {
    frame: u64,
    timestamp: f64,
    detections: usize,
    // (input detection index, located observation)
    observations: Vec<(usize, Observation)>,
    // (track id, index into `observations`)
    matched: Vec<(TrackId, usize)>,
    missed: Vec<TrackId>,
    unmatched: Vec<usize>,
}

impl DetectionsMapping {
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Pairs of (track id, input detection index).
    pub fn matched(&self) -> impl Iterator<Item = (TrackId, usize)> + '_ {
        self.matched
            .iter()
            .map(move |&(id, k)| (id, self.observations[k].0))
    }

    #[inline]
    pub fn missed(&self) -> &[TrackId] {
        &self.missed
    }

    /// Input indices of detections that will spawn new tracks.
    pub fn unmatched(&self) -> impl Iterator<Item = usize> + '_ {
        self.unmatched.iter().map(move |&k| self.observations[k].0)
    }
}

/// Owns every live track, keyed by id. Ids come from a counter that only
/// moves forward, so an evicted id is never handed out again.
#[derive(Debug, Clone)]
pub struct Scene {
    tracks: BTreeMap<TrackId, Track>,
    next_id: TrackId,
    evicted: u64,
    associator: Associator,
    speed: SpeedConfig,
    max_age: u32,
}

impl Scene {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 1,
            evicted: 0,
            associator: Associator::new(&config.association),
            speed: config.speed.clone(),
            max_age: config.association.max_age,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks removed so far.
    #[inline]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    #[inline]
    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    /// Live tracks in ascending id order.
    #[inline]
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn map_detections(
        &self,
        frame: u64,
        timestamp: f64,
        mapper: &GroundMapper,
        detections: &[Detection],
    ) -> DetectionsMapping {
        let observations: Vec<(usize, Observation)> = detections
            .iter()
            .enumerate()
            .filter_map(|(idx, det)| match Observation::locate(det, mapper) {
                Some(obs) => Some((idx, obs)),
                None => {
                    debug!(frame, idx, bbox = ?det.bbox, "skipping unlocatable detection");
                    None
                }
            })
            .collect();

        let tracks: Vec<&Track> = self.tracks.values().collect();
        let located: Vec<Observation> = observations.iter().map(|(_, o)| *o).collect();
        let assignment = self.associator.associate(frame, &tracks, &located);

        DetectionsMapping {
            frame,
            timestamp,
            detections: detections.len(),
            matched: assignment
                .matched
                .iter()
                .map(|m| (tracks[m.track].id(), m.detection))
                .collect(),
            missed: assignment
                .unmatched_tracks
                .iter()
                .map(|&i| tracks[i].id())
                .collect(),
            unmatched: assignment.unmatched_detections,
            observations,
        }
    }

    /// Applies `mapping`: updates matched tracks, ages and evicts missed ones,
    /// spawns tracks for unmatched detections. Returns the owning track of each
    /// input detection, `None` for skipped detections.
    pub fn update(&mut self, mapping: DetectionsMapping) -> Vec<Option<TrackId>> {
        let frame = mapping.frame;
        let time = mapping.timestamp;
        let mut owners = vec![None; mapping.detections];

        for &(id, k) in &mapping.matched {
            let (idx, obs) = &mapping.observations[k];

            if let Some(track) = self.tracks.get_mut(&id) {
                track.update(frame, time, obs);
                owners[*idx] = Some(id);
            }
        }

        for id in &mapping.missed {
            let age = match self.tracks.get_mut(id) {
                Some(track) => track.mark_missed(),
                None => continue,
            };

            if age > self.max_age {
                if let Some(track) = self.tracks.remove(id) {
                    self.evicted += 1;
                    info!(
                        id,
                        frame,
                        hits = track.hits(),
                        plate = track.best_plate().unwrap_or("-"),
                        "evicting track"
                    );
                }
            }
        }

        for &k in &mapping.unmatched {
            let (idx, obs) = &mapping.observations[k];
            let id = self.next_id;
            self.next_id += 1;

            debug!(id, frame, class = %obs.detection.class, "spawning track");
            self.tracks
                .insert(id, Track::new(id, frame, time, obs, &self.speed));
            owners[*idx] = Some(id);
        }

        owners
    }
}
