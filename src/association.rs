use munkres::{solve_assignment, WeightMatrix};
use nalgebra as na;
use std::cmp::Ordering;
use tracing::warn;

use crate::config::{AssociationConfig, AssociationMethod};
use crate::track::{Observation, Track};

// cost for padding rows/columns and gated pairs in the optimal solver
const FORBIDDEN: f64 = 1.0e3;
// tie-break offsets added to solver weights: lower IoU, then higher track id
const IOU_TIE: f64 = 1.0e-7;
const ID_TIE: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// index into the track slice
    pub track: usize,
    /// index into the observation slice
    pub detection: usize,
    pub cost: f64,
    pub iou: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    pub matched: Vec<Match>,
    pub unmatched_detections: Vec<usize>,
    pub unmatched_tracks: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Associator {
    config: AssociationConfig,
}

impl Associator {
    pub fn new(config: &AssociationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Pair cost in `[0, 1]` and the IoU it was built from.
    ///
    /// The cost is the weighted mean of `1 - IoU` against the track's last box
    /// and the ground distance to the track's predicted position, the latter
    /// saturating at `max_distance`.
    pub fn cost(&self, track: &Track, obs: &Observation, frame: u64) -> (f64, f64) {
        let c = &self.config;
        let iou = track.bbox().iou(&obs.detection.bbox) as f64;

        let dist = track
            .predict(frame)
            .map(|p| na::distance(&p, &obs.ground))
            .unwrap_or(c.max_distance);
        let dist_term = (dist / c.max_distance).min(1.0);

        let cost = (c.iou_weight * (1.0 - iou) + c.distance_weight * dist_term)
            / (c.iou_weight + c.distance_weight);

        (cost, iou)
    }

    pub fn associate(&self, frame: u64, tracks: &[&Track], obs: &[Observation]) -> Assignment {
        if tracks.is_empty() || obs.is_empty() {
            return Assignment {
                matched: Vec::new(),
                unmatched_detections: (0..obs.len()).collect(),
                unmatched_tracks: (0..tracks.len()).collect(),
            };
        }

        let mut costs = Vec::with_capacity(tracks.len() * obs.len());
        for track in tracks {
            for o in obs {
                costs.push(self.cost(track, o, frame));
            }
        }

        let matched = match self.config.method {
            AssociationMethod::Greedy => self.greedy(tracks, obs.len(), &costs),
            AssociationMethod::Optimal => self.optimal(tracks, obs.len(), &costs),
        };

        let mut track_used = vec![false; tracks.len()];
        let mut det_used = vec![false; obs.len()];
        for m in &matched {
            track_used[m.track] = true;
            det_used[m.detection] = true;
        }

        Assignment {
            matched,
            unmatched_detections: (0..obs.len()).filter(|&j| !det_used[j]).collect(),
            unmatched_tracks: (0..tracks.len()).filter(|&i| !track_used[i]).collect(),
        }
    }

    fn greedy(&self, tracks: &[&Track], n_obs: usize, costs: &[(f64, f64)]) -> Vec<Match> {
        let mut candidates: Vec<Match> = costs
            .iter()
            .enumerate()
            .filter(|(_, (cost, _))| *cost <= self.config.max_cost)
            .map(|(k, &(cost, iou))| Match {
                track: k / n_obs,
                detection: k % n_obs,
                cost,
                iou,
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.cost
                .total_cmp(&b.cost)
                .then(b.iou.total_cmp(&a.iou))
                .then(tracks[a.track].id().cmp(&tracks[b.track].id()))
                .then(a.detection.cmp(&b.detection))
        });

        let mut track_used = vec![false; tracks.len()];
        let mut det_used = vec![false; n_obs];
        let mut matched = Vec::new();

        for m in candidates {
            if track_used[m.track] || det_used[m.detection] {
                continue;
            }

            track_used[m.track] = true;
            det_used[m.detection] = true;
            matched.push(m);
        }

        matched
    }

    fn optimal(&self, tracks: &[&Track], n_obs: usize, costs: &[(f64, f64)]) -> Vec<Match> {
        let n_tracks = tracks.len();
        let n = n_tracks.max(n_obs);

        let mut by_id: Vec<usize> = (0..n_tracks).collect();
        by_id.sort_by_key(|&i| tracks[i].id());
        let mut rank = vec![0.0; n_tracks];
        for (r, &i) in by_id.iter().enumerate() {
            rank[i] = r as f64 / n_tracks as f64;
        }

        let mut data = Vec::with_capacity(n * n);
        for r in 0..n {
            for c in 0..n {
                let w = if r < n_tracks && c < n_obs {
                    let (cost, iou) = costs[r * n_obs + c];
                    if cost <= self.config.max_cost {
                        cost + IOU_TIE * (1.0 - iou) + ID_TIE * rank[r]
                    } else {
                        FORBIDDEN
                    }
                } else {
                    FORBIDDEN
                };
                data.push(w);
            }
        }

        let mut weights = WeightMatrix::from_row_vec(n, data);
        let positions = match solve_assignment(&mut weights) {
            Ok(positions) => positions,
            Err(err) => {
                warn!(?err, "optimal assignment failed, falling back to greedy");
                return self.greedy(tracks, n_obs, costs);
            }
        };

        let mut matched: Vec<Match> = positions
            .into_iter()
            .filter(|p| p.row < n_tracks && p.column < n_obs)
            .filter_map(|p| {
                let (cost, iou) = costs[p.row * n_obs + p.column];
                (cost <= self.config.max_cost).then_some(Match {
                    track: p.row,
                    detection: p.column,
                    cost,
                    iou,
                })
            })
            .collect();

        matched.sort_by(|a, b| match a.cost.total_cmp(&b.cost) {
            Ordering::Equal => tracks[a.track].id().cmp(&tracks[b.track].id()),
            ord => ord,
        });

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::config::SpeedConfig;
    use crate::detection::{Detection, VehicleClass};
    use crate::geometry::{Correspondence, DistanceUnit, GroundMapper};
    use crate::track::TrackId;

    fn mapper() -> GroundMapper {
        let points = [
            Correspondence::new((0.0, 0.0), (0.0, 0.0)),
            Correspondence::new((1000.0, 0.0), (100.0, 0.0)),
            Correspondence::new((1000.0, 1000.0), (100.0, 100.0)),
            Correspondence::new((0.0, 1000.0), (0.0, 100.0)),
        ];
        GroundMapper::new(&points, DistanceUnit::Meters).unwrap()
    }

    fn obs(left: f32, top: f32) -> Observation {
        let det = Detection::new(BBox::ltwh(left, top, 40.0, 20.0), VehicleClass::Car, 0.9);
        Observation::locate(&det, &mapper()).unwrap()
    }

    fn track(id: TrackId, left: f32, top: f32) -> Track {
        Track::new(id, 0, 0.0, &obs(left, top), &SpeedConfig::default())
    }

    #[test]
    fn identical_box_costs_nothing() {
        let a = Associator::new(&AssociationConfig::default());
        let (cost, iou) = a.cost(&track(1, 100.0, 100.0), &obs(100.0, 100.0), 1);

        assert_eq!(iou, 1.0);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn far_detection_is_gated() {
        let a = Associator::new(&AssociationConfig::default());
        let t = track(1, 100.0, 100.0);
        let result = a.associate(1, &[&t], &[obs(600.0, 600.0)]);

        assert!(result.matched.is_empty());
        assert_eq!(result.unmatched_detections, vec![0]);
        assert_eq!(result.unmatched_tracks, vec![0]);
    }

    #[test]
    fn matches_each_detection_to_its_nearest_track() {
        let a = Associator::new(&AssociationConfig::default());
        let t1 = track(1, 100.0, 100.0);
        let t2 = track(2, 400.0, 100.0);
        let result = a.associate(1, &[&t1, &t2], &[obs(405.0, 100.0), obs(103.0, 100.0)]);

        let mut pairs: Vec<_> = result.matched.iter().map(|m| (m.track, m.detection)).collect();
        pairs.sort();
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn equal_cost_prefers_lower_track_id() {
        let a = Associator::new(&AssociationConfig::default());
        let t7 = track(7, 100.0, 100.0);
        let t3 = track(3, 100.0, 100.0);

        for _ in 0..5 {
            let result = a.associate(1, &[&t7, &t3], &[obs(102.0, 100.0)]);
            assert_eq!(result.matched.len(), 1);
            assert_eq!(result.matched[0].track, 1);
            assert_eq!(result.unmatched_tracks, vec![0]);
        }
    }

    #[test]
    fn equal_cost_detections_resolve_deterministically() {
        let a = Associator::new(&AssociationConfig::default());
        let t = track(1, 100.0, 100.0);

        let dets = [obs(104.0, 100.0), obs(96.0, 100.0)];
        let first = a.associate(1, &[&t], &dets);
        assert_eq!(first.matched.len(), 1);
        assert_eq!(first.unmatched_detections.len(), 1);

        for _ in 0..5 {
            assert_eq!(a.associate(1, &[&t], &dets), first);
        }
    }

    #[test]
    fn optimal_minimizes_total_cost() {
        // greedy grabs the single cheapest pair and strands the other track
        let config = AssociationConfig {
            iou_weight: 0.0,
            distance_weight: 1.0,
            max_distance: 10.0,
            max_cost: 0.6,
            ..AssociationConfig::default()
        };
        let t1 = track(1, 0.0, 100.0);
        let t2 = track(2, 40.0, 100.0);
        let dets = [obs(15.0, 100.0), obs(-30.0, 100.0)];

        let greedy = Associator::new(&config).associate(1, &[&t1, &t2], &dets);
        assert_eq!(greedy.matched.len(), 1);

        let optimal = Associator::new(&AssociationConfig {
            method: AssociationMethod::Optimal,
            ..config
        })
        .associate(1, &[&t1, &t2], &dets);

        let mut pairs: Vec<_> = optimal.matched.iter().map(|m| (m.track, m.detection)).collect();
        pairs.sort();
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn optimal_equal_cost_prefers_lower_track_id() {
        let a = Associator::new(&AssociationConfig {
            method: AssociationMethod::Optimal,
            ..AssociationConfig::default()
        });
        let t7 = track(7, 100.0, 100.0);
        let t3 = track(3, 100.0, 100.0);

        let result = a.associate(1, &[&t7, &t3], &[obs(102.0, 100.0)]);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].track, 1);
        assert_eq!(result.unmatched_tracks, vec![0]);
    }

    #[test]
    fn equal_cost_prefers_higher_iou_in_both_methods() {
        // same reference point, so distance-only costs are identical
        let config = AssociationConfig {
            iou_weight: 0.0,
            distance_weight: 1.0,
            ..AssociationConfig::default()
        };
        let wide = Detection::new(BBox::ltwh(80.0, 100.0, 40.0, 20.0), VehicleClass::Car, 0.9);
        let narrow = Detection::new(BBox::ltwh(90.0, 100.0, 20.0, 20.0), VehicleClass::Car, 0.9);
        let t1 = Track::new(
            1,
            0,
            0.0,
            &Observation::locate(&wide, &mapper()).unwrap(),
            &SpeedConfig::default(),
        );
        let t2 = Track::new(
            2,
            0,
            0.0,
            &Observation::locate(&narrow, &mapper()).unwrap(),
            &SpeedConfig::default(),
        );
        let det = Observation::locate(&narrow, &mapper()).unwrap();

        for method in [AssociationMethod::Greedy, AssociationMethod::Optimal] {
            let a = Associator::new(&AssociationConfig { method, ..config.clone() });
            assert_eq!(a.cost(&t1, &det, 1).0, a.cost(&t2, &det, 1).0);

            let result = a.associate(1, &[&t1, &t2], &[det]);
            assert_eq!(result.matched.len(), 1);
            assert_eq!(result.matched[0].track, 1, "{:?}", method);
            assert_eq!(result.matched[0].iou, 1.0);
        }
    }

    #[test]
    fn empty_inputs() {
        let a = Associator::new(&AssociationConfig::default());
        let t = track(1, 0.0, 0.0);

        let no_dets = a.associate(1, &[&t], &[]);
        assert_eq!(no_dets.unmatched_tracks, vec![0]);

        let no_tracks = a.associate(1, &[], &[obs(0.0, 0.0), obs(50.0, 0.0)]);
        assert_eq!(no_tracks.unmatched_detections, vec![0, 1]);
    }
}
