//! Image-plane to ground-plane mapping.
//!
//! The mapping is a planar homography estimated with the normalized DLT:
//! both point sets are translated to their centroid and scaled to a mean
//! distance of `sqrt(2)`, the stacked `2n x 9` system is solved through SVD,
//! and the result is de-normalized back to pixel/ground units.
//!
//! Points on or beyond the horizon line of the calibrated plane have no
//! ground position and map to `None`.

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::math;

const COLLINEAR_TOLERANCE: f64 = 1e-9;
const NULL_SPACE_TOLERANCE: f64 = 1e-10;
const DETERMINANT_TOLERANCE: f64 = 1e-9;
const HORIZON_TOLERANCE: f64 = 1e-12;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Meters,
    Feet,
}

impl DistanceUnit {
    #[inline]
    pub fn to_meters(&self, value: f64) -> f64 {
        match self {
            Self::Meters => value,
            Self::Feet => value * 0.3048,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meters => "m",
            Self::Feet => "ft",
        }
    }
}

/// A calibration pair: where a ground point appears in the image.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub image: na::Point2<f64>,
    pub ground: na::Point2<f64>,
}

impl Correspondence {
    #[inline]
    pub fn new(image: (f64, f64), ground: (f64, f64)) -> Self {
        Self {
            image: na::Point2::new(image.0, image.1),
            ground: na::Point2::new(ground.0, ground.1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundMapper {
    homography: na::Matrix3<f64>,
    // sign of the homogeneous scale on the visible side of the horizon
    visible_sign: f64,
    unit: DistanceUnit,
}

impl GroundMapper {
    pub fn new(points: &[Correspondence], unit: DistanceUnit) -> Result<Self, CalibrationError> {
        if points.len() < 4 {
            return Err(CalibrationError::TooFewPoints(points.len()));
        }

        if let Some(idx) = points.iter().position(|c| {
            !(c.image.x.is_finite()
                && c.image.y.is_finite()
                && c.ground.x.is_finite()
                && c.ground.y.is_finite())
        }) {
            return Err(CalibrationError::NonFinitePoint(idx));
        }

        let image: Vec<_> = points.iter().map(|c| c.image).collect();
        let ground: Vec<_> = points.iter().map(|c| c.ground).collect();

        if math::all_collinear(&image, COLLINEAR_TOLERANCE) {
            return Err(CalibrationError::Collinear("image"));
        }

        if math::all_collinear(&ground, COLLINEAR_TOLERANCE) {
            return Err(CalibrationError::Collinear("ground"));
        }

        let (t_image, image_n) = normalize(&image);
        let (t_ground, ground_n) = normalize(&ground);

        let h_n = solve_dlt(&image_n, &ground_n)?;

        let det = h_n.determinant();
        if !det.is_finite() || det.abs() < DETERMINANT_TOLERANCE {
            return Err(CalibrationError::Singular(det));
        }

        let t_ground_inv = t_ground
            .try_inverse()
            .ok_or(CalibrationError::Degenerate)?;

        let mut homography = t_ground_inv * h_n * t_image;
        let scale = homography[(2, 2)];
        if scale.abs() > HORIZON_TOLERANCE {
            homography /= scale;
        }

        let centroid = image
            .iter()
            .fold(na::Vector2::zeros(), |acc, p| acc + p.coords)
            / image.len() as f64;
        let w = (homography * na::Vector3::new(centroid.x, centroid.y, 1.0)).z;

        Ok(Self {
            homography,
            visible_sign: w.signum(),
            unit,
        })
    }

    /// Maps the image quadrilateral `[top-left, top-right, bottom-right,
    /// bottom-left]` onto a `width x length` ground rectangle with its origin at
    /// the far-left corner.
    pub fn from_roi(
        quad: [(f64, f64); 4],
        width: f64,
        length: f64,
        unit: DistanceUnit,
    ) -> Result<Self, CalibrationError> {
        let ground = [(0.0, 0.0), (width, 0.0), (width, length), (0.0, length)];
        let points: Vec<_> = quad
            .iter()
            .zip(ground.iter())
            .map(|(i, g)| Correspondence::new(*i, *g))
            .collect();

        Self::new(&points, unit)
    }

    #[inline]
    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }

    #[inline]
    pub fn homography(&self) -> &na::Matrix3<f64> {
        &self.homography
    }

    pub fn map_to_ground(&self, image: &na::Point2<f64>) -> Option<na::Point2<f64>> {
        let v = self.homography * na::Vector3::new(image.x, image.y, 1.0);

        if v.z.abs() < HORIZON_TOLERANCE || v.z.signum() != self.visible_sign {
            return None;
        }

        let ground = na::Point2::new(v.x / v.z, v.y / v.z);

        if ground.x.is_finite() && ground.y.is_finite() {
            Some(ground)
        } else {
            None
        }
    }

    /// Ground distance between two image points.
    pub fn ground_distance(&self, a: &na::Point2<f64>, b: &na::Point2<f64>) -> Option<f64> {
        Some(na::distance(&self.map_to_ground(a)?, &self.map_to_ground(b)?))
    }
}

fn normalize(points: &[na::Point2<f64>]) -> (na::Matrix3<f64>, Vec<na::Point2<f64>>) {
    let n = points.len() as f64;
    let centroid = points
        .iter()
        .fold(na::Vector2::zeros(), |acc, p| acc + p.coords)
        / n;

    let mean_dist = points
        .iter()
        .map(|p| (p.coords - centroid).norm())
        .sum::<f64>()
        / n;

    let s = if mean_dist > f64::EPSILON {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = na::Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    );

    let normalized = points
        .iter()
        .map(|p| na::Point2::from((p.coords - centroid) * s))
        .collect();

    (t, normalized)
}

fn solve_dlt(
    src: &[na::Point2<f64>],
    dst: &[na::Point2<f64>],
) -> Result<na::Matrix3<f64>, CalibrationError> {
    // pad to a square system so the full right singular basis is available
    let rows = (2 * src.len()).max(9);
    let mut a = na::DMatrix::<f64>::zeros(rows, 9);

    for (i, (p, q)) in src.iter().zip(dst.iter()).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        let r = 2 * i;

        a[(r, 0)] = -x;
        a[(r, 1)] = -y;
        a[(r, 2)] = -1.0;
        a[(r, 6)] = u * x;
        a[(r, 7)] = u * y;
        a[(r, 8)] = u;

        a[(r + 1, 3)] = -x;
        a[(r + 1, 4)] = -y;
        a[(r + 1, 5)] = -1.0;
        a[(r + 1, 6)] = v * x;
        a[(r + 1, 7)] = v * y;
        a[(r + 1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(CalibrationError::Degenerate)?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&i, &j| svd.singular_values[i].total_cmp(&svd.singular_values[j]));

    let largest = svd.singular_values[order[order.len() - 1]];
    let second = svd.singular_values[order[1]];

    if largest <= 0.0 || second / largest < NULL_SPACE_TOLERANCE {
        return Err(CalibrationError::Degenerate);
    }

    let h = v_t.row(order[0]);

    Ok(na::Matrix3::new(
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn apply(h: &na::Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
        let v = h * na::Vector3::new(x, y, 1.0);
        (v.x / v.z, v.y / v.z)
    }

    #[test]
    fn pure_scale_calibration() {
        let points = [
            Correspondence::new((0.0, 0.0), (0.0, 0.0)),
            Correspondence::new((100.0, 0.0), (10.0, 0.0)),
            Correspondence::new((100.0, 100.0), (10.0, 10.0)),
            Correspondence::new((0.0, 100.0), (0.0, 10.0)),
        ];
        let mapper = GroundMapper::new(&points, DistanceUnit::Meters).unwrap();

        let g = mapper.map_to_ground(&na::Point2::new(35.0, 72.0)).unwrap();
        assert_relative_eq!(g, na::Point2::new(3.5, 7.2), epsilon = 1e-9);

        let d = mapper
            .ground_distance(&na::Point2::new(0.0, 0.0), &na::Point2::new(30.0, 40.0))
            .unwrap();
        assert_relative_eq!(d, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn recovers_a_perspective_mapping_from_redundant_points() {
        let truth = na::Matrix3::new(0.02, 0.004, -3.0, 0.001, 0.05, -10.0, 0.0, 0.0012, 1.0);
        let image = [
            (120.0, 400.0),
            (900.0, 420.0),
            (1200.0, 700.0),
            (50.0, 690.0),
            (640.0, 550.0),
            (300.0, 600.0),
        ];
        let points: Vec<_> = image
            .iter()
            .map(|&(x, y)| Correspondence::new((x, y), apply(&truth, x, y)))
            .collect();

        let mapper = GroundMapper::new(&points, DistanceUnit::Meters).unwrap();
        let (ex, ey) = apply(&truth, 700.0, 480.0);
        let g = mapper.map_to_ground(&na::Point2::new(700.0, 480.0)).unwrap();

        assert_relative_eq!(g.x, ex, epsilon = 1e-6);
        assert_relative_eq!(g.y, ey, epsilon = 1e-6);
    }

    #[test]
    fn roi_corners_land_on_rectangle() {
        let mapper = GroundMapper::from_roi(
            [(450.0, 450.0), (850.0, 450.0), (1280.0, 720.0), (0.0, 720.0)],
            12.0,
            50.0,
            DistanceUnit::Meters,
        )
        .unwrap();

        let far_right = mapper.map_to_ground(&na::Point2::new(850.0, 450.0)).unwrap();
        let near_left = mapper.map_to_ground(&na::Point2::new(0.0, 720.0)).unwrap();

        assert_relative_eq!(far_right, na::Point2::new(12.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(near_left, na::Point2::new(0.0, 50.0), epsilon = 1e-6);
    }

    #[test]
    fn points_above_the_horizon_have_no_ground_position() {
        let mapper = GroundMapper::from_roi(
            [(450.0, 450.0), (850.0, 450.0), (1280.0, 720.0), (0.0, 720.0)],
            12.0,
            50.0,
            DistanceUnit::Meters,
        )
        .unwrap();

        assert!(mapper.map_to_ground(&na::Point2::new(640.0, 10.0)).is_none());
    }

    #[test]
    fn rejects_too_few_points() {
        let points = [
            Correspondence::new((0.0, 0.0), (0.0, 0.0)),
            Correspondence::new((1.0, 0.0), (1.0, 0.0)),
            Correspondence::new((0.0, 1.0), (0.0, 1.0)),
        ];

        assert_eq!(
            GroundMapper::new(&points, DistanceUnit::Meters),
            Err(CalibrationError::TooFewPoints(3))
        );
    }

    #[test]
    fn rejects_collinear_points() {
        let points: Vec<_> = (0..5)
            .map(|i| Correspondence::new((i as f64, 2.0 * i as f64), (i as f64, i as f64 * 0.5)))
            .collect();

        assert_eq!(
            GroundMapper::new(&points, DistanceUnit::Meters),
            Err(CalibrationError::Collinear("image"))
        );
    }

    #[test]
    fn rejects_non_finite_points() {
        let points = [
            Correspondence::new((0.0, 0.0), (0.0, 0.0)),
            Correspondence::new((1.0, 0.0), (1.0, 0.0)),
            Correspondence::new((1.0, 1.0), (f64::NAN, 1.0)),
            Correspondence::new((0.0, 1.0), (0.0, 1.0)),
        ];

        assert_eq!(
            GroundMapper::new(&points, DistanceUnit::Meters),
            Err(CalibrationError::NonFinitePoint(2))
        );
    }

    #[test]
    fn rejects_mapping_that_flattens_the_plane() {
        // three of the ground points on one line: no invertible mapping exists
        let points = [
            Correspondence::new((0.0, 0.0), (0.0, 0.0)),
            Correspondence::new((10.0, 0.0), (1.0, 0.0)),
            Correspondence::new((10.0, 10.0), (2.0, 0.0)),
            Correspondence::new((0.0, 10.0), (0.0, 1.0)),
        ];

        let err = GroundMapper::new(&points, DistanceUnit::Meters).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::Singular(_) | CalibrationError::Degenerate
        ));
    }

    #[test]
    fn feet_convert_to_meters() {
        assert_relative_eq!(DistanceUnit::Feet.to_meters(10.0), 3.048);
        assert_relative_eq!(DistanceUnit::Meters.to_meters(10.0), 10.0);
    }
}
