use nalgebra as na;

/// Twice the signed area of the triangle `abc`.
#[inline]
pub fn cross(a: &na::Point2<f64>, b: &na::Point2<f64>, c: &na::Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// True when every point lies on one line (or there are fewer than three
/// distinct points). Tolerance is relative to the squared extent of the set.
pub fn all_collinear(points: &[na::Point2<f64>], rel_tol: f64) -> bool {
    let extent = points
        .iter()
        .flat_map(|a| points.iter().map(move |b| na::distance_squared(a, b)))
        .fold(0.0, f64::max);

    if extent <= f64::EPSILON {
        return true;
    }

    let tol = rel_tol * extent;
    let n = points.len();

    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                if cross(&points[i], &points[j], &points[k]).abs() > tol {
                    return false;
                }
            }
        }
    }

    true
}

/// Linear extrapolation through `(t0, p0)` and `(t1, p1)` evaluated at `t`.
/// Falls back to `p1` when the two samples share a time.
#[inline]
pub fn extrapolate(
    t0: f64,
    p0: &na::Point2<f64>,
    t1: f64,
    p1: &na::Point2<f64>,
    t: f64,
) -> na::Point2<f64> {
    let dt = t1 - t0;

    if dt.abs() <= f64::EPSILON {
        return *p1;
    }

    p1 + (p1 - p0) * ((t - t1) / dt)
}

/// Mean of the ten values around the median once more than fifteen values are
/// available; plain mean below that.
pub fn trimmed_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let slice = if sorted.len() > 15 {
        let mid = sorted.len() / 2;
        &sorted[mid - 5..mid + 5]
    } else {
        &sorted[..]
    };

    Some(slice.iter().sum::<f64>() / slice.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> na::Point2<f64> {
        na::Point2::new(x, y)
    }

    #[test]
    fn collinear_sets() {
        assert!(all_collinear(&[p(0., 0.), p(1., 1.), p(2., 2.), p(5., 5.)], 1e-9));
        assert!(all_collinear(&[p(3., 3.), p(3., 3.)], 1e-9));
        assert!(!all_collinear(&[p(0., 0.), p(1., 0.), p(1., 1.), p(0., 1.)], 1e-9));
    }

    #[test]
    fn extrapolates_along_the_line() {
        let q = extrapolate(1.0, &p(0., 0.), 2.0, &p(2., 1.), 4.0);
        assert_relative_eq!(q, p(6., 3.));

        let same = extrapolate(2.0, &p(0., 0.), 2.0, &p(2., 1.), 4.0);
        assert_relative_eq!(same, p(2., 1.));
    }

    #[test]
    fn trimmed_mean_ignores_outliers_on_long_history() {
        assert_eq!(trimmed_mean(&[]), None);
        assert_relative_eq!(trimmed_mean(&[1.0, 2.0, 3.0]).unwrap(), 2.0);

        let mut values = vec![50.0; 16];
        values[0] = 1000.0;
        values[1] = 0.0;
        assert_relative_eq!(trimmed_mean(&values).unwrap(), 50.0);
    }
}
