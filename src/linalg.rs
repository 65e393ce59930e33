//! Dense linear-algebra primitives consumed by the CLIK solver: the damped
//! least-squares pseudo-inverse, the null-space projector and unit-quaternion
//! continuity handling.

extern crate nalgebra as na;

use na::linalg::SVD;
use na::{DMatrix, DVector, UnitQuaternion};

/// Damped least-squares pseudo-inverse.
///
/// Computed through the SVD with the filter factors `sigma / (sigma^2 +
/// damping^2)`. With zero damping this degrades to the plain Moore-Penrose
/// pseudo-inverse: a zero singular value then contributes nothing instead of
/// dividing by zero, so the result stays finite even for singular input.
pub fn pinv_dls(matrix: &DMatrix<f64>, damping: f64) -> DMatrix<f64> {
    let svd = SVD::new(matrix.clone(), true, true);
    let u = svd.u.as_ref().expect("SVD requested with u");
    let v_t = svd.v_t.as_ref().expect("SVD requested with v_t");

    // Relative cutoff separating true singular values from numerical noise;
    // below it a direction is dropped rather than amplified.
    let cutoff = svd.singular_values.max() * 1e-10;

    let mut filtered = DMatrix::zeros(v_t.nrows(), u.ncols());
    for (i, &sigma) in svd.singular_values.iter().enumerate() {
        if sigma > cutoff {
            filtered[(i, i)] = sigma / (sigma * sigma + damping * damping);
        }
    }

    v_t.transpose() * filtered * u.transpose()
}

/// Projector onto the null space of `jacobian`, computed from the jacobian
/// and its (damped) pseudo-inverse: `N = I - J_pinv * J`.
///
/// Joint velocities filtered through `N` produce no primary-task motion up
/// to the accuracy lost to the damping of `jacobian_pinv`.
pub fn null_space_projector(jacobian: &DMatrix<f64>, jacobian_pinv: &DMatrix<f64>) -> DMatrix<f64> {
    DMatrix::identity(jacobian.ncols(), jacobian.ncols()) - jacobian_pinv * jacobian
}

/// Resolve the double-cover sign ambiguity of a unit quaternion against a
/// continuity reference: of `q` and `-q` (the same rotation), return the one
/// closer to `previous`.
pub fn continuous_quaternion(
    q: &UnitQuaternion<f64>,
    previous: &UnitQuaternion<f64>,
) -> UnitQuaternion<f64> {
    if q.coords.dot(&previous.coords) < 0.0 {
        UnitQuaternion::new_unchecked(-q.into_inner())
    } else {
        *q
    }
}

/// Indices and values of the non-finite entries of a joint vector.
pub(crate) fn non_finite_entries(v: &DVector<f64>) -> (Vec<usize>, Vec<f64>) {
    let mut joints = Vec::new();
    let mut values = Vec::new();
    for (i, &x) in v.iter().enumerate() {
        if !x.is_finite() {
            joints.push(i);
            values.push(x);
        }
    }
    (joints, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::Quaternion;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_pinv_dls_undamped_inverts_well_conditioned() {
        let j = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 1.0, 1.0]);
        let pinv = pinv_dls(&j, 0.0);
        let product = &j * &pinv;
        for i in 0..2 {
            for k in 0..2 {
                let expected = if i == k { 1.0 } else { 0.0 };
                assert!(
                    (product[(i, k)] - expected).abs() < EPSILON,
                    "J * pinv(J) is not identity at ({}, {})", i, k
                );
            }
        }
    }

    #[test]
    fn test_pinv_dls_finite_on_singular_matrix() {
        // Rank 1: second row is a multiple of the first
        let j = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 6.0]);
        for damping in [0.0, 0.01, 0.5] {
            let pinv = pinv_dls(&j, damping);
            assert!(pinv.iter().all(|x| x.is_finite()), "damping {}", damping);
            // The damped solution stays bounded
            let v = DVector::from_vec(vec![1.0, 1.0]);
            let solution = &pinv * &v;
            assert!(solution.norm() < 10.0, "damping {}", damping);
        }
    }

    #[test]
    fn test_pinv_dls_converges_to_least_squares_as_damping_vanishes() {
        let j = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]);
        let v = DVector::from_vec(vec![0.3, -0.7]);
        let exact = pinv_dls(&j, 0.0) * &v;
        let mut previous_distance = f64::INFINITY;
        for damping in [0.1, 0.01, 0.001] {
            let solution = pinv_dls(&j, damping) * &v;
            let distance = (&solution - &exact).norm();
            assert!(distance < previous_distance);
            previous_distance = distance;
        }
        assert!(previous_distance < 1e-5);
    }

    #[test]
    fn test_null_space_projector_annihilates_task_motion() {
        // Redundant task: 3 task rows, 5 joints
        let j = DMatrix::from_row_slice(3, 5, &[
            1.0, 0.0, 0.3, -0.2, 0.5,
            0.0, 1.0, -0.4, 0.1, 0.2,
            0.2, -0.1, 1.0, 0.6, -0.3,
        ]);
        let pinv = pinv_dls(&j, 0.0);
        let n = null_space_projector(&j, &pinv);
        for seed in 0..5 {
            let qdot_secondary =
                DVector::from_fn(5, |i, _| ((i + seed * 3) as f64 * 0.37).sin());
            let task_motion = &j * &n * &qdot_secondary;
            assert!(
                task_motion.norm() < 1e-10,
                "null-space term leaked into the task: {}", task_motion.norm()
            );
        }
    }

    #[test]
    fn test_null_space_projector_leak_bounded_by_damping() {
        let j = DMatrix::from_row_slice(2, 4, &[
            1.0, 0.2, -0.3, 0.4,
            0.0, 1.0, 0.5, -0.2,
        ]);
        let damping = 1e-3;
        let pinv = pinv_dls(&j, damping);
        let n = null_space_projector(&j, &pinv);
        let qdot_secondary = DVector::from_vec(vec![1.0, -1.0, 0.5, 0.2]);
        let task_motion = &j * &n * &qdot_secondary;
        // Damping trades exactness for conditioning; the leak is O(damping^2)
        assert!(task_motion.norm() < 1e-4);
    }

    #[test]
    fn test_continuous_quaternion_keeps_hemisphere() {
        let previous = UnitQuaternion::from_quaternion(Quaternion::new(0.1, 0.99, 0.0, 0.0));
        let antipodal =
            UnitQuaternion::new_unchecked(-previous.into_inner());
        let resolved = continuous_quaternion(&antipodal, &previous);
        assert!(resolved.coords.dot(&previous.coords) > 0.0);
        // Same rotation either way
        assert!(resolved.angle_to(&previous) < EPSILON);
    }

    #[test]
    fn test_continuous_quaternion_leaves_aligned_untouched() {
        let previous = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        let resolved = continuous_quaternion(&previous, &previous);
        assert!((resolved.coords - previous.coords).norm() < EPSILON);
    }

    #[test]
    fn test_non_finite_entries() {
        let v = DVector::from_vec(vec![0.0, f64::NAN, 1.0, f64::INFINITY]);
        let (joints, values) = non_finite_entries(&v);
        assert_eq!(joints, vec![1, 3]);
        assert!(values[0].is_nan());
        assert!(values[1].is_infinite());
    }
}
