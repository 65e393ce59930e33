//! Validates the analytic geometric Jacobian against finite differences of
//! the forward kinematics, for chains mixing revolute and prismatic joints.

extern crate nalgebra as na;

use na::{DVector, Isometry3, Translation3, UnitQuaternion, Vector3};
use rand::prelude::*;

use crate::chain::KinematicChain;
use crate::joint::{PrismaticJoint, RevoluteJoint};

const DELTA: f64 = 1e-6;
const TOLERANCE: f64 = 1e-5;

/// Four joints of both types, with a shifted base and a rotated tool so that
/// neither transform is trivially identity.
fn mixed_chain() -> KinematicChain {
    let base = Isometry3::from_parts(
        Translation3::new(0.1, -0.2, 0.5),
        UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.3),
    );
    let tool = Isometry3::from_parts(
        Translation3::new(0.0, 0.05, 0.1),
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -0.4),
    );

    let mut chain = KinematicChain::with_transforms("mixed", base, tool);
    chain.push_joint(Box::new(RevoluteJoint::new(
        0.3,
        std::f64::consts::FRAC_PI_2,
        0.2,
        "j1",
    )));
    chain.push_joint(Box::new(PrismaticJoint::new(
        0.1,
        -std::f64::consts::FRAC_PI_2,
        0.4,
        "j2",
    )));
    chain.push_joint(Box::new(RevoluteJoint::new(0.5, 0.0, 0.0, "j3")));
    chain.push_joint(Box::new(RevoluteJoint::new(
        0.0,
        std::f64::consts::FRAC_PI_2,
        0.3,
        "j4",
    )));
    chain
}

fn random_configuration(rng: &mut StdRng, joints: usize) -> DVector<f64> {
    DVector::from_fn(joints, |_, _| rng.gen_range(-1.5..1.5))
}

/// Central-difference approximation of one Jacobian column.
fn numeric_column(
    chain: &KinematicChain,
    q: &DVector<f64>,
    i: usize,
) -> (Vector3<f64>, Vector3<f64>) {
    let mut q_plus = q.clone();
    q_plus[i] += DELTA;
    let mut q_minus = q.clone();
    q_minus[i] -= DELTA;

    let pose_plus = chain.fkine(&q_plus).expect("valid configuration");
    let pose_minus = chain.fkine(&q_minus).expect("valid configuration");

    let linear =
        (pose_plus.translation.vector - pose_minus.translation.vector) / (2.0 * DELTA);
    let angular =
        (pose_plus.rotation * pose_minus.rotation.inverse()).scaled_axis() / (2.0 * DELTA);

    (linear, angular)
}

#[test]
fn test_geometric_jacobian_matches_finite_differences() {
    let chain = mixed_chain();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..20 {
        let q = random_configuration(&mut rng, chain.num_joints());
        let jacobian = chain.jacob_geometric(&q).expect("valid configuration");

        for i in 0..chain.num_joints() {
            let (linear, angular) = numeric_column(&chain, &q, i);
            for row in 0..3 {
                assert!(
                    (jacobian[(row, i)] - linear[row]).abs() < TOLERANCE,
                    "linear mismatch at column {}, row {}: analytic {} vs numeric {}",
                    i, row, jacobian[(row, i)], linear[row]
                );
                assert!(
                    (jacobian[(row + 3, i)] - angular[row]).abs() < TOLERANCE,
                    "angular mismatch at column {}, row {}: analytic {} vs numeric {}",
                    i, row, jacobian[(row + 3, i)], angular[row]
                );
            }
        }
    }
}

#[test]
fn test_position_and_orientation_blocks_agree_with_full_jacobian() {
    let chain = mixed_chain();
    let mut rng = StdRng::seed_from_u64(7);
    let q = random_configuration(&mut rng, chain.num_joints());

    let full = chain.jacob_geometric(&q).expect("valid configuration");
    let position = chain.jacob_p(&q).expect("valid configuration");
    let orientation = chain.jacob_o_geometric(&q).expect("valid configuration");

    for i in 0..chain.num_joints() {
        for row in 0..3 {
            assert_eq!(full[(row, i)], position[(row, i)]);
            assert_eq!(full[(row + 3, i)], orientation[(row, i)]);
        }
    }
}

#[test]
fn test_intermediate_frame_jacobian_ignores_later_joints() {
    let chain = mixed_chain();
    let mut rng = StdRng::seed_from_u64(99);
    let q = random_configuration(&mut rng, chain.num_joints());

    // Jacobian to the frame after two joints has two columns and must match
    // the two-joint truncation of the chain
    let partial = chain.jacob_geometric_to(&q, 2).expect("valid configuration");
    assert_eq!(partial.ncols(), 2);

    let mut truncated = KinematicChain::with_transforms(
        "truncated",
        *chain.base(),
        Isometry3::identity(),
    );
    truncated.push_joint(Box::new(RevoluteJoint::new(
        0.3,
        std::f64::consts::FRAC_PI_2,
        0.2,
        "j1",
    )));
    truncated.push_joint(Box::new(PrismaticJoint::new(
        0.1,
        -std::f64::consts::FRAC_PI_2,
        0.4,
        "j2",
    )));

    let q_truncated = DVector::from_vec(vec![q[0], q[1]]);
    let reference = truncated
        .jacob_geometric_to(&q_truncated, 2)
        .expect("valid configuration");
    assert!((partial - reference).norm() < 1e-12);
}
