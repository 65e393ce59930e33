//! Ready-made chain definitions for concrete robot models.

use crate::chain::KinematicChain;
use crate::joint::RevoluteJoint;

use std::f64::consts::FRAC_PI_2;

/// KUKA LBR iiwa 7 R800: seven revolute joints, standard DH with all `a`
/// parameters zero, identity base and tool transforms. The extra degree of
/// freedom makes the chain redundant for 6-DOF pose tasks, leaving the null
/// space available for secondary objectives.
///
/// Position limits per the vendor data sheet; soft limits are set 5 degrees
/// inside the hard ones, soft velocity limits at 90% of the hard ones.
pub fn lbr_iiwa7() -> KinematicChain {
    let alpha = [
        -FRAC_PI_2, FRAC_PI_2, FRAC_PI_2, -FRAC_PI_2, -FRAC_PI_2, FRAC_PI_2, 0.0,
    ];
    let d = [0.340, 0.0, 0.400, 0.0, 0.400, 0.0, 0.126];
    let position_limit_deg = [170.0, 120.0, 170.0, 120.0, 170.0, 120.0, 175.0];
    let velocity_limit = [1.71, 1.71, 1.75, 2.27, 2.44, 3.14, 3.14];

    let mut chain = KinematicChain::new("lbr_iiwa7");
    for i in 0..7 {
        let hard: f64 = position_limit_deg[i].to_radians();
        let soft: f64 = (position_limit_deg[i] - 5.0).to_radians();
        let vel = velocity_limit[i];
        let joint = RevoluteJoint::new(0.0, alpha[i], d[i], &format!("iiwa_joint_{}", i + 1))
            .with_limits((-hard, hard), (-soft, soft))
            .expect("limits are ordered")
            .with_velocity_limits((-vel, vel), (-0.9 * vel, 0.9 * vel))
            .expect("limits are ordered");
        chain.push_joint(Box::new(joint));
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    #[test]
    fn test_iiwa7_has_seven_joints() {
        let chain = lbr_iiwa7();
        assert_eq!(chain.num_joints(), 7);
    }

    #[test]
    fn test_iiwa7_candle_pose_height() {
        // All joints at zero: the arm points straight up, the flange sits at
        // the sum of the d parameters
        let chain = lbr_iiwa7();
        let pose = chain.fkine(&DVector::zeros(7)).expect("valid");
        let height = 0.340 + 0.400 + 0.400 + 0.126;
        assert!((pose.translation.vector.z - height).abs() < 1e-9);
        assert!(pose.translation.vector.x.abs() < 1e-9);
        assert!(pose.translation.vector.y.abs() < 1e-9);
    }

    #[test]
    fn test_iiwa7_limits_populated() {
        let chain = lbr_iiwa7();
        let joint = chain.joint(1);
        let (low, high) = joint.hard_limits();
        assert!((high - 120f64.to_radians()).abs() < 1e-12);
        assert!((low + 120f64.to_radians()).abs() < 1e-12);
        let (soft_low, soft_high) = joint.soft_limits();
        assert!(soft_low > low);
        assert!(soft_high < high);
    }
}
