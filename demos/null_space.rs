//! Posture centering in the null space of the pose task: the redundant
//! seventh degree of freedom drifts toward the joint centers while the
//! end-effector pose stays put.

use std::sync::Arc;

use anyhow::Result;
use nalgebra::DVector;

use rs_clik_control::clik_quaternion::Clik6DQuaternion;
use rs_clik_control::generator::JointVelocityTargetConfiguration;
use rs_clik_control::integrator::{JointVelocityIntegrator, DEFAULT_TS};
use rs_clik_control::robots::lbr_iiwa7;
use rs_clik_control::utils::dump_joints;

fn main() -> Result<()> {
    let chain = Arc::new(lbr_iiwa7());

    let q_start = DVector::from_vec(vec![0.3, 0.9, -0.6, -1.2, 0.8, 0.9, 0.4]);
    let held_pose = chain.fkine(&q_start)?;

    let mut posture = JointVelocityTargetConfiguration::new(chain.clone());
    posture.set_desired_configuration(DVector::zeros(7))?;
    posture.set_joint_weights(DVector::from_element(7, 1.0))?;

    let mut clik = Clik6DQuaternion::quaternion_pose(chain.clone());
    clik.set_gain_error(10.0)?;
    clik.set_gain_null_space(50.0)?;
    clik.task_mut()
        .set_desired_pose(held_pose.translation.vector, held_pose.rotation);
    clik.task_mut().reset_orientation_reference(&q_start)?;
    clik.set_secondary_generator(Box::new(posture));

    let mut integrator = JointVelocityIntegrator::new(clik, q_start.clone(), DEFAULT_TS)?;

    println!("Initial joints (degrees):");
    dump_joints(&q_start);

    for _ in 0..5000 {
        integrator.exec_single_step()?;
    }

    let pose = chain.fkine(integrator.joints_dh())?;
    println!("Joints after 5 s of posture centering (degrees):");
    dump_joints(integrator.joints_dh());
    println!(
        "Joint displacement {:.4} rad, pose drift {:.2e} m / {:.2e} rad",
        (integrator.joints_dh() - &q_start).norm(),
        (pose.translation.vector - held_pose.translation.vector).norm(),
        pose.rotation.angle_to(&held_pose.rotation)
    );
    Ok(())
}
