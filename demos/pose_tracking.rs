//! Drives a 7-DOF arm to a Cartesian pose with the quaternion CLIK
//! controller and the joint-velocity integrator, printing the error decay.

use std::sync::Arc;

use anyhow::Result;
use nalgebra::DVector;

use rs_clik_control::clik_quaternion::Clik6DQuaternion;
use rs_clik_control::integrator::{JointVelocityIntegrator, DEFAULT_TS};
use rs_clik_control::robots::lbr_iiwa7;
use rs_clik_control::utils::dump_joints;

fn main() -> Result<()> {
    let chain = Arc::new(lbr_iiwa7());

    let q_start = DVector::from_vec(vec![0.3, 0.5, -0.2, -1.0, 0.4, 0.8, 0.1]);
    let q_target = DVector::from_vec(vec![0.6, 0.7, 0.1, -0.7, 0.6, 1.0, 0.3]);
    let target_pose = chain.fkine(&q_target)?;

    let mut clik = Clik6DQuaternion::quaternion_pose(chain.clone());
    clik.set_gain_error(5.0)?;
    clik.task_mut()
        .set_desired_pose(target_pose.translation.vector, target_pose.rotation);
    clik.task_mut().reset_orientation_reference(&q_start)?;

    let mut integrator = JointVelocityIntegrator::new(clik, q_start, DEFAULT_TS)?;

    println!("Tracking a static pose on the {}:", chain.name());
    for step in 0..=5000 {
        if step % 500 == 0 {
            let pose = chain.fkine(integrator.joints_dh())?;
            let position_error =
                (pose.translation.vector - target_pose.translation.vector).norm();
            let orientation_error = pose.rotation.angle_to(&target_pose.rotation);
            println!(
                "t = {:5.2} s   position error {:10.6} m   orientation error {:10.6} rad",
                step as f64 * integrator.ts(),
                position_error,
                orientation_error
            );
        }
        integrator.exec_single_step()?;

        let q = integrator.joints_dh().clone();
        let qdot = integrator.joints_vel_dh().clone();
        integrator.generator().safety_check(&q, &qdot)?;
    }

    println!("Final joint configuration (degrees):");
    dump_joints(integrator.joints_dh());
    Ok(())
}
