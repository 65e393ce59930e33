//! Helper functions

use nalgebra::DVector;

/// Print joint values, converting radians to degrees.
#[allow(dead_code)]
pub fn dump_joints(joints: &DVector<f64>) {
    let mut row_str = String::new();
    for joint_idx in 0..joints.len() {
        row_str.push_str(&format!("{:7.2} ", joints[joint_idx].to_degrees()));
    }
    println!("[{}]", row_str.trim_end());
}

/// Allows to specify joint values in degrees (converts to radians)
#[allow(dead_code)]
pub fn as_radians<const N: usize>(degrees: [f64; N]) -> DVector<f64> {
    DVector::from_iterator(N, degrees.iter().map(|d| d.to_radians()))
}
