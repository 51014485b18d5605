//! Depth Unit

use crate::states::DepthFunction;

/// Compare an incoming depth `a` against the stored depth `b`.
/// EQUAL and NOTEQUAL tolerate a difference of one machine epsilon.
#[inline]
pub fn depth_test(a: f32, b: f32, func: DepthFunction) -> bool {
    match func {
        DepthFunction::Always => true,
        DepthFunction::Never => false,
        DepthFunction::Equal => (a - b).abs() <= f32::EPSILON,
        DepthFunction::NotEqual => (a - b).abs() > f32::EPSILON,
        DepthFunction::Less => a < b,
        DepthFunction::LessEqual => a <= b,
        DepthFunction::Greater => a > b,
        DepthFunction::GreaterEqual => a >= b,
    }
}
