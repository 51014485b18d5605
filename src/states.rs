//! Fixed-function pipeline state: depth predicates, blend equations and
//! clear values.

use serde::{Deserialize, Serialize};

use crate::math::Vec4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthFunction {
    #[default]
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendFunction {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Separable blend equation: RGB and alpha each get their own factors and
/// combine function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendParameters {
    pub func_rgb: BlendFunction,
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,

    pub func_alpha: BlendFunction,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl Default for BlendParameters {
    fn default() -> Self {
        Self {
            func_rgb: BlendFunction::Add,
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            func_alpha: BlendFunction::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
        }
    }
}

impl BlendParameters {
    /// Standard source-over alpha blending
    pub fn alpha_over() -> Self {
        let mut params = Self::default();
        params.set_blend_factor(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        params
    }

    /// Use the same factor pair for RGB and alpha
    pub fn set_blend_factor(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.src_rgb = src;
        self.src_alpha = src;
        self.dst_rgb = dst;
        self.dst_alpha = dst;
    }

    /// Use the same combine function for RGB and alpha
    pub fn set_blend_function(&mut self, func: BlendFunction) {
        self.func_rgb = func;
        self.func_alpha = func;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStates {
    pub blend: bool,
    pub blend_params: BlendParameters,

    pub depth_test: bool,
    pub depth_mask: bool,
    pub depth_func: DepthFunction,
}

impl Default for RenderStates {
    fn default() -> Self {
        Self {
            blend: false,
            blend_params: BlendParameters::default(),
            depth_test: false,
            depth_mask: true,
            depth_func: DepthFunction::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearStates {
    pub depth_flag: bool,
    pub color_flag: bool,
    pub clear_color: Vec4,
    pub clear_depth: f32,
}

impl Default for ClearStates {
    fn default() -> Self {
        Self {
            depth_flag: false,
            color_flag: false,
            clear_color: Vec4::ZERO,
            clear_depth: 1.0,
        }
    }
}
