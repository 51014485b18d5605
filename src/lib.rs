//! softpixel: a CPU texture sampling and pixel composition pipeline.
//!
//! Texels live in [`PixelBuffer`]s with a linear, 4x4 tiled or 32x32 Morton
//! layout. A [`Texture`] holds one [`MipChain`] per layer; a [`Sampler`]
//! filters texels out of a chain; a [`FrameBuffer`] composes fragments into
//! color and depth attachments through the blend and depth units.

pub mod aligned;
pub mod blend;
pub mod buffer;
pub mod config;
pub mod depth;
pub mod error;
pub mod framebuffer;
pub mod image;
pub mod math;
pub mod procedural;
pub mod sampler;
pub mod states;
pub mod texel;
pub mod texture;

pub use buffer::{Layout, PixelBuffer};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use framebuffer::{AttachmentKind, FrameBuffer, RenderPass};
pub use image::{ImageBuffer, MipChain, SOFT_MS_CNT};
pub use math::{IVec2, Vec2, Vec3, Vec4};
pub use sampler::{Sampler, Sampler2D, SamplerCube};
pub use states::{BlendFactor, BlendFunction, BlendParameters, ClearStates, DepthFunction, RenderStates};
pub use texel::{Rgba8, Texel};
pub use texture::{
    AnyTexture, BorderColor, CubeMapFace, FilterMode, SamplerDesc, SharedTexture, Texture, TextureDesc,
    TextureElement, TextureFormat, TextureType, TextureUsage, WrapMode,
};
