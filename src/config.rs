//! Pipeline configuration, persisted as JSON.

use std::fs;
use std::path::Path;

use log::error;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::procedural::Pattern;
use crate::states::{BlendParameters, ClearStates, RenderStates};
use crate::texture::{BorderColor, FilterMode, SamplerDesc, TextureDesc, TextureUsage, WrapMode};

/// Everything needed to build a texture, sample it and compose the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub texture: TextureDesc,
    pub sampler: SamplerDesc,
    pub render: RenderStates,
    pub clear: ClearStates,
    /// Generator used to fill the source texture
    pub pattern: Pattern,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            texture: TextureDesc {
                width: 256,
                height: 256,
                usage: TextureUsage::SAMPLER | TextureUsage::UPLOAD_DATA,
                use_mipmaps: true,
                tag: "source".into(),
                ..TextureDesc::default()
            },
            sampler: SamplerDesc {
                filter_min: FilterMode::LinearMipmapLinear,
                filter_mag: FilterMode::Linear,
                wrap_s: WrapMode::Repeat,
                wrap_t: WrapMode::Repeat,
                wrap_r: WrapMode::Repeat,
                border_color: BorderColor::Black,
            },
            render: RenderStates {
                blend: true,
                blend_params: BlendParameters::alpha_over(),
                depth_test: true,
                ..RenderStates::default()
            },
            clear: ClearStates {
                color_flag: true,
                depth_flag: true,
                ..ClearStates::default()
            },
            pattern: Pattern::default(),
        }
    }
}

impl PipelineConfig {
    /// Save config to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| {
            error!("config: failed to write {}: {}", path.display(), e);
            PipelineError::io(path, e)
        })
    }

    /// Load config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            error!("config: failed to read {}: {}", path.display(), e);
            PipelineError::io(path, e)
        })?;
        serde_json::from_str(&json).map_err(|e| {
            error!("config: {} is not a valid pipeline config: {}", path.display(), e);
            PipelineError::Config(e)
        })
    }
}
