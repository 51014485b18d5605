//! softpixel command-line driver
//!
//! Builds a procedural texture, generates its mip chain, dumps every level,
//! round-trips the raw texture data through a file and composes two sampled
//! layers into an offscreen frame buffer with depth testing and blending.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use softpixel::procedural::Pattern;
use softpixel::sampler::LodFunc;
use softpixel::{
    FrameBuffer, Layout, PipelineConfig, PipelineError, RenderStates, Rgba8, Sampler, Sampler2D, Texture, TextureDesc,
    TextureFormat, TextureUsage, Vec2, Vec4,
};

const DEFAULT_OUT_DIR: &str = "softpixel-out";

/// Texture coordinate repeats across the background layer
const BACKGROUND_TILING: f32 = 4.0;

struct Options {
    config: Option<PathBuf>,
    save_config: Option<PathBuf>,
    size: Option<usize>,
    layout: Option<Layout>,
    pattern: Option<Pattern>,
    out: PathBuf,
}

/// Parse command line arguments
fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options {
        config: None,
        save_config: None,
        size: None,
        layout: None,
        pattern: None,
        out: PathBuf::from(DEFAULT_OUT_DIR),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    opts.config = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            },
            "--save-config" => {
                if i + 1 < args.len() {
                    opts.save_config = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            },
            "--size" | "-s" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<usize>() {
                        Ok(n) if n > 0 => opts.size = Some(n),
                        _ => warn!("ignoring invalid size '{}'", args[i + 1]),
                    }
                    i += 1;
                }
            },
            "--layout" | "-l" => {
                if i + 1 < args.len() {
                    opts.layout = Layout::parse(&args[i + 1]);
                    if opts.layout.is_none() {
                        warn!("ignoring unknown layout '{}'", args[i + 1]);
                    }
                    i += 1;
                }
            },
            "--pattern" | "-p" => {
                if i + 1 < args.len() {
                    opts.pattern = Pattern::parse(&args[i + 1]);
                    if opts.pattern.is_none() {
                        warn!("ignoring unknown pattern '{}'", args[i + 1]);
                    }
                    i += 1;
                }
            },
            "--out" | "-o" => {
                if i + 1 < args.len() {
                    opts.out = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            },
            "--help" | "-h" => {
                println!("Usage: softpixel [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --config FILE, -c FILE    Load pipeline config (JSON)");
                println!("  --save-config FILE        Write the effective config and continue");
                println!("  --size N, -s N            Texture width and height (default: 256)");
                println!("  --layout L, -l L          Buffer layout: linear, tiled, morton");
                println!("  --pattern P, -p P         Source pattern: checkerboard, xor, plasma, gradient");
                println!("  --out DIR, -o DIR         Output directory (default: {})", DEFAULT_OUT_DIR);
                println!("  --help, -h                Show this help message");
                println!();
                println!("Set RUST_LOG=debug for per-step logging.");
                std::process::exit(0);
            },
            other => warn!("ignoring unknown argument '{}'", other),
        }
        i += 1;
    }

    opts
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = parse_args();
    if let Err(e) = run(&opts) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(opts: &Options) -> softpixel::Result<()> {
    let mut config = match &opts.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(size) = opts.size {
        config.texture.width = size;
        config.texture.height = size;
    }
    if let Some(layout) = opts.layout {
        config.texture.layout = layout;
    }
    if let Some(pattern) = opts.pattern {
        config.pattern = pattern;
    }
    if config.texture.multi_sample {
        warn!("source texture cannot be multi-sample, uploading single-sample data");
        config.texture.multi_sample = false;
    }
    if let Some(path) = &opts.save_config {
        config.save(path)?;
        info!("config written to {}", path.display());
    }

    fs::create_dir_all(&opts.out).map_err(|e| PipelineError::io(&opts.out, e))?;

    let source = build_source(&config)?;
    dump_levels(&source, &opts.out)?;
    verify_raw_roundtrip(&source, &config.texture, &opts.out)?;
    compose(&config, &source, &opts.out)?;

    info!("done, output in {}", opts.out.display());
    Ok(())
}

/// Upload the configured pattern into a texture and build its mip chain
fn build_source(config: &PipelineConfig) -> softpixel::Result<Texture<Rgba8>> {
    let desc = &config.texture;
    info!(
        "source: {}x{} {:?} pattern, {:?} layout, mipmaps {}",
        desc.width, desc.height, config.pattern, desc.layout, desc.use_mipmaps
    );

    let mut texture = Texture::<Rgba8>::new(desc.clone());
    texture.set_sampler_desc(config.sampler);

    let pixels = Arc::new(config.pattern.generate(desc.width, desc.height, desc.layout));
    let layers: Vec<_> = (0..texture.layer_count()).map(|_| Arc::clone(&pixels)).collect();
    texture.set_image_data(&layers)?;
    Ok(texture)
}

fn dump_levels(texture: &Texture<Rgba8>, out: &Path) -> softpixel::Result<()> {
    let levels = texture.image(0).map_or(0, |chain| chain.level_count());
    for level in 0..levels {
        let path = out.join(format!("level{}.png", level));
        texture.dump_image(&path, 0, level)?;
    }
    info!("dumped {} mip levels", levels);
    Ok(())
}

/// Store the raw texture data, reload it into a fresh texture and compare
fn verify_raw_roundtrip(source: &Texture<Rgba8>, desc: &TextureDesc, out: &Path) -> softpixel::Result<()> {
    let path = out.join("source.raw");
    source.store_to_file(&path)?;

    let mut reloaded = Texture::<Rgba8>::new(desc.clone());
    reloaded.init_image_data()?;
    reloaded.load_from_file(&path)?;

    if !source.raw_eq(&reloaded) {
        error!("raw round trip: reloaded texture differs from source");
        return Err(PipelineError::RoundTripMismatch { path });
    }
    info!("raw round trip: {} bytes match", source.raw_data_size());
    Ok(())
}

/// Draw a tiled, minified background at mid depth, then a blended overlay
/// whose depth ramps across the target so half of it lands behind.
fn compose(config: &PipelineConfig, source: &Texture<Rgba8>, out: &Path) -> softpixel::Result<()> {
    let (width, height) = (source.width(), source.height());

    let target_desc = |tag: &str, usage: TextureUsage| TextureDesc {
        width,
        height,
        usage,
        tag: tag.into(),
        ..TextureDesc::default()
    };
    let mut color = Texture::<Rgba8>::new(target_desc(
        "color",
        TextureUsage::ATTACHMENT_COLOR | TextureUsage::RENDERER_OUTPUT,
    ));
    color.init_image_data()?;
    let mut depth = Texture::<f32>::new(TextureDesc {
        format: TextureFormat::Float32,
        ..target_desc("depth", TextureUsage::ATTACHMENT_DEPTH)
    });
    depth.init_image_data()?;
    let color = softpixel::texture::share(color);
    let depth = softpixel::texture::share(depth);

    let mut fb = FrameBuffer::new(true);
    fb.set_color_attachment(Arc::clone(&color), 0, 0)?;
    fb.set_depth_attachment(Arc::clone(&depth), 0, 0)?;
    fb.clear(&config.clear);

    let mut sampler = Sampler2D::new(source.make_sampler());
    sampler.set_image(source.image(0));
    let minification = BACKGROUND_TILING.log2();
    let lod: LodFunc<Rgba8> = Arc::new(move |_: &Sampler<Rgba8>| minification);
    sampler.sampler.set_lod_func(Some(lod));

    let background = RenderStates {
        depth_test: true,
        ..RenderStates::default()
    };

    let mut written = 0usize;
    let mut rejected = 0usize;
    {
        let mut pass = fb.begin_pass();
        for y in 0..height {
            let v = (y as f32 + 0.5) / height as f32;
            for x in 0..width {
                let u = (x as f32 + 0.5) / width as f32;
                let texel = sampler.texture_2d(Vec2::new(u, v) * BACKGROUND_TILING, 0.0);
                if pass.write_fragment(x, y, texel.to_vec4(), 0.5, &background) {
                    written += 1;
                } else {
                    rejected += 1;
                }
            }
        }

        let (x0, x1) = (width / 4, width - width / 4);
        let (y0, y1) = (height / 4, height - height / 4);
        for y in y0..y1 {
            let v = (y - y0) as f32 / (y1 - y0).max(1) as f32;
            for x in x0..x1 {
                let u = (x - x0) as f32 / (x1 - x0).max(1) as f32;
                let texel = sampler.texture_2d(Vec2::new(u, v), 0.0).to_vec4();
                let fragment = Vec4::new(texel.z, texel.x, texel.y, 0.5);
                if pass.write_fragment(x, y, fragment, 0.25 + 0.5 * u, &config.render) {
                    written += 1;
                } else {
                    rejected += 1;
                }
            }
        }
    }
    info!("composed: {} fragments written, {} rejected", written, rejected);

    color.read().dump_image(out.join("composed.png"), 0, 0)?;
    depth.read().dump_image(out.join("depth.png"), 0, 0)?;
    Ok(())
}
