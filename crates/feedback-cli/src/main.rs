mod scene;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use feedback_core::config::{BackendKind, CompositeStrategy, FeedbackConfig};
use feedback_core::hash::hash_frames;
use feedback_core::{translate, FrameBuffer, Viewport};
use feedback_render::image_io::{load_image, save_image};
use feedback_render::{
    BlendProgramDesc, CpuDevice, FeedbackEffect, FrameOutcome, GpuContext, ImageEffect,
    ProgramLibrary, RenderDevice, TextureDesc, WgpuDevice,
};

const DEFAULT_CONFIG: &str = "feedback.toml";

#[derive(Parser)]
#[command(
    name = "feedback",
    version,
    about = "Frame-echo feedback effect: blends every frame with a transformed copy of the last"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the effect over a frame sequence and write PNGs
    Render {
        /// Config file (default: feedback.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Render backend: auto, cpu, gpu (overrides the config)
        #[arg(long, value_parser = parse_backend)]
        backend: Option<BackendKind>,

        /// Compositing strategy: recursive_echo, double_blit, command_list (overrides the config)
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<CompositeStrategy>,

        /// Still image to use as the camera source instead of the orbiting light
        #[arg(long)]
        image: Option<PathBuf>,

        #[arg(long, default_value_t = 320)]
        width: u32,

        #[arg(long, default_value_t = 180)]
        height: u32,

        /// Number of frames to render
        #[arg(short, long, default_value_t = 60)]
        frames: u32,

        /// Directory for the PNG sequence
        #[arg(short, long, default_value = "output")]
        out: PathBuf,

        /// Skip writing PNGs; only report the content hash
        #[arg(long)]
        no_write: bool,

        /// Frame index at which the viewport changes size
        #[arg(long, requires = "resize_to")]
        resize_at: Option<u32>,

        /// New viewport size, as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size, requires = "resize_at")]
        resize_to: Option<(u32, u32)>,
    },

    /// Print the blend uniforms for the configured parameters as JSON
    Uniforms {
        /// Config file (default: feedback.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a default config file
    Init {
        #[arg(default_value = DEFAULT_CONFIG)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
    match s {
        "auto" => Ok(BackendKind::Auto),
        "cpu" => Ok(BackendKind::Cpu),
        "gpu" => Ok(BackendKind::Gpu),
        other => Err(format!("unknown backend '{}' (expected auto, cpu or gpu)", other)),
    }
}

fn parse_strategy(s: &str) -> Result<CompositeStrategy, String> {
    match s {
        "recursive_echo" => Ok(CompositeStrategy::RecursiveEcho),
        "double_blit" => Ok(CompositeStrategy::DoubleBlit),
        "command_list" => Ok(CompositeStrategy::CommandList),
        other => Err(format!(
            "unknown strategy '{}' (expected recursive_echo, double_blit or command_list)",
            other
        )),
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width '{}': {}", w, e))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height '{}': {}", h, e))?;
    if w == 0 || h == 0 {
        return Err("size must be non-zero".to_string());
    }
    Ok((w, h))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render {
            config,
            backend,
            strategy,
            image,
            width,
            height,
            frames,
            out,
            no_write,
            resize_at,
            resize_to,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(backend) = backend {
                config.render.backend = backend;
            }
            if let Some(strategy) = strategy {
                config.effect.strategy = strategy;
            }
            let job = RenderJob {
                image,
                size: (width, height),
                frames,
                out: (!no_write).then_some(out),
                resize: resize_at.zip(resize_to),
            };
            cmd_render(&config, &job)
        }
        Commands::Uniforms { config } => cmd_uniforms(&load_config(config.as_deref())?),
        Commands::Init { path, force } => cmd_init(&path, force),
    }
}

/// Load `path`, or `feedback.toml` if it exists, or the defaults.
fn load_config(path: Option<&Path>) -> Result<FeedbackConfig> {
    match path {
        Some(path) => FeedbackConfig::load_from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            FeedbackConfig::load_from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("failed to load config: {}", DEFAULT_CONFIG))
        }
        None => Ok(FeedbackConfig::default()),
    }
}

struct RenderJob {
    image: Option<PathBuf>,
    size: (u32, u32),
    frames: u32,
    out: Option<PathBuf>,
    /// Frame index and the viewport size from that frame on.
    resize: Option<(u32, (u32, u32))>,
}

fn program_library(config: &FeedbackConfig) -> ProgramLibrary {
    let mut library = ProgramLibrary::empty();
    library.register(BlendProgramDesc {
        name: config.effect.program.clone(),
        persistence: config.effect.persistence,
    });
    library
}

fn cmd_render(config: &FeedbackConfig, job: &RenderJob) -> Result<()> {
    let library = program_library(config);
    match config.render.backend {
        BackendKind::Cpu => run_sequence(CpuDevice::new(library), config, job),
        BackendKind::Gpu => {
            let gpu = GpuContext::init().context("GPU backend requested")?;
            run_sequence(WgpuDevice::new(Arc::new(gpu), library), config, job)
        }
        BackendKind::Auto => match GpuContext::init() {
            Ok(gpu) => run_sequence(WgpuDevice::new(Arc::new(gpu), library), config, job),
            Err(e) => {
                tracing::warn!("no GPU available ({}), falling back to the CPU device", e);
                run_sequence(CpuDevice::new(library), config, job)
            }
        },
    }
}

fn run_sequence<D: RenderDevice>(device: D, config: &FeedbackConfig, job: &RenderJob) -> Result<()> {
    let start = Instant::now();
    println!("Feedback v{}", env!("CARGO_PKG_VERSION"));
    println!("   Backend:   {}", device.backend_name());
    println!("   Strategy:  {}", config.effect.strategy);
    println!("   Program:   {} (persistence {})", config.effect.program, config.effect.persistence);

    let still = match &job.image {
        Some(path) => Some(load_image(path).with_context(|| format!("failed to load {}", path.display()))?),
        None => None,
    };

    if let Some(out) = &job.out {
        std::fs::create_dir_all(out)
            .with_context(|| format!("failed to create output directory: {}", out.display()))?;
    }

    let mut effect = FeedbackEffect::new(device, &config.effect);
    effect.on_enable();

    let mut rendered = Vec::with_capacity(job.frames as usize);
    let mut passthrough = 0u32;
    for index in 0..job.frames {
        let (width, height) = match job.resize {
            Some((at, size)) if index >= at => size,
            _ => job.size,
        };
        let source = match &still {
            Some(image) => resize_nearest(image, width, height),
            None => scene::orbit_frame(width, height, index, job.frames.max(1)),
        };

        let device = effect.device();
        let src = device.upload(&source)?;
        let mut dest = device.create_texture(&TextureDesc::new("camera_target", width, height))?;
        effect.on_update(&config.parameters);
        if effect.on_render(&src, &mut dest, Viewport::new(width, height)) == FrameOutcome::Passthrough {
            passthrough += 1;
        }
        let device = effect.device();
        let frame = device.download(&dest)?;
        device.release_texture(src);
        device.release_texture(dest);

        if let Some(out) = &job.out {
            let path = out.join(format!("frame_{:04}.png", index));
            save_image(&frame, &path)?;
        }
        rendered.push(frame);
    }

    let stats = effect.stats();
    effect.on_disable();

    let elapsed = start.elapsed().as_secs_f64();
    println!("   Frames:    {} ({} passthrough)", rendered.len(), passthrough);
    println!(
        "   Buffers:   {} allocations, {} reallocations, {} transfers, {} commands",
        stats.allocations, stats.reallocations, stats.transfers, stats.commands_recorded
    );
    if let Some(out) = &job.out {
        println!("   Output:    {}", out.display());
    }
    println!("   Time:      {:.2}s", elapsed);
    println!("hash: {}", hash_frames(&rendered));
    Ok(())
}

fn resize_nearest(image: &FrameBuffer, width: u32, height: u32) -> FrameBuffer {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    let mut frame = FrameBuffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let sx = ((x as u64 * image.width as u64) / width as u64) as u32;
            let sy = ((y as u64 * image.height as u64) / height as u64) as u32;
            if let Some(px) = image.get_pixel(sx, sy) {
                frame.set_pixel(x, y, px);
            }
        }
    }
    frame
}

fn cmd_uniforms(config: &FeedbackConfig) -> Result<()> {
    let uniforms = translate(&config.parameters);
    let mut map = serde_json::Map::new();
    for (name, value) in uniforms.to_named() {
        map.insert(name.to_string(), serde_json::json!(value));
    }
    map.insert(
        "filter_mode".to_string(),
        serde_json::to_value(uniforms.filter_mode)?,
    );
    println!("{}", serde_json::to_string_pretty(&serde_json::Value::Object(map))?);
    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("'{}' already exists (use --force to overwrite)", path.display());
    }
    FeedbackConfig::default()
        .save_to_file(path)
        .with_context(|| format!("failed to write config: {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
