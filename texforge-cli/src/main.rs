//! texforge CLI entrypoint.
//!
//! ```bash
//! texforge probe --module ./libaccel.so --json
//! texforge upscale --input tex.rgb --width 64 --height 64 --output out.rgb --module ./libaccel.so
//! texforge upscale --input tex.rgb --width 64 --height 64 --output out.rgb --model x4.onnx --repeat 2
//! texforge config --print-default
//! ```

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use texforge_coordinator::{BackendSelection, Coordinator, CoordinatorConfig, Submission};
use texforge_core::{
    Capability, CapabilitySet, Fingerprint, RequestState, TextureBuffer, UpscaleError,
    UpscaledTexture,
};

const JSON_SCHEMA_VERSION: u32 = 1;
const ASYNC_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Parser, Debug)]
#[command(
    name = "texforge",
    version,
    about = "Content-cached texture upscaling harness",
    arg_required_else_help = true,
    after_help = "Examples:\n  texforge probe --module ./libaccel.so --json\n  texforge upscale --input tex.rgb --width 64 --height 64 --output out.rgb --module ./libaccel.so\n  texforge config --print-default"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bind an accelerator module, report its capabilities, and unbind.
    Probe(ProbeArgs),
    /// Upscale one raw RGB texture through the coordinator.
    Upscale(UpscaleArgs),
    /// Print or check coordinator configuration.
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Accelerator module path or library name.
    #[arg(long = "module")]
    module: String,

    /// Emit a machine-readable JSON object on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct UpscaleArgs {
    /// Raw interleaved RGB8 input file.
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Input width in pixels.
    #[arg(long)]
    width: u32,

    /// Input height in pixels.
    #[arg(long)]
    height: u32,

    /// Raw RGB8 output file.
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Accelerator module to bind.
    #[arg(long = "module", conflicts_with = "model")]
    module: Option<String>,

    /// ONNX model to run in-process (needs the `ort-runtime` feature).
    #[arg(short = 'm', long = "model")]
    model: Option<PathBuf>,

    /// Coordinator config JSON.  `--module`/`--model` override its backend.
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Run the upscale this many times; repeats are served from the cache.
    #[arg(long = "repeat", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    repeat: u32,

    /// Use submit/poll/collect instead of the blocking call.
    #[arg(long = "async")]
    use_async: bool,

    /// Emit a machine-readable JSON summary on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Print the default configuration as JSON.
    #[arg(long = "print-default", conflicts_with = "check")]
    print_default: bool,

    /// Parse a configuration file and print it back normalized.
    #[arg(long = "check")]
    check: Option<PathBuf>,
}

/// Failures the CLI reports.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Upscale(#[from] UpscaleError),
}

impl CliError {
    fn error_code(&self) -> u32 {
        match self {
            Self::Io { .. } => 2,
            Self::Usage(_) => 64,
            Self::Upscale(err) => err.error_code(),
        }
    }
}

type Result<T> = std::result::Result<T, CliError>;

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let json_error_command = match &cli.command {
        Commands::Probe(args) if args.json => Some("probe"),
        Commands::Upscale(args) if args.json => Some("upscale"),
        _ => None,
    };

    let result = match cli.command {
        Commands::Probe(args) => run_probe(args),
        Commands::Upscale(args) => run_upscale(args),
        Commands::Config(args) => run_config(args),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            if let Some(command) = json_error_command {
                println!("{}", command_error_json(command, &err));
            } else {
                tracing::error!(error = %err, code = err.error_code(), "Command failed");
            }
            std::process::exit(err.error_code() as i32);
        }
    }
}

fn init_tracing() {
    let ansi_enabled = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(ansi_enabled)
        .init();
}

// ─── probe ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ProbeReport {
    schema_version: u32,
    command: &'static str,
    ok: bool,
    module: String,
    capabilities: CapabilitySet,
    enabled: Option<bool>,
    osd_enabled: Option<bool>,
}

fn run_probe(args: ProbeArgs) -> Result<()> {
    let mut coordinator = Coordinator::default();
    let capabilities = coordinator.bind_external(&args.module)?;

    let enabled = optional(coordinator.enabled())?;
    let osd_enabled = optional(coordinator.osd_enabled())?;
    coordinator.unbind();

    let report = ProbeReport {
        schema_version: JSON_SCHEMA_VERSION,
        command: "probe",
        ok: true,
        module: args.module,
        capabilities,
        enabled,
        osd_enabled,
    };
    if args.json {
        print_json(&report)?;
    } else {
        println!("module: {}", report.module);
        for capability in Capability::ALL {
            let mark = if capabilities.contains(capability) { "yes" } else { "no" };
            println!("  {capability:<14} {mark}");
        }
        if let Some(enabled) = report.enabled {
            println!("enabled: {enabled}");
        }
        if let Some(osd) = report.osd_enabled {
            println!("osd: {osd}");
        }
    }
    Ok(())
}

/// `Ok(None)` for a capability the backend does not have.
fn optional<T>(result: texforge_core::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_unsupported() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

// ─── upscale ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct UpscaleReport {
    schema_version: u32,
    command: &'static str,
    ok: bool,
    fingerprint: String,
    input: (u32, u32),
    output: (u32, u32),
    output_path: PathBuf,
    capabilities: CapabilitySet,
    runs: Vec<RunTiming>,
    metrics: texforge_coordinator::CoordinatorMetricsSnapshot,
    cache: texforge_core::CacheStats,
}

#[derive(Serialize)]
struct RunTiming {
    elapsed_us: u64,
}

fn load_config(args: &UpscaleArgs) -> Result<CoordinatorConfig> {
    let mut config = match &args.config {
        Some(path) => CoordinatorConfig::from_json_file(path)?,
        None => CoordinatorConfig::default(),
    };
    if let Some(module) = &args.module {
        config.backend = Some(BackendSelection::External {
            module: module.clone(),
        });
    } else if let Some(model) = &args.model {
        config.backend = Some(BackendSelection::Local {
            model: model.clone(),
        });
    }
    if config.backend.is_none() {
        return Err(CliError::Usage(
            "no backend: pass --module, --model, or a --config with a backend".into(),
        ));
    }
    Ok(config)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn run_upscale(args: UpscaleArgs) -> Result<()> {
    let config = load_config(&args)?;
    let data = read_file(&args.input)?;
    let input = TextureBuffer::new(&data, args.width, args.height)?;
    let fingerprint = Fingerprint::of_texture(&input);

    let mut coordinator = Coordinator::new(config);
    let capabilities = coordinator.bind_configured()?;
    tracing::info!(
        %fingerprint,
        width = args.width,
        height = args.height,
        repeat = args.repeat,
        use_async = args.use_async,
        "Upscaling texture"
    );

    let mut runs = Vec::with_capacity(args.repeat as usize);
    let mut result: Option<UpscaledTexture> = None;
    for _ in 0..args.repeat {
        let start = Instant::now();
        let texture = if args.use_async {
            upscale_async(&mut coordinator, &input)?
        } else {
            coordinator.upscale(&input)?.to_texture()
        };
        runs.push(RunTiming {
            elapsed_us: u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
        });
        result = Some(texture);
    }
    let texture = result.ok_or_else(|| CliError::Usage("--repeat must be at least 1".into()))?;

    std::fs::write(&args.output, &texture.data).map_err(|source| CliError::Io {
        path: args.output.clone(),
        source,
    })?;

    let report = UpscaleReport {
        schema_version: JSON_SCHEMA_VERSION,
        command: "upscale",
        ok: true,
        fingerprint: fingerprint.to_string(),
        input: (args.width, args.height),
        output: (texture.width, texture.height),
        output_path: args.output.clone(),
        capabilities,
        runs,
        metrics: coordinator.metrics(),
        cache: coordinator.cache_stats(),
    };
    coordinator.shutdown();

    if args.json {
        print_json(&report)?;
    } else {
        println!(
            "{}x{} -> {}x{} written to {}",
            args.width,
            args.height,
            texture.width,
            texture.height,
            args.output.display()
        );
        println!(
            "backend invocations: {}, cache hits: {}",
            report.metrics.backend_invocations, report.metrics.cache_hits
        );
    }
    Ok(())
}

/// Drive one texture through submit/poll/collect.
fn upscale_async(coordinator: &mut Coordinator, input: &TextureBuffer<'_>) -> Result<UpscaledTexture> {
    let id = match coordinator.submit(input)? {
        Submission::Cached(fingerprint) => {
            return coordinator
                .cached(fingerprint)
                .map(|view| view.to_texture())
                .ok_or_else(|| {
                    UpscaleError::InvariantViolation(format!("{fingerprint} vanished from cache"))
                        .into()
                });
        }
        Submission::Pending(id) => id,
    };
    while coordinator.poll(id)? == RequestState::Pending {
        thread::sleep(ASYNC_POLL_INTERVAL);
    }
    Ok(coordinator.collect(id)?.to_texture())
}

// ─── config ──────────────────────────────────────────────────────────────

fn run_config(args: ConfigArgs) -> Result<()> {
    let config = match (&args.check, args.print_default) {
        (Some(path), _) => CoordinatorConfig::from_json_file(path)?,
        (None, true) => CoordinatorConfig::default(),
        (None, false) => {
            return Err(CliError::Usage(
                "pass --print-default or --check <path>".into(),
            ));
        }
    };
    println!("{}", config.to_json_pretty()?);
    Ok(())
}

// ─── output ──────────────────────────────────────────────────────────────

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string(value).map_err(|err| {
        UpscaleError::InvariantViolation(format!("Failed to serialize report: {err}"))
    })?;
    println!("{text}");
    Ok(())
}

fn command_error_json(command: &str, err: &CliError) -> String {
    serde_json::json!({
        "schema_version": JSON_SCHEMA_VERSION,
        "command": command,
        "ok": false,
        "code": err.error_code(),
        "error": err.to_string(),
    })
    .to_string()
}
