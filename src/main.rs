use anyhow::{bail, Context};
use chatsnap::capture::{CancelToken, Capture, CaptureOutcome};
use chatsnap::platform::{ConsoleInteraction, DeviceMetrics, DirectorySurface, Interaction};
use chatsnap::range::{RangeMode, RangeRequest};
use chatsnap::rendering::BlockPainter;
use chatsnap::settings::{DebouncedStore, JsonFileStore, Settings, DEFAULT_DEBOUNCE};
use chatsnap::transcript::{MessageSource, Transcript};
use chatsnap::SettingsEdit;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

const SETTINGS_ENV: &str = "CHATSNAP_SETTINGS";

#[derive(Parser)]
#[command(name = "chatsnap", version, about = "Capture chat transcripts as PNG images")]
struct Cli {
    /// Settings file (defaults to $CHATSNAP_SETTINGS or the user config dir)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a range of messages to <chat>.png or <chat>.zip
    Capture(CaptureArgs),
    /// Inspect or change the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct CaptureArgs {
    /// Chat log (.jsonl) or saved chat page (.html)
    transcript: PathBuf,

    /// First message id to include
    #[arg(long)]
    start: Option<u64>,

    /// Last message id to include
    #[arg(long)]
    end: Option<u64>,

    /// Range used when no bounds are given
    #[arg(long, value_enum, default_value_t = RangeMode::Last)]
    mode: RangeMode,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Answer yes when asked to split into several images
    #[arg(short, long)]
    yes: bool,

    /// Device pixel ratio used for the raster scale
    #[arg(long)]
    dpr: Option<f32>,

    /// Emulate a phone-sized viewport
    #[arg(long)]
    mobile: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,
    /// Change stored values
    Set(SetArgs),
    /// Restore the defaults
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args)]
struct SetArgs {
    #[arg(long)]
    user_bg: Option<String>,
    #[arg(long)]
    ai_bg: Option<String>,
    #[arg(long)]
    txt: Option<String>,
    /// Color of quoted speech and its brackets
    #[arg(long)]
    quote_color: Option<String>,
    #[arg(long)]
    italic_color: Option<String>,
    #[arg(long)]
    font_size: Option<f32>,
    #[arg(long)]
    font_family: Option<String>,
    /// Font file used instead of a system lookup
    #[arg(long)]
    font_file: Option<String>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    bg: Option<String>,
    #[arg(long)]
    avatar_width: Option<u32>,
    #[arg(long)]
    show_avatar: Option<bool>,
    /// Height threshold in pixels before splitting
    #[arg(long)]
    max_height: Option<u32>,
}

impl From<SetArgs> for SettingsEdit {
    fn from(a: SetArgs) -> Self {
        SettingsEdit {
            user_bg: a.user_bg,
            ai_bg: a.ai_bg,
            txt: a.txt,
            quote_color: a.quote_color,
            italic_color: a.italic_color,
            f_size: a.font_size,
            f_family: a.font_family,
            width: a.width,
            bg: a.bg,
            avatar_w: a.avatar_width,
            show_avatar: a.show_avatar,
            max_segment_height: a.max_height,
            font_file: a.font_file,
        }
    }
}

fn settings_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(p) = explicit {
        return p;
    }
    if let Some(p) = std::env::var_os(SETTINGS_ENV) {
        return PathBuf::from(p);
    }
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("chatsnap").join("settings.json")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn config_command(settings: &Settings<DebouncedStore>, action: ConfigAction) -> anyhow::Result<()> {
    let cfg = match action {
        ConfigAction::Show => settings.load()?,
        ConfigAction::Set(args) => {
            let edit = SettingsEdit::from(args);
            if edit.is_empty() {
                bail!("nothing to set");
            }
            settings.edit(&edit)?
        }
        ConfigAction::Reset { yes } => {
            if !ConsoleInteraction::new(yes).confirm("Reset all settings to their defaults?") {
                return Ok(());
            }
            settings.reset()?
        }
    };
    // Surface write errors here instead of losing them when the store drops.
    settings.store().flush().context("writing settings")?;
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

async fn capture_command(
    settings: &Settings<DebouncedStore>,
    args: CaptureArgs,
) -> anyhow::Result<CaptureOutcome> {
    let config = settings.load().context("loading settings")?;
    let transcript = Transcript::load(&args.transcript)
        .with_context(|| format!("reading {}", args.transcript.display()))?;
    let painter = BlockPainter::from_config(&config, transcript.base_url().map(str::to_string))
        .context("preparing renderer")?;

    let mut device = if args.mobile {
        DeviceMetrics::mobile()
    } else {
        DeviceMetrics::desktop()
    };
    if let Some(dpr) = args.dpr {
        device.dpr = dpr;
    }

    let request = RangeRequest {
        start: args.start,
        end: args.end,
        mode: args.mode,
    };
    let ui = ConsoleInteraction::new(args.yes);
    let surface = DirectorySurface::new(&args.out);

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let outcome = Capture::new(&config, &painter, &ui, &surface)
        .with_device(device)
        .run(&transcript, &request, &cancel)
        .await;
    Ok(outcome)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let file = JsonFileStore::new(settings_path(cli.settings));
    let settings = Settings::new(DebouncedStore::new(Arc::new(file), DEFAULT_DEBOUNCE));

    match cli.command {
        Command::Config { action } => config_command(&settings, action),
        Command::Capture(args) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("starting runtime")?;
            let outcome = runtime.block_on(capture_command(&settings, args))?;
            match outcome {
                CaptureOutcome::Saved(report) => {
                    println!("{}", report.artifact);
                    Ok(())
                }
                CaptureOutcome::NoMessages | CaptureOutcome::Declined => Ok(()),
                CaptureOutcome::Cancelled => bail!("capture cancelled"),
                CaptureOutcome::Failed(reason) => bail!("capture failed: {}", reason),
            }
        }
    }
}
