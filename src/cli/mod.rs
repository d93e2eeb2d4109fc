use crate::core::{
    animation::{AnimationConfig, AnimationHandle, animate_progress},
    api_client::{HttpEventFeed, HttpGenerationSource},
    config::{CONFIG_KEYS, ConfigService},
    error_log::ErrorLogReader,
    generation::GenerationSource,
    latch::TerminalLatch,
    models::{DataPath, validate_generation_id},
    poller::{GenerationPoller, PollingOptions},
    progress_bar::{ProgressBarConfig, ProgressBarController},
    realtime::{RealtimeHandlers, RealtimeReconciler},
    sync_tracker::SynchronizedProgressTracker,
    watch_events::{WatchEvent, WatchSender, create_watch_channel},
};
use crate::terminal::StdTerminal;
use crate::tui::{InlineRenderer, PlainReporter, ProgressView};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "imagelingo")]
#[command(about = "Track ImageLingo translation jobs from the terminal.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets a custom data path
    #[arg(long, value_name = "DIR", global = true)]
    pub data_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the seeded progress curve for a generation
    Curve {
        /// Seed for the curve, usually the generation id
        #[arg(long)]
        seed: String,
        /// Expected processing time in milliseconds
        #[arg(long, default_value_t = 30_000)]
        average_ms: u64,
        /// Percentage reached at the average time
        #[arg(long, default_value_t = 95.0)]
        target: f64,
        /// Number of samples between zero and four average times
        #[arg(long, default_value_t = 16)]
        steps: u32,
    },
    /// Fetch the current status of a generation once
    Status {
        /// The generation id
        generation_id: String,
    },
    /// Follow a generation until it completes or fails
    Watch {
        /// The generation id
        generation_id: String,
        /// Print text lines instead of drawing a progress bar
        #[arg(long)]
        plain: bool,
        /// How the progress bar advances while waiting
        #[arg(long, value_enum, default_value_t = ProgressStrategy::Animated)]
        strategy: ProgressStrategy,
        /// Override the configured average processing time
        #[arg(long)]
        average_ms: Option<u64>,
        /// Only poll, do not subscribe to pushed updates
        #[arg(long)]
        no_realtime: bool,
        /// Open the translated image in the browser when done
        #[arg(long)]
        open: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Inspect the error log
    Errors {
        #[command(subcommand)]
        command: Option<ErrorCommands>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// The key to get, e.g. polling.interval_ms
        key: String,
    },
    /// Set a configuration value
    Set {
        /// The key to set
        key: String,
        /// The value to set
        value: String,
    },
}

#[derive(Subcommand)]
pub enum ErrorCommands {
    /// Show recent errors
    List {
        /// Maximum number of errors to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Only show errors from one operation
        #[arg(long)]
        operation: Option<String>,
    },
    /// Delete the error log
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStrategy {
    /// Seeded curve pushed on every frame
    Animated,
    /// Linear wall-clock progress pulled on every redraw
    Synchronized,
}

pub struct WatchArgs {
    pub generation_id: String,
    pub plain: bool,
    pub strategy: ProgressStrategy,
    pub average_ms: Option<u64>,
    pub no_realtime: bool,
    pub open: bool,
}

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);
/// The curve table runs from zero to this many average times.
const CURVE_SPAN_AVERAGES: u64 = 4;

pub fn handle_curve_command(seed: &str, average_ms: u64, target: f64, steps: u32) -> io::Result<()> {
    if average_ms == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "--average-ms must be greater than zero",
        ));
    }
    if !(target > 0.0 && target <= 100.0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "--target must be in (0, 100]",
        ));
    }
    let steps = steps.max(1);
    let span = average_ms.checked_mul(CURVE_SPAN_AVERAGES).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("--average-ms must be at most {}", u64::MAX / CURVE_SPAN_AVERAGES),
        )
    })?;

    let controller = ProgressBarController::new(
        ProgressBarConfig::new(Duration::from_millis(average_ms), seed).with_target_percentage(target),
    );

    println!(
        "Seed: {seed:?} | average: {}ms | target: {:.1}%",
        controller.average_time().as_millis(),
        controller.target_percentage()
    );
    let points: Vec<String> = controller
        .control_points()
        .iter()
        .map(|p| format!("({:.3}, {:.2})", p.x, p.y))
        .collect();
    println!("Control points: {}", points.join(" "));
    println!("{}", "=".repeat(36));
    println!("{:>10}  {:>8}  complete", "elapsed", "percent");

    for i in 0..=steps {
        // i <= steps, so the sample never exceeds span
        let elapsed_ms = (u128::from(span) * u128::from(i) / u128::from(steps)) as u64;
        let state = controller.get_progress(Duration::from_millis(elapsed_ms));
        println!(
            "{:>8}ms  {:>7.2}%  {}",
            elapsed_ms,
            state.percentage,
            if state.is_complete { "yes" } else { "no" }
        );
    }

    Ok(())
}

pub async fn handle_status_command(data_path: &DataPath, generation_id: &str) -> io::Result<()> {
    validate_generation_id(generation_id)?;
    let config = ConfigService::load_config(data_path)?;
    let source = HttpGenerationSource::new(&config.api)?.with_error_log(data_path.error_log_path());

    let record = source.fetch_generation_status(generation_id).await?;

    println!("Generation: {}", record.id);
    println!(
        "Status:     {} ({}%)",
        record.status,
        record.status.progress_bucket()
    );
    if let Some(url) = &record.input_url {
        println!("Input:      {url}");
    }
    if let Some(url) = &record.output_url {
        println!("Output:     {url}");
    }
    if let Some(message) = &record.error_message {
        println!("Error:      {message}");
    }
    if let Some(updated) = record.updated_at {
        println!("Updated:    {}", updated.to_rfc3339());
    }

    Ok(())
}

enum WatchOutput {
    Inline(InlineRenderer),
    Plain(PlainReporter<StdTerminal>),
}

impl WatchOutput {
    fn new(plain: bool) -> Self {
        if plain {
            return WatchOutput::Plain(PlainReporter::new(StdTerminal));
        }
        match InlineRenderer::new() {
            Ok(renderer) => WatchOutput::Inline(renderer),
            Err(e) => {
                info!("Falling back to plain output: {e}");
                WatchOutput::Plain(PlainReporter::new(StdTerminal))
            }
        }
    }

    fn show(&mut self, view: &ProgressView) -> io::Result<()> {
        match self {
            WatchOutput::Inline(renderer) => renderer.draw(view),
            WatchOutput::Plain(reporter) => reporter.report(view),
        }
    }

    fn finish(&self) {
        if let WatchOutput::Inline(_) = self {
            println!();
        }
    }
}

fn realtime_handlers(tx: &WatchSender) -> RealtimeHandlers {
    let completed = tx.clone();
    let failed = tx.clone();
    let processing = tx.clone();
    RealtimeHandlers::default()
        .on_complete(move |record| {
            let _ = completed.send(WatchEvent::Completed {
                output_url: record.output_url.clone(),
            });
        })
        .on_failed(move |record| {
            let _ = failed.send(WatchEvent::Failed {
                message: record.failure_message(),
            });
        })
        .on_processing(move |record| {
            let _ = processing.send(WatchEvent::Status(record.status));
        })
}

pub async fn handle_watch_command(data_path: &DataPath, args: &WatchArgs) -> io::Result<()> {
    let generation_id = args.generation_id.as_str();
    validate_generation_id(generation_id)?;

    let config = ConfigService::load_config(data_path)?;
    let error_log = data_path.error_log_path();
    let source =
        Arc::new(HttpGenerationSource::new(&config.api)?.with_error_log(error_log.clone()));

    let (tx, mut rx) = create_watch_channel();
    let latch = TerminalLatch::new();

    let on_complete = tx.clone();
    let on_error = tx.clone();
    let options = PollingOptions::default()
        .with_interval(config.polling.interval())
        .with_max_duration(config.polling.max_duration())
        .with_transient_errors(config.polling.transient_errors)
        .with_latch(latch.clone())
        .on_complete(move |_, output_url| {
            let _ = on_complete.send(WatchEvent::Completed {
                output_url: output_url.map(str::to_string),
            });
        })
        .on_error(move |message| {
            let _ = on_error.send(WatchEvent::Failed {
                message: message.to_string(),
            });
        });

    let mut poller = GenerationPoller::new(source, options);
    poller.set_generation_id(Some(generation_id.to_string()));

    let user_id = config.api.user_id.trim();
    let mut reconciler = None;
    if config.realtime.enabled && !args.no_realtime && !user_id.is_empty() {
        let feed = HttpEventFeed::new(
            &config.api,
            Duration::from_millis(config.realtime.reconnect_delay_ms),
        )?
        .with_error_log(error_log);
        let mut realtime = RealtimeReconciler::new(Arc::new(feed)).with_latch(latch);
        realtime.set_handlers(realtime_handlers(&tx));
        realtime.update(Some(user_id), &[generation_id.to_string()]);
        if let Some(key) = realtime.subscription_key() {
            info!("Listening for pushed updates on {key}");
        }
        reconciler = Some(realtime);
    } else {
        info!("Realtime updates disabled, relying on polling only");
    }

    let average_time = Duration::from_millis(args.average_ms.unwrap_or(config.progress.average_time_ms));
    let mut animation: Option<AnimationHandle> = None;
    let mut tracker: Option<SynchronizedProgressTracker> = None;
    match args.strategy {
        ProgressStrategy::Animated => {
            let progress = ProgressBarConfig::new(average_time, generation_id)
                .with_target_percentage(config.progress.target_percentage);
            let frames = tx.clone();
            animation = Some(animate_progress(
                move |pct| {
                    let _ = frames.send(WatchEvent::Progress(pct));
                },
                AnimationConfig::new(progress)
                    .with_frame_interval(Duration::from_millis(config.progress.frame_interval_ms)),
            ));
        }
        ProgressStrategy::Synchronized => {
            tracker = Some(SynchronizedProgressTracker::new(average_time));
        }
    }
    drop(tx);

    let mut output = WatchOutput::new(args.plain);
    let mut view = ProgressView::new(generation_id);
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => view.apply(&event),
                None => break,
            },
            _ = redraw.tick() => {
                if let Some(tracker) = &tracker {
                    view.apply(&WatchEvent::Progress(tracker.get_progress()));
                }
                if let Some(generation) = poller.snapshot().generation {
                    if !generation.status.is_terminal() {
                        view.apply(&WatchEvent::Status(generation.status));
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            },
        }

        output.show(&view)?;
        if view.is_finished() {
            break;
        }
    }

    if let Some(animation) = &animation {
        animation.cancel();
    }
    poller.set_generation_id(None);
    drop(reconciler);
    output.finish();

    if interrupted {
        println!("Stopped watching {generation_id}.");
        return Ok(());
    }

    if let Some(message) = view.message() {
        error!("Generation {generation_id} did not complete: {message}");
        return Err(io::Error::other(format!(
            "Generation {generation_id} failed: {message}"
        )));
    }

    match view.output_url() {
        Some(url) => {
            println!("✅ Translation ready: {url}");
            if args.open {
                if let Err(e) = webbrowser::open(url) {
                    warn!("Failed to open browser: {e}");
                    println!("Could not open a browser: {e}");
                }
            }
        }
        None => println!("✅ Generation {generation_id} completed."),
    }

    Ok(())
}

pub fn handle_config_command(
    data_path: &DataPath,
    command: &Option<ConfigCommands>,
) -> io::Result<()> {
    match command {
        Some(ConfigCommands::Get { key }) => {
            let config = ConfigService::load_config(data_path)?;
            let value = ConfigService::get_value(&config, key)?;
            println!("{key}: {value}");
            println!("Config file: {}", data_path.config_path().display());
        }
        Some(ConfigCommands::Set { key, value }) => {
            let mut config = ConfigService::load_config(data_path)?;
            if let Err(e) = ConfigService::set_value(&mut config, key, value) {
                error!("Invalid configuration value for {key}: {e}");
                return Err(e);
            }
            ConfigService::save_config(&config, data_path)?;
            info!("Updated {key} configuration");
            println!("{key} set to: {}", ConfigService::get_value(&config, key)?);
            println!("Config file: {}", data_path.config_path().display());
        }
        None => {
            let config = ConfigService::load_config(data_path)?;
            println!("Current Configuration:");
            println!("======================");
            for key in CONFIG_KEYS {
                println!("{key}: {}", ConfigService::get_value(&config, key)?);
            }
            println!();
            println!("Config file: {}", data_path.config_path().display());
        }
    }
    Ok(())
}

pub fn handle_errors_command(
    data_path: &DataPath,
    command: &Option<ErrorCommands>,
) -> io::Result<()> {
    let error_log = data_path.error_log_path();
    match command {
        Some(ErrorCommands::List { limit, operation }) => {
            let errors = ErrorLogReader::read_recent_errors(&error_log, *limit, operation.as_deref())?;
            if errors.is_empty() {
                println!("No errors found.");
                return Ok(());
            }

            println!("Recent errors ({}):", errors.len());
            println!("{}", "=".repeat(20));
            for entry in &errors {
                println!(
                    "• {} [{}] {}: {}",
                    entry.timestamp, entry.operation, entry.error_type, entry.error_message
                );
                if let Some(id) = &entry.generation_id {
                    println!("    generation: {id}");
                }
                if let Some(url) = &entry.request_url {
                    match entry.status_code {
                        Some(code) => println!("    request: {url} ({code})"),
                        None => println!("    request: {url}"),
                    }
                }
            }
        }
        Some(ErrorCommands::Clear) => {
            if ErrorLogReader::clear(&error_log)? {
                println!("Error log cleared.");
            } else {
                println!("No error log file found.");
            }
        }
        None => {
            println!("Available error commands:");
            println!("  list   Show recent errors");
            println!("  clear  Delete the error log");
        }
    }
    Ok(())
}
