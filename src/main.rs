use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use coach_orchestrator::backend::{ConfigBackend, HttpBackend, StaticBackend};
use coach_orchestrator::media::HeadlessMedia;
use coach_orchestrator::memory::HttpMemoryGateway;
use coach_orchestrator::realtime::ConsoleService;
use coach_orchestrator::rewards::HttpRewardSink;
use coach_orchestrator::tone::{EmotionalState, determine_next_tone};
use coach_orchestrator::{Config, SessionController, SessionEvent, StartOptions};

/// Coach - timed coaching sessions with an adaptive AI assistant
#[derive(Parser)]
#[command(name = "coach", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/coach/config.toml)
    #[arg(short, long, env = "COACH_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved configuration
    Config,
    /// Print the tone progression for increasing rejections
    Tones {
        /// Number of rejections to show
        #[arg(short, long, default_value = "8")]
        count: u32,
    },
    /// Run a session against the console; type both sides on stdin
    Simulate {
        /// What the user is trying to get done
        task: String,
        /// Session length in seconds
        #[arg(short, long)]
        duration: Option<u64>,
        /// Fetch instructions and credentials from the configured backend
        #[arg(long)]
        online: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,coach_orchestrator=info",
        1 => "info,coach_orchestrator=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Config => {
            print_config(&config);
            Ok(())
        }
        Command::Tones { count } => {
            print_tones(count);
            Ok(())
        }
        Command::Simulate {
            task,
            duration,
            online,
        } => simulate(config, &task, duration, online).await,
    }
}

fn print_config(config: &Config) {
    let session = &config.session;
    let backend = &config.backend;

    println!("[session]");
    println!("  duration          {:?}", session.duration);
    println!("  tick              {:?}", session.tick);
    println!("  connect_timeout   {:?}", session.connect_timeout);
    println!("  observing_window  {:?}", session.observing_window);
    println!("[media]");
    println!("  video             {}", config.media.video);
    println!("  camera_retries    {}", config.media.max_retries);
    println!("  retry_delay       {:?}", config.media.retry_delay);
    println!("[tone]");
    println!("  debounce          {:?}", config.tone.debounce);
    println!("  min_change        {:?}", config.tone.min_change_interval);
    println!("[scheduler]");
    println!("  poll_interval     {:?}", config.scheduler.poll_interval);
    println!("  cooldown          {:?}", config.scheduler.cooldown);
    println!("[backend]");
    println!("  url               {}", backend.url);
    println!(
        "  api_key           {}",
        if backend.api_key.is_some() { "(set)" } else { "(none)" }
    );
    println!("  memory_url        {}", backend.memory_url.as_deref().unwrap_or("-"));
    println!("  rewards_url       {}", backend.rewards_url.as_deref().unwrap_or("-"));
    println!("  user_id           {}", backend.user_id);
    println!("  locale            {}", backend.locale);
}

fn print_tones(count: u32) {
    println!("{:>10}  {:<18}  {:<18}", "rejections", "procrastinating", "low mood");

    let mut cycle = 0;
    let mut low_cycle = 0;
    for n in 0..=count {
        let (tone, next) = determine_next_tone(n, EmotionalState::Procrastinating, cycle);
        let (low, low_next) = determine_next_tone(n, EmotionalState::LowMood, low_cycle);
        cycle = next;
        low_cycle = low_next;
        println!("{n:>10}  {:<18}  {:<18}", tone.as_str(), low.as_str());
    }
}

async fn simulate(config: Config, task: &str, duration: Option<u64>, online: bool) -> anyhow::Result<()> {
    let backend: Arc<dyn ConfigBackend> = if online {
        Arc::new(HttpBackend::new(&config.backend))
    } else {
        Arc::new(StaticBackend::default())
    };

    let mut builder = SessionController::builder(
        config.clone(),
        Arc::new(HeadlessMedia),
        backend,
        Arc::new(ConsoleService),
    );
    if let Some(url) = &config.backend.memory_url {
        builder = builder.memory(Arc::new(HttpMemoryGateway::new(
            url.clone(),
            config.backend.api_key.clone(),
        )));
    }
    if let Some(url) = &config.backend.rewards_url {
        builder = builder.rewards(Arc::new(HttpRewardSink::new(
            url.clone(),
            config.backend.user_id.clone(),
            config.backend.api_key.clone(),
        )));
    }
    let controller = builder.build();

    let mut options = StartOptions::new().with_on_complete(|outcome| {
        println!(
            "--- session complete: {:?} after {}s, {} rejections overcome ---",
            outcome.reason,
            outcome.duration.as_secs(),
            outcome.rejections_overcome
        );
    });
    if let Some(secs) = duration {
        options = options.with_duration(Duration::from_secs(secs));
    }

    let mut events = controller.events();
    controller.start_session(task, options).await?;

    let mut ending = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::ToneChanged { tone, rejections }) => {
                    println!("--- tone: {tone} ({rejections} rejections) ---");
                }
                Ok(SessionEvent::ConnectionLost { reason }) => {
                    println!("--- connection closed: {reason} ---");
                    ending = true;
                }
                Ok(SessionEvent::CleanedUp) if ending => break,
                Ok(SessionEvent::Completed(_)) | Err(RecvError::Closed) => break,
                Ok(event) => tracing::debug!(?event, "session event"),
                Err(RecvError::Lagged(missed)) => tracing::warn!(missed, "session events lagged"),
            },
            _ = tokio::signal::ctrl_c() => {
                controller.end_session().await;
                break;
            }
        }
    }

    Ok(())
}
