//! voxa CLI: tiered voice-command routing core.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use voxa::cloud::{CloudConfig, HttpCloudClient};
use voxa::context::{Section, VoiceContext};
use voxa::exec::ToolExecutor;
use voxa::intent::KeywordClassifier;
use voxa::model::backend::{HttpBackendConfig, ScriptedBackend};
use voxa::model::{GemmaConfig, GemmaEngine};
use voxa::orchestrator::VoiceRouter;
use voxa::pattern::RegexMatcher;
use voxa::repo::MemoryRepository;
use voxa::session::ClockSessionHandler;

#[derive(Parser)]
#[command(name = "voxa", version, about = "Tiered voice-command routing core")]
struct Cli {
    /// Base URL of the local inference server.
    #[arg(long, global = true, default_value = "http://localhost:11434")]
    backend_url: String,

    /// Model name on the inference server.
    #[arg(long, global = true, default_value = "functiongemma-270m")]
    model: String,

    /// Base URL of the cloud synthesis service (omit to run local-only).
    #[arg(long, global = true)]
    cloud_url: Option<String>,

    /// Run without any model backend; only the deterministic tier answers.
    #[arg(long, global = true)]
    offline: bool,

    /// UI section the commands are spoken from.
    #[arg(long, global = true, default_value = "home")]
    section: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a single transcript and print the outcome.
    Route {
        /// The transcript to route.
        transcript: String,
    },

    /// Interactive loop: one transcript per line, `quit` to exit.
    Repl,

    /// List the dispatchable function names and their required parameters.
    Functions,
}

fn parse_section(s: &str) -> Result<Section> {
    match s {
        "home" => Ok(Section::Home),
        "canvas" => Ok(Section::Canvas),
        "focusMode" => Ok(Section::FocusMode),
        "projects" => Ok(Section::Projects),
        "journal" => Ok(Section::Journal),
        "health" => Ok(Section::Health),
        "settings" => Ok(Section::Settings),
        other => Err(miette::miette!("unknown section: {other}")),
    }
}

fn build_router(cli: &Cli) -> Result<VoiceRouter> {
    let engine = if cli.offline {
        Arc::new(GemmaEngine::with_factory(GemmaConfig::default(), || {
            Ok(Box::new(ScriptedBackend::with_outputs([""])) as Box<_>)
        }))
    } else {
        Arc::new(GemmaEngine::new(GemmaConfig {
            backend: HttpBackendConfig {
                base_url: cli.backend_url.clone(),
                model: cli.model.clone(),
                ..Default::default()
            },
            ..Default::default()
        }))
    };

    let executor = ToolExecutor::builder()
        .repository(Arc::new(MemoryRepository::new()))
        .sessions(Arc::new(ClockSessionHandler::new()))
        .build();

    let mut router = VoiceRouter::new(
        Box::new(RegexMatcher),
        Box::new(KeywordClassifier),
        engine,
        executor,
    );
    if let Some(ref url) = cli.cloud_url {
        router = router.with_cloud(Arc::new(HttpCloudClient::new(CloudConfig {
            base_url: url.clone(),
            ..Default::default()
        })));
    }
    Ok(router)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let section = parse_section(&cli.section)?;
    let ctx = VoiceContext::new(section, chrono::Local::now().date_naive());

    match cli.command {
        Commands::Route { ref transcript } => {
            let router = build_router(&cli)?;
            let outcome = router.route(transcript, &ctx);
            println!("[{}] {}", outcome.tier, outcome.message);
            if outcome.degraded {
                println!("(cloud unavailable, answered locally)");
            }
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Commands::Repl => {
            let router = build_router(&cli)?;
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            loop {
                print!("voxa> ");
                stdout.flush().into_diagnostic()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line).into_diagnostic()? == 0 {
                    break;
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" || line == "exit" {
                    break;
                }
                if line == ":metrics" {
                    let m = router.metrics();
                    println!(
                        "{} routed, {:.0}% ok, tiers p/g/c {}/{}/{}, {} fallbacks",
                        m.total,
                        m.success_rate * 100.0,
                        m.pattern,
                        m.gemma,
                        m.cloud,
                        m.fallbacks
                    );
                    continue;
                }
                let outcome = router.route(line, &ctx);
                println!("[{}] {}", outcome.tier, outcome.message);
            }
        }
        Commands::Functions => {
            for name in voxa::FunctionName::ALL {
                let required = name.required_params();
                if required.is_empty() {
                    println!("{name}");
                } else {
                    println!("{name}  (requires: {})", required.join(", "));
                }
            }
        }
    }
    Ok(())
}
