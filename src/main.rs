use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ewhgen::EwhError;
use ewhgen::cli::Output;
use ewhgen::cli::commands::generate::{GenerateOptions, ProviderKind};

#[derive(Parser)]
#[command(name = "ewhgen")]
#[command(
    version,
    about = "Reliable Gemini/OpenRouter calls and JSON repair for exam rubric generation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt to a provider and print the decoded JSON
    Generate {
        #[arg(long, value_enum, default_value = "gemini", help = "LLM provider")]
        provider: ProviderKind,
        #[arg(long, short, help = "Prompt file, or - for stdin")]
        prompt: PathBuf,
        #[arg(long, help = "PDF sent inline to the vision model (Gemini only)")]
        pdf: Option<PathBuf>,
        #[arg(long, help = "Enable the code execution tool (Gemini only)")]
        code_execution: bool,
        #[arg(long = "require", value_name = "FIELD", help = "Top-level field that must be present")]
        require: Vec<String>,
        #[arg(long, help = "Model override")]
        model: Option<String>,
        #[arg(long, help = "Maximum output tokens")]
        max_tokens: Option<u32>,
        #[arg(long, help = "Sampling temperature (0.0-2.0)")]
        temperature: Option<f32>,
    },

    /// Repair raw model output into valid JSON
    Repair {
        #[arg(default_value = "-", help = "Input file, or - for stdin")]
        input: PathBuf,
        #[arg(long, help = "Also parse the result and fail if it is still invalid")]
        check: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Print as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mewhgen encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<EwhError>() {
                Some(error) => {
                    tracing::debug!(category = %error.category(), "{}", error);
                    Output::new().failure(error);
                }
                None => eprintln!("\x1b[31mError:\x1b[0m {}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    // Logs go to stderr so stdout stays pipeable JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            provider,
            prompt,
            pdf,
            code_execution,
            require,
            model,
            max_tokens,
            temperature,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(ewhgen::cli::commands::generate::run(GenerateOptions {
                provider,
                prompt,
                pdf,
                code_execution,
                require,
                model,
                max_tokens,
                temperature,
            }))?;
        }
        Commands::Repair { input, check } => {
            ewhgen::cli::commands::repair::run(&input, check)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                ewhgen::cli::commands::config::show(json)?;
            }
            ConfigAction::Path => {
                ewhgen::cli::commands::config::path()?;
            }
        },
    }

    Ok(())
}
