use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookforge::ai::OutlineRequest;
use bookforge::cli::commands;
use bookforge::types::{HeatLevel, Perspective};

#[derive(Parser)]
#[command(name = "bookforge")]
#[command(
    version,
    about = "Multi-provider AI book generator with resumable generation"
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
    /// Generate a book outline from a premise and store it
    Outline {
        #[arg(long, short, help = "Premise of the book")]
        prompt: String,
        #[arg(long, short, default_value = "Romance")]
        genre: String,
        #[arg(long)]
        sub_genre: Option<String>,
        #[arg(long, help = "Heat level: clean, sweet, sensual, steamy, spicy, explicit")]
        heat: Option<HeatLevel>,
        #[arg(
            long,
            help = "Point of view: first-person, third-limited, third-omniscient, second-person"
        )]
        perspective: Option<Perspective>,
        #[arg(long, short, help = "Desired chapter count")]
        chapters: Option<usize>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        tone: Option<String>,
        #[arg(long)]
        audience: Option<String>,
    },

    /// Generate all missing chapters and sections (resumes interrupted runs)
    Generate {
        #[arg(help = "Book id")]
        id: String,
        #[arg(long, help = "Research each section before writing it")]
        research: bool,
    },

    /// Derive a copy of a book at a different heat level
    Convert {
        #[arg(help = "Book id (the derived book's id with --resume)")]
        id: String,
        #[arg(
            long,
            required_unless_present = "resume",
            conflicts_with = "resume",
            help = "Target heat level"
        )]
        heat: Option<HeatLevel>,
        #[arg(long, help = "Finish a stopped conversion")]
        resume: bool,
    },

    /// Show progress of one book, or list all books
    Status {
        #[arg(help = "Book id")]
        id: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Show which providers are available
    Probe {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
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
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: String,
    },
    /// Show configuration and data paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
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
        eprintln!("\x1b[31mBookForge encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!("\x1b[33mStored books are saved after every step; re-run to resume.\x1b[0m");
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
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

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Outline {
            prompt,
            genre,
            sub_genre,
            heat,
            perspective,
            chapters,
            author,
            tone,
            audience,
        } => {
            commands::outline::run(OutlineRequest {
                prompt,
                genre,
                sub_genre,
                author,
                tone,
                target_audience: audience,
                heat_level: heat,
                perspective,
                chapter_count: chapters,
            })?;
        }
        Commands::Generate { id, research } => {
            commands::generate::run(&id, research, cli.quiet)?;
        }
        Commands::Convert { id, heat, resume } => {
            commands::convert::run(&id, heat, resume, cli.quiet)?;
        }
        Commands::Status { id, format } => {
            commands::status::run(id.as_deref(), &format)?;
        }
        Commands::Probe { format } => {
            commands::probe::run(&format)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => commands::config::show(&format)?,
            ConfigAction::Path => commands::config::path()?,
            ConfigAction::Init { global, force } => commands::config::init(global, force)?,
        },
    }

    Ok(())
}
