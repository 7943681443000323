//! readgap CLI: sessions, assessments and exports from the command line.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "readgap", version, about = "Adaptive English / home-language reading gap assessment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and question catalog
    Init,

    /// Validate question catalog TOML files
    Validate {
        /// Path to a catalog file or directory
        #[arg(long)]
        catalog: PathBuf,

        /// Config file path; its [assessment] block sizes are checked
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the home languages a catalog offers
    Languages {
        /// Path to a catalog file or directory
        #[arg(long)]
        catalog: PathBuf,
    },

    /// Create a new assessment session
    Session {
        /// Teacher running the session
        #[arg(long)]
        teacher: Option<String>,

        /// Use this six-digit code instead of a random one
        #[arg(long)]
        code: Option<String>,

        /// Data directory (overrides config)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Take an assessment interactively
    Take {
        /// Path to a catalog file or directory
        #[arg(long)]
        catalog: PathBuf,

        /// Session code
        #[arg(long)]
        session: String,

        /// Student name
        #[arg(long)]
        name: String,

        /// Student year group
        #[arg(long)]
        year_group: String,

        /// Home-language code (e.g. "spanish"); omit for English only
        #[arg(long)]
        home_language: Option<String>,

        /// Seed for question selection
        #[arg(long)]
        seed: Option<u64>,

        /// Data directory (overrides config)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run synthetic students through the assessment
    Simulate {
        /// Path to a catalog file or directory
        #[arg(long)]
        catalog: PathBuf,

        /// Session code
        #[arg(long)]
        session: String,

        /// Number of synthetic students
        #[arg(long, default_value = "10")]
        students: usize,

        /// Answer strategy: correct, incorrect, alternate, ability:<difficulty>
        #[arg(long, default_value = "alternate")]
        strategy: String,

        /// Max concurrent attempts
        #[arg(long, default_value = "4")]
        parallelism: usize,

        /// Seed for question selection
        #[arg(long)]
        seed: Option<u64>,

        /// Simulate students without a home language
        #[arg(long)]
        no_home_language: bool,

        /// Data directory (overrides config)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Export a session's results
    Export {
        /// Session code
        #[arg(long)]
        session: String,

        /// Output format: csv, html, json, all
        #[arg(long, default_value = "csv")]
        format: String,

        /// Output directory
        #[arg(long, default_value = ".")]
        output: PathBuf,

        /// Data directory (overrides config)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "readgap=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { catalog, config } => commands::validate::execute(catalog, config),
        Commands::Languages { catalog } => commands::languages::execute(catalog),
        Commands::Session {
            teacher,
            code,
            data_dir,
            config,
        } => commands::session::execute(teacher, code, data_dir, config),
        Commands::Take {
            catalog,
            session,
            name,
            year_group,
            home_language,
            seed,
            data_dir,
            config,
        } => {
            commands::take::execute(commands::take::TakeArgs {
                catalog,
                session,
                name,
                year_group,
                home_language,
                seed,
                data_dir,
                config,
            })
            .await
        }
        Commands::Simulate {
            catalog,
            session,
            students,
            strategy,
            parallelism,
            seed,
            no_home_language,
            data_dir,
            config,
        } => {
            commands::simulate::execute(commands::simulate::SimulateArgs {
                catalog,
                session,
                students,
                strategy,
                parallelism,
                seed,
                no_home_language,
                data_dir,
                config,
            })
            .await
        }
        Commands::Export {
            session,
            format,
            output,
            data_dir,
            config,
        } => commands::export::execute(session, format, output, data_dir, config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
