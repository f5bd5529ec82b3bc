mod app;
mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docsum::error::DocsumError;
use docsum::job::ProcessingStatus;

use app::App;
use commands::Submission;

#[derive(Parser)]
#[command(name = "docsum")]
#[command(about = "Queue-driven document summarization worker and operator tools")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file. Defaults apply when omitted.
    #[arg(short, long, global = true, env = "DOCSUM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume the processing topic until interrupted
    Worker,
    /// Create a job for a file and queue it
    Submit {
        path: PathBuf,
        #[arg(long)]
        owner: String,
        /// Declared media type; guessed from the file name when omitted
        #[arg(long)]
        mime: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// Embed the file in the message instead of copying it to the upload directory
        #[arg(long)]
        inline: bool,
    },
    /// Queue raw text for summarization
    SubmitText {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        title: String,
        text: String,
    },
    /// Print a job record as JSON
    Status {
        id: String,
        #[arg(long)]
        owner: Option<String>,
    },
    /// List an owner's jobs, newest first
    List {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        status: Option<ProcessingStatus>,
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },
    /// Show jobs stuck in processing
    Stuck {
        #[arg(long, default_value_t = 30)]
        older_than_mins: u64,
    },
    /// Fail jobs stuck in processing
    Reap {
        #[arg(long, default_value_t = 30)]
        older_than_mins: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match app::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("docsum: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(&config.logging);

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("docsum: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: docsum::Config) -> Result<(), DocsumError> {
    let app = App::open(config)?;

    match command {
        Commands::Worker => commands::worker(&app),
        Commands::Submit {
            path,
            owner,
            mime,
            title,
            inline,
        } => {
            let id = commands::submit(
                &app,
                Submission {
                    path: &path,
                    owner: &owner,
                    mime,
                    title,
                    inline,
                },
            )?;
            println!("{}", id);
            Ok(())
        }
        Commands::SubmitText { owner, title, text } => {
            let id = commands::submit_text(&app, &owner, &title, &text)?;
            println!("{}", id);
            Ok(())
        }
        Commands::Status { id, owner } => commands::status(&app, &id, owner.as_deref()),
        Commands::List {
            owner,
            status,
            limit,
        } => commands::list(&app, &owner, status, limit),
        Commands::Stuck { older_than_mins } => commands::stuck(&app, older_than_mins),
        Commands::Reap { older_than_mins } => commands::reap(&app, older_than_mins),
    }
}
