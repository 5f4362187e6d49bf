use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "padctl")]
#[command(version, about = "Automate a Digipad-style collaborative board")]
pub struct Cli {
    /// Session cookie, overriding the stored one
    #[arg(long, global = true)]
    pub cookie: Option<String>,

    /// Service instance to talk to
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// Pause between pads in batch commands, in seconds
    #[arg(long, global = true)]
    pub delay: Option<f64>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a block in one or more pads
    CreateBlock {
        /// Pads to edit: ids, URLs, category keywords, folder names (default: created)
        pads: Vec<String>,

        /// Title of the block
        #[arg(long, default_value = "")]
        title: String,

        /// Text of the block
        #[arg(long)]
        text: String,

        /// Column number, starting from 1
        #[arg(long, default_value = "1")]
        column: u32,

        /// Create the block hidden
        #[arg(long)]
        hidden: bool,

        /// Comment to add to the created block
        #[arg(long)]
        comment: Option<String>,
    },
    /// Rename a column in one or more pads
    RenameColumn {
        /// Pads to edit (default: created)
        pads: Vec<String>,

        /// Column number, starting from 1
        #[arg(long)]
        column: u32,

        /// New column title
        #[arg(long)]
        title: String,
    },
    /// Export pads as ZIP archives
    Export {
        /// Pads to export (default: created)
        pads: Vec<String>,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List pads on the account
    List {
        /// Pad lists to show (default: created)
        pads: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Log in with username and password and store the session cookie
    Login {
        username: String,
    },
    /// Show, save or clear the stored session cookie
    Cookie {
        #[command(subcommand)]
        command: CookieCommands,
    },
    /// Start the companion web UI
    Serve {
        #[arg(short, long, default_value = "3172")]
        port: u16,

        /// Auto-open the browser after the server starts
        #[arg(long)]
        open: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum CookieCommands {
    /// Print the stored cookie
    Show,
    /// Validate and store a cookie
    Set { cookie: String },
    /// Delete the stored cookie
    Clear,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "padctl=debug" } else { "padctl=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::CreateBlock {
            pads,
            title,
            text,
            column,
            hidden,
            comment,
        } => {
            cmd::cmd_create_block(
                &cli,
                pads,
                title,
                text,
                *column,
                *hidden,
                comment.as_deref(),
            )
            .await?;
        }
        Commands::RenameColumn {
            pads,
            column,
            title,
        } => {
            cmd::cmd_rename_column(&cli, pads, *column, title).await?;
        }
        Commands::Export { pads, output } => {
            cmd::cmd_export(&cli, pads, output.as_deref()).await?;
        }
        Commands::List { pads, format } => {
            cmd::cmd_list(&cli, pads, *format).await?;
        }
        Commands::Login { username } => {
            cmd::cmd_login(&cli, username).await?;
        }
        Commands::Cookie { command } => {
            cmd::cmd_cookie(&cli, command.clone()).await?;
        }
        Commands::Serve { port, open } => {
            cmd::cmd_serve(&cli, *port, *open).await?;
        }
    }

    Ok(())
}
