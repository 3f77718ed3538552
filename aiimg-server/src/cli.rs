use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aiimg",
    about = "aiimg - resilient image generation with key rotation and push delivery",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, env = "AIIMG_CONFIG", help = "Path to config.json")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, help = "Also write daily-rotated logs into this directory")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Generate one image and print where it was delivered")]
    Generate {
        #[arg(short, long, help = "Chat group id (shares the per-minute budget)")]
        group: Option<String>,

        #[arg(long, help = "Session id, used when no group is given")]
        session: Option<String>,

        #[arg(long, help = "Sender id, used when neither group nor session is given")]
        sender: Option<String>,

        #[arg(short, long = "image", help = "Reference image (repeatable)")]
        images: Vec<PathBuf>,

        #[arg(long, help = "Print the outcome or the error as JSON")]
        json: bool,

        #[arg(required = true, num_args = 1.., help = "Prompt text")]
        prompt: Vec<String>,
    },

    #[command(about = "Run the push receiver until interrupted")]
    Receive {
        #[arg(short, long, help = "Listen address (default 0.0.0.0:<delivery.port or 8765>)")]
        bind: Option<SocketAddr>,

        #[arg(short, long, help = "Directory for received artifacts")]
        dir: Option<PathBuf>,
    },

    #[command(about = "Remove artifacts older than the retention window")]
    Cleanup,

    #[command(subcommand, about = "Inspect configuration")]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show effective configuration (keys masked)")]
    Show {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Print the config file location")]
    Path,
}
