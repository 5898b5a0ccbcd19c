// CLI definitions using clap

use clap::{Parser, Subcommand};
use lockbell::CueStyle;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lockbell")]
#[command(author, version, about = "Audible Caps/Num/Scroll Lock indicator")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/lockbell/config.toml, then /etc/lockbell/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the keyboard and publish lock-key changes (run as root)
    #[command(visible_alias = "serve")]
    Server {
        /// Keyboard event node (default: first keyboard with a Caps Lock LED)
        #[arg(short, long)]
        device: Option<PathBuf>,

        /// Notification FIFO path
        #[arg(long)]
        fifo: Option<PathBuf>,

        /// Server lock file
        #[arg(long)]
        pid_file: Option<PathBuf>,
    },

    /// Play a cue for every lock-key change (run in the desktop session)
    Client {
        /// Notification FIFO path
        #[arg(long)]
        fifo: Option<PathBuf>,

        /// Client lock file (default: $XDG_RUNTIME_DIR/lockbell-client.pid)
        #[arg(long)]
        pid_file: Option<PathBuf>,

        /// How cues are played
        #[arg(long, value_enum)]
        cue: Option<CueStyle>,
    },

    /// List keyboards with lock-key LEDs
    #[command(visible_aliases = ["list", "ls"])]
    Devices,

    /// Print decoded lock-key changes without a client
    Watch {
        /// Keyboard event node (default: first keyboard with a Caps Lock LED)
        #[arg(short, long)]
        device: Option<PathBuf>,
    },
}
