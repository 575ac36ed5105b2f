use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ytdrop")]
#[command(author, version, about = "Telegram bot that sends YouTube videos and audio back to the chat", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot with long polling
    Run,

    /// Print the format catalog the bot would offer for a link
    Formats {
        /// YouTube video URL
        url: String,
    },

    /// Remove leftovers from download directories and exit
    Clean {
        /// Directory to scan (defaults to the current directory)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
