use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "aniryx",
    version,
    about = "Browse and play the Aniryx library with watch-progress tracking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play a title by id or name, optionally at a specific episode
    Play {
        title: String,
        #[arg(short, long)]
        episode: Option<usize>,
    },
    /// Continue the most recently watched title
    Resume,
    /// List tracked titles and watch progress
    List,
    /// Sign in to the Aniryx account service
    Login { email: String },
    /// Drop the stored session
    Logout,
    /// Create an Aniryx account
    Register { email: String },
    /// Request a password-reset mail
    ResetPassword { email: String },
    Tui,
}
