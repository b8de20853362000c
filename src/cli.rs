// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hoist")]
#[command(about = "Pull container images from Docker and Podman engines")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to hoist.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull an image and wait for it to finish
    Pull {
        /// Image reference, e.g. busybox or localhost:5000/app:1.0
        image: String,

        #[command(flatten)]
        login: LoginArgs,

        /// Give up after this long (e.g. 30s, 2m)
        #[arg(short, long, value_parser = humantime_serde::re::humantime::parse_duration)]
        timeout: Option<Duration>,
    },

    /// Show engine version and mode
    Info,

    /// Remove a local image
    Rmi {
        image: String,

        /// Remove even if containers use it
        #[arg(short, long)]
        force: bool,
    },
}

/// Registry login given on the command line; overrides the config file.
#[derive(Args, Debug, Default)]
pub struct LoginArgs {
    #[arg(short, long, requires = "password")]
    pub username: Option<String>,

    #[arg(short, long, requires = "username")]
    pub password: Option<String>,

    /// Registry server the login is for (defaults to the image's registry)
    #[arg(long)]
    pub registry: Option<String>,

    #[arg(long, requires = "username")]
    pub email: Option<String>,
}
