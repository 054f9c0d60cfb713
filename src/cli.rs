//! Command-line interface for signrelay
//!
//! Provides argument parsing using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Sign-language relay between a video/audio source and a downstream muxer
#[derive(Parser, Debug)]
#[command(name = "signrelay", version, about = "Sign-language video ⇄ speech relay")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Socket overrides shared by both directions
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointArgs {
    /// Host to listen on
    #[arg(long, value_name = "HOST")]
    pub listen_host: Option<String>,

    /// Port to listen on
    #[arg(long, value_name = "PORT")]
    pub listen_port: Option<u16>,

    /// Downstream muxer host
    #[arg(long, value_name = "HOST")]
    pub relay_host: Option<String>,

    /// Downstream muxer port
    #[arg(long, value_name = "PORT")]
    pub relay_port: Option<u16>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Relay sign-language video in as synthesized speech out
    Gesture {
        #[command(flatten)]
        endpoints: EndpointArgs,
    },

    /// Relay speech audio in as sign-language video out
    Speech {
        #[command(flatten)]
        endpoints: EndpointArgs,
    },

    /// Validate and print the effective configuration
    CheckConfig,
}
