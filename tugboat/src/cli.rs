mod build;
mod common;
mod manifest;
mod tag;
mod version;

use clap::{Parser, Subcommand};

use crate::{cancel::Cancellation, Result};

#[derive(Debug, Parser)]
#[command(
    name = "tugboat",
    version = crate::version::VERSION,
    about = "Build multi-arch images",
    long_about = "A tool to build and publish multi-architecture container images"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: common::GlobalArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build an image from a Dockerfile
    Build(build::BuildArgs),

    /// Create a tag that refers to another image
    #[command(arg_required_else_help = true)]
    Tag(tag::TagArgs),

    /// Manage manifest lists
    Manifest {
        #[command(subcommand)]
        command: manifest::ManifestCommands,
    },

    /// Print the version information
    Version(version::VersionArgs),
}

impl Cli {
    pub fn debug(&self) -> bool {
        self.global.debug
    }

    pub fn run(self, cancellation: Cancellation) -> Result<()> {
        if let Commands::Version(args) = &self.command {
            version::version(args);
            return Ok(());
        }

        let mut context = common::Context::new(self.global, cancellation)?;
        match self.command {
            Commands::Build(args) => build::build(&mut context, args),
            Commands::Tag(args) => tag::tag(&mut context, args),
            Commands::Manifest { command } => manifest::manifest(&mut context, command),
            Commands::Version(_) => Ok(()),
        }
    }
}
