mod audio;
mod log;
mod network;
mod video;

use audio::*;
use log::*;
use network::*;
use video::*;

use clap::{Parser, Subcommand};

/// Publish a synthetic track, push it through a simulated network, and watch it.
#[derive(Parser, Clone)]
pub struct Cli {
	#[command(flatten)]
	log: Log,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
	/// Video frames in groups of pictures; stale groups are skipped.
	Video(VideoArgs),

	/// A sine tone played out of a jitter buffer.
	Audio(AudioArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	cli.log.init();

	match cli.command {
		Command::Video(args) => video::run(args).await,
		Command::Audio(args) => audio::run(args).await,
	}
}
