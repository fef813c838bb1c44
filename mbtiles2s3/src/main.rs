mod tools;

use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::{ErrorLevel, Verbosity};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	arg_required_else_help = true,
)]
struct Cli {
	#[command(flatten)]
	arguments: tools::export::Arguments,

	#[command(flatten)]
	verbose: Verbosity<ErrorLevel>,
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	tools::export::run(&cli.arguments)
}

#[cfg(test)]
mod tests {
	use super::Cli;
	use clap::{CommandFactory, Parser};

	#[test]
	fn verify_cli() {
		Cli::command().debug_assert();
	}

	#[test]
	fn help() {
		let error = Cli::try_parse_from(["mbtiles2s3"]).unwrap_err().to_string();
		assert!(error.starts_with("Export the contents of an MBTiles file to an S3 bucket"), "{error}");
		assert!(error.contains("Usage: mbtiles2s3 [OPTIONS] <SOURCE> <BUCKET>"), "{error}");
	}

	#[test]
	fn version() {
		let error = Cli::try_parse_from(["mbtiles2s3", "-V"]).unwrap_err().to_string();
		assert!(error.starts_with("mbtiles2s3 "));
	}

	#[test]
	fn verbosity() {
		let cli = Cli::try_parse_from(["mbtiles2s3", "-vv", "world.mbtiles", "tiles"]).unwrap();
		assert_eq!(cli.verbose.log_level_filter(), log::LevelFilter::Info);
	}
}
