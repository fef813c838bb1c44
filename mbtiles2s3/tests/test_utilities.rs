#![allow(unused)]

use assert_cmd::{Command, cargo};
use mbtiles2s3_container::testing::MBTilesBuilder;
use std::path::PathBuf;
use tempfile::{TempDir, tempdir};

#[cfg(windows)]
pub const BINARY_NAME: &str = "mbtiles2s3.exe";
#[cfg(not(windows))]
pub const BINARY_NAME: &str = "mbtiles2s3";

/// Command for the binary with AWS settings removed from the environment.
pub fn mbtiles2s3_cmd() -> Command {
	let mut cmd = Command::new(cargo::cargo_bin!());
	for name in ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_SESSION_TOKEN", "AWS_PROFILE"] {
		cmd.env_remove(name);
	}
	cmd
}

/// Writes a small MBTiles file into a new temp dir.
pub fn get_world_mbtiles() -> (TempDir, PathBuf) {
	let dir = tempdir().expect("failed to create temp dir");
	let path = dir.path().join("world.mbtiles");
	MBTilesBuilder::new()
		.metadata("name", "world")
		.metadata("format", "png")
		.tile(0, 0, 0, b"tile")
		.write(&path)
		.expect("failed to write MBTiles fixture");
	(dir, path)
}
