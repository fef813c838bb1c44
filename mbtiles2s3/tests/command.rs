mod test_utilities;
use assert_fs::prelude::*;
use predicates::{prelude::*, str};
use rstest::rstest;
use test_utilities::*;

#[test]
fn no_arguments() -> Result<(), Box<dyn std::error::Error>> {
	mbtiles2s3_cmd()
		.assert()
		.failure()
		.code(2)
		.stdout(str::is_empty())
		.stderr(str::contains(format!("Usage: {BINARY_NAME} [OPTIONS] <SOURCE> <BUCKET>")));
	Ok(())
}

#[test]
fn missing_bucket() -> Result<(), Box<dyn std::error::Error>> {
	mbtiles2s3_cmd()
		.arg("world.mbtiles")
		.assert()
		.failure()
		.code(2)
		.stderr(str::contains("<BUCKET>"));
	Ok(())
}

#[test]
fn missing_source_file() -> Result<(), Box<dyn std::error::Error>> {
	let dir = tempfile::tempdir()?;
	mbtiles2s3_cmd()
		.arg(dir.path().join("missing.mbtiles"))
		.arg("tiles")
		.env("AWS_ACCESS_KEY_ID", "key")
		.env("AWS_SECRET_ACCESS_KEY", "secret")
		.assert()
		.failure()
		.code(1)
		.stderr(str::contains("does not exist"));
	Ok(())
}

#[test]
fn source_is_not_a_database() -> Result<(), Box<dyn std::error::Error>> {
	let temp = assert_fs::TempDir::new()?;
	let source = temp.child("broken.mbtiles");
	source.write_str("this is definitely not a sqlite file, just some text padding it out")?;
	mbtiles2s3_cmd()
		.arg(source.path())
		.arg("tiles")
		.args(["--region", "us-east-1", "--endpoint-url", "http://127.0.0.1:9"])
		.env("AWS_ACCESS_KEY_ID", "key")
		.env("AWS_SECRET_ACCESS_KEY", "secret")
		.assert()
		.failure()
		.code(1)
		.stderr(str::contains("not a valid SQLite database"))
		.stderr(str::contains("connecting to S3").not());
	Ok(())
}

#[test]
fn missing_credentials() -> Result<(), Box<dyn std::error::Error>> {
	let (_dir, source) = get_world_mbtiles();
	mbtiles2s3_cmd()
		.arg(&source)
		.arg("tiles")
		.assert()
		.failure()
		.code(1)
		.stderr(str::contains("AWS credentials missing, set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY"));
	Ok(())
}

#[test]
fn partial_credentials() -> Result<(), Box<dyn std::error::Error>> {
	let (_dir, source) = get_world_mbtiles();
	mbtiles2s3_cmd()
		.arg(&source)
		.arg("tiles")
		.env("AWS_ACCESS_KEY_ID", "key")
		.assert()
		.failure()
		.code(1)
		.stderr(str::contains("set AWS_SECRET_ACCESS_KEY"));
	Ok(())
}

#[rstest]
#[case(&["-g", "alert(1)"], "invalid grid callback")]
#[case(&["-c", "0"], "concurrency must be at least 1")]
#[case(&["-t", "a/b"], "must not contain '/'")]
fn invalid_options(#[case] args: &[&str], #[case] message: &str) -> Result<(), Box<dyn std::error::Error>> {
	let (_dir, source) = get_world_mbtiles();
	mbtiles2s3_cmd()
		.arg(&source)
		.arg("tiles")
		.args(args)
		.assert()
		.failure()
		.code(1)
		.stderr(str::contains(message));
	Ok(())
}

#[test]
fn invalid_config_file() -> Result<(), Box<dyn std::error::Error>> {
	let (_dir, source) = get_world_mbtiles();
	let temp = assert_fs::TempDir::new()?;
	let config = temp.child("config.yaml");
	config.write_str("acces:\n  acl: private\n")?;
	mbtiles2s3_cmd()
		.arg(&source)
		.arg("tiles")
		.arg("--config")
		.arg(config.path())
		.assert()
		.failure()
		.code(1)
		.stderr(str::contains("parsing config file"));
	Ok(())
}

#[rstest]
#[case("--acl")]
#[case("--concurrency")]
fn option_needs_value(#[case] flag: &str) -> Result<(), Box<dyn std::error::Error>> {
	mbtiles2s3_cmd()
		.args(["world.mbtiles", "tiles", flag])
		.assert()
		.failure()
		.code(2);
	Ok(())
}
