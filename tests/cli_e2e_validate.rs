//! End-to-end tests for the `validate` command.
//!
//! These tests invoke the actual CLI binary and validate the behavior of the
//! `validate` subcommand from a user's perspective.

mod common;
use common::prelude::*;

#[test]
fn test_validate_valid_config() {
    let fixture = TestFixture::new()
        .with_fragment("sles.xml", fragments::SLES)
        .with_fragment("suma.xml", fragments::SUMA);

    fixture
        .command()
        .arg("validate")
        .arg("--config-dir")
        .arg(fixture.config_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("Stitched 2 products"))
        .stdout(predicate::str::contains("All 9 checks passed"));
}

#[test]
fn test_validate_uses_env_config_dir() {
    let fixture = TestFixture::new()
        .with_fragment("sles.xml", fragments::SLES)
        .with_env("true {dcfile} {output}");

    fixture.command().arg("validate").assert().success();
}

#[test]
fn test_validate_duplicate_product_fails() {
    let fixture = TestFixture::new()
        .with_fragment("a.xml", fragments::SLES)
        .with_fragment("b.xml", fragments::SLES);

    fixture
        .command()
        .arg("validate")
        .arg("--config-dir")
        .arg(fixture.config_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("sles"));
}

#[test]
fn test_validate_broken_reference() {
    let fixture = TestFixture::new()
        .with_fragment("sles.xml", fragments::SLES)
        .with_fragment("sled.xml", fragments::BROKEN_REF);

    fixture
        .command()
        .arg("validate")
        .arg("--config-dir")
        .arg(fixture.config_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("sles/99"));

    fixture
        .command()
        .arg("validate")
        .arg("--config-dir")
        .arg(fixture.config_dir())
        .arg("--no-ref-check")
        .assert()
        .success();
}

#[test]
fn test_validate_skips_malformed_fragment() {
    let fixture = TestFixture::new()
        .with_fragment("sles.xml", fragments::SLES)
        .with_fragment("broken.xml", fragments::MALFORMED);

    fixture
        .command()
        .arg("validate")
        .arg("--config-dir")
        .arg(fixture.config_dir())
        .assert()
        .success()
        .stderr(predicate::str::contains("broken.xml"))
        .stdout(predicate::str::contains("Stitched 1 products"));
}

#[test]
fn test_validate_failed_check_exits_one() {
    let fixture = TestFixture::new().with_fragment(
        "sled.xml",
        r#"<product productid="sled">
  <docset setid="15" lifecycle="supported">
    <builddocs>
      <git remote="gh://SUSE/doc-sled"/>
      <language lang="en-us" default="1">
        <deliverable><dc>DC-SLED-all</dc><format html="0" pdf="0"/></deliverable>
      </language>
    </builddocs>
  </docset>
</product>
"#,
    );

    fixture
        .command()
        .arg("validate")
        .arg("--config-dir")
        .arg(fixture.config_dir())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("enabled_format"))
        .stdout(predicate::str::contains("1 of 9 checks failed"));
}
