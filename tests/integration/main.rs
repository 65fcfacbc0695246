//! Integration tests for Stagekeep

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn stagekeep() -> Command {
        cargo_bin_cmd!("stagekeep")
    }

    #[test]
    fn help_displays() {
        stagekeep()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("host cleanup"));
    }

    #[test]
    fn version_displays() {
        stagekeep()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("stagekeep"));
    }

    #[test]
    fn config_path() {
        stagekeep()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        stagekeep()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[project]"));
    }

    #[test]
    fn config_show_reads_custom_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[project]\nname = \"shop\"\n").unwrap();

        stagekeep()
            .args(["--config", path.to_str().unwrap(), "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("shop"));
    }

    #[test]
    fn cleanup_requires_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        stagekeep()
            .args(["--config", path.to_str().unwrap(), "cleanup", "--dry-run"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("git.url"));
    }

    #[test]
    fn invalid_config_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "not [valid").unwrap();

        stagekeep()
            .args(["--config", path.to_str().unwrap(), "config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }
}
