//! Integration tests for relmatrix

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    const RELEASE_MATRIX: &str = r#"
[general]
history = false

[build]
engine = "podman"

[cache]
dir = "cache"

[[matrix.release.platforms]]
os_flavor = "distroA"
architecture = "x86_64"
build_recipe = "ci/build.sh"
image_definition = "ci/distroA.Dockerfile"

[[matrix.release.platforms]]
os_flavor = "distroA"
architecture = "arm64"
build_recipe = "ci/build.sh"
image_definition = "ci/distroA.Dockerfile"
"#;

    /// Command isolated from the user's config and state directories
    fn relmatrix(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("relmatrix");
        cmd.current_dir(dir)
            .env_remove("RELMATRIX_CONFIG")
            .env_remove("RUST_LOG")
            .env("XDG_STATE_HOME", dir.join("state"))
            .env("CI", "1");
        cmd
    }

    fn project(config: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("ci")).unwrap();
        std::fs::write(dir.path().join("ci/build.sh"), "cargo build --release\n").unwrap();
        std::fs::write(dir.path().join("ci/distroA.Dockerfile"), "FROM distroA:12\n").unwrap();
        std::fs::write(dir.path().join("relmatrix.toml"), config).unwrap();
        dir
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        relmatrix(dir.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("release build matrix orchestrator"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        relmatrix(dir.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("relmatrix"));
    }

    #[test]
    fn config_path_defaults_to_working_directory() {
        let dir = TempDir::new().unwrap();
        relmatrix(dir.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("relmatrix.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        relmatrix(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("[build]"));
    }

    #[test]
    fn config_init_writes_starter_matrix() {
        let dir = TempDir::new().unwrap();
        relmatrix(dir.path())
            .args(["config", "init"])
            .assert()
            .success();

        let written = std::fs::read_to_string(dir.path().join("relmatrix.toml")).unwrap();
        assert!(written.contains("[[matrix.release.platforms]]"));
    }

    #[test]
    fn validate_lists_platforms() {
        let dir = project(RELEASE_MATRIX);
        relmatrix(dir.path())
            .arg("validate")
            .assert()
            .success()
            .stdout(predicate::str::contains("x86_64-distroA"))
            .stdout(predicate::str::contains("arm64-distroA"));
    }

    #[test]
    fn validate_without_config_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        relmatrix(dir.path())
            .arg("validate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"))
            .stderr(predicate::str::contains("relmatrix config init"));
    }

    #[test]
    fn validate_reports_missing_recipe() {
        let dir = project(RELEASE_MATRIX);
        std::fs::remove_file(dir.path().join("ci/build.sh")).unwrap();

        relmatrix(dir.path())
            .arg("validate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn validate_reports_duplicate_ids() {
        let config = RELEASE_MATRIX.replace("\"arm64\"", "\"x86_64\"");
        let dir = project(&config);

        relmatrix(dir.path())
            .arg("validate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Duplicate platform id"));
    }

    #[test]
    fn validate_unknown_matrix() {
        let dir = project(RELEASE_MATRIX);
        relmatrix(dir.path())
            .args(["validate", "--matrix", "nightly"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Matrix not found: nightly"));
    }

    #[test]
    fn list_plain_prints_ids_in_order() {
        let dir = project(RELEASE_MATRIX);
        relmatrix(dir.path())
            .args(["list", "-f", "plain"])
            .assert()
            .success()
            .stdout("x86_64-distroA\narm64-distroA\n");
    }

    #[test]
    fn list_json_shows_uncached_keys() {
        let dir = project(RELEASE_MATRIX);
        relmatrix(dir.path())
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"cache\": \"missing\""))
            .stdout(predicate::str::contains("\"cache_key\""));
    }

    #[test]
    fn run_rejects_unknown_platform_before_building() {
        let dir = project(RELEASE_MATRIX);
        relmatrix(dir.path())
            .args(["run", "--platform", "riscv64-distroA"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown platform: riscv64-distroA"));
    }

    #[test]
    fn run_json_keeps_stdout_free_of_progress() {
        let dir = project(RELEASE_MATRIX);
        relmatrix(dir.path())
            .args(["run", "-f", "json", "--platform", "riscv64-distroA"])
            .assert()
            .failure()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn validate_rejects_parent_dir_id() {
        let config = RELEASE_MATRIX.replacen(
            "architecture = \"arm64\"",
            "architecture = \"arm64\"\nid = \"..\"",
            1,
        );
        let dir = project(&config);
        relmatrix(dir.path())
            .arg("validate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("must start with a letter or digit"));
    }

    #[test]
    fn run_rejects_unsupported_engine() {
        let config = RELEASE_MATRIX.replace("engine = \"podman\"", "engine = \"rkt\"");
        let dir = project(&config);
        relmatrix(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported container engine: rkt"));
    }

    #[test]
    fn cache_list_empty_json() {
        let dir = project(RELEASE_MATRIX);
        relmatrix(dir.path())
            .args(["cache", "list", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn explicit_config_flag() {
        let dir = project(RELEASE_MATRIX);
        let elsewhere = TempDir::new().unwrap();
        relmatrix(elsewhere.path())
            .args(["list", "-f", "plain", "-c"])
            .arg(dir.path().join("relmatrix.toml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("arm64-distroA"));
    }

    #[test]
    fn completions_bash() {
        let dir = TempDir::new().unwrap();
        relmatrix(dir.path())
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("relmatrix"));
    }

    #[test]
    fn status_does_not_panic() {
        // Fails without podman installed, but must exit cleanly either way
        let dir = TempDir::new().unwrap();
        let _ = relmatrix(dir.path()).arg("status").assert();
    }
}
