use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn write_feed(dir: &Path, manifests: &[(&str, &str)]) {
    std::fs::create_dir_all(dir).unwrap();
    for (name, json) in manifests {
        std::fs::write(dir.join(name), json).unwrap();
    }
}

fn pkgplan(root: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("pkgplan"));
    cmd.env_remove("PKGPLAN_CONSUMER")
        .env("RUST_LOG", "warn")
        .arg("--root")
        .arg(root);
    cmd
}

const A_1_0: &str = r#"{
    "id": "A",
    "version": "1.0",
    "dependencies": [{"dependencies": [{"id": "B", "version": "[1.0,2.0)"}]}]
}"#;
const A_2_0: &str = r#"{
    "id": "A",
    "version": "2.0",
    "dependencies": [{"dependencies": [{"id": "B", "version": "2.0"}]}]
}"#;
const B_1_0: &str = r#"{"id": "B", "version": "1.0"}"#;
const B_2_0: &str = r#"{"id": "B", "version": "2.0"}"#;
const F_1_0: &str = r#"{
    "id": "F",
    "version": "1.0",
    "dependencies": [{"dependencies": [{"id": "B"}]}]
}"#;
const TOOL_1_0: &str = r#"{"id": "Tool", "version": "1.0", "solution_level": true}"#;

#[test]
fn test_end_to_end_install_list_uninstall() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    write_feed(&root.join("feed"), &[("a1.json", A_1_0), ("b1.json", B_1_0)]);

    pkgplan(root)
        .args(["--consumer", "web", "install", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Install 'B 1.0' into web"))
        .stdout(predicate::str::contains("Install 'A 1.0' into web"));

    assert!(root.join("store.json").exists());
    assert!(root.join("packages/a.1.0/package.json").exists());
    assert!(root.join("packages/b.1.0/package.json").exists());

    pkgplan(root)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("web"))
        .stdout(predicate::str::contains("  A 1.0\n"))
        .stdout(predicate::str::contains("B 1.0 (dependency)"));

    pkgplan(root)
        .args(["--consumer", "web", "uninstall", "B"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Unable to uninstall 'B 1.0' because A 1.0 depend(s) on it",
        ));

    pkgplan(root)
        .args(["--consumer", "web", "uninstall", "A", "--remove-dependencies"])
        .assert()
        .success();

    assert!(!root.join("packages/a.1.0").exists());
    assert!(!root.join("packages/b.1.0").exists());
    pkgplan(root)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No packages installed."));
}

#[test]
fn test_shared_dependency_kept_for_other_consumer() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    write_feed(
        &root.join("feed"),
        &[("a1.json", A_1_0), ("b1.json", B_1_0), ("f1.json", F_1_0)],
    );

    pkgplan(root)
        .args(["--consumer", "web", "install", "A"])
        .assert()
        .success();
    pkgplan(root)
        .args(["--consumer", "api", "install", "F"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Install 'F 1.0' into api"));

    pkgplan(root)
        .args(["--consumer", "web", "uninstall", "A", "--remove-dependencies"])
        .assert()
        .success();

    assert!(!root.join("packages/a.1.0").exists());
    assert!(root.join("packages/b.1.0/package.json").exists());
    pkgplan(root)
        .args(["--consumer", "api", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("B 1.0 (dependency)"));
}

#[test]
fn test_update_and_dry_run() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    let feed = root.join("feed");
    write_feed(&feed, &[("a1.json", A_1_0), ("b1.json", B_1_0)]);

    pkgplan(root)
        .args(["--consumer", "web", "install", "A"])
        .assert()
        .success();

    write_feed(&feed, &[("a2.json", A_2_0), ("b2.json", B_2_0)]);

    pkgplan(root)
        .args(["--consumer", "web", "--dry-run", "update", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Install 'A 2.0' into web"));
    assert!(!root.join("packages/a.2.0").exists());

    pkgplan(root)
        .args(["--consumer", "web", "update", "A"])
        .assert()
        .success();
    assert!(root.join("packages/a.2.0/package.json").exists());
    assert!(root.join("packages/b.2.0/package.json").exists());
    assert!(!root.join("packages/a.1.0").exists());
}

#[test]
fn test_solution_level_package_without_consumer() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    write_feed(&root.join("feed"), &[("a1.json", A_1_0), ("tool.json", TOOL_1_0)]);

    pkgplan(root)
        .args(["install", "Tool"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Install 'Tool 1.0' into solution"));

    pkgplan(root)
        .args(["install", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No project was specified for 'A'"));

    pkgplan(root)
        .args(["uninstall", "tool"])
        .assert()
        .success();
    assert!(!root.join("packages/tool.1.0").exists());
}

#[test]
fn test_restore_and_reinstall() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    write_feed(&root.join("feed"), &[("a1.json", A_1_0), ("b1.json", B_1_0)]);

    pkgplan(root)
        .args(["--consumer", "web", "install", "A"])
        .assert()
        .success();
    let manifest = root.join("packages/a.1.0/package.json");
    let before = std::fs::read(&manifest).unwrap();

    std::fs::remove_dir_all(root.join("packages")).unwrap();
    pkgplan(root)
        .arg("restore")
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 'A 1.0'"));
    assert_eq!(std::fs::read(&manifest).unwrap(), before);

    pkgplan(root)
        .arg("restore")
        .assert()
        .success()
        .stdout(predicate::str::contains("All packages are present."));

    pkgplan(root)
        .args(["--consumer", "web", "reinstall"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Uninstall 'A 1.0' from web"));
    assert_eq!(std::fs::read(&manifest).unwrap(), before);
}

#[test]
fn test_missing_source_is_reported() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();

    pkgplan(root)
        .args(["--consumer", "web", "install", "A"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unavailable"));
}

#[test]
fn test_dependency_from_secondary_source() {
    let root_dir = tempdir().unwrap();
    let root = root_dir.path();
    let main = root.join("main");
    let extra = root.join("extra");
    write_feed(&main, &[("a1.json", A_1_0)]);
    write_feed(&extra, &[("b1.json", B_1_0)]);

    pkgplan(root)
        .arg("--source")
        .arg(format!("main={}", main.display()))
        .arg("--source")
        .arg(format!("extra={}", extra.display()))
        .args(["--consumer", "web", "install", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Install 'B 1.0' into web"));
}
