//! Command-line behaviour against a temporary root.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sharebind(root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sharebind").unwrap();
    cmd.arg("--root")
        .arg(root.path())
        .arg("--config")
        .arg(root.path().join("missing.toml"))
        .env_remove("SHAREBIND_PASSWORD");
    cmd
}

#[test]
fn export_of_empty_host_prints_markers_only() {
    let root = tempfile::tempdir().unwrap();
    sharebind(&root)
        .arg("export")
        .assert()
        .success()
        .stdout("BEGIN_EXPORT\nEND_EXPORT\n");
}

#[test]
fn list_shows_managed_entries_as_json() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("etc")).unwrap();
    fs::write(
        root.path().join("etc/fstab"),
        "//10.0.0.5/main /mnt/lxc_shares/main cifs _netdev,ro,credentials=/root/.smbcredentials_main 0 0\n",
    )
    .unwrap();

    sharebind(&root)
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"/mnt/lxc_shares/main\""))
        .stdout(predicate::str::contains("\"ro\""));
}

#[test]
fn add_without_target_fails_when_not_interactive() {
    let root = tempfile::tempdir().unwrap();
    sharebind(&root)
        .args(["add", "--skip-host", "-y"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required input"));
}

#[test]
fn invalid_config_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let config = root.path().join("config.toml");
    fs::write(&config, "dir_mode = \"rwx\"\n").unwrap();

    Command::cargo_bin("sharebind")
        .unwrap()
        .arg("--root")
        .arg(root.path())
        .arg("--config")
        .arg(&config)
        .arg("export")
        .assert()
        .failure();
}

#[test]
fn add_reports_json() {
    let root = tempfile::tempdir().unwrap();
    sharebind(&root)
        .args(["add", "--skip-host", "--target", "/srv/already-mounted", "-y"])
        .args(["--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"target\": \"/srv/already-mounted\""))
        .stdout(predicate::str::contains("\"outcome\": \"unverified\""))
        .stdout(predicate::str::contains("\"bind\": null"));
}

#[test]
fn import_reports_existing_target_as_json() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("etc")).unwrap();
    let fstab = "//10.0.0.5/main /mnt/lxc_shares/main cifs _netdev,rw,credentials=/root/.smbcredentials_main 0 0\n";
    fs::write(root.path().join("etc/fstab"), fstab).unwrap();
    let bundle = root.path().join("bundle.txt");
    fs::write(
        &bundle,
        "BEGIN_EXPORT\nBEGIN\nnas_share=//10.0.0.9/main\nhost_mount=/mnt/lxc_shares/main\nhost_mode=ro\nEND\nEND_EXPORT\n",
    )
    .unwrap();

    sharebind(&root)
        .args(["import", "-y", "--format", "json", "--input"])
        .arg(&bundle)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"target\": \"/mnt/lxc_shares/main\""))
        .stdout(predicate::str::contains("\"status\": \"existing\""));

    assert_eq!(
        fs::read_to_string(root.path().join("etc/fstab")).unwrap(),
        fstab
    );
}
