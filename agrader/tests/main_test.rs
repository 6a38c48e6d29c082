use assert_cmd::Command;
use std::{fs, path::Path};

const EXECUTABLE_NAME: &str = "agrader";

const CONFIG: &str = r#"{
    "name": "pa0",
    "release": "1",
    "projects": [{
        "name": "echo",
        "clean": "rm -f echo",
        "build": "cp echo.sh echo",
        "groups": [{"tests": {"kind": "string"}}]
    }]
}"#;

fn write_executable(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// An assignment directory with a config, two tests and a submission running `body`.
fn assignment(body: &str) -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("autograder.json"), CONFIG).unwrap();
    fs::create_dir(root.path().join("data")).unwrap();
    fs::write(root.path().join("data/tests.txt"), "a\na\nb\nb\n").unwrap();
    fs::create_dir(root.path().join("src")).unwrap();
    write_executable(&root.path().join("src/echo.sh"), body);
    root
}

fn stdout_of(cmd: &mut Command) -> String {
    String::from_utf8(cmd.output().unwrap().stdout).unwrap()
}

#[test]
fn should_grade_a_correct_submission() {
    let root = assignment("echo \"$1\"");
    let mut cmd = Command::cargo_bin(EXECUTABLE_NAME).unwrap();

    cmd.current_dir(root.path()).assert().success().stdout(concat!(
        "pa0 Auto-grader, Release 1\n",
        "\n",
        "echo: 2 tests complete\n",
        "\n",
        "Points\n",
        "      Score   Max\n",
        "echo    2.0   2.0\n",
    ));
    assert!(root.path().join("autograder.log").exists());
}

#[test]
fn should_report_failed_tests() {
    let root = assignment("echo a");
    let mut cmd = Command::cargo_bin(EXECUTABLE_NAME).unwrap();
    cmd.current_dir(root.path()).arg("-v");

    let stdout = stdout_of(&mut cmd);
    assert!(stdout.contains("echo: incorrect output"), "{stdout}");
    assert!(stdout.contains("called as ./echo b"), "{stdout}");
    assert!(stdout.contains("  expected: 'b'"), "{stdout}");
    assert!(stdout.contains("\noutput\n------\na\n------\n"), "{stdout}");
    assert!(stdout.contains("echo    1.0   2.0"), "{stdout}");
}

#[test]
fn should_hide_details_when_quiet() {
    let root = assignment("echo a");
    let mut cmd = Command::cargo_bin(EXECUTABLE_NAME).unwrap();
    cmd.current_dir(root.path()).arg("-q");

    let stdout = stdout_of(&mut cmd);
    assert!(stdout.contains("called as ./echo b"), "{stdout}");
    assert!(!stdout.contains("expected: 'b'"), "{stdout}");
}

#[test]
fn should_give_zero_when_the_build_fails() {
    let root = assignment("echo \"$1\"");
    fs::write(
        root.path().join("autograder.json"),
        CONFIG.replace("cp echo.sh echo", "false"),
    )
    .unwrap();
    let mut cmd = Command::cargo_bin(EXECUTABLE_NAME).unwrap();
    cmd.current_dir(root.path());

    let stdout = stdout_of(&mut cmd);
    assert!(stdout.contains("echo    0.0   2.0"), "{stdout}");
    assert!(!stdout.contains("tests complete"), "{stdout}");
}

#[test]
fn should_select_requested_projects() {
    let root = assignment("echo \"$1\"");
    let mut cmd = Command::cargo_bin(EXECUTABLE_NAME).unwrap();

    cmd.current_dir(root.path())
        .arg("other")
        .assert()
        .success()
        .stdout("pa0 Auto-grader, Release 1\n");
}

#[test]
fn should_grade_an_archive() {
    let root = assignment("echo \"$1\"");
    let status = std::process::Command::new("tar")
        .arg("cf")
        .arg("submission.tar")
        .arg("src")
        .current_dir(root.path())
        .status()
        .unwrap();
    assert!(status.success());
    fs::remove_dir_all(root.path().join("src")).unwrap();

    let mut cmd = Command::cargo_bin(EXECUTABLE_NAME).unwrap();
    cmd.current_dir(root.path()).args(["-a", "submission.tar"]);

    let stdout = stdout_of(&mut cmd);
    assert!(stdout.contains("echo    2.0   2.0"), "{stdout}");
}

#[test]
fn should_fail_without_a_config() {
    let root = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin(EXECUTABLE_NAME).unwrap();

    let output = cmd.current_dir(root.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stdout).unwrap().starts_with("grader: "));
}

#[test]
fn should_fail_for_a_missing_src_directory() {
    let root = assignment("echo \"$1\"");
    let mut cmd = Command::cargo_bin(EXECUTABLE_NAME).unwrap();

    let output = cmd.current_dir(root.path()).args(["-s", "nowhere"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("grader: invalid src directory"), "{stdout}");
}

#[test]
fn should_read_the_config_from_another_directory() {
    let root = assignment("echo \"$1\"");
    let elsewhere = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin(EXECUTABLE_NAME).unwrap();

    cmd.current_dir(elsewhere.path())
        .arg("-c")
        .arg(root.path().join("autograder.json"))
        .arg("-s")
        .arg(root.path().join("src"))
        .assert()
        .success();
}
