//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const COURSEWARE: &str = r#"
[courseware]
id = "cli"
name = "CLI Course"
root = "course"

[[activities]]
key = "course"
pathways = ["lessons"]

[[pathways]]
key = "lessons"
children = ["intro", "quiz"]

[[interactives]]
key = "intro"

[[interactives.scenarios]]
name = "seen"

[[interactives]]
key = "quiz"

[[interactives.scenarios]]
name = "right"
correctness = "correct"
condition = { type = "equals", source = "answer", value = 42 }

[[interactives.scenarios]]
name = "wrong"
correctness = "incorrect"
"#;

const SCRIPT: &str = r#"
student = "0190d5a2-7c1e-7000-8000-000000000001"

[[submissions]]
interactive = "intro"

[[submissions]]
interactive = "quiz"
scope = { answer = 42 }
"#;

fn pathwise(dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("pathwise").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("PATHWISE_OUTPUT_DIR", dir.path().join("results"));
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn validate_valid_courseware() {
    let dir = TempDir::new().unwrap();
    let courseware = write(&dir, "course.toml", COURSEWARE);

    pathwise(&dir)
        .arg("validate")
        .arg("--courseware")
        .arg(&courseware)
        .assert()
        .success()
        .stdout(predicate::str::contains("CLI Course"))
        .stdout(predicate::str::contains("2 interactives"))
        .stdout(predicate::str::contains("All courseware valid"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let broken = COURSEWARE.replace(r#"children = ["intro", "quiz"]"#, r#"children = ["intro", "missing"]"#);
    let courseware = write(&dir, "course.toml", &broken);

    pathwise(&dir)
        .arg("validate")
        .arg("--courseware")
        .arg(&courseware)
        .assert()
        .success()
        .stdout(predicate::str::contains("[lessons] WARNING: unknown child walkable: missing"))
        .stdout(predicate::str::contains("warning(s) found"));
}

#[test]
fn validate_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("courseware")).unwrap();
    write(&dir, "courseware/a.toml", COURSEWARE);
    write(
        &dir,
        "courseware/b.toml",
        &COURSEWARE.replace("CLI Course", "Second Course"),
    );

    pathwise(&dir)
        .arg("validate")
        .arg("--courseware")
        .arg("courseware")
        .assert()
        .success()
        .stdout(predicate::str::contains("CLI Course"))
        .stdout(predicate::str::contains("Second Course"));
}

#[test]
fn validate_nonexistent_file() {
    let dir = TempDir::new().unwrap();
    pathwise(&dir)
        .arg("validate")
        .arg("--courseware")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_malformed_file() {
    let dir = TempDir::new().unwrap();
    let courseware = write(&dir, "course.toml", "[courseware]\nid = 3\n");

    pathwise(&dir)
        .arg("validate")
        .arg("--courseware")
        .arg(&courseware)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    pathwise(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created pathwise.toml"))
        .stdout(predicate::str::contains("Created courseware/example.toml"));

    assert!(dir.path().join("pathwise.toml").exists());
    assert!(dir.path().join("courseware/example.toml").exists());
    assert!(dir.path().join("scripts/example.toml").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    pathwise(&dir).arg("init").assert().success();

    pathwise(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_output_validates_and_simulates() {
    let dir = TempDir::new().unwrap();
    pathwise(&dir).arg("init").assert().success();

    pathwise(&dir)
        .arg("validate")
        .arg("--courseware")
        .arg("courseware/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("All courseware valid"));

    pathwise(&dir)
        .arg("simulate")
        .arg("--courseware")
        .arg("courseware/example.toml")
        .arg("--script")
        .arg("scripts/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("Final completion"));
}

#[test]
fn simulate_prints_table_and_saves_report() {
    let dir = TempDir::new().unwrap();
    let courseware = write(&dir, "course.toml", COURSEWARE);
    let script = write(&dir, "script.toml", SCRIPT);

    pathwise(&dir)
        .arg("simulate")
        .arg("--courseware")
        .arg(&courseware)
        .arg("--script")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Completion"))
        .stdout(predicate::str::contains("correct"))
        .stdout(predicate::str::contains("Final completion: 100.0%"))
        .stderr(predicate::str::contains("Results saved to"));

    let reports: Vec<_> = std::fs::read_dir(dir.path().join("results"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(reports.len(), 1);
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&reports[0]).unwrap()).unwrap();
    assert_eq!(report["student_id"], "0190d5a2-7c1e-7000-8000-000000000001");
    assert_eq!(report["steps"].as_array().unwrap().len(), 2);
}

#[test]
fn simulate_json_output() {
    let dir = TempDir::new().unwrap();
    let courseware = write(&dir, "course.toml", COURSEWARE);
    let script = write(&dir, "script.toml", SCRIPT);

    let output = pathwise(&dir)
        .arg("simulate")
        .arg("--courseware")
        .arg(&courseware)
        .arg("--script")
        .arg(&script)
        .arg("--student")
        .arg("0190d5a2-7c1e-7000-8000-0000000000ff")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["courseware_id"], "cli");
    assert_eq!(report["student_id"], "0190d5a2-7c1e-7000-8000-0000000000ff");
    let last = &report["steps"][1]["levels"];
    assert_eq!(last[0]["key"], "quiz");
    assert_eq!(last[2]["key"], "course");
    assert_eq!(last[2]["value"], 1.0);
}

#[test]
fn simulate_unknown_interactive_fails() {
    let dir = TempDir::new().unwrap();
    let courseware = write(&dir, "course.toml", COURSEWARE);
    let script = write(&dir, "script.toml", "[[submissions]]\ninteractive = \"nope\"\n");

    pathwise(&dir)
        .arg("simulate")
        .arg("--courseware")
        .arg(&courseware)
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown element key 'nope'"));
}

#[test]
fn simulate_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    let courseware = write(&dir, "course.toml", COURSEWARE);
    let script = write(&dir, "script.toml", SCRIPT);

    pathwise(&dir)
        .arg("simulate")
        .arg("--courseware")
        .arg(&courseware)
        .arg("--script")
        .arg(&script)
        .arg("--format")
        .arg("xml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn help_output() {
    let dir = TempDir::new().unwrap();
    pathwise(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Adaptive courseware runtime"));
}

#[test]
fn version_output() {
    let dir = TempDir::new().unwrap();
    pathwise(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pathwise"));
}
