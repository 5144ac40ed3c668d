mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::*;
use predicates::str::contains;

const PEOPLE_CSV: &str = "id,First Name,joined\n1,Ann,2024-01-05\n2,Bo,2024-02-11\n";

fn sheetbridge(workspace: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("sheetbridge").expect("binary exists");
    cmd.env("SHEETBRIDGE_DATABASE", workspace.database())
        .env_remove("SHEETBRIDGE_SAMPLE_ROWS")
        .env_remove("SHEETBRIDGE_BATCH_SIZE")
        .env_remove("SHEETBRIDGE_BUSY_TIMEOUT_MS")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn preview_prints_inferred_columns_and_rows() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE_CSV);

    sheetbridge(&workspace)
        .args(["preview", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("first_name"))
        .stdout(contains("INTEGER"))
        .stdout(contains("DATE"))
        .stdout(contains("2024-02-11"));
}

#[test]
fn preview_json_lists_columns_rows_and_tables() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE_CSV);
    sheetbridge(&workspace)
        .args(["commit", "-i", input.to_str().unwrap(), "--action", "create"])
        .assert()
        .success();

    let output = sheetbridge(&workspace)
        .args(["preview", "-i", input.to_str().unwrap(), "--json"])
        .output()
        .expect("run preview");
    assert!(output.status.success());
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(document["columns"][1]["name"], "first_name");
    assert_eq!(document["columns"][2]["type"], "DATE");
    assert_eq!(document["rows"].as_array().map(Vec::len), Some(2));
    assert_eq!(document["tables"][0], "people");
}

#[test]
fn preview_writes_editable_schema_file() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE_CSV);
    let schema = workspace.path().join("people-schema.yml");

    sheetbridge(&workspace)
        .args([
            "preview",
            "-i",
            input.to_str().unwrap(),
            "--write-schema",
            schema.to_str().unwrap(),
        ])
        .assert()
        .success();

    let written = std::fs::read_to_string(&schema).expect("schema written");
    assert!(written.contains("name: first_name"));
    assert!(written.contains("type: DATE"));
}

#[test]
fn preview_leaves_missing_database_uncreated() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE_CSV);
    let missing = workspace.path().join("missing.sqlite");

    sheetbridge(&workspace)
        .args([
            "preview",
            "-i",
            input.to_str().unwrap(),
            "--database",
            missing.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("first_name"));
    assert!(!missing.exists());
}

#[test]
fn commit_creates_table_named_after_file() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("Team Roster.csv", PEOPLE_CSV);

    sheetbridge(&workspace)
        .args(["commit", "-i", input.to_str().unwrap(), "-a", "create"])
        .assert()
        .success()
        .stdout(contains("Created table 'team_roster': 2 row(s) loaded"));

    sheetbridge(&workspace)
        .arg("tables")
        .assert()
        .success()
        .stdout("team_roster\n");

    sheetbridge(&workspace)
        .args(["describe", "--table", "team_roster"])
        .assert()
        .success()
        .stdout(contains("(2 row(s))"))
        .stdout(contains("joined"))
        .stdout(contains("DATE"));
}

#[test]
fn commit_reads_stdin_and_applies_schema_override() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write(
        "override.json",
        r#"{"columns": [{"name": "person_id", "type": "BIGINT"}, {}, {"type": "TIMESTAMP"}]}"#,
    );

    sheetbridge(&workspace)
        .args([
            "commit",
            "-i",
            "-",
            "--table",
            "people",
            "--action",
            "create",
            "--schema",
            schema.to_str().unwrap(),
        ])
        .write_stdin(PEOPLE_CSV)
        .assert()
        .success();

    sheetbridge(&workspace)
        .args(["describe", "-t", "people"])
        .assert()
        .success()
        .stdout(contains("person_id"))
        .stdout(contains("BIGINT"))
        .stdout(contains("TIMESTAMP"));
}

#[test]
fn conflicts_exit_with_user_error_status() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE_CSV);
    let args = ["commit", "-i", input.to_str().unwrap(), "--action", "create"];

    sheetbridge(&workspace).args(args).assert().success();
    sheetbridge(&workspace)
        .args(args)
        .assert()
        .code(2)
        .stderr(contains("already exists"));
}

#[test]
fn type_conversion_failure_rolls_back_append() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", PEOPLE_CSV);
    let late = workspace.write(
        "late.csv",
        "id,First Name,joined\n3,Cy,2024-03-01\n4,Di,not a date\n",
    );
    sheetbridge(&workspace)
        .args(["commit", "-i", input.to_str().unwrap(), "-a", "create"])
        .assert()
        .success();

    sheetbridge(&workspace)
        .args([
            "commit",
            "-i",
            late.to_str().unwrap(),
            "--table",
            "people",
            "-a",
            "append",
            "--sample-rows",
            "1",
        ])
        .assert()
        .code(2)
        .stderr(contains("Row 2 column 'joined'").and(contains("'not a date'")));

    sheetbridge(&workspace)
        .args(["describe", "-t", "people"])
        .assert()
        .success()
        .stdout(contains("(2 row(s))"));
}

#[test]
fn describe_unknown_table_is_a_user_error() {
    let workspace = TestWorkspace::new();
    sheetbridge(&workspace)
        .args(["describe", "--table", "nope"])
        .assert()
        .code(2)
        .stderr(contains("Table 'nope' does not exist"));
}

#[test]
fn missing_database_setting_is_rejected() {
    Command::cargo_bin("sheetbridge")
        .expect("binary exists")
        .env_remove("SHEETBRIDGE_DATABASE")
        .arg("tables")
        .assert()
        .failure()
        .stderr(contains("--database"));
}
