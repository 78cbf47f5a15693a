use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_fs::prelude::*;
use serde_json::{Value, json};

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../form-spec/tests/fixtures/order_form.json")
}

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("greentic-forms").expect("binary");
    cmd.env_remove("GREENTIC_FORMS_LOG");
    cmd
}

#[test]
fn evaluate_prints_settled_state() -> Result<(), Box<dyn Error>> {
    let workspace = assert_fs::TempDir::new()?;
    let data = workspace.child("data.json");
    data.write_str(r#"{"qty":"4","price":"30"}"#)?;

    let output = cli()
        .arg("evaluate")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--data")
        .arg(data.path())
        .output()?;
    assert!(output.status.success());
    let result: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(result["data"]["total"], json!(120));
    assert_eq!(result["data"]["bulk_note"], json!("Bulk discount applies"));
    assert_eq!(result["visibility"]["bulk_note"], json!(true));
    Ok(())
}

#[test]
fn preview_outputs_text_and_json() -> Result<(), Box<dyn Error>> {
    let output = cli()
        .arg("preview")
        .arg("--spec")
        .arg(fixture_path())
        .output()?;
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout)?;
    assert!(text.starts_with("Form: Order Form (order-form)"));
    assert!(!text.contains("company (Company)"));

    let output = cli()
        .arg("preview")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--format")
        .arg("json")
        .output()?;
    let ui: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(ui["next_field_id"], json!("name"));
    Ok(())
}

#[test]
fn validate_reports_every_problem() -> Result<(), Box<dyn Error>> {
    let workspace = assert_fs::TempDir::new()?;
    let data = workspace.child("data.json");
    data.write_str(r#"{"email":"not-an-email","qty":"1"}"#)?;

    let output = cli()
        .arg("validate")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--data")
        .arg(data.path())
        .output()?;
    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Validation result: invalid"));
    assert!(stdout.contains("email - enter a valid email address"));
    assert!(stdout.contains("Missing required fields: name"));
    Ok(())
}

#[test]
fn submit_prints_confirmation() -> Result<(), Box<dyn Error>> {
    let workspace = assert_fs::TempDir::new()?;
    let data = workspace.child("data.json");
    data.write_str(r#"{"name":"Ada","email":"ada@example.com","qty":"2","price":"10"}"#)?;

    let output = cli()
        .arg("submit")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--data")
        .arg(data.path())
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("Thanks Ada, your order total is 20.\n"));
    Ok(())
}

#[test]
fn fill_walks_visible_fields_and_submits() -> Result<(), Box<dyn Error>> {
    let stdin = ["Ada", "ada@example.com", "no", "10", ""].join("\n") + "\n";
    let output = cli()
        .arg("fill")
        .arg("--spec")
        .arg(fixture_path())
        .write_stdin(stdin)
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Done ✅"));
    assert!(stdout.contains("Thanks Ada, your order total is 10."));
    assert!(!stdout.contains("Company"));
    Ok(())
}

#[test]
fn fill_save_writes_a_resumable_draft() -> Result<(), Box<dyn Error>> {
    let workspace = assert_fs::TempDir::new()?;
    let draft = workspace.child("draft.json");

    cli()
        .arg("fill")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--draft-out")
        .arg(draft.path())
        .write_stdin("Ada\nsave\n")
        .assert()
        .success();

    let saved: Value = serde_json::from_str(&fs::read_to_string(draft.path())?)?;
    assert!(saved["id"].as_str().unwrap_or_default().starts_with("DRAFT-"));
    assert_eq!(saved["data"]["name"], json!("Ada"));

    let stdin = ["ada@example.com", "", "", ""].join("\n") + "\n";
    let output = cli()
        .arg("fill")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--resume")
        .arg(draft.path())
        .write_stdin(stdin)
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Resuming draft DRAFT-"));
    assert!(stdout.contains("Thanks Ada, your order total is 0."));
    Ok(())
}

#[test]
fn fill_fails_when_input_runs_out() -> Result<(), Box<dyn Error>> {
    cli()
        .arg("fill")
        .arg("--spec")
        .arg(fixture_path())
        .write_stdin("Ada\n")
        .assert()
        .failure();
    Ok(())
}

#[test]
fn import_normalizes_field_snippets() -> Result<(), Box<dyn Error>> {
    let workspace = assert_fs::TempDir::new()?;
    let snippet = workspace.child("field.json");
    snippet.write_str(r#"{"id":"phone","type":"text","label":"Phone"}"#)?;
    let out = workspace.child("normalized.json");

    let output = cli()
        .arg("import")
        .arg("--input")
        .arg(snippet.path())
        .arg("--out")
        .arg(out.path())
        .output()?;
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.starts_with("Imported field 'phone' (text)"));
    let normalized: Value = serde_json::from_str(&fs::read_to_string(out.path())?)?;
    assert_eq!(normalized["width"], json!("1/1"));

    let bogus = workspace.child("bogus.json");
    bogus.write_str(r#"{"title":"neither"}"#)?;
    cli()
        .arg("import")
        .arg("--input")
        .arg(bogus.path())
        .assert()
        .failure();
    Ok(())
}

#[test]
fn schema_prints_entry_schema() -> Result<(), Box<dyn Error>> {
    let output = cli()
        .arg("schema")
        .arg("entry")
        .arg("--spec")
        .arg(fixture_path())
        .output()?;
    assert!(output.status.success());
    let schema: Value = serde_json::from_slice(&output.stdout)?;
    assert!(schema["properties"]["name"].is_object());
    assert!(schema["properties"].get("company").is_none());

    cli().arg("schema").arg("entry").assert().failure();
    Ok(())
}

#[test]
fn unknown_log_levels_are_rejected() {
    cli()
        .arg("--log-level")
        .arg("loud")
        .arg("schema")
        .arg("form")
        .assert()
        .failure();
}

#[test]
fn validate_checks_the_settled_data() -> Result<(), Box<dyn Error>> {
    let workspace = tempfile::tempdir()?;
    let data = workspace.path().join("data.json");
    fs::write(
        &data,
        r#"{"name":"Ada","email":"ada@example.com","has_company":"yes","qty":"1"}"#,
    )?;

    let output = cli()
        .arg("validate")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--data")
        .arg(&data)
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));
    assert!(String::from_utf8(output.stdout)?.contains("Validation result: valid"));

    let output = cli()
        .arg("submit")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--data")
        .arg(&data)
        .output()?;
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.contains("\"company\": \"ACME Ltd\""));
    Ok(())
}

#[test]
fn resume_code_must_match_the_draft() -> Result<(), Box<dyn Error>> {
    let workspace = tempfile::tempdir()?;
    let draft = workspace.path().join("draft.json");

    cli()
        .arg("fill")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--draft-out")
        .arg(&draft)
        .write_stdin("Ada\nsave\n")
        .assert()
        .success();
    let saved: Value = serde_json::from_str(&fs::read_to_string(&draft)?)?;
    let code = saved["id"].as_str().unwrap_or_default().to_string();

    let output = cli()
        .arg("fill")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--resume")
        .arg(&draft)
        .arg("--code")
        .arg("DRAFT-ZZZZZZ")
        .write_stdin("")
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("does not match"));

    // Saving a resumed draft keeps its code.
    cli()
        .arg("fill")
        .arg("--spec")
        .arg(fixture_path())
        .arg("--resume")
        .arg(&draft)
        .arg("--code")
        .arg(code.trim_start_matches("DRAFT-").to_ascii_lowercase())
        .arg("--draft-out")
        .arg(&draft)
        .write_stdin("ada@example.com\nsave\n")
        .assert()
        .success();
    let updated: Value = serde_json::from_str(&fs::read_to_string(&draft)?)?;
    assert_eq!(updated["id"], json!(code));
    assert_eq!(updated["data"]["email"], json!("ada@example.com"));
    Ok(())
}

#[test]
fn import_can_assign_a_fresh_id() -> Result<(), Box<dyn Error>> {
    let workspace = assert_fs::TempDir::new()?;
    let snippet = workspace.child("field.json");
    snippet.write_str(r#"{"id":"email","type":"email","label":"Backup email"}"#)?;

    let output = cli()
        .arg("import")
        .arg("--input")
        .arg(snippet.path())
        .arg("--fresh-id")
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("Imported field 'field-"), "{}", stdout);
    assert!(!stdout.contains("\"id\": \"email\""));
    Ok(())
}

#[test]
fn forms_without_an_id_can_be_filled() -> Result<(), Box<dyn Error>> {
    let workspace = assert_fs::TempDir::new()?;
    let spec = workspace.child("form.json");
    spec.write_str(
        r#"{"title":"Quick","pages":[{"id":"p","fields":[{"id":"who","type":"text","label":"Who","required":true}]}]}"#,
    )?;

    let output = cli()
        .arg("fill")
        .arg("--spec")
        .arg(spec.path())
        .write_stdin("Ada\n")
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8(output.stdout)?.contains("Done ✅"));
    Ok(())
}
