mod wizard;

use clap::{Parser, Subcommand, ValueEnum};
use component_form::{
    evaluate as form_evaluate, get_entry_schema, render_json_ui, render_text, resume_draft,
    resume_draft_with_code, save_draft, set_value, submit, update_draft, validate_entry,
};
use form_spec::{
    FormSpec, ImportedDocument, ValidationResult, export_field, export_form,
    form_definition_schema, import_document, submission_schema,
};
use serde_json::{Number, Value, json};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use wizard::{
    AnswerParseError, FieldKind, PromptContext, Verbosity, WizardField, WizardPayload,
    WizardPresenter,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const LOG_ENV: &str = "GREENTIC_FORMS_LOG";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Conditional form CLI",
    long_about = "Evaluates, previews, validates and fills conditional forms backed by the form component"
)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace). Defaults to GREENTIC_FORMS_LOG or warn.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SchemaKind {
    /// Schema of the form definition document.
    Form,
    /// Schema of a submission record.
    Submission,
    /// Schema of the entry data a given form accepts.
    Entry,
}

#[derive(Subcommand)]
enum Command {
    /// Run conditional logic, defaults and calculations until the form settles.
    Evaluate {
        /// Path to the form definition JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Optional JSON file with the current form data.
        #[arg(long, value_name = "DATA")]
        data: Option<PathBuf>,
    },
    /// Show what a person filling the form currently sees.
    Preview {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "DATA")]
        data: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate form data against the visible fields of a form.
    Validate {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "DATA")]
        data: PathBuf,
    },
    /// Validate and submit form data, printing the submission record.
    Submit {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        #[arg(long, value_name = "DATA")]
        data: PathBuf,
    },
    /// Fill a form interactively in a text shell.
    Fill {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Optional JSON file containing initial data.
        #[arg(long, value_name = "DATA")]
        data: Option<PathBuf>,
        /// Resume from a saved draft instead of starting fresh.
        #[arg(long, value_name = "DRAFT", conflicts_with = "data")]
        resume: Option<PathBuf>,
        /// Resume code the draft must match (`DRAFT-XXXXXX` or just the suffix).
        #[arg(long, value_name = "CODE", requires = "resume")]
        code: Option<String>,
        /// Where `save` writes the draft (printed to stdout otherwise).
        #[arg(long, value_name = "FILE")]
        draft_out: Option<PathBuf>,
        /// Show verbose output (statuses, visible fields, parse expectations).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also emit the submission JSON on completion.
        #[arg(long)]
        submission_json: bool,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Import a form or field document and print it in normalized form.
    Import {
        #[arg(long, value_name = "INPUT")]
        input: PathBuf,
        /// Write the normalized document here.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Give the document a new generated id, as when adding a template or snippet.
        #[arg(long)]
        fresh_id: bool,
    },
    /// Print a JSON Schema.
    Schema {
        #[arg(value_enum)]
        kind: SchemaKind,
        /// Form definition; required for `entry`.
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        #[arg(long, value_name = "DATA")]
        data: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;
    match cli.command {
        Command::Evaluate { spec, data } => run_evaluate(spec, data),
        Command::Preview { spec, data, format } => run_preview(spec, data, format),
        Command::Validate { spec, data } => run_validate(spec, data),
        Command::Submit { spec, data } => run_submit(spec, data),
        Command::Fill {
            spec,
            data,
            resume,
            code,
            draft_out,
            verbose,
            submission_json,
            format,
        } => run_fill(FillArgs {
            spec,
            data,
            resume,
            code,
            draft_out,
            verbose,
            submission_json,
            format,
        }),
        Command::Import {
            input,
            out,
            fresh_id,
        } => run_import(input, out, fresh_id),
        Command::Schema { kind, spec, data } => run_schema(kind, spec, data),
    }
}

fn init_logging(level: Option<&str>) -> CliResult<()> {
    let raw = level
        .map(str::to_string)
        .or_else(|| env::var(LOG_ENV).ok())
        .filter(|raw| !raw.trim().is_empty());
    let filter = match raw {
        Some(raw) => LevelFilter::from_str(raw.trim())
            .map_err(|_| format!("unknown log level '{}'", raw))?,
        None => LevelFilter::Warn,
    };
    // A logger may already be installed when embedded; keep going without ours.
    let _ = TermLogger::init(
        filter,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
    Ok(())
}

/// A form definition loaded from disk, ready to hand to the component.
struct LoadedForm {
    spec: FormSpec,
    config_json: String,
}

impl LoadedForm {
    fn id(&self) -> &str {
        &self.spec.id
    }
}

fn load_form(path: &Path) -> CliResult<LoadedForm> {
    let contents = fs::read_to_string(path)?;
    match import_document(&contents)? {
        ImportedDocument::Form(spec) => {
            log::debug!("loaded form '{}' from {}", spec.id, path.display());
            // Normalized so a generated form id reaches the component too.
            let config_json = json!({ "form_spec_json": export_form(&spec)? }).to_string();
            Ok(LoadedForm { spec, config_json })
        }
        ImportedDocument::Field(field) => Err(format!(
            "{} holds a single field ('{}'), not a form",
            path.display(),
            field.id
        )
        .into()),
    }
}

fn read_state(path: Option<&Path>) -> CliResult<String> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => Ok("{}".to_string()),
    }
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn run_evaluate(spec_path: PathBuf, data_path: Option<PathBuf>) -> CliResult<()> {
    let form = load_form(&spec_path)?;
    let state = read_state(data_path.as_deref())?;
    let result = parse_component_result(&form_evaluate(form.id(), &form.config_json, &state))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_preview(spec_path: PathBuf, data_path: Option<PathBuf>, format: RenderMode) -> CliResult<()> {
    let form = load_form(&spec_path)?;
    let state = read_state(data_path.as_deref())?;
    match format {
        RenderMode::Text => {
            let text = render_text(form.id(), &form.config_json, &state);
            // Failures come back as a JSON error object instead of text.
            if text.starts_with('{') {
                parse_component_result(&text)?;
            }
            println!("{}", text);
        }
        RenderMode::Json => {
            let ui = parse_component_result(&render_json_ui(form.id(), &form.config_json, &state))?;
            println!("{}", serde_json::to_string_pretty(&ui)?);
        }
    }
    Ok(())
}

fn run_validate(spec_path: PathBuf, data_path: PathBuf) -> CliResult<()> {
    let form = load_form(&spec_path)?;
    let state = fs::read_to_string(data_path)?;
    let response = parse_component_result(&validate_entry(form.id(), &form.config_json, &state))?;
    let result: ValidationResult = serde_json::from_value(response)?;
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!("  {} - {}", error.field_id, error.message);
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required fields: {}",
            result.missing_required.join(", ")
        );
    }
}

fn run_submit(spec_path: PathBuf, data_path: PathBuf) -> CliResult<()> {
    let form = load_form(&spec_path)?;
    let state = fs::read_to_string(data_path)?;
    let response = parse_component_result(&submit(form.id(), &form.config_json, &state))?;
    if response["status"] == "error" {
        print_validation_errors(&gather_validation_details(&response));
        return Err("submission rejected".into());
    }
    if let Some(confirmation) = response["confirmation"].as_str() {
        println!("{}", confirmation);
    }
    println!("{}", serde_json::to_string_pretty(&response["submission"])?);
    Ok(())
}

fn run_import(input: PathBuf, out: Option<PathBuf>, fresh_id: bool) -> CliResult<()> {
    let contents = fs::read_to_string(&input)?;
    let mut document = import_document(&contents)?;
    if fresh_id {
        document = document.with_fresh_id();
    }
    let (summary, normalized) = match document {
        ImportedDocument::Form(spec) => (
            format!(
                "Imported form '{}' ({} pages, {} fields)",
                spec.id,
                spec.pages.len(),
                spec.fields().count()
            ),
            export_form(&spec)?,
        ),
        ImportedDocument::Field(field) => (
            format!("Imported field '{}' ({})", field.id, field.kind.as_str()),
            export_field(&field)?,
        ),
    };
    println!("{}", summary);
    match out {
        Some(path) => {
            fs::write(&path, &normalized)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", normalized),
    }
    Ok(())
}

fn run_schema(
    kind: SchemaKind,
    spec_path: Option<PathBuf>,
    data_path: Option<PathBuf>,
) -> CliResult<()> {
    let schema = match kind {
        SchemaKind::Form => form_definition_schema(),
        SchemaKind::Submission => submission_schema(),
        SchemaKind::Entry => {
            let spec_path = spec_path.ok_or("--spec is required for entry schemas")?;
            let form = load_form(&spec_path)?;
            let state = read_state(data_path.as_deref())?;
            parse_component_result(&get_entry_schema(form.id(), &form.config_json, &state))?
        }
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

struct FillArgs {
    spec: PathBuf,
    data: Option<PathBuf>,
    resume: Option<PathBuf>,
    code: Option<String>,
    draft_out: Option<PathBuf>,
    verbose: bool,
    submission_json: bool,
    format: RenderMode,
}

fn run_fill(args: FillArgs) -> CliResult<()> {
    let FillArgs {
        spec: spec_path,
        data: data_path,
        resume: resume_path,
        code,
        draft_out,
        verbose,
        submission_json,
        format,
    } = args;
    let form = load_form(&spec_path)?;

    // The draft being continued; `save` writes back into it.
    let mut resumed_draft: Option<String> = None;
    let mut state = match resume_path {
        Some(path) => {
            let draft = fs::read_to_string(path)?;
            let raw = match code.as_deref() {
                Some(code) => resume_draft_with_code(form.id(), &form.config_json, &draft, code),
                None => resume_draft(form.id(), &form.config_json, &draft),
            };
            let resumed = parse_component_result(&raw)?;
            if let Some(id) = resumed["draft_id"].as_str() {
                println!("Resuming draft {}", id);
            }
            resumed_draft = Some(draft);
            json!({ "data": resumed["data"], "visibility": resumed["visibility"] })
        }
        None => serde_json::from_str(&read_state(data_path.as_deref())?)?,
    };

    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), submission_json);
    let mut skipped: Vec<String> = Vec::new();

    loop {
        let state_str = state.to_string();
        let ui_raw = render_json_ui(form.id(), &form.config_json, &state_str);
        let ui = parse_component_result(&ui_raw)?;
        if let RenderMode::Json = format {
            println!("JSON UI:\n{}", ui_raw);
        }
        let payload =
            WizardPayload::from_json(&ui).map_err(|err| format!("wizard UI error: {}", err))?;
        presenter.show_header(&payload);
        presenter.show_status(&payload);

        let field_id = match payload.next_unanswered(&skipped) {
            Some(field) => field.id.clone(),
            None => {
                let response =
                    parse_component_result(&submit(form.id(), &form.config_json, &state_str))?;
                if response["status"] == "submitted" {
                    presenter.show_completion(&response);
                    break;
                }
                let details = gather_validation_details(&response);
                print_validation_errors(&details);
                let retry = details
                    .offending_fields()
                    .into_iter()
                    .find(|id| {
                        payload
                            .field(id)
                            .is_some_and(|field| field.visible && field.kind.is_promptable())
                    })
                    .ok_or("the form cannot be completed from this shell")?;
                skipped.retain(|id| id != &retry);
                retry
            }
        };

        let field = payload
            .field(&field_id)
            .ok_or_else(|| format!("wizard payload missing field '{}'", field_id))?;
        let prompt = PromptContext::new(field, &payload.progress);
        let answer = match prompt_field(&prompt, field, &presenter)? {
            PromptOutcome::Answer(value) => value,
            PromptOutcome::Save => {
                return save_draft_to(
                    &form,
                    &state_str,
                    resumed_draft.as_deref(),
                    draft_out.as_deref(),
                );
            }
        };
        if answer.is_null() {
            skipped.push(field_id.clone());
        }

        let value_json = serde_json::to_string(&answer)?;
        let response = parse_component_result(&set_value(
            form.id(),
            &form.config_json,
            &state_str,
            &field_id,
            &value_json,
        ))?;
        log::debug!(
            "'{}' settled after {} passes (changed: {})",
            field_id,
            response["passes"],
            response["changed"]
        );
        state = json!({ "data": response["data"], "visibility": response["visibility"] });
    }

    Ok(())
}

fn save_draft_to(
    form: &LoadedForm,
    state: &str,
    existing: Option<&str>,
    out: Option<&Path>,
) -> CliResult<()> {
    let raw = match existing {
        Some(draft) => update_draft(form.id(), &form.config_json, draft, state),
        None => save_draft(form.id(), &form.config_json, state),
    };
    let draft = parse_component_result(&raw)?;
    let id = draft["id"].as_str().unwrap_or("<unknown>").to_string();
    let pretty = serde_json::to_string_pretty(&draft)?;
    match out {
        Some(path) => {
            fs::write(path, pretty)?;
            println!("Draft {} saved to {}", id, path.display());
        }
        None => println!("Draft {}:\n{}", id, pretty),
    }
    Ok(())
}

enum PromptOutcome {
    Answer(Value),
    Save,
}

fn prompt_field(
    prompt: &PromptContext,
    field: &WizardField,
    presenter: &WizardPresenter,
) -> CliResult<PromptOutcome> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("input closed before the form was completed".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("wizard aborted by user".into());
        }
        if trimmed.eq_ignore_ascii_case("save") {
            return Ok(PromptOutcome::Save);
        }

        match parse_answer(field, trimmed) {
            Ok(value) => return Ok(PromptOutcome::Answer(value)),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn parse_answer(field: &WizardField, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if field.required {
            return Err(AnswerParseError::new("This field requires an answer.", None));
        }
        return Ok(Value::Null);
    }

    match field.kind {
        FieldKind::Number => parse_number(raw),
        FieldKind::Date => parse_date(raw),
        FieldKind::SingleChoice => parse_choice(field, raw).map(Value::String),
        FieldKind::MultiChoice => parse_choices(field, raw),
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    let number = raw
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| {
            AnswerParseError::new(
                "Please enter a number.",
                Some("expected a finite number".to_string()),
            )
        })?;
    if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
        return Ok(Value::Number(Number::from(number as i64)));
    }
    Number::from_f64(number)
        .map(Value::Number)
        .ok_or_else(|| AnswerParseError::new("Please enter a finite number.", None))
}

fn parse_date(raw: &str) -> Result<Value, AnswerParseError> {
    let parts = raw.split('-').collect::<Vec<_>>();
    let well_formed = matches!(parts.as_slice(), [year, month, day]
        if year.len() == 4 && month.len() == 2 && day.len() == 2
            && parts.iter().all(|part| part.chars().all(|ch| ch.is_ascii_digit())));
    if well_formed {
        Ok(Value::String(raw.to_string()))
    } else {
        Err(AnswerParseError::new(
            "Please enter a date.",
            Some("expected YYYY-MM-DD".to_string()),
        ))
    }
}

/// Accepts a choice value, its text, or its 1-based position.
fn parse_choice(field: &WizardField, raw: &str) -> Result<String, AnswerParseError> {
    let by_index = raw
        .parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| field.choices.get(index));
    let found = by_index.or_else(|| {
        field.choices.iter().find(|(value, text)| {
            value.eq_ignore_ascii_case(raw) || text.eq_ignore_ascii_case(raw)
        })
    });
    match found {
        Some((value, _)) => Ok(value.clone()),
        None => {
            let allowed = field.choice_values().join(", ");
            Err(AnswerParseError::new(
                format!("Choose one of: {}.", allowed),
                Some(format!("allowed values: {}", allowed)),
            ))
        }
    }
}

fn parse_choices(field: &WizardField, raw: &str) -> Result<Value, AnswerParseError> {
    let mut selected: Vec<Value> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let value = Value::String(parse_choice(field, part)?);
        if !selected.contains(&value) {
            selected.push(value);
        }
    }
    Ok(Value::Array(selected))
}

struct ValidationDetails {
    errors: Vec<(String, String)>,
    missing_required: Vec<String>,
}

impl ValidationDetails {
    fn offending_fields(&self) -> Vec<String> {
        let mut ids = self.missing_required.clone();
        for (id, _) in &self.errors {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

fn gather_validation_details(response: &Value) -> ValidationDetails {
    let validation = response.get("validation");

    let errors = validation
        .and_then(|value| value.get("errors"))
        .and_then(Value::as_array)
        .map(|array| {
            array
                .iter()
                .map(|error| {
                    let field_id = error
                        .get("field_id")
                        .and_then(Value::as_str)
                        .unwrap_or("<unknown>")
                        .to_string();
                    let message = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("validation failed")
                        .to_string();
                    (field_id, message)
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let missing_required = validation
        .and_then(|value| value.get("missing_required"))
        .and_then(Value::as_array)
        .map(|array| {
            array
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    ValidationDetails {
        errors,
        missing_required,
    }
}

fn print_validation_errors(details: &ValidationDetails) {
    if !details.errors.is_empty() {
        eprintln!("Validation errors:");
        for (field_id, message) in &details.errors {
            eprintln!("  {}: {}", field_id, message);
        }
    }

    if !details.missing_required.is_empty() {
        eprintln!(
            "Missing required fields: {}",
            details.missing_required.join(", ")
        );
    }
}
