use serde_json::Value;

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: status, visible fields, parse expectations.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and summaries as the fill loop advances.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_submission_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_submission_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_submission_json,
        }
    }

    pub fn show_header(&mut self, payload: &WizardPayload) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", payload.form_title);
        if self.verbosity.is_verbose()
            && let Some(help) = &payload.help
        {
            println!("Help: {}", help);
        }
        self.header_printed = true;
    }

    pub fn show_status(&self, payload: &WizardPayload) {
        if !self.verbosity.is_verbose() {
            return;
        }
        println!(
            "Status: {} ({}/{})",
            payload.status, payload.progress.answered, payload.progress.total
        );
        println!("Visible fields:");
        for field in payload.fields.iter().filter(|field| field.visible) {
            let mut entry = format!(" - {} ({})", field.id, field.label);
            if field.required {
                entry.push_str(" [required]");
            }
            println!("{}", entry);
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.label)
        } else {
            format!("{} {}", prompt.index, prompt.label)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
        if self.verbosity.is_verbose()
            && let Some(placeholder) = &prompt.placeholder
        {
            println!("e.g. {}", placeholder);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_completion(&self, response: &Value) {
        println!("Done ✅");
        if let Some(confirmation) = response.get("confirmation").and_then(Value::as_str) {
            println!("{}", confirmation);
        }
        if let Some(id) = response
            .get("submission")
            .and_then(|submission| submission.get("id"))
            .and_then(Value::as_str)
        {
            println!("Entry: {}", id);
        }
        if self.show_submission_json
            && let Some(submission) = response.get("submission")
        {
            match serde_json::to_string_pretty(submission) {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize submission to JSON: {}", err),
            }
        }
    }
}

/// Render payload extracted from the component output.
pub struct WizardPayload {
    pub form_title: String,
    pub help: Option<String>,
    pub status: String,
    pub progress: RenderProgress,
    pub fields: Vec<WizardField>,
}

impl WizardPayload {
    pub fn from_json(json: &Value) -> Result<Self, String> {
        let form_title = json
            .get("form_title")
            .and_then(Value::as_str)
            .ok_or_else(|| "wizard payload missing form_title".to_string())?
            .to_string();
        let help = json
            .get("help")
            .and_then(Value::as_str)
            .map(|value| value.to_string());
        let status = json
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("need_input")
            .to_string();
        let progress = json
            .get("progress")
            .and_then(Value::as_object)
            .ok_or_else(|| "wizard payload missing progress".to_string())?;
        let answered = progress
            .get("answered")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        let total = progress.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;
        let fields = json
            .get("pages")
            .and_then(Value::as_array)
            .ok_or_else(|| "wizard payload missing pages".to_string())?
            .iter()
            .flat_map(|page| {
                page.get("fields")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default()
            })
            .map(|field| WizardField::from_json(&field))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            form_title,
            help,
            status,
            progress: RenderProgress { answered, total },
            fields,
        })
    }

    pub fn field(&self, id: &str) -> Option<&WizardField> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// First visible field still waiting for input that is not in `skipped`.
    pub fn next_unanswered<'a>(&'a self, skipped: &[String]) -> Option<&'a WizardField> {
        self.fields.iter().find(|field| {
            field.visible
                && field.kind.is_promptable()
                && !field.answered
                && !skipped.contains(&field.id)
        })
    }
}

/// Progress counters from the render payload.
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// Minimal view of a field used for rendering prompts.
pub struct WizardField {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub visible: bool,
    pub answered: bool,
    pub choices: Vec<(String, String)>,
}

impl WizardField {
    fn from_json(value: &Value) -> Result<Self, String> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| "field missing id".to_string())?
            .to_string();
        let label = value
            .get("label")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("field '{}' missing label", id))?
            .to_string();
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(|value| value.to_string())
        };
        let answered = match value.get("current_value") {
            None | Some(Value::Null) => false,
            Some(Value::String(text)) => !text.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        };
        let choices = value
            .get("choices")
            .and_then(Value::as_array)
            .map(|choices| {
                choices
                    .iter()
                    .filter_map(|choice| {
                        let value = choice.get("value").and_then(Value::as_str)?;
                        let text = choice.get("text").and_then(Value::as_str).unwrap_or(value);
                        Some((value.to_string(), text.to_string()))
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(Self {
            label,
            description: text("description"),
            placeholder: text("placeholder"),
            kind: FieldKind::from_label(value.get("type").and_then(Value::as_str).unwrap_or("text")),
            required: value
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            visible: value.get("visible").and_then(Value::as_bool).unwrap_or(true),
            answered,
            choices,
            id,
        })
    }

    pub fn choice_values(&self) -> Vec<&str> {
        self.choices.iter().map(|(value, _)| value.as_str()).collect()
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub label: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
}

impl PromptContext {
    pub fn new(field: &WizardField, progress: &RenderProgress) -> Self {
        Self {
            index: (progress.answered + 1).max(1),
            total: progress.total,
            label: field.label.clone(),
            description: field.description.clone(),
            placeholder: field.placeholder.clone(),
            required: field.required,
            hint: field.kind.hint(&field.choice_values()),
        }
    }
}

/// How the wizard reads an answer for a field type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Email,
    Date,
    SingleChoice,
    MultiChoice,
    Layout,
    Calculated,
    Unsupported,
}

impl FieldKind {
    pub fn from_label(label: &str) -> Self {
        match label {
            "text" | "textarea" => FieldKind::Text,
            "number" => FieldKind::Number,
            "email" => FieldKind::Email,
            "date" => FieldKind::Date,
            "select" | "radio" | "quiz" | "poll" | "survey" => FieldKind::SingleChoice,
            "checkbox" => FieldKind::MultiChoice,
            "section" | "page_break" => FieldKind::Layout,
            "calculation" => FieldKind::Calculated,
            _ => FieldKind::Unsupported,
        }
    }

    /// Whether the person filling the form types a value for this kind.
    pub fn is_promptable(&self) -> bool {
        !matches!(
            self,
            FieldKind::Layout | FieldKind::Calculated | FieldKind::Unsupported
        )
    }

    fn hint(&self, choices: &[&str]) -> Option<String> {
        match self {
            FieldKind::Number => Some("(number)".to_string()),
            FieldKind::Email => Some("(email)".to_string()),
            FieldKind::Date => Some("(YYYY-MM-DD)".to_string()),
            FieldKind::SingleChoice if !choices.is_empty() => {
                Some(format!("({})", choices.join("/")))
            }
            FieldKind::MultiChoice if !choices.is_empty() => {
                Some(format!("(comma-separated: {})", choices.join("/")))
            }
            _ => None,
        }
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}
