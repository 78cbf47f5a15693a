use rand::{Rng, distributions::Alphanumeric};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::data::FormData;

const RESUME_PREFIX: &str = "DRAFT-";
const RESUME_CODE_LEN: usize = 6;

/// A partial, unvalidated snapshot saved for later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    /// Shareable resume code, e.g. `DRAFT-7KQ2ZD`.
    pub id: String,
    pub form_id: String,
    pub data: FormData,
    #[serde(with = "time::serde::rfc3339")]
    #[schemars(with = "String")]
    pub updated_at: OffsetDateTime,
}

impl Draft {
    pub fn new(form_id: &str, data: FormData) -> Self {
        Self {
            id: format!("{}{}", RESUME_PREFIX, random_code(RESUME_CODE_LEN)),
            form_id: form_id.to_string(),
            data,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Replaces the saved data, keeping the resume code.
    pub fn update(&mut self, data: FormData) {
        self.data = data;
        self.updated_at = OffsetDateTime::now_utc();
    }

    pub fn matches_code(&self, code: &str) -> bool {
        self.id == normalize_resume_code(code)
    }
}

/// Accepts `DRAFT-ABC123`, `draft-abc123` or just `abc123`.
pub fn normalize_resume_code(input: &str) -> String {
    let code = input.trim().to_ascii_uppercase();
    if code.starts_with(RESUME_PREFIX) {
        code
    } else {
        format!("{}{}", RESUME_PREFIX, code)
    }
}

/// Upper-case alphanumeric code of the given length.
pub(crate) fn random_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect()
}
