use serde::Serialize;
use thiserror::Error;

use crate::capture::CapturedQuery;
use crate::utils::{count_words, is_blank};

pub const MAX_TEMPLATE_WORDS: usize = 120;
pub const PROMPT_DELIMITER: &str = "\n\nText: ";

pub const DEFAULT_INSTRUCTIONS: &str = "Explain the following text in plain, factual language. \
Do not greet the reader or add conversational filler. \
Keep the explanation between 0 and 200 words. \
If the text cannot be simply explained, reply exactly with: \
\"This text cannot be simply explained.\" \
If the text is a question, answer it directly and do not ask any follow-up questions.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("custom prompt must be at most {MAX_TEMPLATE_WORDS} words (got {0})")]
    TooManyWords(usize),
}

/// Final request text sent to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn build_prompt(template: &str, query: &CapturedQuery) -> Prompt {
    let instructions = if is_blank(template) {
        DEFAULT_INSTRUCTIONS
    } else {
        template.trim()
    };

    Prompt(format!("{instructions}{PROMPT_DELIMITER}{query}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TemplateEdit {
    Accepted { text: String, word_count: usize },
    Rejected { kept: String, word_count: usize },
}

/// Applies a user edit to the instruction template. Edits that would push the
/// template over the word cap are dropped and the current text is kept.
pub fn apply_template_edit(current: &str, proposed: &str) -> TemplateEdit {
    let word_count = count_words(proposed);
    if word_count <= MAX_TEMPLATE_WORDS {
        TemplateEdit::Accepted {
            text: proposed.to_string(),
            word_count,
        }
    } else {
        TemplateEdit::Rejected {
            kept: current.to_string(),
            word_count,
        }
    }
}

pub fn validate_template(text: &str) -> Result<(), PromptError> {
    let word_count = count_words(text);
    if word_count > MAX_TEMPLATE_WORDS {
        return Err(PromptError::TooManyWords(word_count));
    }
    Ok(())
}
