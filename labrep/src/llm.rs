use anyhow::{anyhow, bail, Result};
use openai_tools::chat::request::ChatCompletion;
use openai_tools::common::message::Message;
use openai_tools::common::role::Role;
use regex::Regex;
use std::sync::LazyLock;

/// Default model to use when OPENAI_API_MODEL is not set
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

static DOCUMENTCLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\documentclass(\[.*?\])?\{.*?\}").unwrap());
static USEPACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\usepackage(\[.*?\])?\{.*?\}").unwrap());
static DOCUMENT_ENV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:begin|end)\{document\}").unwrap());
static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static NEWLINES_AFTER_ENV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\(?:begin|end)\{[^}]*\})\n+").unwrap());
static NEWLINE_BEFORE_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\\item").unwrap());
/// A `%` comment running to the end of its line; `\%` is a literal percent sign.
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\\])%[^\n]*\n").unwrap());

const CONVERSION_PROMPT: &str = r"Convert the following text to LaTeX format, but DO NOT include any LaTeX document preamble (no \documentclass, \usepackage, \begin{document}, etc). Just provide the content LaTeX commands:";

const CONVERSION_RULES: &str = r"Ensure the output uses proper LaTeX syntax like \section, \textbf, \item, etc. Do not add any document structure commands.";

const PRESERVE_RULE: &str = "Preserve the original formatting as much as possible.";

/// Check if LLM processing is available (OPENAI_API_KEY is set)
pub fn is_llm_available() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.trim().is_empty())
}

/// Returns the value of OPENAI_API_MODEL environment variable, or DEFAULT_MODEL if not set.
pub fn get_model_id() -> String {
    std::env::var("OPENAI_API_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string())
}

pub fn build_conversion_prompt(text: &str, preserve: bool) -> String {
    let mut prompt = format!("{}\n\n{}\n\n{}", CONVERSION_PROMPT, text, CONVERSION_RULES);
    if preserve {
        prompt.push('\n');
        prompt.push_str(PRESERVE_RULE);
    }
    prompt
}

/// Converts free text into a LaTeX body fragment with the configured chat model.
///
/// # Arguments
///
/// * `text` - The text to convert.
/// * `preserve` - Ask the model to keep the original formatting.
///
/// # Returns
///
/// The model's answer after [`clean_llm_latex`].
///
/// # Errors
///
/// Returns an error if `text` is empty, no API key is configured, or the request fails.
pub async fn convert_to_latex(text: &str, preserve: bool) -> Result<String> {
    if text.trim().is_empty() {
        bail!("Text is empty");
    }
    if !is_llm_available() {
        bail!("LLM conversion is not available: OPENAI_API_KEY is not set");
    }

    let model_id = get_model_id();
    tracing::info!("Converting {} chars to LaTeX with {}", text.chars().count(), model_id);
    let message = Message::from_string(Role::User, build_conversion_prompt(text, preserve));

    let mut chat = ChatCompletion::new();
    let response = chat
        .model_id(&model_id)
        .messages(vec![message])
        .temperature(0.0)
        .chat()
        .await
        .map_err(|e| anyhow!("LLM LaTeX conversion failed: {}", e))?;

    let raw = response
        .choices
        .first()
        .and_then(|c| c.message.content.as_ref())
        .and_then(|c| c.text.as_ref())
        .map(|t| t.to_string())
        .unwrap_or_default();

    Ok(clean_llm_latex(&raw))
}

/// Strips document scaffolding, comments and stray blank lines from a model answer.
pub fn clean_llm_latex(raw: &str) -> String {
    let text = raw.trim();
    let text = DOCUMENTCLASS.replace_all(text, "");
    let text = USEPACKAGE.replace_all(&text, "");
    let text = DOCUMENT_ENV.replace_all(&text, "");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    let text = NEWLINES_AFTER_ENV.replace_all(&text, "${1}");
    let text = NEWLINE_BEFORE_ITEM.replace_all(&text, r"\item");
    let text = LINE_COMMENT.replace_all(&text, "${1}\n");
    text.trim().to_string()
}
