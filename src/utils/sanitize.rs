// src/utils/sanitize.rs

use crate::error::AppError;

/// Cleans user-authored rich text before it is stored.
///
/// Whitelist-based (ammonia): formatting tags such as <b> or <code> survive,
/// while <script>, <iframe> and event-handler attributes are stripped.
/// Leading and trailing whitespace is dropped.
///
/// Attachment content is not passed through here: code snippets are stored
/// verbatim.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}

/// Cleans `input` for a column limited to `max_chars` characters.
///
/// Escaping can grow the text (`<` becomes `&lt;`), so the limit is checked
/// on the cleaned value.
pub fn clean_bounded(input: &str, max_chars: usize, field: &str) -> Result<String, AppError> {
    let cleaned = clean_html(input);
    if cleaned.chars().count() > max_chars {
        return Err(AppError::BadRequest(format!(
            "{} is too long once special characters are escaped (max {} characters)",
            field, max_chars
        )));
    }
    Ok(cleaned)
}
