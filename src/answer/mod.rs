//! Question answering over retrieved chunks: query classification, prompt
//! construction, and structured-answer parsing.

pub mod query_parser;
pub mod synthesizer;
pub mod types;

pub use query_parser::parse_query;
pub use synthesizer::generate_answer;
pub use types::{Answer, ParsedQuery, ReferencedClause};

/// Strips a Markdown code fence (with optional language tag) wrapping the
/// model's reply, leaving the JSON body.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag line, if any.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::strip_code_fences;

    #[test]
    fn plain_json_passes_through() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn fence_without_language_tag_is_unwrapped() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let fenced = "  \n```json\n{\"a\": 1}\n```  \n";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }
}
