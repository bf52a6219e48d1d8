use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured classification of a natural-language question, used only to
/// build a richer search string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub intent: String,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

impl ParsedQuery {
    /// The search string handed to the vector index for this query.
    pub fn search_string(&self) -> String {
        let details: Vec<String> = self
            .details
            .iter()
            .map(|(key, value)| match value.as_str() {
                Some(text) => format!("{}: {}", key, text),
                None => format!("{}: {}", key, value),
            })
            .collect();
        format!("Intent: {}. Details: {}", self.intent, details.join(", "))
    }
}

/// A clause cited in support of an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencedClause {
    #[serde(default = "default_clause_number")]
    pub clause_number: String,
    pub text: String,
    pub document_name: String,
}

fn default_clause_number() -> String {
    "N/A".to_string()
}

/// The structured decision produced for one question. Produced once,
/// returned to the caller, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub decision: String,
    pub justification: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub conditions: Option<String>,
    pub referenced_clauses: Vec<ReferencedClause>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_string_includes_intent_and_details() {
        let parsed = ParsedQuery {
            intent: "decision_check".to_string(),
            details: BTreeMap::from([
                ("age".to_string(), json!(46)),
                ("procedure".to_string(), json!("knee surgery")),
            ]),
        };

        let search = parsed.search_string();

        assert!(search.starts_with("Intent: decision_check."));
        assert!(search.contains("age: 46"));
        assert!(search.contains("procedure: knee surgery"));
    }

    #[test]
    fn answer_parses_with_optional_fields_missing() {
        let answer: Answer = serde_json::from_value(json!({
            "decision": "Information Provided",
            "justification": "The policy covers it.",
            "referenced_clauses": [
                { "text": "Clause body", "document_name": "policy.pdf" }
            ]
        }))
        .unwrap();

        assert!(answer.amount.is_none());
        assert!(answer.conditions.is_none());
        assert_eq!(answer.referenced_clauses[0].clause_number, "N/A");
    }
}
