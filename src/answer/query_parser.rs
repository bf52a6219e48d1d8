//! LLM-backed query classification.

use super::types::ParsedQuery;
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

const CLASSIFY_PROMPT: &str = r#"You are an assistant for an insurance document query system. Parse the user's query into a structured JSON object. Do not output anything other than the JSON object.

Classify the user's intent and extract all relevant entities. The possible intents are:
- "coverage_check": the user wants to know whether something is covered.
- "condition_retrieval": the user is asking about specific conditions, waiting periods, or rules.
- "definition_lookup": the user is asking for the definition of a term.
- "decision_check": a shorthand query with key-value pairs that requires a decision.

Extract entities such as: age, gender, location, procedure, policy_duration, disease.

Example:
Query: "46M, knee surgery, Pune, 3-month policy"
Output:
{
    "intent": "decision_check",
    "details": {
        "age": 46,
        "gender": "male",
        "procedure": "knee surgery",
        "location": "Pune",
        "policy_duration": "3 months"
    }
}"#;

/// Classifies `question` into a `ParsedQuery` with one generation call.
/// A reply that is not the expected JSON shape fails the query.
pub async fn parse_query(
    provider: &dyn LlmProvider,
    question: &str,
) -> Result<ParsedQuery, ApiError> {
    let prompt = format!("{}\n\nQuery: \"{}\"", CLASSIFY_PROMPT, question);
    let response = provider.generate(&prompt).await?;

    let cleaned = super::strip_code_fences(&response);
    serde_json::from_str(cleaned).map_err(|err| {
        ApiError::Upstream(format!("query classification was not valid JSON: {}", err))
    })
}
