//! Builds the answer prompt and parses the model's reply into a typed
//! `Answer`.
//!
//! The reply must be a single JSON object. It is validated against a JSON
//! Schema before deserialization; on a parse or validation failure the model
//! is re-prompted with the error appended, up to a bounded number of
//! attempts, after which the failure propagates.

use serde_json::{json, Value};

use super::types::Answer;
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;
use crate::retrieval::ScoredChunk;

/// One initial attempt plus this many repair re-prompts.
const MAX_REPAIR_ATTEMPTS: usize = 2;

/// Synthesizes a structured answer for `question` from the retrieved chunks.
pub async fn generate_answer(
    provider: &dyn LlmProvider,
    question: &str,
    clauses: &[ScoredChunk],
) -> Result<Answer, ApiError> {
    let prompt = build_answer_prompt(question, clauses);
    let mut request = prompt.clone();
    let mut last_err = None;

    for attempt in 0..=MAX_REPAIR_ATTEMPTS {
        let response = provider.generate(&request).await?;

        match parse_answer(&response) {
            Ok(answer) => return Ok(answer),
            Err(err) => {
                tracing::warn!(
                    "answer parse attempt {} of {} failed: {}",
                    attempt + 1,
                    MAX_REPAIR_ATTEMPTS + 1,
                    err
                );
                request = format!(
                    "{}\n\nYour previous reply could not be parsed: {}. Reply again with only the corrected JSON object.",
                    prompt, err
                );
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        ApiError::Internal("answer synthesis produced no attempts".to_string())
    }))
}

fn build_answer_prompt(question: &str, clauses: &[ScoredChunk]) -> String {
    let context: Vec<String> = clauses
        .iter()
        .map(|scored| {
            format!(
                "Document: {}\nClause {}: {}",
                scored.chunk.document_name, scored.chunk.clause_number, scored.chunk.content
            )
        })
        .collect();
    let context = context.join("\n\n---\n\n");

    format!(
        r#"You are a helpful, friendly, and conversational insurance assistant named 'PolicyQuery'.
Answer the user's question in a natural way, based ONLY on the provided context clauses, then fill out the structured JSON object.

--- High-Quality Example Start ---
User Query Example: "What is the waiting period for pre-existing diseases (PED) to be covered?"
Context Clause Example: "Clause 4.1: Pre-existing Diseases: The Company shall not be liable for any claim arising from a PED until thirty-six (36) months of continuous coverage have elapsed since the inception of the first policy. The maximum liability per claim shall be 50% of the Sum Insured."
Good JSON Output Example:
{{
    "decision": "Covered with Conditions",
    "justification": "Yes, pre-existing diseases are covered, but there's a 36-month (3 year) waiting period after your policy starts. Also, please note that claims for pre-existing diseases are limited to 50% of your total Sum Insured.",
    "amount": null,
    "conditions": "36-month waiting period. Coverage is limited to 50% of the Sum Insured.",
    "referenced_clauses": [
        {{
            "clause_number": "4.1",
            "text": "The Company shall not be liable for any claim arising from a PED until thirty-six (36) months...",
            "document_name": "policy_document.pdf"
        }}
    ]
}}
--- High-Quality Example End ---

Instructions for the real task:
1. `decision`: set to "Covered", "Not Covered", "Covered with Conditions", or "Information Provided".
2. `justification`: the most important field. Write a conversational answer directly addressing the user's question using the context. If the context mentions monetary limits, amounts, percentages, or time periods, you MUST include them here.
3. `conditions`: briefly list the key conditions or limits.
4. `referenced_clauses`: include every clause you used to form your answer.

Real Context from Policy Documents:
{context}

Real User Query: {question}

Output must be only the JSON object."#,
        context = context,
        question = question,
    )
}

/// Parses a model reply: strip code fences, parse JSON, validate against the
/// answer schema, then deserialize.
fn parse_answer(response: &str) -> Result<Answer, ApiError> {
    let cleaned = super::strip_code_fences(response);

    let value: Value = serde_json::from_str(cleaned).map_err(|err| {
        ApiError::Upstream(format!("model output is not valid JSON: {}", err))
    })?;

    let validator = jsonschema::validator_for(&answer_schema()).map_err(ApiError::internal)?;
    if let Err(error) = validator.validate(&value) {
        return Err(ApiError::Upstream(format!(
            "model output failed schema validation: {}",
            error
        )));
    }

    serde_json::from_value(value).map_err(ApiError::internal)
}

fn answer_schema() -> Value {
    json!({
        "type": "object",
        "required": ["decision", "justification", "referenced_clauses"],
        "properties": {
            "decision": { "type": "string" },
            "justification": { "type": "string" },
            "amount": { "type": ["number", "null"] },
            "conditions": { "type": ["string", "null"] },
            "referenced_clauses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["text", "document_name"],
                    "properties": {
                        "clause_number": { "type": "string" },
                        "text": { "type": "string" },
                        "document_name": { "type": "string" }
                    }
                }
            }
        }
    })
}
