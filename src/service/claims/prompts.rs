//! Prompts for claim extraction

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::model::ClaimTypeConfig;
use crate::model::extracted::{ExtractedClaims, response_schema};

/// Built-in claim taxonomy offered to the model
const CLAIM_TYPES: &str = r#"- statistical: Claims involving numbers, percentages, quantities
- factual: General factual statements
- temporal: Claims about dates, times, durations
- geographic: Claims about locations, places
- citation: References to other sources, quotes
- comparative: Claims comparing entities (X is larger/better than Y)
- causal: Claims about cause and effect relationships"#;

const EXTRACTION_RULES: &str = r#"## Rules

- Ignore opinions, questions, and subjective statements
- Focus only on objective, verifiable facts
- Each claim must be a complete, standalone statement
- Do not merge multiple facts into one claim
- Return an **empty claims array** if the text contains no verifiable facts"#;

const OUTPUT_FORMAT: &str = r#"## Output Format

Respond with a JSON object containing an array of claims:
{
  "claims": [
    {"text": "The claim text", "type": "statistical", "sentence_index": 0},
    {"text": "Another claim", "type": "factual", "sentence_index": 1}
  ]
}"#;

/// Build the extraction system prompt, listing any configured custom types
pub fn build_extraction_system_prompt(custom_types: &BTreeMap<String, ClaimTypeConfig>) -> String {
    let mut prompt = String::from(
        r#"You are an expert fact-checker specialized in decomposing text into atomic, verifiable claims.

## Task

1. Break down the text into individual, atomic factual claims
2. Each claim should be independently verifiable
3. Classify each claim by type
4. Preserve the original meaning and context
5. Number each claim by the position of its sentence in the original text (0-indexed)

## Claim Types

"#,
    );
    prompt.push_str(CLAIM_TYPES);

    if !custom_types.is_empty() {
        prompt.push_str("\n\n## Custom Claim Types\n");
        for (name, config) in custom_types {
            let _ = write!(prompt, "\n- {}: {}", name, config.description.trim());
            if !config.prompt_hint.trim().is_empty() {
                let _ = write!(prompt, ". {}", config.prompt_hint.trim());
            }
        }
    }

    prompt.push_str("\n\n");
    prompt.push_str(EXTRACTION_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(OUTPUT_FORMAT);
    let _ = write!(
        prompt,
        "\n\nThe object must conform to this JSON Schema:\n{}\n\nOnly respond with the JSON object, no other text.",
        response_schema::<ExtractedClaims>()
    );
    prompt
}

/// Build the extraction user prompt
pub fn build_extraction_prompt(text: &str) -> String {
    format!("Text to analyze:\n\n{}", text)
}
