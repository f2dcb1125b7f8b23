//! Prompts for claim adjudication

use std::fmt::Write;
use std::sync::LazyLock;

use crate::model::Evidence;
use crate::model::extracted::{ExtractedVerdict, response_schema};

/// System prompt for evidence-backed verification
pub static EVIDENCE_SYSTEM_PROMPT: LazyLock<String> =
    LazyLock::new(|| with_verdict_schema(EVIDENCE_INSTRUCTIONS));

/// System prompt for knowledge-only verification
pub static KNOWLEDGE_SYSTEM_PROMPT: LazyLock<String> =
    LazyLock::new(|| with_verdict_schema(KNOWLEDGE_INSTRUCTIONS));

const EVIDENCE_INSTRUCTIONS: &str = r#"You are a fact-checking expert. Analyze the claim against the provided evidence.

## Task

1. Compare the claim with each piece of evidence
2. Determine if the evidence supports, contradicts, or is neutral to the claim
3. Assign a confidence score (0-1) based on:
   - Quality and authority of sources
   - Consistency across multiple sources
   - Recency of information
   - Specificity of evidence

## Status Meanings

- verified: Evidence strongly supports the claim
- mixed: Evidence is conflicting or partially supports
- unsupported: No evidence supports the claim or evidence contradicts it

## Output Format

Respond with a JSON object:
{
  "verification_status": "verified|mixed|unsupported",
  "confidence_score": 0.0-1.0,
  "reasoning": "Brief explanation of your decision"
}"#;

const KNOWLEDGE_INSTRUCTIONS: &str = r#"You are a fact-checking expert. Analyze the claim using your training knowledge.

IMPORTANT: You are operating without external evidence sources. Base your assessment only on your training data.

## Task

1. Assess whether the claim is likely to be true based on your knowledge
2. Be conservative: if uncertain, mark as unsupported
3. Assign a confidence score (0-1); without external verification, confidence should generally be lower

## Status Meanings

- verified: You are confident the claim is factually correct
- mixed: The claim is partially correct or you have some uncertainty
- unsupported: You cannot verify the claim or believe it may be incorrect

## Output Format

Respond with a JSON object:
{
  "verification_status": "verified|mixed|unsupported",
  "confidence_score": 0.0-1.0,
  "reasoning": "Brief explanation including any caveats about relying on model knowledge"
}"#;

fn with_verdict_schema(instructions: &str) -> String {
    format!(
        "{}\n\nThe object must conform to this JSON Schema:\n{}\n\nOnly respond with the JSON object, no other text.",
        instructions,
        response_schema::<ExtractedVerdict>()
    )
}

/// Build the evidence-backed user prompt listing every evidence item
pub fn build_evidence_prompt(claim: &str, evidences: &[Evidence]) -> String {
    let mut prompt = format!("Claim: {}\n\nEvidence found:\n", claim);

    for (i, evidence) in evidences.iter().enumerate() {
        let _ = write!(
            prompt,
            "\nEvidence {}:\nSource: {} ({})\nURL: {}\nText: {}\n",
            i + 1,
            evidence.source_name,
            evidence.source_type.as_str(),
            evidence.source_url,
            evidence.snippet
        );
    }

    prompt.push_str("\nAnalyze and provide verification result.");
    prompt
}

/// Build the knowledge-only user prompt
pub fn build_knowledge_prompt(claim: &str) -> String {
    format!("Claim to verify: {}", claim)
}
