//! Prompt material for the single summarisation call of a mixed batch.

use serde_json::Value;

/// System instruction for batch summarisation.
pub const SUMMARY_SYSTEM_INSTRUCTION: &str = r#"You are a summarizer for executed tool results.

Input:
- A JSON list named "tool_results".
- Each item has:
  - "name": tool name
  - "type": one of {"api", "prompt", "static"}
  - "content": the tool output

Rules:
1. For items where "type" == "static":
   - DO NOT change or rewrite the text.
   - DO NOT summarize it.
   - Repeat the content EXACTLY as provided. No added words.

2. For items where "type" == "api" or "prompt":
   - Present the information naturally and directly to the user.
   - If it's a joke, quote, story, or similar content: present it as-is without explanation.
   - If it's data or factual information: format it clearly for the user.
   - DO NOT add meta-commentary like "I received..." or "The API returned...".

3. Combine all results into ONE final answer:
   - Present all information in a natural, conversational way.
   - Separate different topics with a blank line.
   - Maintain the flow as if you're directly answering the user's question.

4. Output format:
   - Only natural-language text.
   - No JSON, no code blocks.
   - No preambles or explanations about where the data came from."#;

/// User prompt carrying the serialised items, in call order.
pub fn summary_prompt(items: &[Value]) -> String {
    let payload = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".into());
    format!("tool_results = {payload}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_names_the_list_and_keeps_order() {
        let prompt = summary_prompt(&[
            json!({"name": "a", "type": "static", "content": "first"}),
            json!({"name": "b", "type": "api", "content": {"t": 20}}),
        ]);
        assert!(prompt.starts_with("tool_results = ["));
        assert!(prompt.find("first").unwrap() < prompt.find("\"b\"").unwrap());
    }

    #[test]
    fn instruction_keeps_static_verbatim() {
        assert!(SUMMARY_SYSTEM_INSTRUCTION.contains("Repeat the content EXACTLY"));
    }
}
