use serde_json::Value;

/// System prompt for the recipe extraction call.
///
/// Loaded from `prompt.txt` at compile time so it can be edited without
/// dealing with Rust string syntax.
pub const EXTRACTION_SYSTEM_PROMPT: &str = include_str!("prompt.txt");

/// What to pull out of each chunk.
pub const EXTRACTION_INSTRUCTION: &str = "Extract the name of the recipe, the ingredients \
(with original measurements, e.g. 1 TBSP, 2 cups), and the recipe steps in order. Remove any \
unrelated content (author notes, introductions, ads, reader comments). Ensure clarity and \
conciseness. If no valid ingredients or instructions are found, return: No recipe data found.";

/// User message for one chunk: instruction, target schema and the chunk text.
pub fn build_user_prompt(
    chunk: &str,
    schema: &Value,
    instruction: &str,
    chunk_index: usize,
    chunk_count: usize,
) -> String {
    let schema = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    let position = if chunk_count > 1 {
        format!(
            "\nThis is part {} of {} of the page; extract only what appears in this part.\n",
            chunk_index + 1,
            chunk_count
        )
    } else {
        String::new()
    };

    format!(
        "<request>\n{instruction}\n</request>\n\n<schema>\n{schema}\n</schema>\n{position}\n<content>\n{chunk}\n</content>"
    )
}
