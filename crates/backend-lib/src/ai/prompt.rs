// ============================
// backend-lib/src/ai/prompt.rs
// ============================
//! Prompt assembly for the completion backend.
//!
//! Queries are classified before rendering: a query that asks for a code
//! change gets an addendum instructing the model to return the complete
//! modified file in a fenced block, which is what suggestion extraction
//! looks for afterwards.
use coderoom_common::AiContext;
use serde_json::Value;

/// A query containing any of these asks for a code change.
const MODIFICATION_KEYWORDS: &[&str] = &[
    "change",
    "modify",
    "update",
    "fix",
    "refactor",
    "add",
    "remove",
    "edit",
    "improve",
    "optimize",
    "implement",
    "create function",
    "create class",
    "add feature",
    "bug fix",
];

/// Case-insensitive substring match against the keyword table.
pub fn requires_code_modification(query: &str) -> bool {
    let lowered = query.to_lowercase();
    MODIFICATION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Renders the shared-session context into labelled sections. Absent
/// fields produce no section at all.
pub fn render_context(context: &AiContext) -> String {
    let mut rendered = String::new();

    if let Some(file) = &context.current_file {
        rendered.push_str(&format!(
            "\n### Current File: {} ({})\n```{}\n{}\n```\n",
            file.name, file.language, file.language, file.content
        ));
    }

    if let Some(structure) = &context.file_structure {
        let listing = match structure {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        };
        rendered.push_str(&format!("\n### File Structure:\n{listing}\n"));
    }

    if let Some(drawing) = &context.drawing_context {
        rendered.push_str(&format!("\n### Drawing/Diagram Context:\n{drawing}\n"));
    }

    if let Some(history) = &context.chat_history {
        if !history.is_empty() {
            rendered.push_str("\n### Recent Chat History:\n");
            for line in history {
                rendered.push_str(&format!("{}: {}\n", line.username, line.message));
            }
        }
    }

    rendered
}

/// Full prompt for a room query: persona, rendered context, the query
/// itself, and the modification addendum when one is warranted.
pub fn build_query_prompt(query: &str, context: &AiContext, wants_modification: bool) -> String {
    let rendered = render_context(context);
    let mut prompt = format!(
        "You are an expert AI coding assistant integrated into a collaborative code editor. You have access to:
- The current code file being edited
- The entire file structure of the project
- Any drawings or diagrams created by users
- Recent chat history between collaborators

Your role is to:
1. Analyze code and provide helpful suggestions
2. Explain code concepts clearly
3. Help debug issues
4. Suggest improvements and optimizations
5. When asked to modify code, provide complete, working code suggestions

{rendered}

User Query: {query}
"
    );

    if wants_modification && context.current_file.is_some() {
        prompt.push_str(
            "\n\nIMPORTANT: The user wants to modify the code. Provide:
1. A clear explanation of what changes you're making
2. The complete modified code in a code block with the language specified
3. Make sure the code is production-ready and follows best practices\n",
        );
    }

    prompt
}

/// Prompt for the standalone code-analysis endpoint.
pub fn build_analyze_prompt(code: &str, language: &str, file_name: &str) -> String {
    format!(
        "Analyze the following {language} code from {file_name} and provide:
1. Potential bugs or issues
2. Security concerns
3. Performance optimization suggestions
4. Code quality improvements

```{language}
{code}
```
"
    )
}

/// Prompt for the standalone code-generation endpoint.
pub fn build_generate_prompt(description: &str, language: &str, extra_context: Option<&str>) -> String {
    let context_block = extra_context
        .map(|ctx| format!("Additional context:\n{ctx}\n\n"))
        .unwrap_or_default();
    format!(
        "Generate {language} code based on the following description:
{description}

{context_block}Provide clean, well-commented, production-ready code."
    )
}

/// Prompt for the standalone code-explanation endpoint.
pub fn build_explain_prompt(code: &str, language: &str) -> String {
    format!(
        "Explain the following {language} code in detail:

```{language}
{code}
```

Provide:
1. What the code does
2. How it works
3. Key concepts used
4. Any potential issues or improvements"
    )
}
