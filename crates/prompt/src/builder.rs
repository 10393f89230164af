//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use meeple_core::{AppError, AppResult};
use serde_json::Value;

/// Build a prompt from a definition and input variables.
///
/// This function:
/// 1. Checks that every variable the definition requires is present
/// 2. Renders the system template (if any) and the user template
/// 3. Returns a `BuiltPrompt` ready for LLM execution
///
/// `variables` must be a JSON object; nested arrays and objects are available
/// to `{{#each}}` blocks.
///
/// # Example
/// ```no_run
/// use meeple_prompt::{build_prompt, PromptDefinition};
/// use serde_json::json;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let vars = json!({ "game": "monopoly", "question": "Can I build hotels?" });
/// let built = build_prompt(&def, &vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, variables: &Value) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let object = variables.as_object().ok_or_else(|| {
        AppError::Prompt(format!(
            "Variables for prompt {} must be an object",
            definition.id
        ))
    })?;

    for name in &definition.requires {
        if object.get(name).map_or(true, Value::is_null) {
            return Err(AppError::Prompt(format!(
                "Prompt {} requires variable '{}'",
                definition.id, name
            )));
        }
    }

    let handlebars = registry();

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(&handlebars, template, variables))
        .transpose()?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let user = render_template(&handlebars, &definition.template, variables)?;

    let resolved_variables = object.keys().cloned().collect();

    Ok(BuiltPrompt::new(
        system,
        user.trim_end().to_string(),
        definition.id.clone(),
        resolved_variables,
    ))
}

fn registry() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
}

/// Render a Handlebars template with variables.
fn render_template(handlebars: &Handlebars<'_>, template: &str, variables: &Value) -> AppResult<String> {
    handlebars
        .render_template(template, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
