//! Prompts that ship with the binary.
//!
//! A workspace may shadow any of these by dropping a file with the same id
//! into `.meeple/prompts/`.

use crate::types::PromptDefinition;
use meeple_core::{AppError, AppResult};

/// Prompt used to answer a rules question from retrieved passages.
pub const GROUNDED_ANSWER_PROMPT_ID: &str = "rules.answer.grounded";

const GROUNDED_ANSWER_YAML: &str = r#"
id: rules.answer.grounded
title: Grounded rules answer
apiVersion: "1.0"
createdBy: meeple
requires: [game, question, passages]
system: |
  You are a helpful board game rules assistant for {{game}}.

  Rules:
  1. Only use information from the passages you are given.
  2. If the passages do not contain enough information, say so.
  3. Be clear and concise.
  4. Cite every passage you rely on by its id in square brackets, for example [{{example_id}}].
  5. If the question is about a different game than {{game}}, point that out.
  {{#if low_confidence}}

  The passages are only a weak match for this question. Answer cautiously and say what is uncertain.
  {{/if}}
template: |
  Passages from the {{game}} rulebook:

  {{#each passages}}
  [{{id}}]{{#if section}} ({{section}}){{/if}}
  {{text}}

  {{/each}}
  Question: {{question}}
"#;

/// Look up a built-in prompt by id.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<Option<PromptDefinition>> {
    let yaml = match prompt_id {
        GROUNDED_ANSWER_PROMPT_ID => GROUNDED_ANSWER_YAML,
        _ => return Ok(None),
    };

    let definition = serde_yaml::from_str(yaml).map_err(|e| {
        AppError::Prompt(format!("Built-in prompt {} is malformed: {}", prompt_id, e))
    })?;

    Ok(Some(definition))
}

/// Ids of every built-in prompt.
pub fn builtin_prompt_ids() -> &'static [&'static str] {
    &[GROUNDED_ANSWER_PROMPT_ID]
}
