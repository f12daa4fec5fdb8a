//! Prompt rendering for the generation adapter.
//!
//! Every prompt starts with the shared system preamble asking for bare code in
//! the configured language, followed by the operation-specific body.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");
const MODIFY_TEMPLATE: &str = include_str!("prompts/modify.md");
const FIX_TEMPLATE: &str = include_str!("prompts/fix.md");

/// Template engine wrapper around minijinja.
///
/// Template names carry no extension so nothing is HTML-escaped; code and
/// error text pass through verbatim.
pub struct PromptBuilder {
    env: Environment<'static>,
    language: String,
}

impl PromptBuilder {
    pub fn new(language: impl Into<String>) -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("generate", GENERATE_TEMPLATE)
            .expect("generate template should be valid");
        env.add_template("modify", MODIFY_TEMPLATE)
            .expect("modify template should be valid");
        env.add_template("fix", FIX_TEMPLATE)
            .expect("fix template should be valid");
        Self {
            env,
            language: language.into(),
        }
    }

    /// Prompt for a fresh generation request.
    pub fn generate(&self, request: &str) -> Result<String> {
        self.render(
            "generate",
            context! {
                language => &self.language,
                request => request,
            },
        )
    }

    /// Prompt asking for `code` to be revised per `instructions`.
    pub fn modify(&self, code: &str, instructions: &str) -> Result<String> {
        self.render(
            "modify",
            context! {
                language => &self.language,
                code => code,
                instructions => instructions,
            },
        )
    }

    /// Prompt asking for `code` to be repaired given the error it produced.
    pub fn fix(&self, description: &str, code: &str, error: &str) -> Result<String> {
        self.render(
            "fix",
            context! {
                language => &self.language,
                description => description,
                code => code,
                error => error,
            },
        )
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .with_context(|| format!("load {name} template"))?;
        template
            .render(ctx)
            .with_context(|| format!("render {name} template"))
    }
}
