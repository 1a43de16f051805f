//! Instruction rendering for the reasoning service.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::shell::ShellDialect;

const PLANNER_TEMPLATE: &str = include_str!("../prompts/planner.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .context("register planner template")?;
        Ok(Self { env })
    }

    /// Render the planning instruction. The goal is embedded verbatim.
    pub fn render_planner(&self, goal: &str, dialect: ShellDialect) -> Result<String> {
        let template = self.env.get_template("planner")?;
        let rendered = template
            .render(context! {
                goal => goal,
                shell => dialect.name(),
                chain => dialect.chain_token(),
                shell_is_powershell => dialect == ShellDialect::PowerShell,
            })
            .context("render planner template")?;
        Ok(rendered)
    }
}
