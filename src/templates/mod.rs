//! Template engine
//!
//! HTML rendering with Tera. Templates are embedded into the binary at
//! compile time so the server ships as a single executable.

use anyhow::{Context as _, Result};
use rust_embed::RustEmbed;
use tera::{Context as TeraContext, Tera};

/// Templates embedded at compile time
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Template engine wrapping a preloaded Tera instance
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Load all embedded templates.
    ///
    /// Fails when a template has a syntax error, which makes broken
    /// templates a startup error instead of a runtime 500.
    pub fn new() -> Result<Self> {
        let mut templates = Vec::new();
        for name in EmbeddedTemplates::iter() {
            let file = EmbeddedTemplates::get(&name)
                .ok_or_else(|| anyhow::anyhow!("Missing embedded template: {}", name))?;
            let content = String::from_utf8(file.data.into_owned())
                .with_context(|| format!("Template '{}' is not valid UTF-8", name))?;
            templates.push((name.to_string(), content));
        }

        let mut tera = Tera::default();
        // add_raw_templates resolves {% extends %} across the whole set
        tera.add_raw_templates(templates)
            .context("Failed to load templates")?;

        Ok(Self { tera })
    }

    /// Render a template with the given context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera
            .render(template, context)
            .with_context(|| format!("Failed to render '{}'", template))
    }

    /// Names of all loaded templates
    pub fn template_names(&self) -> Vec<&str> {
        self.tera.get_template_names().collect()
    }
}
