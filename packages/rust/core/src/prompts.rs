//! Prompt templates with `{placeholder}` substitution.
//!
//! Templates are plain text files named `<name>.txt`. `{{` and `}}` render as
//! literal braces. Built-in copies of every template ship with the crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use enricher_shared::{EnricherError, Result};
use regex::Regex;
use tracing::debug;

/// Address lookup prompt; placeholders `company_name`, `domain`, `country`.
pub const RETRIEVE_ADDRESS: &str = "retrieve_address";
/// Description lookup prompt; placeholders `company_name`, `domain`.
pub const CREATE_DESCRIPTION: &str = "create_description";
/// Batch enrichment prompt; placeholder `companies`.
pub const ENRICH_COMPANIES: &str = "enrich_companies";

const BUILTIN: [(&str, &str); 3] = [
    (RETRIEVE_ADDRESS, include_str!("../prompts/retrieve_address.txt")),
    (CREATE_DESCRIPTION, include_str!("../prompts/create_description.txt")),
    (ENRICH_COMPANIES, include_str!("../prompts/enrich_companies.txt")),
];

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex")
});

/// Named prompt templates, loaded once per run.
#[derive(Debug, Clone)]
pub struct PromptStore {
    templates: HashMap<String, String>,
}

impl PromptStore {
    /// The templates bundled with the crate.
    pub fn builtin() -> Self {
        Self {
            templates: BUILTIN
                .iter()
                .map(|(name, text)| ((*name).to_string(), (*text).to_string()))
                .collect(),
        }
    }

    /// Load every required template from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut templates = HashMap::new();
        for (name, _) in BUILTIN {
            let path = dir.join(format!("{name}.txt"));
            let text = std::fs::read_to_string(&path).map_err(|e| EnricherError::io(&path, e))?;
            debug!(template = name, path = %path.display(), "loaded prompt template");
            templates.insert(name.to_string(), text);
        }
        Ok(Self { templates })
    }

    /// Load from `dir` when given, otherwise use the built-ins.
    pub fn from_dir(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::load(dir),
            None => Ok(Self::builtin()),
        }
    }

    /// Replace or add a template.
    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    /// Render template `name` with `vars`.
    ///
    /// A placeholder with no matching variable is an error.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        let template = self
            .get(name)
            .ok_or_else(|| EnricherError::template(format!("unknown prompt template `{name}`")))?;
        render_template(template, vars)
            .map_err(|e| EnricherError::template(format!("prompt `{name}`: {e}")))
    }
}

impl Default for PromptStore {
    fn default() -> Self {
        Self::builtin()
    }
}

fn render_template(template: &str, vars: &[(&str, &str)]) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in TOKEN_RE.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        match caps.get(1) {
            Some(name) => {
                let value = vars
                    .iter()
                    .find(|(k, _)| *k == name.as_str())
                    .map(|(_, v)| *v)
                    .ok_or_else(|| format!("no value for placeholder {{{}}}", name.as_str()))?;
                out.push_str(value);
            }
            None => out.push_str(&whole.as_str()[..1]),
        }
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}
