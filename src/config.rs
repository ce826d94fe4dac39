use std::path::Path;

use anyhow::anyhow;
use config::{Config, File};
use serde::Deserialize;
use tower_lsp::lsp_types::ClientCapabilities;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Dialect of a document without section markers
    pub default_dialect: String,
    /// Built-in handlers that are not registered
    pub disabled_dialects: Vec<String>,
    pub unresolved_diagnostics: bool,
    pub hover: bool,
    /// Snippets offered at the start of a section
    pub boilerplate_completions: bool,
    pub completion_limit: usize,
    pub command_timeout_ms: u64,
    pub case_matching: Case,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum Case {
    Ignore,
    Smart,
    Respect,
}

impl Settings {
    pub fn new(root_dir: &Path, capabilities: &ClientCapabilities) -> anyhow::Result<Settings> {
        let snippets = capabilities
            .text_document
            .as_ref()
            .and_then(|it| it.completion.as_ref())
            .and_then(|it| it.completion_item.as_ref())
            .and_then(|it| it.snippet_support)
            .unwrap_or(false);

        let expanded = shellexpand::tilde("~/.config/dialect-lsp/settings");
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.dialect-lsp",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .set_default("default_dialect", "Pure")?
            .set_default("disabled_dialects", Vec::<String>::new())?
            .set_default("unresolved_diagnostics", true)?
            .set_default("hover", true)?
            .set_default("boilerplate_completions", true)?
            .set_default("completion_limit", 50)?
            .set_default("command_timeout_ms", 30_000)?
            .set_default("case_matching", "Smart")?
            .set_override_option("boilerplate_completions", (!snippets).then_some(false))?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_dialect: "Pure".to_string(),
            disabled_dialects: vec![],
            unresolved_diagnostics: true,
            hover: true,
            boilerplate_completions: true,
            completion_limit: 50,
            command_timeout_ms: 30_000,
            case_matching: Case::Smart,
        }
    }
}
