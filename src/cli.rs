//! Command-line entry points besides the language server itself.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tower_lsp::lsp_types::Url;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{
    config::Settings,
    diagnostics::{document_diagnostics, Diagnostic, Severity},
    dialects::builtin_extensions,
    location::DocumentId,
    workspace::WorkspaceSnapshot,
};

#[derive(Parser, Debug)]
#[command(
    name = "dialect-lsp",
    version,
    about = "Language server for multi-dialect model documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum CliCommand {
    /// Serve the language server protocol over stdio (the default).
    Serve,
    /// Print the diagnostics of every `.pure` file under the given paths.
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Directory whose `.dialect-lsp` settings apply. Defaults to the
        /// current directory.
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckReport {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl CheckReport {
    pub fn failed(&self) -> bool {
        self.errors > 0
    }
}

/// Loads every file into one workspace, so pointers resolve across files,
/// and writes one line per diagnostic to `out`.
pub fn check(paths: &[PathBuf], settings: Settings, out: &mut impl Write) -> anyhow::Result<CheckReport> {
    let files = source_files(paths)?;
    info!(files = files.len(), "checking");

    let texts = files
        .par_iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok((document_id(path)?, text))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let extensions = builtin_extensions(&settings)?;
    let snapshot = WorkspaceSnapshot::new(Arc::new(extensions), Arc::new(settings))
        .with_documents(texts.clone());

    let per_file = texts
        .par_iter()
        .map(|(id, _)| document_diagnostics(&snapshot, id))
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = CheckReport {
        files: files.len(),
        ..CheckReport::default()
    };
    for (path, diagnostics) in files.iter().zip(per_file) {
        for diagnostic in diagnostics {
            match diagnostic.severity {
                Severity::Error => report.errors += 1,
                Severity::Warning => report.warnings += 1,
                Severity::Information | Severity::Hint => {}
            }
            writeln!(out, "{}", format_diagnostic(path, &diagnostic))?;
        }
    }

    debug!(?report, "check finished");
    Ok(report)
}

/// `*.pure` files under `paths`, sorted and without duplicates.
fn source_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).follow_links(true) {
            let entry = entry.with_context(|| format!("walking {}", path.display()))?;
            let is_source = entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "pure");
            if is_source {
                files.push(entry.into_path().canonicalize()?);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn document_id(path: &Path) -> anyhow::Result<DocumentId> {
    let uri = Url::from_file_path(path)
        .map_err(|_| anyhow!("{} is not an absolute path", path.display()))?;
    Ok(DocumentId::new(uri.as_str()))
}

/// `path:line:column: severity: message`, one-based like a compiler.
fn format_diagnostic(path: &Path, diagnostic: &Diagnostic) -> String {
    let start = diagnostic.location.interval.start();
    let severity = match diagnostic.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Information => "info",
        Severity::Hint => "hint",
    };
    format!(
        "{}:{}:{}: {severity}: {}",
        path.display(),
        start.line + 1,
        start.column + 1,
        diagnostic.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn run(paths: &[PathBuf]) -> (CheckReport, String) {
        let mut out = Vec::new();
        let report = check(paths, Settings::default(), &mut out).unwrap();
        (report, String::from_utf8(out).unwrap())
    }

    #[test]
    fn pointers_resolve_across_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("model.pure"), "Class a::Firm {}\n").unwrap();
        fs::write(
            dir.path().join("person.pure"),
            "Class a::Person\n{\n  firm: a::Firm[1];\n}\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "Class broken").unwrap();

        let (report, output) = run(&[dir.path().to_path_buf()]);

        assert_eq!(report, CheckReport { files: 2, errors: 0, warnings: 0 });
        assert!(output.is_empty());
        assert!(!report.failed());
    }

    #[test]
    fn errors_fail_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("bad.pure"), "Class a::A\n{\n  name String[1];\n}\n").unwrap();
        fs::write(dir.path().join("warn.pure"), "Class a::B { c: a::Missing[1]; }\n").unwrap();

        let (report, output) = run(&[dir.path().to_path_buf()]);

        assert_eq!(report.files, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.warnings, 1);
        assert!(report.failed());

        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("bad.pure:3:8: error: Unexpected 'String', expected ':'"));
        assert!(lines[1].contains("warn.pure:1:17: warning: Can't find"));
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();

        let result = check(&[dir.path().join("absent")], Settings::default(), &mut out);

        assert!(result.is_err());
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["dialect-lsp"]).unwrap();
        assert_eq!(cli.command, None);

        let cli = Cli::try_parse_from(["dialect-lsp", "check", "a", "b"]).unwrap();
        assert_eq!(
            cli.command,
            Some(CliCommand::Check {
                paths: vec![PathBuf::from("a"), PathBuf::from("b")],
                root: None,
            })
        );
        assert!(Cli::try_parse_from(["dialect-lsp", "check"]).is_err());
    }
}
