//! Template registry: loads and compiles response templates from disk.
//!
//! The registry is built once at startup and is read-only afterwards, so
//! request tasks share it behind an `Arc` without synchronization.

mod engine;

pub use engine::{parse_query_string, RenderError, RequestData, Template, TemplateError};

use anyhow::Context;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Compiled, read-only set of named response templates.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    /// Walk `root` recursively and compile every file whose path contains
    /// the `filter` substring, keyed by file base name.
    ///
    /// Files that fail to read or compile are logged and skipped; the load
    /// continues. A root that cannot be walked is an error, which startup
    /// treats as fatal.
    pub fn load(root: &Path, filter: &str) -> Result<Self, anyhow::Error> {
        let mut files = Vec::new();
        collect_template_files(root, filter, &mut files)
            .with_context(|| format!("failed to walk template directory '{}'", root.display()))?;

        let mut templates = HashMap::new();
        for path in files {
            let name = match path.file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => continue,
            };
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    error!(
                        path = %path.display(),
                        error = %err,
                        "Skipping unreadable template file"
                    );
                    continue;
                }
            };
            match Template::parse(&source) {
                Ok(template) => {
                    info!(template = %name, path = %path.display(), "Compiled response template");
                    templates.insert(name, template);
                }
                Err(err) => {
                    error!(
                        path = %path.display(),
                        error = %err,
                        "Skipping template that failed to compile"
                    );
                }
            }
        }

        Ok(Self { templates })
    }

    /// Render the named template against a request.
    pub fn render(&self, name: &str, request: &RequestData) -> Result<String, RenderError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| RenderError::UnknownTemplate(name.to_string()))?;
        template.render(request)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Collect template file paths under `dir`, depth-first with sorted
/// entries so load order (and duplicate-name override) is deterministic.
fn collect_template_files(
    dir: &Path,
    filter: &str,
    files: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_template_files(&path, filter, files)?;
        } else if path.to_string_lossy().contains(filter) {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_load_compiles_matching_files() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "hello.template", "Hello");
        write_file(dir.path(), "echo.template", "${request.method} ${request.path}");
        write_file(dir.path(), "notes.txt", "not a template");

        let registry = TemplateRegistry::load(dir.path(), ".template").unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("hello.template"));
        assert!(registry.contains("echo.template"));
        assert!(!registry.contains("notes.txt"));
    }

    #[test]
    fn test_load_recurses_into_subdirectories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("api").join("v1");
        fs::create_dir_all(&nested).unwrap();
        write_file(&nested, "users.template", "users");
        write_file(dir.path(), "root.template", "root");

        let registry = TemplateRegistry::load(dir.path(), ".template").unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("users.template"));
        assert!(registry.contains("root.template"));
    }

    #[test]
    fn test_load_skips_malformed_template() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "good.template", "Hello");
        write_file(dir.path(), "bad.template", "broken ${request.path");

        let registry = TemplateRegistry::load(dir.path(), ".template").unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("good.template"));
        assert!(!registry.contains("bad.template"));
    }

    #[test]
    fn test_load_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(TemplateRegistry::load(&missing, ".template").is_err());
    }

    #[test]
    fn test_render_unknown_template() {
        let dir = TempDir::new().unwrap();
        let registry = TemplateRegistry::load(dir.path(), ".template").unwrap();
        let err = registry
            .render("ghost.template", &RequestData::default())
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownTemplate(ref name) if name == "ghost.template"));
    }

    #[test]
    fn test_render_through_registry() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "echo.template", "method=${request.method}");

        let registry = TemplateRegistry::load(dir.path(), ".template").unwrap();
        let request = RequestData {
            method: "GET".to_string(),
            ..Default::default()
        };
        assert_eq!(
            registry.render("echo.template", &request).unwrap(),
            "method=GET"
        );
    }
}
