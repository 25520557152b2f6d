use std::fs;
use std::path::PathBuf;

use core_types::{DomainError, DomainErrorKind, Port};
use regex::Regex;

use crate::error::Result;

fn io_err(err: std::io::Error) -> DomainError {
    DomainError::with_source(DomainErrorKind::IoError, "rules activator filesystem operation failed", err)
}

/// Materializes and tears down the per-port prompt artifact a running port
/// needs in its working directory.
///
/// An artifact is a single Markdown file named `<port-id>.md` inside the
/// project's rules directory, carrying a YAML preamble and the port's
/// checklist extracted from its spec file.
pub struct RulesActivator {
    rules_dir: PathBuf,
}

impl RulesActivator {
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            rules_dir: rules_dir.into(),
        }
    }

    fn artifact_path(&self, port_id: &str) -> PathBuf {
        self.rules_dir.join(format!("{port_id}.md"))
    }

    /// Write the active-rules artifact for `port` entering `running`.
    /// Never fails on a missing or unparseable spec file — the artifact is
    /// simply written with metadata only.
    pub fn activate(&self, port: &Port) -> Result<PathBuf> {
        fs::create_dir_all(&self.rules_dir).map_err(io_err)?;

        let spec_text = port
            .file
            .as_ref()
            .and_then(|path| fs::read_to_string(path).ok());

        let objective = spec_text.as_deref().and_then(extract_first_objective);
        let checklist = spec_text
            .as_deref()
            .map(extract_checklist)
            .unwrap_or_default();

        let mut body = String::new();
        body.push_str("paths:\n");
        body.push_str(&format!("  - {}\n", port.file.clone().unwrap_or_default()));
        body.push_str("---\n\n");
        body.push_str(&format!("# {}\n\n", port.title));
        if let Some(objective) = objective {
            body.push_str(&format!("## {objective}\n\n"));
        }
        if !checklist.is_empty() {
            body.push_str("## Checklist\n\n");
            for item in &checklist {
                body.push_str(&format!("- [ ] {item}\n"));
            }
        }

        let path = self.artifact_path(&port.id);
        fs::write(&path, body).map_err(io_err)?;
        Ok(path)
    }

    /// Remove the artifact for a port leaving `running`. A missing artifact
    /// is not an error.
    pub fn deactivate(&self, port_id: &str) -> Result<()> {
        let path = self.artifact_path(port_id);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(err)),
        }
    }

    /// Reconcile the rules directory against the given set of currently
    /// running ports: write any missing artifact, delete any stale one.
    pub fn sync(&self, running: &[Port]) -> Result<()> {
        fs::create_dir_all(&self.rules_dir).map_err(io_err)?;
        let wanted: std::collections::HashSet<&str> =
            running.iter().map(|p| p.id.as_str()).collect();

        if let Ok(entries) = fs::read_dir(&self.rules_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if !wanted.contains(stem) {
                    let _ = fs::remove_file(&path);
                }
            }
        }

        for port in running {
            self.activate(port)?;
        }
        Ok(())
    }
}

fn extract_first_objective(spec_text: &str) -> Option<String> {
    let heading = Regex::new(r"(?m)^#{1,6}\s+(.+)$").ok()?;
    heading
        .captures(spec_text)
        .map(|c| c[1].trim().to_string())
}

fn extract_checklist(spec_text: &str) -> Vec<String> {
    let item = Regex::new(r"(?m)^\s*-\s*\[ \]\s*(.+)$").unwrap();
    item.captures_iter(spec_text)
        .map(|c| c[1].trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PortStatus;

    fn sample_port(file: Option<String>) -> Port {
        Port {
            id: "p1".to_string(),
            title: "implement parser".to_string(),
            file,
            status: PortStatus::Running,
            pipeline_id: None,
            linked_session_id: None,
            estimated_tokens: None,
            estimated_cost: None,
            estimated_duration_secs: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn activate_writes_checklist_from_spec_file() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("spec.md");
        fs::write(
            &spec_path,
            "# Implement the parser\n\nSome prose.\n\n- [ ] tokenize input\n- [ ] build AST\n",
        )
        .unwrap();

        let activator = RulesActivator::new(dir.path().join("rules"));
        let port = sample_port(Some(spec_path.to_string_lossy().to_string()));
        let artifact = activator.activate(&port).unwrap();

        let contents = fs::read_to_string(artifact).unwrap();
        assert!(contents.contains("tokenize input"));
        assert!(contents.contains("build AST"));
    }

    #[test]
    fn activate_with_missing_spec_still_writes_metadata_only() {
        let dir = tempfile::tempdir().unwrap();
        let activator = RulesActivator::new(dir.path().join("rules"));
        let port = sample_port(Some("/nonexistent/spec.md".to_string()));
        let artifact = activator.activate(&port).unwrap();
        assert!(artifact.exists());
    }

    #[test]
    fn deactivate_missing_artifact_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let activator = RulesActivator::new(dir.path().join("rules"));
        activator.deactivate("never-existed").unwrap();
    }

    #[test]
    fn sync_removes_stale_and_writes_missing() {
        let dir = tempfile::tempdir().unwrap();
        let activator = RulesActivator::new(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("stale.md"), "old").unwrap();

        let port = sample_port(None);
        activator.sync(&[port]).unwrap();

        assert!(!dir.path().join("stale.md").exists());
        assert!(dir.path().join("p1.md").exists());
    }
}
