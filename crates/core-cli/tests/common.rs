use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// A project root with its own `.port` data directory, isolated per test.
pub struct TestFixture {
    _temp_dir: TempDir,
    project_root: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let project_root = temp_dir.path().to_path_buf();
        Self { _temp_dir: temp_dir, project_root }
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("port").expect("failed to find port binary");
        cmd.arg("--data-dir").arg(&self.project_root);
        cmd
    }

    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self
            .command()
            .arg("--format")
            .arg("json")
            .args(args)
            .output()
            .expect("failed to run command");
        assert!(
            output.status.success(),
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout was not valid JSON")
    }
}
