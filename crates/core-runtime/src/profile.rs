use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use core_types::EnvironmentProfile;
use serde::{Deserialize, Serialize};

use crate::config::resolve_config_dir;
use crate::error::{Error, Result};

/// On-disk shape of `profiles.toml`: one table per profile plus a
/// `current` key naming the active one (§6.5).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ProfileFile {
    current: Option<String>,
    #[serde(default)]
    profiles: HashMap<String, EnvironmentProfile>,
}

/// CRUD and switching over environment profiles, persisted as a single
/// `profiles.toml` under the global configuration directory.
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(config_dir: &PathBuf) -> Self {
        Self {
            path: config_dir.join("profiles.toml"),
        }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(&resolve_config_dir(None)?))
    }

    fn load(&self) -> Result<ProfileFile> {
        if !self.path.exists() {
            return Ok(ProfileFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn save(&self, file: &ProfileFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(file)?)?;
        Ok(())
    }

    pub fn upsert(&self, profile: EnvironmentProfile) -> Result<()> {
        let mut file = self.load()?;
        if file.current.is_none() {
            file.current = Some(profile.name.clone());
        }
        file.profiles.insert(profile.name.clone(), profile);
        self.save(&file)
    }

    pub fn get(&self, name: &str) -> Result<Option<EnvironmentProfile>> {
        Ok(self.load()?.profiles.get(name).cloned())
    }

    pub fn list(&self) -> Result<Vec<EnvironmentProfile>> {
        Ok(self.load()?.profiles.into_values().collect())
    }

    pub fn current(&self) -> Result<Option<EnvironmentProfile>> {
        let file = self.load()?;
        match file.current {
            Some(name) => Ok(file.profiles.get(&name).cloned()),
            None => Ok(None),
        }
    }

    /// Make `name` the current profile and stamp its `last_active_at`.
    /// Idempotent: switching to the already-current profile still refreshes
    /// the timestamp, per §6.5.
    pub fn switch(&self, name: &str) -> Result<EnvironmentProfile> {
        let mut file = self.load()?;
        let profile = file
            .profiles
            .get_mut(name)
            .ok_or_else(|| Error::InvalidOperation(format!("no environment profile named '{name}'")))?;
        profile.last_active_at = Some(Utc::now());
        file.current = Some(name.to_string());
        let switched = profile.clone();
        self.save(&file)?;
        Ok(switched)
    }

    /// Find the first profile whose match rules are satisfied by this host,
    /// for `port env detect` (§6.3/§6.5).
    pub fn detect(&self) -> Result<Option<EnvironmentProfile>> {
        let hostname = hostname();
        for profile in self.list()? {
            if profile.match_rules.is_empty() {
                continue;
            }
            let matches = profile.match_rules.iter().all(|rule| match rule {
                core_types::MatchRule::Hostname { equals } => *equals == hostname,
                core_types::MatchRule::PathExists { path } => std::path::Path::new(path).exists(),
            });
            if matches {
                return Ok(Some(profile));
            }
        }
        Ok(None)
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| hostname_from_uname())
        .unwrap_or_else(|| "unknown-host".to_string())
}

#[cfg(unix)]
fn hostname_from_uname() -> Option<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return None;
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..len]).ok().map(|s| s.to_string())
}

#[cfg(not(unix))]
fn hostname_from_uname() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(name: &str) -> EnvironmentProfile {
        EnvironmentProfile {
            name: name.to_string(),
            hostname: "dev-box".to_string(),
            workspace_path: "/home/dev/workspace".to_string(),
            agent_data_path: "/home/dev/.port".to_string(),
            home_path: "/home/dev".to_string(),
            projects: HashMap::new(),
            docs_vaults: HashMap::new(),
            match_rules: vec![],
            last_active_at: None,
        }
    }

    #[test]
    fn first_profile_upserted_becomes_current() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(&dir.path().to_path_buf());
        store.upsert(sample("laptop")).unwrap();

        let current = store.current().unwrap().unwrap();
        assert_eq!(current.name, "laptop");
    }

    #[test]
    fn switch_updates_current_and_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(&dir.path().to_path_buf());
        store.upsert(sample("laptop")).unwrap();
        store.upsert(sample("server")).unwrap();

        let switched = store.switch("server").unwrap();
        assert!(switched.last_active_at.is_some());
        assert_eq!(store.current().unwrap().unwrap().name, "server");
    }

    #[test]
    fn switch_is_idempotent_for_the_already_current_profile() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(&dir.path().to_path_buf());
        store.upsert(sample("laptop")).unwrap();

        store.switch("laptop").unwrap();
        let first = store.current().unwrap().unwrap().last_active_at;
        store.switch("laptop").unwrap();
        let second = store.current().unwrap().unwrap().last_active_at;
        assert!(second >= first);
    }

    #[test]
    fn switch_unknown_profile_fails() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(&dir.path().to_path_buf());
        assert!(store.switch("ghost").is_err());
    }

    #[test]
    fn detect_matches_path_exists_rule() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(&dir.path().to_path_buf());
        let mut profile = sample("laptop");
        profile.match_rules = vec![core_types::MatchRule::PathExists {
            path: dir.path().to_string_lossy().to_string(),
        }];
        store.upsert(profile).unwrap();

        let detected = store.detect().unwrap().unwrap();
        assert_eq!(detected.name, "laptop");
    }
}
