use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::TranscodeConfig;
use crate::profile::config_fingerprint;

#[derive(Debug, Serialize)]
pub struct ProfileLockfile {
    pub config_version: u32,
    pub generated_at: DateTime<Utc>,
    pub profiles: Vec<ProfileLock>,
}

#[derive(Debug, Serialize)]
pub struct ProfileLock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub codec: Option<String>,
    pub fingerprint: String,
}

pub fn build_lock(config: &TranscodeConfig) -> ProfileLockfile {
    let profiles = config
        .profiles
        .iter()
        .map(|profile| ProfileLock {
            id: profile.id.clone(),
            name: profile.name.clone(),
            codec: profile.codec.clone(),
            fingerprint: config_fingerprint(profile),
        })
        .collect();

    ProfileLockfile {
        config_version: config.version,
        generated_at: Utc::now(),
        profiles,
    }
}

pub fn generate_lock(config: &TranscodeConfig, path: &Path) -> Result<()> {
    let lock = build_lock(config);
    let file = File::create(path)
        .with_context(|| format!("Failed to create lockfile: {}", path.display()))?;
    serde_yaml::to_writer(file, &lock)
        .with_context(|| format!("Failed to write lockfile: {}", path.display()))?;
    Ok(())
}
