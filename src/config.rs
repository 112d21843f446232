use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::codec::{CodecDescriptor, CodecRegistry};
use crate::directory::ProfileDirectory;
use crate::profile::ProfileConfig;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    pub version: u32,
    /// Codecs added to the built-in catalogue.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codecs: Vec<CodecDescriptor>,
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            codecs: Vec::new(),
            profiles: Vec::new(),
        }
    }
}

impl TranscodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config YAML: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn build_registry(&self) -> CodecRegistry {
        let mut registry = CodecRegistry::with_defaults();
        for codec in &self.codecs {
            registry.register(codec.clone());
        }
        registry
    }

    pub fn build_directory(&self, registry: &CodecRegistry) -> Result<ProfileDirectory> {
        let mut directory = ProfileDirectory::new();
        for (idx, profile) in self.profiles.iter().enumerate() {
            directory
                .create(profile.clone(), registry)
                .with_context(|| format!("Profile {} ('{}')", idx + 1, profile.name))?;
        }
        Ok(directory)
    }
}
