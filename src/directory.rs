use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::CodecRegistry;
use crate::error::{TranscodeError, TranscodeResult};
use crate::media::MediaKind;
use crate::profile::{COPY_PROFILE_NAME, CodecProfile, ProfileConfig, ProfileId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub id: ProfileId,
    pub name: String,
}

/// Every configured codec profile, in registration order. The copy profile
/// is always present and always first.
///
/// Lookups take `&self`; mutation takes `&mut self`, so owners that share the
/// directory serialize writers themselves (e.g. behind an `RwLock`).
#[derive(Debug)]
pub struct ProfileDirectory {
    profiles: Vec<Arc<CodecProfile>>,
}

impl Default for ProfileDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileDirectory {
    pub fn new() -> Self {
        Self {
            profiles: vec![Arc::new(CodecProfile::copy())],
        }
    }

    pub fn copy_profile(&self) -> Arc<CodecProfile> {
        Arc::clone(&self.profiles[0])
    }

    /// Register a profile. An unresolvable codec only disables the profile.
    pub fn create(
        &mut self,
        config: ProfileConfig,
        registry: &CodecRegistry,
    ) -> TranscodeResult<Arc<CodecProfile>> {
        if config.name == COPY_PROFILE_NAME {
            return Err(TranscodeError::ReservedName(config.name));
        }
        if let Some(id) = config.id.as_deref()
            && self.get(&ProfileId::new(id)).is_some()
        {
            return Err(TranscodeError::DuplicateProfile(id.to_string()));
        }

        let profile = Arc::new(CodecProfile::from_config(config));
        warn_if_disabled(&profile, registry);
        info!(
            profile = profile.name(),
            id = %profile.id(),
            codec = profile.codec_name().unwrap_or("-"),
            "Codec profile registered"
        );
        self.profiles.push(Arc::clone(&profile));
        Ok(profile)
    }

    /// Replace a profile's configuration, keeping its identity and position.
    /// Streams already holding the old profile keep using it.
    pub fn update(
        &mut self,
        id: &ProfileId,
        config: ProfileConfig,
        registry: &CodecRegistry,
    ) -> TranscodeResult<Arc<CodecProfile>> {
        if config.name == COPY_PROFILE_NAME {
            return Err(TranscodeError::ReservedName(config.name));
        }
        let position = self.position(id)?;
        let current = &self.profiles[position];
        let next = Arc::new(current.updated(config));
        if next.fingerprint() == current.fingerprint() {
            debug!(profile = next.name(), "Codec profile unchanged");
        } else {
            info!(profile = next.name(), id = %id, "Codec profile updated");
        }
        warn_if_disabled(&next, registry);
        self.profiles[position] = Arc::clone(&next);
        Ok(next)
    }

    pub fn delete(&mut self, id: &ProfileId) -> TranscodeResult<Arc<CodecProfile>> {
        let position = self.position(id)?;
        let removed = self.profiles.remove(position);
        info!(profile = removed.name(), id = %id, "Codec profile deleted");
        Ok(removed)
    }

    pub fn get(&self, id: &ProfileId) -> Option<Arc<CodecProfile>> {
        self.profiles.iter().find(|p| p.id() == id).cloned()
    }

    /// Exact-name lookup; the first registered match wins.
    pub fn find_profile(&self, name: &str) -> Option<Arc<CodecProfile>> {
        self.profiles.iter().find(|p| p.name() == name).cloned()
    }

    /// Profiles usable for `kind`, in registration order. The copy profile
    /// applies to every kind.
    pub fn list_profiles(&self, kind: MediaKind) -> Vec<ProfileSummary> {
        self.profiles
            .iter()
            .filter(|p| p.is_copy_profile() || p.kind() == Some(kind))
            .map(|p| ProfileSummary {
                id: p.id().clone(),
                name: p.name().to_string(),
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CodecProfile>> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    fn position(&self, id: &ProfileId) -> TranscodeResult<usize> {
        let position = self
            .profiles
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| TranscodeError::ProfileNotFound(id.to_string()))?;
        if self.profiles[position].is_copy_profile() {
            return Err(TranscodeError::ImmutableProfile);
        }
        Ok(position)
    }
}

fn warn_if_disabled(profile: &CodecProfile, registry: &CodecRegistry) {
    match profile.codec_name() {
        None => warn!(
            profile = profile.name(),
            "Codec profile has no codec and stays disabled"
        ),
        Some(codec) if profile.resolve_codec(registry).is_none() => warn!(
            profile = profile.name(),
            codec,
            "Codec is not available, profile disabled until it is"
        ),
        Some(_) => {}
    }
}
