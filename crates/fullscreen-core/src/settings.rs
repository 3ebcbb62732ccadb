//! On-disk feature configuration, owned by the asset system and only read
//! here.
//!
//! ```ron
//! (
//!     name: "Outline",
//!     injection_point: AfterRenderingPostProcessing,
//!     requirements: [Depth, Normal],
//!     material: Some("outline"),
//!     pass_index: 0,
//!     fetch_color_buffer: true,
//! )
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::descriptor::{EffectPassDescriptor, InjectionPoint, InputKind};
use crate::error::SettingsError;
use crate::feature::WarningPolicy;

// ---------------------------------------------------------------------------
// MaterialLibrary
// ---------------------------------------------------------------------------

/// Resolves material asset keys to loaded materials.
pub trait MaterialLibrary<M> {
    fn material(&self, key: &str) -> Option<Arc<M>>;
}

impl<M> MaterialLibrary<M> for HashMap<String, Arc<M>> {
    fn material(&self, key: &str) -> Option<Arc<M>> {
        self.get(key).cloned()
    }
}

// ---------------------------------------------------------------------------
// FeatureSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub name: String,
    pub injection_point: InjectionPoint,
    pub requirements: Vec<InputKind>,
    /// Material asset key.
    pub material: Option<String>,
    pub pass_index: i32,
    pub fetch_color_buffer: bool,
    pub warning_policy: WarningPolicy,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            name: "FullScreenPass".into(),
            injection_point: InjectionPoint::AfterRenderingPostProcessing,
            requirements: Vec::new(),
            material: None,
            pass_index: 0,
            fetch_color_buffer: true,
            warning_policy: WarningPolicy::OnChange,
        }
    }
}

impl FeatureSettings {
    pub fn from_ron_str(source: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_ron_str(&source)?;
        log::debug!("loaded feature settings \"{}\" from {}", settings.name, path.display());
        Ok(settings)
    }

    /// Build a descriptor, resolving the material key through `library`.
    ///
    /// An unknown key leaves the material empty, so validation reports it as
    /// missing rather than this step failing.
    pub fn to_descriptor<M, L>(&self, library: &L) -> EffectPassDescriptor<M>
    where
        L: MaterialLibrary<M> + ?Sized,
    {
        let material = self.material.as_deref().and_then(|key| {
            let found = library.material(key);
            if found.is_none() {
                log::debug!("feature \"{}\": material `{key}` is not loaded", self.name);
            }
            found
        });

        EffectPassDescriptor {
            injection_point: self.injection_point,
            input_requirements: self.requirements.iter().copied().collect(),
            material,
            pass_sub_index: self.pass_index,
            fetch_color_buffer: self.fetch_color_buffer,
        }
    }
}
