//! Machine configuration loaded from TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use millforge_cam::CompileOptions;
use millforge_gcode::PostSettings;
use serde::Deserialize;

/// Compile and post settings for one machine.
///
/// ```toml
/// [compile]
/// error_policy = "skip_and_continue"
///
/// [post]
/// flavor = "linuxcnc"
/// coolant = "flood"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub compile: CompileOptions,
    pub post: PostSettings,
}

impl MachineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading machine config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing machine config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use millforge_cam::ErrorPolicy;
    use millforge_gcode::{Coolant, PostFlavor};

    #[test]
    fn test_full_config() {
        let config = MachineConfig::from_toml(
            r#"
            [compile]
            error_policy = "skip_and_continue"
            parallel = false

            [post]
            flavor = "linuxcnc"
            line_numbers = true
            coolant = "flood"
            program_name = "bracket rev B"
            "#,
        )
        .unwrap();
        assert_eq!(config.compile.error_policy, ErrorPolicy::SkipAndContinue);
        assert!(!config.compile.parallel);
        assert_eq!(config.post.flavor, PostFlavor::LinuxCnc);
        assert!(config.post.line_numbers);
        assert!(config.post.comments);
        assert_eq!(config.post.coolant, Coolant::Flood);
        assert_eq!(config.post.program_name.as_deref(), Some("bracket rev B"));
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(MachineConfig::from_toml("").unwrap(), MachineConfig::default());
    }

    #[test]
    fn test_unknown_flavor_is_rejected() {
        assert!(MachineConfig::from_toml("[post]\nflavor = \"fanuc\"").is_err());
    }
}
