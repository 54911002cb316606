//! Init command - write the configuration file.

use std::path::Path;

use kioskplay::config::{ConfigFile, ConfigKey};

use crate::error::CliError;

/// Run the init command.
///
/// Keeps any existing settings and only replaces the ones given.
pub fn run(path: &Path, manifest_url: &str, device_id: Option<&str>) -> Result<(), CliError> {
    let mut config = ConfigFile::load_from(path).unwrap_or_default();
    ConfigKey::ManifestUrl.set(&mut config, manifest_url)?;
    if let Some(id) = device_id {
        ConfigKey::DeviceId.set(&mut config, id)?;
    }
    config.save_to(path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("  Manifest:  {}", manifest_url);
    println!("  Device id: {}", config.device.id);
    println!("  Cache:     {}", config.cache.directory.display());
    println!();
    println!("Run 'kioskplay sync' to test the manifest, then 'kioskplay run'.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_url_and_keeps_other_settings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.ini");
        let mut existing = ConfigFile::default();
        existing.playback.player = "vlc".to_string();
        existing.save_to(&path).unwrap();

        run(&path, "https://signage.test/api/content.php", Some("lobby")).unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(
            config.manifest.url.as_deref(),
            Some("https://signage.test/api/content.php")
        );
        assert_eq!(config.device.id, "lobby");
        assert_eq!(config.playback.player, "vlc");
    }

    #[test]
    fn test_init_rejects_bad_url() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.ini");
        assert!(run(&path, "not-a-url", None).is_err());
        assert!(!path.exists());
    }
}
