use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env::apply_env_overrides,
    error::{Error, Result},
    schema::BridgeConfig,
};

const CONFIG_FILENAME: &str = "mqttgram.toml";

/// Load the configuration: file (explicit path or discovered), then
/// environment overrides.
///
/// Returns the config and the file it was read from, if any. A missing
/// explicit path is an error; finding no file during discovery is not.
pub fn load(path: Option<&Path>) -> Result<(BridgeConfig, Option<PathBuf>)> {
    let source = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };

    let mut config = match source {
        Some(ref p) => {
            debug!(path = %p.display(), "loading config");
            load_from_path(p)?
        },
        None => {
            debug!("no config file found, using defaults");
            BridgeConfig::default()
        },
    };

    apply_env_overrides(&mut config)?;
    Ok((config, source))
}

/// Parse a TOML config file without applying environment overrides.
pub fn load_from_path(path: &Path) -> Result<BridgeConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Find the config file in standard locations.
///
/// Search order:
/// 1. `./mqttgram.toml`
/// 2. `~/.config/mqttgram/mqttgram.toml`
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }
    config_dir()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .filter(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/mqttgram/`).
fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mqttgram").map(|d| d.config_dir().to_path_buf())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, std::io::Write};

    #[test]
    fn loads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[mqtt]\ninput_topic = \"bot/in\"\n\n[telegram]\nallowed_users = [5]"
        )
        .unwrap();

        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.mqtt.input_topic, "bot/in");
        assert_eq!(cfg.telegram.allowed_users, vec![5]);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }), "{err}");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mqtt\nport = ").unwrap();
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "{err}");
    }

    #[test]
    fn wrong_type_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mqtt]\nport = \"not a number\"").unwrap();
        assert!(load_from_path(file.path()).is_err());
    }
}
