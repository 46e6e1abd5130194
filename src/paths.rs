//! Per-user default locations for the configuration file and logs

use std::path::PathBuf;

pub const APP_DIR: &str = "CamPing";
pub const CONFIG_FILE_NAME: &str = "camping.toml";

/// `<config dir>/CamPing/camping.toml`, falling back to the working directory
pub fn default_config_file() -> PathBuf {
    config_file_in(dirs::config_dir())
}

/// `<state dir>/CamPing/logs`; platforms without a state dir use local data
pub fn default_log_dir() -> Option<PathBuf> {
    log_dir_in(dirs::state_dir().or_else(dirs::data_local_dir))
}

fn config_file_in(base: Option<PathBuf>) -> PathBuf {
    match base {
        Some(base) => base.join(APP_DIR).join(CONFIG_FILE_NAME),
        None => PathBuf::from(CONFIG_FILE_NAME),
    }
}

fn log_dir_in(base: Option<PathBuf>) -> Option<PathBuf> {
    base.map(|base| base.join(APP_DIR).join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_config_file_location() {
        assert_eq!(
            config_file_in(Some(PathBuf::from("/home/op/.config"))),
            Path::new("/home/op/.config/CamPing/camping.toml")
        );
        assert_eq!(config_file_in(None), Path::new("camping.toml"));
        assert!(default_config_file().ends_with("camping.toml"));
    }

    #[test]
    fn test_log_dir_location() {
        assert_eq!(
            log_dir_in(Some(PathBuf::from("/home/op/.local/state"))),
            Some(PathBuf::from("/home/op/.local/state/CamPing/logs"))
        );
        assert_eq!(log_dir_in(None), None);
    }
}
