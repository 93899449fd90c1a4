use std::{collections::HashMap, fs, path::Path};

use tracing::warn;

pub const CONFIG_FILE: &str = "careful.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub log_filter: String,
    pub camera_width: u32,
    pub camera_height: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/careful.db".into(),
            log_filter: "info".into(),
            camera_width: 1280,
            camera_height: 720,
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(CONFIG_FILE), |name| std::env::var(name).ok())
}

/// Defaults, then the flat `key = "value"` file, then environment overrides.
/// `CAREFUL_*` wins over the generic `APP__*` names.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("database_url") {
                    settings.database_url = v.clone();
                }
                if let Some(v) = file_cfg.get("log_filter") {
                    settings.log_filter = v.clone();
                }
                if let Some(v) = file_cfg.get("camera_width") {
                    apply_dimension(&mut settings.camera_width, "camera_width", v);
                }
                if let Some(v) = file_cfg.get("camera_height") {
                    apply_dimension(&mut settings.camera_height, "camera_height", v);
                }
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable config file");
            }
        }
    }

    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("CAREFUL_DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    if let Some(v) = env("CAREFUL_LOG") {
        settings.log_filter = v;
    }

    if let Some(v) = env("CAREFUL_CAMERA_WIDTH") {
        apply_dimension(&mut settings.camera_width, "CAREFUL_CAMERA_WIDTH", &v);
    }
    if let Some(v) = env("CAREFUL_CAMERA_HEIGHT") {
        apply_dimension(&mut settings.camera_height, "CAREFUL_CAMERA_HEIGHT", &v);
    }

    settings.database_url = normalize_database_url(&settings.database_url);
    settings
}

fn apply_dimension(target: &mut u32, name: &str, raw: &str) {
    match raw.trim().parse::<u32>() {
        Ok(parsed) if parsed > 0 => *target = parsed,
        _ => warn!(setting = name, value = raw, "ignoring invalid camera dimension"),
    }
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
