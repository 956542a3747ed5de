use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
pub const ASSET_DIR_ENV: &str = "MINDFORGE_ASSET_DIR";

/// Directory holding `config.json` and the default SQLite database.
pub fn asset_dir() -> PathBuf {
    let path = match std::env::var(ASSET_DIR_ENV) {
        Ok(override_dir) if !override_dir.trim().is_empty() => PathBuf::from(override_dir.trim()),
        _ if cfg!(debug_assertions) => PathBuf::from(PROJECT_ROOT).join("../../dev_assets"),
        _ => ProjectDirs::from("io", "mindforge", "mindforge")
            .expect("OS didn't give us a home directory")
            .data_dir()
            .to_path_buf(),
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).expect("Failed to create asset directory");
    }

    path
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}
