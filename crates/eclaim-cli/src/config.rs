use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileConfig {
    pub server: Option<String>,
    pub format: Option<String>,
}

pub type ConfigFile = HashMap<String, ProfileConfig>;

fn config_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".eclaim");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_all() -> Result<ConfigFile> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(ConfigFile::new());
    }
    let content = fs::read_to_string(&path)?;
    parse(&content)
}

fn parse(content: &str) -> Result<ConfigFile> {
    toml::from_str(content).context("Invalid CLI config file")
}

pub fn load_profile(profile: &str) -> Result<ProfileConfig> {
    let mut all = load_all()?;
    Ok(all.remove(profile).unwrap_or_default())
}

pub fn save_profile(profile: &str, config: &ProfileConfig) -> Result<()> {
    let mut all = load_all()?;
    all.insert(profile.to_string(), config.clone());
    let content = toml::to_string_pretty(&all)?;
    fs::write(config_path()?, content)?;
    Ok(())
}

pub fn resolve_server(cli_server: &Option<String>, profile: &str) -> Result<String> {
    // 1. --server flag / ECLAIM_URL env
    if let Some(s) = cli_server {
        return Ok(s.clone());
    }
    // 2. config.toml profile
    if let Some(s) = load_profile(profile)?.server {
        return Ok(s);
    }
    anyhow::bail!(
        "No server URL configured. Use --server, set ECLAIM_URL, or run: eclaim config set server <url>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_parse_from_toml() {
        let all = parse(
            r#"
[default]
server = "http://localhost:8080"

[rsud]
server = "https://eclaim.rsud.test"
format = "table"
"#,
        )
        .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all["default"].server.as_deref(), Some("http://localhost:8080"));
        assert_eq!(all["default"].format, None);
        assert_eq!(all["rsud"].format.as_deref(), Some("table"));
    }

    #[test]
    fn server_flag_wins() {
        let server = resolve_server(&Some("http://flag.test".into()), "default").unwrap();
        assert_eq!(server, "http://flag.test");
    }
}
