pub mod claims;
pub mod local;

use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};

fn read_input(file: &Option<String>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}")),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn read_json(file: &Option<String>) -> Result<serde_json::Value> {
    let content = read_input(file)?;
    serde_json::from_str(&content).context("Invalid JSON")
}
