// ABOUTME: Reader for the project's .env file.
// ABOUTME: KEY=VALUE lines with optional quotes, comments and export prefixes.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

pub const DOTENV_FILENAME: &str = ".env";

/// Load `.env` from a directory. A missing file yields no variables.
pub fn load(dir: &Path) -> Result<HashMap<String, String>> {
    let path = dir.join(DOTENV_FILENAME);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(parse(&content))
}

pub fn parse(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), unquote(value.trim()).to_string()))
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
