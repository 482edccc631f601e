use crate::types::*;
use chrono::Local;
use std::{
    env,
    fs,
    io::Write,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  repo_root().join("config.json")
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn env_flag_true_default(key: &str, default: bool) -> bool {
  match env::var(key) {
    Ok(value) => {
      let value = value.trim().to_ascii_lowercase();
      matches!(value.as_str(), "1" | "true" | "yes" | "on")
    }
    Err(_) => default,
  }
}

pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
  if let Some(value) = env_default("WALLSCORE_API_ADDR") {
    config.api_addr = value;
  }
  if let Some(value) = env_default("WALLSCORE_OVERLAY_ADDR") {
    config.overlay_addr = value;
  }
  if let Some(value) = env_default("OVERLAY_DIR") {
    config.overlay_dir = value;
  }
  if config.roster_path.trim().is_empty() {
    if let Some(value) = env_default("WALLSCORE_ROSTER_PATH") {
      config.roster_path = value;
    }
  }
  config.judge_log = env_flag_true_default("WALLSCORE_JUDGE_LOG", config.judge_log);
  config
}

pub fn load_config_inner() -> Result<AppConfig, String> {
  let path = config_path();
  if !path.is_file() {
    return Ok(apply_env_defaults(AppConfig::default()));
  }
  let data = fs::read_to_string(&path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn load_env_file() {
  let env_path = repo_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn now_ms() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}

// ── Judge input audit log ──────────────────────────────────────────────

pub fn judge_log_path() -> PathBuf {
  repo_root().join("logs").join("judge_input.log")
}

pub fn append_judge_log(label: &str, payload: &str) {
  let dir = repo_root().join("logs");
  if fs::create_dir_all(&dir).is_err() {
    return;
  }
  let path = judge_log_path();
  let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
  let entry = format!("[{timestamp}] {label}\n{payload}\n\n");
  if let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(&path) {
    let _ = file.write_all(entry.as_bytes());
  }
}

// ── Roster files ───────────────────────────────────────────────────────

pub fn rosters_dir() -> PathBuf {
  repo_root().join("rosters")
}

pub fn resolve_roster_path(raw: &str) -> PathBuf {
  let trimmed = raw.trim();
  let path = PathBuf::from(trimmed);
  if path.is_absolute() {
    return path;
  }
  if trimmed.contains(std::path::MAIN_SEPARATOR) || trimmed.contains('/') {
    return repo_root().join(path);
  }
  rosters_dir().join(path)
}

pub fn load_roster_from(raw: &str) -> Result<RosterConfig, String> {
  let path = resolve_roster_path(raw);
  let data = fs::read_to_string(&path).map_err(|e| format!("read roster {}: {e}", path.display()))?;
  let roster = serde_json::from_str::<RosterConfig>(&data)
    .map_err(|e| format!("parse roster {}: {e}", path.display()))?;
  if roster.competition_id.trim().is_empty() {
    return Err(format!("Roster {} has an empty competition id.", path.display()));
  }
  Ok(roster)
}

pub fn log_env_warnings(config: &AppConfig) {
  let mut warnings = Vec::new();

  if config.roster_path.trim().is_empty() {
    warnings.push("No roster configured — set rosterPath in config.json or WALLSCORE_ROSTER_PATH; the server starts with no competition loaded");
  } else if !resolve_roster_path(&config.roster_path).is_file() {
    warnings.push("Configured roster file not found — the server starts with no competition loaded");
  }

  for msg in warnings {
    tracing::warn!("{}", msg);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_env_line_plain() {
    assert_eq!(
      parse_env_line("WALLSCORE_API_ADDR=127.0.0.1:9000"),
      Some(("WALLSCORE_API_ADDR".to_string(), "127.0.0.1:9000".to_string()))
    );
  }

  #[test]
  fn test_parse_env_line_quotes_and_comments() {
    assert_eq!(
      parse_env_line("export NAME=\"City Finals\""),
      Some(("NAME".to_string(), "City Finals".to_string()))
    );
    assert_eq!(
      parse_env_line("ADDR=127.0.0.1:9000 # local only"),
      Some(("ADDR".to_string(), "127.0.0.1:9000".to_string()))
    );
    assert_eq!(parse_env_line("# comment"), None);
    assert_eq!(parse_env_line("   "), None);
  }
}
