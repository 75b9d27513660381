use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::ollama::{DEFAULT_OLLAMA_ENDPOINT, DEFAULT_OLLAMA_MODEL, DEFAULT_TEMPERATURE};
use crate::python::{DEFAULT_PYTHON, DEFAULT_RUN_TIMEOUT};
use crate::web::DEFAULT_PAGE_LOAD_TIMEOUT;

const CONFIG_DIR_NAME: &str = "localagent";
const CONFIG_FILE_NAME: &str = "config.toml";
const TEMPERATURE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub ollama_endpoint: String,
    pub ollama_model: String,
    pub ollama_api_key: Option<String>,
    pub temperature: f64,
    pub python_executable: PathBuf,
    pub sandbox_timeout: Duration,
    pub page_load_timeout: Duration,
    pub chrome_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            python_executable: PathBuf::from(DEFAULT_PYTHON),
            sandbox_timeout: DEFAULT_RUN_TIMEOUT,
            page_load_timeout: DEFAULT_PAGE_LOAD_TIMEOUT,
            chrome_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    ollama_endpoint: Option<String>,
    ollama_model: Option<String>,
    ollama_api_key: Option<String>,
    temperature: Option<f64>,
    python_executable: Option<String>,
    sandbox_timeout_secs: Option<u64>,
    page_load_timeout_secs: Option<u64>,
    chrome_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Loads the config file, then layers `.env` and process environment on top.
    ///
    /// An explicit `path` must exist; the discovered default path is optional.
    pub fn load_with_path(path: Option<&Path>) -> Result<Self> {
        let (config_path, file_config) = match path {
            Some(path) => {
                if !path.is_file() {
                    bail!(
                        "Failed to load config {}: file does not exist",
                        path.display()
                    );
                }
                (path.to_path_buf(), load_file_config(path)?)
            }
            None => {
                let discovered = discover_config_path()?;
                let file_config = load_file_config(&discovered)?;
                (discovered, file_config)
            }
        };
        let file = file_config.unwrap_or_default();

        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let ollama_endpoint = env_non_empty("OLLAMA_ENDPOINT")
            .or_else(|| file_value(file.ollama_endpoint.as_deref()))
            .unwrap_or(defaults.ollama_endpoint);
        if !(ollama_endpoint.starts_with("http://") || ollama_endpoint.starts_with("https://")) {
            return Err(config_error(
                &config_path,
                "ollama_endpoint",
                &format!("expected an http(s) URL, got '{ollama_endpoint}'"),
            ));
        }

        let temperature = file.temperature.unwrap_or(defaults.temperature);
        if !TEMPERATURE_RANGE.contains(&temperature) {
            return Err(config_error(
                &config_path,
                "temperature",
                &format!("must be between 0.0 and 2.0, got {temperature}"),
            ));
        }

        let sandbox_timeout = positive_secs(
            file.sandbox_timeout_secs,
            defaults.sandbox_timeout,
            &config_path,
            "sandbox_timeout_secs",
        )?;
        let page_load_timeout = positive_secs(
            file.page_load_timeout_secs,
            defaults.page_load_timeout,
            &config_path,
            "page_load_timeout_secs",
        )?;

        Ok(Self {
            ollama_endpoint,
            ollama_model: env_non_empty("OLLAMA_MODEL")
                .or_else(|| file_value(file.ollama_model.as_deref()))
                .unwrap_or(defaults.ollama_model),
            ollama_api_key: env_non_empty("OLLAMA_API_KEY")
                .or_else(|| file_value(file.ollama_api_key.as_deref())),
            temperature,
            python_executable: env_non_empty("LOCALAGENT_PYTHON")
                .or_else(|| file_value(file.python_executable.as_deref()))
                .map(PathBuf::from)
                .unwrap_or(defaults.python_executable),
            sandbox_timeout,
            page_load_timeout,
            chrome_path: env_non_empty("LOCALAGENT_CHROME")
                .or_else(|| file_value(file.chrome_path.as_deref()))
                .map(PathBuf::from),
        })
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow!("Failed to resolve config path: HOME directory is unavailable"))?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

fn positive_secs(
    value: Option<u64>,
    default: Duration,
    config_path: &Path,
    key: &str,
) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(0) => Err(config_error(config_path, key, "must be greater than zero")),
        Some(secs) => Ok(Duration::from_secs(secs)),
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|value| file_value(Some(&value)))
}

fn file_value(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(ToOwned::to_owned)
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use crate::llm::ollama::{DEFAULT_OLLAMA_ENDPOINT, DEFAULT_OLLAMA_MODEL};
    use serial_test::serial;
    use std::env;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    const VARS: [&str; 6] = [
        "OLLAMA_ENDPOINT",
        "OLLAMA_MODEL",
        "OLLAMA_API_KEY",
        "LOCALAGENT_PYTHON",
        "LOCALAGENT_CHROME",
        "XDG_CONFIG_HOME",
    ];

    fn reset_vars() {
        unsafe {
            for var in VARS {
                env::remove_var(var);
            }
        }
    }

    fn with_cwd<T>(path: &Path, f: impl FnOnce() -> T) -> T {
        let cwd = env::current_dir().expect("current dir");
        env::set_current_dir(path).expect("set current dir");
        let result = f();
        env::set_current_dir(cwd).expect("restore current dir");
        result
    }

    fn write_default_config(root: &Path, contents: &str) {
        let config_dir = root.join("localagent");
        fs::create_dir_all(&config_dir).expect("create config dir");
        fs::write(config_dir.join("config.toml"), contents).expect("write config");
    }

    fn load_from_xdg(root: &Path) -> anyhow::Result<AppConfig> {
        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", root);
        }
        with_cwd(root, AppConfig::load)
    }

    #[test]
    #[serial]
    fn load_uses_defaults_without_file() {
        let tmp = tempfile::tempdir().expect("tempdir");

        let cfg = load_from_xdg(tmp.path()).expect("load config");

        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.ollama_endpoint, DEFAULT_OLLAMA_ENDPOINT);
        assert_eq!(cfg.ollama_model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(cfg.sandbox_timeout, Duration::from_secs(60));
        assert_eq!(cfg.page_load_timeout, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn load_reads_every_file_key() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(
            tmp.path(),
            r#"
ollama_endpoint = "http://gpu-box:11434/api/chat"
ollama_model = "llama3.1:8b"
ollama_api_key = "secret"
temperature = 0.7
python_executable = "/opt/python/bin/python3"
sandbox_timeout_secs = 5
page_load_timeout_secs = 12
chrome_path = "/usr/bin/chromium"
"#,
        );

        let cfg = load_from_xdg(tmp.path()).expect("load config");

        assert_eq!(cfg.ollama_endpoint, "http://gpu-box:11434/api/chat");
        assert_eq!(cfg.ollama_model, "llama3.1:8b");
        assert_eq!(cfg.ollama_api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.temperature, 0.7);
        assert_eq!(cfg.python_executable, PathBuf::from("/opt/python/bin/python3"));
        assert_eq!(cfg.sandbox_timeout, Duration::from_secs(5));
        assert_eq!(cfg.page_load_timeout, Duration::from_secs(12));
        assert_eq!(cfg.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    #[serial]
    fn load_env_overrides_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(
            tmp.path(),
            r#"
ollama_model = "file_model"
python_executable = "file_python"
"#,
        );

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
            env::set_var("OLLAMA_MODEL", "env_model");
            env::set_var("OLLAMA_ENDPOINT", "https://ollama.internal/api/chat");
            env::set_var("LOCALAGENT_PYTHON", "env_python");
        }

        let cfg = with_cwd(tmp.path(), || AppConfig::load().expect("load config"));
        reset_vars();

        assert_eq!(cfg.ollama_model, "env_model");
        assert_eq!(cfg.ollama_endpoint, "https://ollama.internal/api/chat");
        assert_eq!(cfg.python_executable, PathBuf::from("env_python"));
    }

    #[test]
    #[serial]
    fn load_ignores_blank_values() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(tmp.path(), "ollama_model = \"   \"\n");

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
            env::set_var("OLLAMA_API_KEY", "  ");
        }

        let cfg = with_cwd(tmp.path(), || AppConfig::load().expect("load config"));
        reset_vars();

        assert_eq!(cfg.ollama_model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(cfg.ollama_api_key, None);
    }

    #[test]
    #[serial]
    fn load_with_explicit_path_skips_discovery() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "ollama_model = \"custom\"\n").expect("write config");

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", "   ");
        }

        let cfg = with_cwd(tmp.path(), || {
            AppConfig::load_with_path(Some(&path)).expect("load config")
        });
        reset_vars();

        assert_eq!(cfg.ollama_model, "custom");
    }

    #[test]
    #[serial]
    fn load_with_missing_explicit_path_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("missing.toml");
        reset_vars();

        let err = AppConfig::load_with_path(Some(&path)).expect_err("load should fail");

        assert!(err.to_string().contains("Failed to load config"));
        assert!(err.to_string().contains("file does not exist"));
    }

    #[test]
    #[serial]
    fn load_fails_when_xdg_config_home_is_empty() {
        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", "   ");
        }

        let err = AppConfig::load().expect_err("load should fail");
        reset_vars();

        assert!(
            err.to_string()
                .contains("Failed to resolve config path: XDG_CONFIG_HOME is set but empty")
        );
    }

    #[test]
    #[serial]
    fn load_fails_on_unknown_root_key() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(tmp.path(), "model = \"llama3\"");

        let err = load_from_xdg(tmp.path()).expect_err("load should fail");

        assert!(err.to_string().contains("Failed to load config"));
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    #[serial]
    fn load_fails_on_out_of_range_temperature() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(tmp.path(), "temperature = 3.5");

        let err = load_from_xdg(tmp.path()).expect_err("load should fail");

        assert!(
            err.to_string()
                .contains("temperature: must be between 0.0 and 2.0, got 3.5")
        );
    }

    #[test]
    #[serial]
    fn load_fails_on_zero_timeout() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(tmp.path(), "sandbox_timeout_secs = 0");

        let err = load_from_xdg(tmp.path()).expect_err("load should fail");

        assert!(
            err.to_string()
                .contains("sandbox_timeout_secs: must be greater than zero")
        );
    }

    #[test]
    #[serial]
    fn load_fails_on_non_http_endpoint() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(tmp.path(), "ollama_endpoint = \"127.0.0.1:11434\"");

        let err = load_from_xdg(tmp.path()).expect_err("load should fail");

        assert!(err.to_string().contains("ollama_endpoint: expected an http(s) URL"));
    }
}
