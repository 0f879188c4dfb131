use crate::utils::error::{IntegrationError, Result};
use crate::utils::validation::{
    validate_no_placeholder, validate_non_empty_string, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "CONTRAST_INTEGRATIONS_CONFIG";
pub const DEFAULT_TEAMSERVER_URL: &str = "https://eval.contrastsecurity.com/Contrast";
pub const DEFAULT_SCW_BASE_URL: &str = "https://integration-api.securecodewarrior.com";
pub const DEFAULT_SECURE_FLAG_CATALOG_URL: &str =
    "https://knowledge-base.secureflag.com/_vulnerabilities/labs.json";

/// 設定檔內容。純量欄位需放在表格之前，序列化成 TOML 才合法
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub teamserver_url: String,
    pub api_key: String,
    pub auth_header: String,
    #[serde(default)]
    pub is_superadmin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<ProfileAuth>,
    /// 手動加入設定檔的 `[active_profile]`，superadmin 用來操作其他組織；
    /// `auth init` 不會寫入這個欄位
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_profile: Option<ProfileAuth>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// 組織與該組織可用的 API key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAuth {
    pub org_uuid: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub scw: ScwConfig,
    #[serde(default)]
    pub secure_flag: SecureFlagConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScwConfig {
    #[serde(default = "default_scw_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_file: Option<PathBuf>,
}

impl Default for ScwConfig {
    fn default() -> Self {
        Self {
            base_url: default_scw_base_url(),
            template_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureFlagConfig {
    #[serde(default = "default_secure_flag_catalog_url")]
    pub catalog_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_file: Option<PathBuf>,
}

impl Default for SecureFlagConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_secure_flag_catalog_url(),
            template_file: None,
        }
    }
}

fn default_scw_base_url() -> String {
    DEFAULT_SCW_BASE_URL.to_string()
}

fn default_secure_flag_catalog_url() -> String {
    DEFAULT_SECURE_FLAG_CATALOG_URL.to_string()
}

impl AppConfig {
    pub fn new(teamserver_url: &str, api_key: &str, auth_header: &str) -> Self {
        Self {
            teamserver_url: teamserver_url.to_string(),
            api_key: api_key.to_string(),
            auth_header: auth_header.to_string(),
            is_superadmin: false,
            request_timeout: None,
            default_profile: None,
            active_profile: None,
            providers: ProvidersConfig::default(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading config file from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| IntegrationError::ConfigError {
            message: format!(
                "Could not read config file '{}': {}. Run `auth init` first",
                path.display(),
                e
            ),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| IntegrationError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| IntegrationError::ConfigError {
            message: format!("Could not serialize config: {}", e),
        })?;
        std::fs::write(path, content)?;
        tracing::debug!("Wrote config file to {}", path.display());
        Ok(())
    }

    /// 替換 `${VAR}`；未設定的變數保留原樣，交給驗證階段回報
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| IntegrationError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 設定檔位置：`--config` > `$CONTRAST_INTEGRATIONS_CONFIG` > 使用者設定目錄
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        Self::default_path()
    }

    pub fn default_path() -> Result<PathBuf> {
        let base = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var("HOME").map_err(|_| IntegrationError::MissingConfigError {
                    field: "HOME".to_string(),
                })?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("contrast-integrations").join("config.toml"))
    }

    /// active profile（superadmin 切換的組織）優先於預設組織
    pub fn current_profile(&self) -> Option<&ProfileAuth> {
        self.active_profile.as_ref().or(self.default_profile.as_ref())
    }

    pub fn org_uuid(&self) -> Result<&str> {
        self.current_profile()
            .map(|p| p.org_uuid.as_str())
            .ok_or_else(|| IntegrationError::MissingConfigError {
                field: "default_profile.org_uuid".to_string(),
            })
    }

    pub fn effective_api_key(&self) -> &str {
        self.active_profile
            .as_ref()
            .map(|p| p.api_key.as_str())
            .unwrap_or(&self.api_key)
    }

    pub fn set_default_profile(&mut self, org_uuid: &str, org_name: Option<&str>) {
        self.default_profile = Some(ProfileAuth {
            org_uuid: org_uuid.to_string(),
            api_key: self.api_key.clone(),
            name: org_name.map(str::to_string),
        });
    }

    pub fn request_timeout(&self) -> Option<u64> {
        self.request_timeout
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_url("teamserver_url", &self.teamserver_url)?;

        validate_non_empty_string("api_key", &self.api_key)?;
        validate_no_placeholder("api_key", &self.api_key)?;
        validate_non_empty_string("auth_header", &self.auth_header)?;
        validate_no_placeholder("auth_header", &self.auth_header)?;

        if let Some(timeout) = self.request_timeout {
            validate_range("request_timeout", timeout, 1, 600)?;
        }

        for (field, profile) in [
            ("default_profile", &self.default_profile),
            ("active_profile", &self.active_profile),
        ] {
            if let Some(profile) = profile {
                validate_non_empty_string(&format!("{}.org_uuid", field), &profile.org_uuid)?;
                validate_no_placeholder(&format!("{}.api_key", field), &profile.api_key)?;
            }
        }

        validate_url("providers.scw.base_url", &self.providers.scw.base_url)?;
        validate_url(
            "providers.secure_flag.catalog_url",
            &self.providers.secure_flag.catalog_url,
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BASIC: &str = r#"
teamserver_url = "https://eval.contrastsecurity.com/Contrast"
api_key = "abc123"
auth_header = "dXNlcjprZXk="

[default_profile]
org_uuid = "11111111-2222-3333-4444-555555555555"
api_key = "abc123"
name = "Acme"
"#;

    #[test]
    fn test_parse_basic_config_with_provider_defaults() {
        let config = AppConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.org_uuid().unwrap(), "11111111-2222-3333-4444-555555555555");
        assert_eq!(config.effective_api_key(), "abc123");
        assert_eq!(config.providers.scw.base_url, DEFAULT_SCW_BASE_URL);
        assert_eq!(
            config.providers.secure_flag.catalog_url,
            DEFAULT_SECURE_FLAG_CATALOG_URL
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_active_profile_wins() {
        let content = format!(
            "{}\n[active_profile]\norg_uuid = \"other-org\"\napi_key = \"other-key\"\n",
            BASIC
        );
        let config = AppConfig::from_toml_str(&content).unwrap();

        assert_eq!(config.org_uuid().unwrap(), "other-org");
        assert_eq!(config.effective_api_key(), "other-key");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CI_TEST_CONTRAST_API_KEY", "from-env");
        let config = AppConfig::from_toml_str(
            r#"
teamserver_url = "https://app.contrastsecurity.com/Contrast"
api_key = "${CI_TEST_CONTRAST_API_KEY}"
auth_header = "header"
"#,
        )
        .unwrap();
        std::env::remove_var("CI_TEST_CONTRAST_API_KEY");

        assert_eq!(config.api_key, "from-env");
    }

    #[test]
    fn test_unset_env_var_fails_validation() {
        let config = AppConfig::from_toml_str(
            r#"
teamserver_url = "https://app.contrastsecurity.com/Contrast"
api_key = "${CI_TEST_DEFINITELY_UNSET_VARIABLE}"
auth_header = "header"
"#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidConfigValueError { ref field, .. } if field == "api_key"));
    }

    #[test]
    fn test_missing_profile_is_reported() {
        let config = AppConfig::new(DEFAULT_TEAMSERVER_URL, "key", "header");
        assert!(matches!(
            config.org_uuid(),
            Err(IntegrationError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_invalid_url_fails_validation() {
        let config = AppConfig::new("not-a-url", "key", "header");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_written_file_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::new(DEFAULT_TEAMSERVER_URL, "key", "header");
        config.is_superadmin = true;
        config.set_default_profile("org-1", Some("Acme"));
        config.to_file(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert!(loaded.is_superadmin);
        assert_eq!(loaded.default_profile, config.default_profile);
    }

    #[test]
    fn test_missing_file_points_to_auth_init() {
        let dir = TempDir::new().unwrap();
        let err = AppConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("auth init"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = AppConfig::resolve_path(Some(Path::new("/tmp/custom.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.toml"));
    }
}
