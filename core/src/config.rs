/// Configuration for the translation tool
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "quest-translator";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderOptions {
    /// Root for exported files and the cache.
    pub work_folder: PathBuf,
    /// Overrides `<workFolder>/.mplt/cache`.
    #[serde(default)]
    pub cache_folder: Option<PathBuf>,
    /// JSON term map handed to translators as hints.
    #[serde(default)]
    pub glossary_file: Option<PathBuf>,
}

impl Default for FolderOptions {
    fn default() -> Self {
        Self {
            work_folder: PathBuf::from("work"),
            cache_folder: None,
            glossary_file: None,
        }
    }
}

impl FolderOptions {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_folder
            .clone()
            .unwrap_or_else(|| self.work_folder.join(".mplt").join("cache"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageOptions {
    /// Provider language code of the source text.
    pub source_lang: String,
    pub target_lang: String,
    /// Minecraft lang file stem of the source text.
    pub source_lang_file: String,
    pub target_lang_file: String,
}

impl Default for LanguageOptions {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "zh".to_string(),
            source_lang_file: "en_us".to_string(),
            target_lang_file: "zh_cn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackFillOptions {
    /// Append `[--source--]` after each machine translation.
    #[serde(default)]
    pub keep_original: bool,
    /// Untranslated placeholders get their source text instead of staying
    /// `{key}` in the output.
    #[serde(default)]
    pub fallback_to_source: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LangFormatOptions {
    /// Export extracted lang files as `.lang` (1.12 packs) instead of `.json`.
    #[serde(default)]
    pub low_version_lang_format: bool,
}

impl LangFormatOptions {
    pub fn extension(&self) -> &'static str {
        if self.low_version_lang_format {
            "lang"
        } else {
            "json"
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatorConfig {
    #[serde(default)]
    pub folders: FolderOptions,
    #[serde(default)]
    pub languages: LanguageOptions,
    #[serde(default)]
    pub back_fill: BackFillOptions,
    #[serde(default)]
    pub lang_format: LangFormatOptions,
}

impl TranslatorConfig {
    /// `<config dir>/quest-translator/config.yaml`, if the platform has a
    /// config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.yaml"))
    }

    /// Load from the default path, falling back to defaults when the file is
    /// missing.
    pub fn load_default() -> Result<Self, String> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_yaml_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        serde_yaml::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        crate::backup::write_atomic(path.as_ref(), content.as_bytes())
            .map_err(|e| format!("Failed to write config file: {}", e))
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse JSON config: {}", e))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize to JSON: {}", e))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.folders.cache_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = TranslatorConfig::default();
        assert_eq!(config.languages.target_lang_file, "zh_cn");
        assert!(!config.back_fill.keep_original);
        assert_eq!(config.cache_dir(), PathBuf::from("work/.mplt/cache"));
        assert_eq!(config.lang_format.extension(), "json");
    }

    #[test]
    fn test_json_serialization() {
        let mut config = TranslatorConfig::default();
        config.back_fill.fallback_to_source = true;
        let json = config.to_json().unwrap();
        assert!(json.contains("\"fallbackToSource\": true"));
        let deserialized = TranslatorConfig::from_json(&json).unwrap();
        assert!(deserialized.back_fill.fallback_to_source);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            TranslatorConfig::from_json(r#"{"folders": {"workFolder": "/tmp/pack"}}"#).unwrap();
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/pack/.mplt/cache"));
        assert_eq!(config.languages.source_lang, "en");
        assert!(config.folders.glossary_file.is_none());
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = TranslatorConfig::default();
        config.folders.cache_folder = Some(dir.path().join("cache"));
        config.lang_format.low_version_lang_format = true;
        config.to_yaml_file(&path).unwrap();

        let loaded = TranslatorConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.cache_dir(), dir.path().join("cache"));
        assert_eq!(loaded.lang_format.extension(), "lang");
        assert!(TranslatorConfig::from_yaml_file(dir.path().join("missing.yaml")).is_err());
    }
}
