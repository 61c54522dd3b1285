use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    completion::DEFAULT_MODEL,
    error::{Error, Result},
};

const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

pub const API_KEY_SETTING: &str = "api_key";
pub const MODEL_SETTING: &str = "model";

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
/// Environment variable that overrides the stored model.
pub const MODEL_ENV: &str = "DOCASK_MODEL";

const API_KEY_PREFIX: &str = "sk-";

pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure the table exists so readers never see TableDoesNotExist.
        let txn = db.begin_write()?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    // -- API key --

    /// Validate and store the API key.
    pub fn set_api_key(&self, key: &str) -> Result<()> {
        let key = validate_api_key(key)?;
        self.set_setting(API_KEY_SETTING, key)
    }

    pub fn api_key(&self) -> Result<Option<String>> {
        self.get_setting(API_KEY_SETTING)
    }

    pub fn clear_api_key(&self) -> Result<bool> {
        self.remove_setting(API_KEY_SETTING)
    }

    // -- Model --

    pub fn set_model(&self, model: &str) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            return Err(Error::Config("model name cannot be empty".into()));
        }
        self.set_setting(MODEL_SETTING, model)
    }

    pub fn model(&self) -> Result<Option<String>> {
        self.get_setting(MODEL_SETTING)
    }

    pub fn clear_model(&self) -> Result<bool> {
        self.remove_setting(MODEL_SETTING)
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}

/// Check that `key` looks like an Anthropic API key, returning it trimmed.
pub fn validate_api_key(key: &str) -> Result<&str> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::Config("API key cannot be empty".into()));
    }
    if !key.starts_with(API_KEY_PREFIX) {
        return Err(Error::Config(format!(
            "API key must start with \"{API_KEY_PREFIX}\""
        )));
    }
    Ok(key)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Pick the API key: environment first, then the stored setting.
pub fn resolve_api_key(
    env_value: Option<String>,
    db: Option<&ConfigDb>,
) -> Result<Option<String>> {
    if let Some(key) = non_empty(env_value) {
        return Ok(Some(key));
    }
    match db {
        Some(db) => Ok(non_empty(db.api_key()?)),
        None => Ok(None),
    }
}

/// Pick the model: explicit flag, environment, stored setting, default.
pub fn resolve_model(
    explicit: Option<&str>,
    env_value: Option<String>,
    db: Option<&ConfigDb>,
) -> Result<String> {
    if let Some(model) = non_empty(explicit.map(str::to_string)) {
        return Ok(model);
    }
    if let Some(model) = non_empty(env_value) {
        return Ok(model);
    }
    match db {
        Some(db) => db.get_setting_or(MODEL_SETTING, DEFAULT_MODEL),
        None => Ok(DEFAULT_MODEL.to_string()),
    }
}

/// Show only the start and end of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, ConfigDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = ConfigDb::open(&tmp.path().join("config.db")).unwrap();
        (tmp, db)
    }

    #[test]
    fn settings_crud() {
        let (_tmp, db) = test_db();

        assert_eq!(db.get_setting("model").unwrap(), None);
        assert_eq!(
            db.get_setting_or("model", "default-model").unwrap(),
            "default-model"
        );

        db.set_setting("model", "custom-model").unwrap();
        assert_eq!(
            db.get_setting("model").unwrap(),
            Some("custom-model".to_string())
        );

        assert!(db.remove_setting("model").unwrap());
        assert!(!db.remove_setting("model").unwrap());
        assert_eq!(db.get_setting("model").unwrap(), None);
    }

    #[test]
    fn api_key_is_validated_before_storing() {
        let (_tmp, db) = test_db();

        assert!(matches!(db.set_api_key(""), Err(Error::Config(_))));
        assert!(matches!(db.set_api_key("abc"), Err(Error::Config(_))));
        assert_eq!(db.api_key().unwrap(), None);

        db.set_api_key("  sk-ant-123  ").unwrap();
        assert_eq!(db.api_key().unwrap(), Some("sk-ant-123".to_string()));

        assert!(db.clear_api_key().unwrap());
        assert_eq!(db.api_key().unwrap(), None);
    }

    #[test]
    fn empty_model_is_rejected() {
        let (_tmp, db) = test_db();
        assert!(db.set_model("  ").is_err());
        db.set_model("claude-x").unwrap();
        assert_eq!(db.model().unwrap(), Some("claude-x".to_string()));
        assert!(db.clear_model().unwrap());
    }

    #[test]
    fn environment_key_wins_over_stored_key() {
        let (_tmp, db) = test_db();
        db.set_api_key("sk-stored").unwrap();

        assert_eq!(
            resolve_api_key(Some("sk-env".into()), Some(&db)).unwrap(),
            Some("sk-env".to_string())
        );
        assert_eq!(
            resolve_api_key(Some("   ".into()), Some(&db)).unwrap(),
            Some("sk-stored".to_string())
        );
        assert_eq!(resolve_api_key(None, None).unwrap(), None);
    }

    #[test]
    fn model_resolution_order() {
        let (_tmp, db) = test_db();
        assert_eq!(
            resolve_model(None, None, Some(&db)).unwrap(),
            DEFAULT_MODEL
        );

        db.set_model("stored").unwrap();
        assert_eq!(resolve_model(None, None, Some(&db)).unwrap(), "stored");
        assert_eq!(
            resolve_model(None, Some("env".into()), Some(&db)).unwrap(),
            "env"
        );
        assert_eq!(
            resolve_model(Some("flag"), Some("env".into()), Some(&db)).unwrap(),
            "flag"
        );
        assert_eq!(resolve_model(None, None, None).unwrap(), DEFAULT_MODEL);
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.db");

        {
            let db = ConfigDb::open(&path).unwrap();
            db.set_api_key("sk-persisted").unwrap();
        }

        {
            let db = ConfigDb::open(&path).unwrap();
            assert_eq!(
                db.api_key().unwrap(),
                Some("sk-persisted".to_string())
            );
        }
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret("sk-ant-api03-abcdefgh"), "sk-ant…efgh");
        assert_eq!(mask_secret("sk-short"), "********");
    }
}
