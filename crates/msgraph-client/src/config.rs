//! Client configuration.
//!
//! Settings live in `~/.d-msgraph-cli/config.json`, a flat JSON object of
//! string values. Each setting is resolved from, in order of precedence:
//! command-line flags, environment variables, the config file, then the
//! built-in default.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use msgraph_services::identity::{default_config_dir, parse_scopes, write_private};
use msgraph_services::{AuthSettings, DEFAULT_TIME_ZONE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::secret;

/// File name of the configuration inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

pub const CLIENT_ID: &str = "clientId";
pub const TENANT_ID: &str = "tenantId";
pub const CLIENT_SECRET: &str = "clientSecret";
pub const SCOPES: &str = "scopes";
pub const TIMEZONE: &str = "timezone";

/// Keys accepted by `config set` and `config unset`.
pub const KEYS: &[&str] = &[CLIENT_ID, TENANT_ID, CLIENT_SECRET, SCOPES, TIMEZONE];

/// Environment variable consulted for each key, if any.
fn env_var_for(key: &str) -> Option<&'static str> {
    match key {
        CLIENT_ID => Some("AZURE_CLIENT_ID"),
        TENANT_ID => Some("AZURE_TENANT_ID"),
        CLIENT_SECRET => Some("AZURE_CLIENT_SECRET"),
        SCOPES => Some("GRAPH_SCOPES"),
        _ => None,
    }
}

/// The contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigFile {
    values: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Returns `~/.d-msgraph-cli/config.json`.
    pub fn default_path() -> ClientResult<PathBuf> {
        Ok(default_config_dir()?.join(CONFIG_FILE))
    }

    /// Loads the file at `path`.
    ///
    /// A missing file is an empty configuration. So is an unreadable or
    /// malformed one, after a warning.
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!("no config file at {}", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("ignoring unreadable config {}: {}", path.display(), e);
                return Self::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("ignoring invalid config {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Writes the file to `path`, owner-readable only.
    pub fn save_to(&self, path: &Path) -> ClientResult<()> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        write_private(path, &bytes)?;
        debug!("saved config to {}", path.display());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Sets a known key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> ClientResult<()> {
        let key = known_key(key)?;
        self.values.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Removes a known key. Returns `true` if it was present.
    pub fn unset(&mut self, key: &str) -> ClientResult<bool> {
        let key = known_key(key)?;
        Ok(self.values.remove(key).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a copy with the client secret masked, unless it is a
    /// reference.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(value) = copy.values.get_mut(CLIENT_SECRET)
            && !secret::is_reference(value)
        {
            *value = "***".to_string();
        }
        copy
    }
}

fn known_key(key: &str) -> ClientResult<&'static str> {
    KEYS.iter().copied().find(|k| *k == key).ok_or_else(|| {
        ClientError::Config(format!(
            "unknown configuration key \"{}\". Valid keys: {}",
            key,
            KEYS.join(", ")
        ))
    })
}

/// Values given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_secret: Option<String>,
    pub scopes: Option<String>,
}

/// Resolves settings against a config file and an environment lookup.
pub struct Resolver<'a, E> {
    file: &'a ConfigFile,
    env: E,
    system_zone: fn() -> Option<String>,
}

impl<'a, E> Resolver<'a, E>
where
    E: Fn(&str) -> Option<String>,
{
    pub fn new(file: &'a ConfigFile, env: E) -> Self {
        Self {
            file,
            env,
            system_zone: system_time_zone,
        }
    }

    /// Replaces the lookup of the operating system's time zone.
    #[must_use]
    pub fn with_system_zone(mut self, lookup: fn() -> Option<String>) -> Self {
        self.system_zone = lookup;
        self
    }

    /// Resolves one key: the flag, then its environment variable, then the
    /// file. File values may be secret references.
    pub fn value(&self, key: &str, flag: Option<&str>) -> ClientResult<Option<String>> {
        let non_blank = |v: &str| !v.trim().is_empty();

        if let Some(flag) = flag.filter(|v| non_blank(v)) {
            return Ok(Some(flag.to_string()));
        }
        if let Some(value) = env_var_for(key)
            .and_then(|var| (self.env)(var))
            .filter(|v| non_blank(v))
        {
            return Ok(Some(value));
        }
        match self.file.get(key) {
            Some(raw) => secret::resolve(raw)
                .map(Some)
                .map_err(|source| ClientError::Secret {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Builds the identity settings. Missing values stay `None` and are
    /// reported by the identity client when a command needs them.
    pub fn auth_settings(&self, cli: &CliOverrides) -> ClientResult<AuthSettings> {
        let scopes = self
            .value(SCOPES, cli.scopes.as_deref())?
            .map(|list| parse_scopes(&list))
            .unwrap_or_default();

        Ok(AuthSettings {
            client_id: self.value(CLIENT_ID, cli.client_id.as_deref())?,
            tenant_id: self.value(TENANT_ID, cli.tenant_id.as_deref())?,
            client_secret: self.value(CLIENT_SECRET, cli.client_secret.as_deref())?,
            scopes,
        })
    }

    /// The calendar time zone: the flag, then the config file, then `TZ`,
    /// then the system zone, then UTC.
    pub fn time_zone(&self, flag: Option<&str>) -> String {
        let non_blank = |v: &&str| !v.trim().is_empty();
        flag.filter(non_blank)
            .map(str::to_string)
            .or_else(|| self.file.get(TIMEZONE).map(str::to_string))
            .or_else(|| (self.env)("TZ").filter(|tz| non_blank(&tz.as_str())))
            .or_else(|| (self.system_zone)().filter(|tz| non_blank(&tz.as_str())))
            .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string())
    }
}

/// Reads the process environment.
pub fn process_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// The IANA name of the operating system's time zone, if it can be read.
pub fn system_time_zone() -> Option<String> {
    match iana_time_zone::get_timezone() {
        Ok(zone) => Some(zone),
        Err(e) => {
            warn!("could not read the system time zone: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    fn file_with(pairs: &[(&str, &str)]) -> ConfigFile {
        let mut file = ConfigFile::default();
        for (k, v) in pairs {
            file.set(k, *v).unwrap();
        }
        file
    }

    mod file {
        use super::*;

        #[test]
        fn missing_file_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            assert!(ConfigFile::load_from(&dir.path().join(CONFIG_FILE)).is_empty());
        }

        #[test]
        fn invalid_json_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(CONFIG_FILE);
            fs::write(&path, "{not json").unwrap();
            assert!(ConfigFile::load_from(&path).is_empty());

            fs::write(&path, r#"{"clientId": 42}"#).unwrap();
            assert!(ConfigFile::load_from(&path).is_empty());
        }

        #[test]
        fn save_then_load() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nested").join(CONFIG_FILE);
            let file = file_with(&[(CLIENT_ID, "app"), (TIMEZONE, "Asia/Tokyo")]);
            file.save_to(&path).unwrap();

            let content = fs::read_to_string(&path).unwrap();
            assert!(content.contains("\"clientId\": \"app\""));
            assert_eq!(ConfigFile::load_from(&path), file);
        }

        #[cfg(unix)]
        #[test]
        fn saved_file_is_private() {
            use std::os::unix::fs::PermissionsExt;

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(CONFIG_FILE);
            file_with(&[(CLIENT_SECRET, "s")]).save_to(&path).unwrap();
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        #[test]
        fn unknown_keys_are_rejected() {
            let mut file = ConfigFile::default();
            let err = file.set("clientid", "x").unwrap_err();
            assert!(err.to_string().contains("Valid keys: clientId, tenantId"));
            assert!(file.unset("nope").is_err());
        }

        #[test]
        fn unset_reports_presence() {
            let mut file = file_with(&[(TENANT_ID, "t")]);
            assert!(file.unset(TENANT_ID).unwrap());
            assert!(!file.unset(TENANT_ID).unwrap());
        }

        #[test]
        fn blank_values_read_as_missing() {
            let file = file_with(&[(CLIENT_ID, "  ")]);
            assert_eq!(file.get(CLIENT_ID), None);
        }

        #[test]
        fn redacted_masks_literal_secret_only() {
            let file = file_with(&[(CLIENT_SECRET, "hunter2")]);
            assert_eq!(file.redacted().get(CLIENT_SECRET), Some("***"));

            let file = file_with(&[(CLIENT_SECRET, "env::APP_SECRET")]);
            assert_eq!(file.redacted().get(CLIENT_SECRET), Some("env::APP_SECRET"));
        }
    }

    mod precedence {
        use super::*;

        #[test]
        fn flag_beats_env_beats_file() {
            let file = file_with(&[(CLIENT_ID, "from-file")]);

            let env = env_of(&[("AZURE_CLIENT_ID", "from-env")]);
            let resolver = Resolver::new(&file, env);
            assert_eq!(
                resolver.value(CLIENT_ID, Some("from-flag")).unwrap().as_deref(),
                Some("from-flag")
            );
            assert_eq!(
                resolver.value(CLIENT_ID, None).unwrap().as_deref(),
                Some("from-env")
            );

            let resolver = Resolver::new(&file, env_of(&[]));
            assert_eq!(
                resolver.value(CLIENT_ID, None).unwrap().as_deref(),
                Some("from-file")
            );
        }

        #[test]
        fn blank_flag_and_env_fall_through() {
            let file = file_with(&[(TENANT_ID, "from-file")]);
            let resolver = Resolver::new(&file, env_of(&[("AZURE_TENANT_ID", "")]));
            assert_eq!(
                resolver.value(TENANT_ID, Some(" ")).unwrap().as_deref(),
                Some("from-file")
            );
        }

        #[test]
        fn auth_settings_from_all_sources() {
            let file = file_with(&[(TENANT_ID, "tenant"), (SCOPES, "Mail.Read, User.Read")]);
            let resolver = Resolver::new(&file, env_of(&[("AZURE_CLIENT_SECRET", "secret")]));
            let cli = CliOverrides {
                client_id: Some("client".into()),
                ..Default::default()
            };

            let settings = resolver.auth_settings(&cli).unwrap();
            assert_eq!(settings.client_id.as_deref(), Some("client"));
            assert_eq!(settings.tenant_id.as_deref(), Some("tenant"));
            assert_eq!(settings.client_secret.as_deref(), Some("secret"));
            assert_eq!(settings.scopes, vec!["Mail.Read", "User.Read"]);
        }

        #[test]
        fn missing_values_stay_unset() {
            let file = ConfigFile::default();
            let settings = Resolver::new(&file, env_of(&[]))
                .auth_settings(&CliOverrides::default())
                .unwrap();
            assert_eq!(settings, AuthSettings::default());
        }

        #[test]
        fn scopes_flag_overrides_env() {
            let file = ConfigFile::default();
            let resolver = Resolver::new(&file, env_of(&[("GRAPH_SCOPES", "User.Read")]));
            let cli = CliOverrides {
                scopes: Some("Calendars.Read".into()),
                ..Default::default()
            };
            assert_eq!(resolver.auth_settings(&cli).unwrap().scopes, vec!["Calendars.Read"]);
        }
    }

    mod secrets {
        use super::*;

        #[test]
        fn file_references_are_resolved() {
            let file = file_with(&[(CLIENT_SECRET, "env::_D_MSGRAPH_CFG_SECRET")]);
            let resolver = Resolver::new(&file, env_of(&[]));

            unsafe {
                std::env::set_var("_D_MSGRAPH_CFG_SECRET", "resolved");
            }
            let value = resolver.value(CLIENT_SECRET, None).unwrap();
            unsafe {
                std::env::remove_var("_D_MSGRAPH_CFG_SECRET");
            }
            assert_eq!(value.as_deref(), Some("resolved"));
        }

        #[test]
        fn unresolvable_reference_is_an_error() {
            let file = file_with(&[(CLIENT_ID, "env::_D_MSGRAPH_UNSET_VAR_98765")]);
            let err = Resolver::new(&file, env_of(&[]))
                .auth_settings(&CliOverrides::default())
                .unwrap_err();
            assert!(matches!(err, ClientError::Secret { ref key, .. } if key == CLIENT_ID));
        }
    }

    mod time_zone {
        use super::*;

        #[test]
        fn flag_then_file_then_tz() {
            let file = file_with(&[(TIMEZONE, "Europe/Paris")]);
            let resolver = Resolver::new(&file, env_of(&[("TZ", "Asia/Tokyo")]));
            assert_eq!(resolver.time_zone(Some("America/New_York")), "America/New_York");
            assert_eq!(resolver.time_zone(None), "Europe/Paris");

            let empty = ConfigFile::default();
            let resolver = Resolver::new(&empty, env_of(&[("TZ", "Asia/Tokyo")]));
            assert_eq!(resolver.time_zone(None), "Asia/Tokyo");

            let resolver = Resolver::new(&empty, env_of(&[])).with_system_zone(|| None);
            assert_eq!(resolver.time_zone(Some("")), "UTC");
        }

        #[test]
        fn system_zone_before_utc() {
            let empty = ConfigFile::default();
            let resolver = Resolver::new(&empty, env_of(&[]))
                .with_system_zone(|| Some("Europe/Berlin".to_string()));
            assert_eq!(resolver.time_zone(None), "Europe/Berlin");

            let resolver = Resolver::new(&empty, env_of(&[("TZ", "Asia/Tokyo")]))
                .with_system_zone(|| Some("Europe/Berlin".to_string()));
            assert_eq!(resolver.time_zone(None), "Asia/Tokyo");

            let file = file_with(&[(TIMEZONE, "Europe/Paris")]);
            let resolver = Resolver::new(&file, env_of(&[]))
                .with_system_zone(|| Some("Europe/Berlin".to_string()));
            assert_eq!(resolver.time_zone(None), "Europe/Paris");

            let resolver = Resolver::new(&empty, env_of(&[]))
                .with_system_zone(|| Some(" ".to_string()));
            assert_eq!(resolver.time_zone(None), "UTC");
        }

        #[test]
        fn default_resolver_reads_the_system_zone() {
            let empty = ConfigFile::default();
            let resolver = Resolver::new(&empty, env_of(&[]));
            let expected = system_time_zone()
                .filter(|tz| !tz.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());
            assert_eq!(resolver.time_zone(None), expected);
        }
    }
}
