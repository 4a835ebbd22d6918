//! Application configuration for lodebot.
//!
//! User config lives at `~/.lodebot/lodebot.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LodebotError, Result};
use crate::types::RoleBucket;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lodebot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lodebot";

// ---------------------------------------------------------------------------
// Config structs (matching lodebot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat-side settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Upstream lookup service settings.
    #[serde(default)]
    pub lodestone: LodestoneConfig,

    /// Weekly scheduled announcements.
    #[serde(default = "default_announcements")]
    pub announcements: Vec<AnnouncementConfig>,

    /// Operator additions/overrides for the class table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<ClassOverride>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            lodestone: LodestoneConfig::default(),
            announcements: default_announcements(),
            classes: Vec::new(),
        }
    }
}

/// `[bot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Command prefix, e.g. `!` for `!lookup`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Channel that scheduled announcements are addressed to.
    #[serde(default)]
    pub schedule_channel: u64,

    /// Offset from UTC, in minutes, used to evaluate weekly triggers.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            schedule_channel: 0,
            utc_offset_minutes: 0,
        }
    }
}

fn default_prefix() -> String {
    "!".into()
}

/// `[lodestone]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LodestoneConfig {
    /// Base URL of the lookup API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum outbound calls per rolling second.
    #[serde(default = "default_rate_limit_per_sec")]
    pub rate_limit_per_sec: u32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How many search result pages to follow.
    #[serde(default = "default_max_search_pages")]
    pub max_search_pages: u32,
}

impl Default for LodestoneConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            rate_limit_per_sec: default_rate_limit_per_sec(),
            timeout_secs: default_timeout_secs(),
            max_search_pages: default_max_search_pages(),
        }
    }
}

fn default_base_url() -> String {
    "https://xivapi.com".into()
}
fn default_api_key_env() -> String {
    "XIVAPI_KEY".into()
}
// Provider quota is 20/s.
fn default_rate_limit_per_sec() -> u32 {
    18
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_search_pages() -> u32 {
    3
}

/// `[[announcements]]` entry — a command fired on a weekly schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementConfig {
    /// Command name; the scheduler sends `<prefix><name>`.
    pub name: String,
    /// `mon`, `tue`, ... `sun` (full names also accepted).
    pub day_of_week: String,
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
    /// Text posted when the command runs.
    #[serde(default)]
    pub message: String,
}

fn default_announcements() -> Vec<AnnouncementConfig> {
    vec![
        AnnouncementConfig {
            name: "events".into(),
            day_of_week: "sun".into(),
            hour: 21,
            minute: 20,
            second: 0,
            message: "Sign-ups for this week's events are open!".into(),
        },
        AnnouncementConfig {
            name: "event_results".into(),
            day_of_week: "wed".into(),
            hour: 18,
            minute: 0,
            second: 0,
            message: "This week's event results are in!".into(),
        },
    ]
}

/// `[[classes]]` entry — adds or replaces one class table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassOverride {
    pub id: u32,
    /// Role bucket name, e.g. `"Tank"` or `"RangedMagicalDPS"`.
    pub role: String,
    /// Short name, e.g. `"PLD"`.
    pub abbreviation: String,
    /// Display icon (emoji markup); defaults to the abbreviation.
    #[serde(default)]
    pub icon: Option<String>,
}

// ---------------------------------------------------------------------------
// Lookup config (runtime, merged from config + environment)
// ---------------------------------------------------------------------------

/// Runtime lookup client configuration.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub base_url: Url,
    /// Upstream token; sent as `private_key` when present.
    pub api_key: Option<String>,
    pub rate_limit_per_sec: u32,
    pub timeout: Duration,
    pub max_search_pages: u32,
}

/// Resolves the API key from the environment, so conversion can fail.
impl TryFrom<&AppConfig> for LookupConfig {
    type Error = LodebotError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.lodestone.base_url).map_err(|e| {
            LodebotError::config(format!(
                "invalid lodestone.base_url '{}': {e}",
                config.lodestone.base_url
            ))
        })?;

        Ok(Self {
            base_url,
            api_key: Some(resolve_api_key(config)?),
            rate_limit_per_sec: config.lodestone.rate_limit_per_sec,
            timeout: Duration::from_secs(config.lodestone.timeout_secs),
            max_search_pages: config.lodestone.max_search_pages,
        })
    }
}

impl LookupConfig {
    /// Keyless config against `base_url` with default limits.
    pub fn for_base_url(base_url: Url) -> Self {
        let defaults = LodestoneConfig::default();
        Self {
            base_url,
            api_key: None,
            rate_limit_per_sec: defaults.rate_limit_per_sec,
            timeout: Duration::from_secs(defaults.timeout_secs),
            max_search_pages: defaults.max_search_pages,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lodebot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| LodebotError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lodebot/lodebot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LodebotError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LodebotError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LodebotError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LodebotError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LodebotError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check value ranges that serde cannot express.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.bot.prefix.is_empty() {
        return Err(LodebotError::config("bot.prefix must not be empty"));
    }
    if config.lodestone.rate_limit_per_sec == 0 {
        return Err(LodebotError::config(
            "lodestone.rate_limit_per_sec must be at least 1",
        ));
    }
    if config.lodestone.max_search_pages == 0 {
        return Err(LodebotError::config(
            "lodestone.max_search_pages must be at least 1",
        ));
    }
    if config.bot.utc_offset_minutes.abs() >= 24 * 60 {
        return Err(LodebotError::config(
            "bot.utc_offset_minutes must be within one day",
        ));
    }

    for a in &config.announcements {
        if a.name.is_empty() || a.name.contains(char::is_whitespace) {
            return Err(LodebotError::config(format!(
                "announcement name '{}' must be a single word",
                a.name
            )));
        }
        a.day_of_week
            .parse::<chrono::Weekday>()
            .map_err(|_| {
                LodebotError::config(format!(
                    "announcement '{}': invalid day_of_week '{}'",
                    a.name, a.day_of_week
                ))
            })?;
        if a.hour > 23 || a.minute > 59 || a.second > 59 {
            return Err(LodebotError::config(format!(
                "announcement '{}': time {:02}:{:02}:{:02} out of range",
                a.name, a.hour, a.minute, a.second
            )));
        }
    }

    for class in &config.classes {
        class.role.parse::<RoleBucket>().map_err(|_| {
            LodebotError::config(format!(
                "class {}: unknown role '{}'",
                class.id, class.role
            ))
        })?;
    }

    Ok(())
}

/// Read the upstream API key from the env var named in the config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.lodestone.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(LodebotError::config(format!(
            "Lodestone API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://xivapi.com/account"
        ))),
    }
}
