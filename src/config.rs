//! Application-level configuration: the authoritative quiz settings and the server wiring.

use std::{env, fmt::Display, fs, io::ErrorKind, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};
use utoipa::ToSchema;

/// Default location on disk where the server looks for the JSON quiz configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HOTSEAT_CONFIG_PATH";
const DEFAULT_PORT: u16 = 8080;

/// Which lifelines the match offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LifelineToggles {
    pub phone_a_friend: bool,
    pub fifty_fifty: bool,
}

impl Default for LifelineToggles {
    fn default() -> Self {
        Self {
            phone_a_friend: true,
            fifty_fifty: true,
        }
    }
}

/// Settings consumed by the display screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplaySettings {
    pub show_prize_ladder: bool,
    pub show_team_roster: bool,
    /// Pause the displays apply before revealing the verdict.
    pub reveal_delay_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_prize_ladder: true,
            show_team_roster: true,
            reveal_delay_ms: 1_500,
        }
    }
}

/// Quiz settings. The values derived from the environment are authoritative; the copy under
/// the `config` partition is only a mirror.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct QuizConfig {
    pub max_teams: u32,
    pub questions_per_team: u32,
    pub lifelines: LifelineToggles,
    pub display: DisplaySettings,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "phoneTimerSeconds")]
    #[schema(value_type = u64)]
    pub phone_timer: Duration,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            max_teams: 10,
            questions_per_team: 20,
            lifelines: LifelineToggles::default(),
            display: DisplaySettings::default(),
            phone_timer: Duration::from_secs(180),
        }
    }
}

impl QuizConfig {
    /// Load the quiz configuration from disk, falling back to built-in defaults, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let base = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<QuizConfig>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded quiz config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse quiz config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "quiz config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read quiz config; falling back to defaults"
                );
                Self::default()
            }
        };

        base.with_env_overrides()
    }

    /// Apply the `HOTSEAT_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(value) = env_parse("HOTSEAT_MAX_TEAMS") {
            self.max_teams = value;
        }
        if let Some(value) = env_parse("HOTSEAT_QUESTIONS_PER_TEAM") {
            self.questions_per_team = value;
        }
        if let Some(value) = env_parse("HOTSEAT_LIFELINE_PHONE") {
            self.lifelines.phone_a_friend = value;
        }
        if let Some(value) = env_parse("HOTSEAT_LIFELINE_FIFTY_FIFTY") {
            self.lifelines.fifty_fifty = value;
        }
        if let Some(seconds) = env_parse::<u64>("HOTSEAT_PHONE_TIMER_SECS") {
            self.phone_timer = Duration::from_secs(seconds);
        }
        if let Some(value) = env_parse("HOTSEAT_SHOW_PRIZE_LADDER") {
            self.display.show_prize_ladder = value;
        }
        if let Some(value) = env_parse("HOTSEAT_SHOW_TEAM_ROSTER") {
            self.display.show_team_roster = value;
        }
        if let Some(value) = env_parse("HOTSEAT_REVEAL_DELAY_MS") {
            self.display.reveal_delay_ms = value;
        }
        self
    }
}

/// Process-level wiring read once at startup.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
    /// Realtime database root URL; the in-memory store is used when absent.
    pub database_url: Option<String>,
    pub auth_token: Option<String>,
    /// Identity the config reconciler writes as.
    pub host_id: Option<String>,
    /// JSON file listing the locally cached question sets.
    pub question_bank_path: Option<PathBuf>,
}

impl ServerSettings {
    /// Build the settings from the process environment.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            port,
            database_url: non_empty_env("FIREBASE_DATABASE_URL"),
            auth_token: non_empty_env("FIREBASE_AUTH_TOKEN"),
            host_id: non_empty_env("HOTSEAT_HOST_ID"),
            question_bank_path: non_empty_env("HOTSEAT_QUESTION_BANK_PATH").map(PathBuf::from),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = non_empty_env(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(var = name, value = %raw, error = %err, "ignoring unparsable override");
            None
        }
    }
}
