use std::{fmt, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    alarm::{RepeatMode, ToneId},
    error::{Error, Result},
};

const APP_NAME: &str = "noti_alarm";
/// recurring triggers carry the offset as the second of the minute
pub const MAX_BURST_LEN: u32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_message")]
    pub default_message: String,
    #[serde(default)]
    pub default_tone: ToneId,
    #[serde(default)]
    pub default_repeat: RepeatMode,
    /// emulators and headless boxes can't show notifications
    #[serde(default = "always_true")]
    pub physical_device: bool,
    #[serde(default = "default_preview_secs")]
    pub preview_secs: u64,
    #[serde(default = "Tone::defaults")]
    pub tones: Vec<Tone>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_message: default_message(),
            default_tone: ToneId::default(),
            default_repeat: RepeatMode::default(),
            physical_device: true,
            preview_secs: default_preview_secs(),
            tones: Tone::defaults(),
            scheduler: SchedulerConfig::default(),
            player: PlayerConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// how many notifications (one per second) make up one alarm
    pub burst_len: u32,
    /// how long the success message stays up
    pub success_delay_ms: u64,
    pub title: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            burst_len: 60,
            success_delay_ms: 2000,
            title: "Alarm".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// a burst has to fit into one minute and can't be empty
    pub fn validate(&self) -> Result<()> {
        if (1..=MAX_BURST_LEN).contains(&self.burst_len) {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "scheduler.burst_len is {}, it has to be between 1 and {MAX_BURST_LEN}",
                self.burst_len
            )))
        }
    }

    #[must_use]
    pub const fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub auto_stop_secs: u64,
    pub volume: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            auto_stop_secs: 60,
            volume: 1.0,
        }
    }
}

impl PlayerConfig {
    #[must_use]
    pub const fn auto_stop(&self) -> Duration {
        Duration::from_secs(self.auto_stop_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub poll_interval_ms: u64,
    /// one-shot notifications missed by more than this are dropped instead of delivered
    pub missed_grace_secs: u64,
    pub desktop_banners: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            missed_grace_secs: 60,
            desktop_banners: true,
        }
    }
}

impl DaemonConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: PathBuf) -> Result<Self> {
        let config = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&config)?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// the saved config, or the defaults if there is none yet
    pub fn load_or_default() -> Result<Self> {
        if Self::is_config_present() {
            Self::load(Self::config_path()?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: PathBuf) -> Result<()> {
        let config = toml::to_string(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, config)?;
        Ok(())
    }

    fn project_dirs() -> Result<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", APP_NAME).ok_or(Error::NoProjectDirs)
    }

    pub fn config_path() -> Result<PathBuf> {
        let mut path = Self::project_dirs()?.config_dir().to_path_buf();
        path.push("config.toml");
        Ok(path)
    }

    pub fn sounds_path() -> Result<PathBuf> {
        let mut path = Self::project_dirs()?.data_dir().to_path_buf();
        path.push("sounds");
        Ok(path)
    }

    /// where the scheduled notifications are kept between runs
    pub fn store_path() -> Result<PathBuf> {
        let mut path = Self::project_dirs()?.data_dir().to_path_buf();
        path.push("scheduled.toml");
        Ok(path)
    }

    #[must_use]
    pub fn is_config_present() -> bool {
        Self::config_path().is_ok_and(|path| path.exists())
    }

    #[must_use]
    pub fn tone(&self, id: ToneId) -> Option<&Tone> {
        self.tones.iter().find(|tone| tone.id == id)
    }

    #[must_use]
    pub const fn preview_length(&self) -> Duration {
        Duration::from_secs(self.preview_secs)
    }
}

#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}

fn default_message() -> String {
    "Wake up".to_string()
}

const fn default_preview_secs() -> u64 {
    5
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tone {
    pub id: ToneId,
    pub name: String,
    pub path: PathBuf,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{}",
            self.id,
            self.name,
            self.path
                .file_name()
                .map(|name| name.to_string_lossy())
                .unwrap_or_default()
        )
    }
}

impl Tone {
    #[must_use]
    pub const fn new(id: ToneId, name: String, path: PathBuf) -> Self {
        Self { id, name, path }
    }

    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![Self::morning_bliss(), Self::beep_fest()]
    }

    /// the file name a tone is stored under in [`Config::sounds_path`]
    #[must_use]
    pub const fn file_name(id: ToneId) -> &'static str {
        match id {
            ToneId::MorningBliss => "morning-bliss.mp3",
            ToneId::BeepFest => "beep-fest.mp3",
        }
    }

    fn bundled(id: ToneId, name: &str) -> Self {
        let path = Config::sounds_path()
            .unwrap_or_default()
            .join(Self::file_name(id));
        Self {
            id,
            name: name.to_string(),
            path,
        }
    }

    #[must_use]
    pub fn morning_bliss() -> Self {
        Self::bundled(ToneId::MorningBliss, "Morning Bliss")
    }

    #[must_use]
    pub fn beep_fest() -> Self {
        Self::bundled(ToneId::BeepFest, "Beep Fest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = toml::from_str(
            r#"
            default_message = "Standup"
            default_repeat = "weekdays"

            [player]
            auto_stop_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.default_message, "Standup");
        assert_eq!(config.default_repeat, RepeatMode::Weekdays);
        assert_eq!(config.player.auto_stop(), Duration::from_secs(30));
        assert!((config.player.volume - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.tones.len(), 2);
        assert!(config.physical_device);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::new();
        config.default_tone = ToneId::BeepFest;
        config.daemon.desktop_banners = false;
        config.save(path.clone()).unwrap();
        assert_eq!(Config::load(path).unwrap(), config);
    }

    #[test]
    fn burst_has_to_fit_into_a_minute() {
        let dir = tempfile::tempdir().unwrap();
        for burst_len in [0, 61] {
            let path = dir.path().join(format!("burst-{burst_len}.toml"));
            std::fs::write(&path, format!("[scheduler]\nburst_len = {burst_len}\n")).unwrap();
            assert!(matches!(Config::load(path), Err(Error::InvalidConfig(_))));
        }
        let path = dir.path().join("burst-60.toml");
        std::fs::write(&path, "[scheduler]\nburst_len = 60\n").unwrap();
        assert_eq!(Config::load(path).unwrap().scheduler.burst_len, MAX_BURST_LEN);
    }

    #[test]
    fn finds_tone_by_id() {
        let config = Config::new();
        assert_eq!(config.tone(ToneId::BeepFest).unwrap().name, "Beep Fest");
        assert!(config
            .tone(ToneId::MorningBliss)
            .unwrap()
            .path
            .ends_with("morning-bliss.mp3"));
    }
}
