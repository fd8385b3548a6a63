use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// the user declined notifications or the platform restricts them
    #[error("notification permission was not granted")]
    PermissionDenied,
    /// the notification store rejected part of a batch, accepted requests stay scheduled
    #[error("{failed} of {total} notifications could not be scheduled")]
    SchedulingFailure { failed: usize, total: usize },
    #[error("could not play tone: {0}")]
    PlaybackFailure(String),
    #[error("unknown tone id {0}")]
    UnknownTone(u8),
    #[error("{0:?} is not a tone id, expected a number like 1")]
    InvalidTone(String),
    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// the store file exists but holds nothing, most likely another process is writing it
    #[error("notification store {} is empty", .0.display())]
    EmptyStore(std::path::PathBuf),
    #[error("couldn't find a home directory for the config")]
    NoProjectDirs,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("couldn't parse toml: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("couldn't serialize toml: {0}")]
    TomlSer(#[from] toml::ser::Error),
}
