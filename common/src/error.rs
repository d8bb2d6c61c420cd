use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("fan on threshold {on_temp_f}F must be above off threshold {off_temp_f}F")]
    ThresholdsInverted { on_temp_f: i16, off_temp_f: i16 },
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("sensor did not respond in time")]
    Timeout,
    #[error("sensor checksum mismatch")]
    Checksum,
    #[error("sensor bus fault: {0}")]
    Bus(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("sensor returned a non-numeric value")]
    NotANumber,
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("time source has no epoch available")]
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("display rejected frame: {0}")]
pub struct DisplayError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("relay drive failed: {0}")]
pub struct RelayError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}
