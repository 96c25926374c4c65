use thiserror::Error;

/// Result type alias for synthesis operations.
pub type Result<T> = std::result::Result<T, SynthError>;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),
    #[error("Computation error: {0}")]
    Computation(#[from] ComputationError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structurally invalid setup, raised when a tuning or factory is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no ratio table defines semitone {semitone}; add a more complete table")]
    IncompleteTuning { semitone: usize },
    #[error("expected a list of ratio tables, not a single table")]
    SingleRatioTable,
    #[error("the prioritized ratio-table list is empty")]
    EmptyTuningPreferences,
    #[error("ratio table has {found} entries, expected 12")]
    RatioTableLength { found: usize },
    #[error("invalid ratio {numerator}/{denominator}")]
    InvalidRatio { numerator: f64, denominator: f64 },
    #[error("unknown ratio table preset '{0}'")]
    UnknownRatioPreset(String),
    #[error("unknown harmonic preset '{0}'")]
    UnknownHarmonicPreset(String),
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
    #[error("unsupported sample width of {0} bytes (expected 1, 2, 4 or 8)")]
    UnsupportedWidth(u8),
    #[error("frame rate must be positive")]
    InvalidFrameRate,
    #[error("seconds per beat must be positive and finite, got {0}")]
    InvalidTempo(f64),
    #[error("tonic frequency must be positive and finite, got {0}")]
    InvalidTonic(f64),
    #[error("invalid envelope shape: {field} = {value}")]
    InvalidDecayShape { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("unknown note name '{0}'")]
    UnknownNote(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    #[error("note duration must be positive and finite, got {0} beats")]
    EmptyDuration(f64),
    #[error("harmonic weights sum to {0}; cannot normalize")]
    DegenerateHarmonics(f64),
    #[error("envelope covers {found} samples but the note spans {expected}")]
    EnvelopeLength { expected: usize, found: usize },
    #[error("frequency must be finite and non-negative, got {0} Hz")]
    InvalidFrequency(f64),
    #[error("note denominator must be non-zero")]
    ZeroDenominator,
    #[error("filter '{filter}' changed the tone from {expected} to {found} samples")]
    FilteredLength {
        filter: String,
        expected: usize,
        found: usize,
    },
}
