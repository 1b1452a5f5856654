// Lume Intent - Core Library
// Turns a free-form Portuguese message into a structured financial/task intent

pub mod text;           // Diacritic-insensitive normalization
pub mod weekday;        // Weekday Resolver
pub mod clock;          // Explicit "now"
pub mod temporal;       // Temporal Extractor
pub mod intent;         // StructuredIntent + raw classifier shape
pub mod config;         // Classifier settings
pub mod classifier;     // Semantic Intent Classifier Adapter
pub mod reconciler;     // Intent Reconciler

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use temporal::{DatePolicy, TemporalCandidate, TemporalExtractor};
pub use weekday::{iso_weekday, next_occurrence};
pub use intent::{
    Action, EntityType, Period, RawIntent, StructuredIntent, TransactionDirection,
    VocabularyError,
};
pub use config::{ClassifierConfig, ConfigError};
pub use classifier::{
    ClassifierError, IntentClassifier, LlmClient, LlmError, LlmRequest, MockLlmClient,
};
#[cfg(feature = "http")]
pub use classifier::HttpLlmClient;
pub use reconciler::{merge_temporal, IntentReconciler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
