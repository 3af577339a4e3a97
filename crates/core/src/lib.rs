pub mod capability;
pub mod config;
pub mod image;
pub mod lifecycle;
pub mod llm;
pub mod metrics;
pub mod query;
pub mod submission;
pub mod testing;

pub use capability::{
    build_capabilities, CapabilityError, CardCapabilities, CardIdentifier, CardValuer,
    IdentificationOutcome, LlmCapabilityConfig, LlmCardIdentifier, LlmCardValuer,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig, ServerConfig, StoreBackend, SubmissionsConfig,
};
pub use image::{ImageError, ImageReference, ImageValidator};
pub use lifecycle::{
    LifecycleConfig, LifecycleError, LifecycleManager, RetentionPolicy, RetentionSweeper,
    SubmissionUpdateCallback,
};
pub use llm::{LlmClient, LlmConfig, LlmError, LlmProvider};
pub use query::{QueryError, SubmissionPage, SubmissionQuery};
pub use submission::{
    CardIdentity, InMemorySubmissionStore, MarketplaceEstimate, SqliteSubmissionStore,
    Submission, SubmissionError, SubmissionFilter, SubmissionStatus, SubmissionStore,
};
