pub mod config;
pub mod library;
pub mod matcher;
pub mod metrics;
pub mod orchestrator;
pub mod searcher;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, BatchConfig, Config, ConfigError,
    DatabaseConfig, MatcherConfig, RerankConfig, SanitizedConfig, ServerConfig, SiteConfig,
};
pub use library::{
    FileFilter, Library, LibraryError, LibraryFile, NewFile, Scene, SceneLink, SqliteLibrary,
};
pub use matcher::{
    normalize_query, HttpReranker, NoopReranker, RerankError, RerankOverride, Reranker,
    ScoredCandidate,
};
pub use orchestrator::{
    BatchError, BatchItem, BatchRequest, BatchResult, BatchScheduler, MatchError,
    MatchOrchestrator, MatchRequest, MatchResult, MatchStage,
};
pub use searcher::{Candidate, Enricher, SearchError, Searcher, SiteScraper};
