pub mod accessibility;
pub mod analyzers;
pub mod auditor;
pub mod auth;
pub mod browser;
pub mod config;
pub mod crawler;
pub mod discovery;
pub mod error;
pub mod issue;
pub mod page;
pub mod performance;
pub mod result;
pub mod validation;

pub use auditor::Auditor;
pub use auth::BasicAuth;
pub use config::AuditConfig;
pub use crawler::{CrawlProgress, Crawler, ProgressCallback};
pub use error::AuditError;
pub use result::{CrawlPlan, CrawlResult, PageResult};
pub use validation::{is_allowed_target, validate_target_url};
