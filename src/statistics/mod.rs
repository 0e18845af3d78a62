//! 统计模块聚合
//!
//! 响应体用量提取与用量账本写入

pub mod service;
pub mod usage_extractor;
pub mod util;

pub use service::{BodyCollector, RecordOutcome, UsageRecorder};
pub use usage_extractor::{UsageExtraction, UsageParseError, extract_usage};
