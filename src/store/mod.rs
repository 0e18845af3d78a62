//! # 存储模块
//!
//! 代理核心依赖的两个协作者：只读的密钥库和按月累加的用量账本。
//! 各自提供基于 Sea-ORM 的实现和进程内实现。

pub mod key_store;
pub mod memory;
pub mod usage_ledger;
pub mod usage_report;

pub use key_store::{DbKeyStore, KeyStore, ResolvedKey};
pub use memory::{MemoryKeyStore, MemoryUsageLedger};
pub use usage_ledger::{DbUsageLedger, TokenUsage, UsageBucket, UsageLedger};
pub use usage_report::{KeyUsageSummary, api_key_exists, monthly_summary_for_user};
