//! # 测试 Mock 对象

use async_trait::async_trait;
use mockall::mock;

use crate::error::Result;
use crate::store::{KeyStore, ResolvedKey, TokenUsage, UsageBucket, UsageLedger};

mock! {
    /// Mock 密钥库
    pub KeyStore {}

    #[async_trait]
    impl KeyStore for KeyStore {
        async fn find_active(&self, proxy_key: &str) -> Result<Option<ResolvedKey>>;
    }
}

mock! {
    /// Mock 用量账本
    pub UsageLedger {}

    #[async_trait]
    impl UsageLedger for UsageLedger {
        async fn increment(&self, api_key_id: i32, bucket: UsageBucket, delta: TokenUsage) -> Result<()>;
        async fn get(&self, api_key_id: i32, bucket: UsageBucket) -> Result<TokenUsage>;
    }
}
