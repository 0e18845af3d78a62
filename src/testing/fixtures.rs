//! # 测试数据 Fixtures
//!
//! 预设的用户/服务商/代理密钥记录，以及典型的上游响应体

use entity::{api_keys, providers, users};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// 服务商测试数据构建器
pub struct ProviderFixture {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub is_active: bool,
}

impl Default for ProviderFixture {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            api_key: "sk-upstream-test".to_string(),
            base_url: "https://api.openai.com".to_string(),
            is_active: true,
        }
    }
}

impl ProviderFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn api_key(mut self, api_key: &str) -> Self {
        self.api_key = api_key.to_string();
        self
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn to_active_model(&self) -> providers::ActiveModel {
        providers::ActiveModel {
            name: Set(self.name.clone()),
            api_key: Set(self.api_key.clone()),
            base_url: Set(self.base_url.clone()),
            path: Set(None),
            is_active: Set(self.is_active),
            ..Default::default()
        }
    }
}

/// 插入一个用户
pub async fn seed_user(db: &DatabaseConnection, email: &str) -> users::Model {
    users::ActiveModel {
        name: Set(email.split('@').next().unwrap_or(email).to_string()),
        email: Set(email.to_string()),
        is_admin: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("插入测试用户失败")
}

/// 插入一个服务商
pub async fn seed_provider(
    db: &DatabaseConnection,
    name: &str,
    api_key: &str,
    base_url: &str,
    is_active: bool,
) -> providers::Model {
    let mut fixture = ProviderFixture::new()
        .name(name)
        .api_key(api_key)
        .base_url(base_url);
    if !is_active {
        fixture = fixture.inactive();
    }
    fixture
        .to_active_model()
        .insert(db)
        .await
        .expect("插入测试服务商失败")
}

/// 插入一个代理密钥
pub async fn seed_key(
    db: &DatabaseConnection,
    user_id: i32,
    provider_id: i32,
    proxy_key: &str,
    is_active: bool,
) -> api_keys::Model {
    api_keys::ActiveModel {
        user_id: Set(user_id),
        provider_id: Set(provider_id),
        name: Set(format!("key {proxy_key}")),
        api_key: Set(proxy_key.to_string()),
        is_active: Set(is_active),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("插入测试代理密钥失败")
}

/// 插入用户、启用的服务商和启用的代理密钥
pub async fn seed_active_key(db: &DatabaseConnection, proxy_key: &str) -> api_keys::Model {
    let user = seed_user(db, &format!("{proxy_key}@example.com")).await;
    let provider = seed_provider(
        db,
        "openai",
        "sk-upstream-test",
        "https://api.openai.com",
        true,
    )
    .await;
    seed_key(db, user.id, provider.id, proxy_key, true).await
}

/// OpenAI 风格的 chat completion 响应
pub const OPENAI_CHAT_BODY: &str = r#"{"id":"chatcmpl-1","object":"chat.completion","choices":[{"index":0,"message":{"role":"assistant","content":"hi"}}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;

/// Anthropic 风格的 messages 响应
pub const ANTHROPIC_MESSAGE_BODY: &str = r#"{"id":"msg_1","type":"message","role":"assistant","content":[{"type":"text","text":"hi"}],"usage":{"input_tokens":7,"output_tokens":3}}"#;

/// 带 `data` 数组的批量响应
pub const BATCH_DATA_BODY: &str = r#"{"data":[{"usage":{"prompt_tokens":2,"completion_tokens":1}},{"usage":{"prompt_tokens":3,"completion_tokens":1}}]}"#;

/// 流式响应的首个事件
pub const SSE_STREAM_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\ndata: [DONE]\n\n";
