//! # 用量提取器
//!
//! 从上游响应体中读取 Token 用量。按顺序检查：
//!
//! 1. `usage.input_tokens` / `usage.output_tokens`（Anthropic 风格）
//! 2. `usage.prompt_tokens` / `usage.completion_tokens`（OpenAI 风格，两个字段都存在时覆盖 1）
//! 3. 顶层 `data` 数组中每个元素的 `usage.prompt_tokens` / `usage.completion_tokens`（累加）
//!
//! 流式响应（以 `data:` 或 `event:` 开头）整体跳过。除 SSE 的 `data:` 行外，
//! Anthropic 的流式响应以 `event:` 行开头，同样视为流式。

use serde_json::Value;

use crate::store::TokenUsage;

/// 流式响应的起始标记
pub const STREAMING_MARKERS: &[&[u8]] = &[b"data:", b"event:"];

/// 提取结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageExtraction {
    /// 找到了至少一组用量字段
    Usage(TokenUsage),
    /// 流式响应，不统计
    Streaming,
    /// 合法 JSON 但没有可识别的用量字段
    NoUsage,
}

/// 响应体无法解析
#[derive(Debug, thiserror::Error)]
pub enum UsageParseError {
    #[error("响应体不是合法的 UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("响应体不是合法的 JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// 是否为流式响应体（精确前缀匹配，不去除空白）
#[must_use]
pub fn is_streaming_body(body: &[u8]) -> bool {
    STREAMING_MARKERS.iter().any(|marker| body.starts_with(marker))
}

/// 从原始响应体中提取用量
pub fn extract_usage(body: &[u8]) -> Result<UsageExtraction, UsageParseError> {
    if is_streaming_body(body) {
        return Ok(UsageExtraction::Streaming);
    }

    let text = std::str::from_utf8(body)?;
    let json: Value = serde_json::from_str(text)?;

    Ok(extract_usage_from_json(&json).map_or(UsageExtraction::NoUsage, UsageExtraction::Usage))
}

/// 从已解析的 JSON 中提取用量，没有任何形状匹配时返回 `None`
#[must_use]
pub fn extract_usage_from_json(json: &Value) -> Option<TokenUsage> {
    let usage = json.get("usage");
    let anthropic = usage.and_then(|u| token_pair(u, "input_tokens", "output_tokens"));
    let openai = usage.and_then(|u| token_pair(u, "prompt_tokens", "completion_tokens"));
    // OpenAI 字段只有两个都存在时才覆盖 Anthropic 字段
    let openai_complete = usage
        .filter(|u| has_both(u, "prompt_tokens", "completion_tokens"))
        .and(openai);
    let mut total = openai_complete.or(anthropic).or(openai);

    if let Some(items) = json.get("data").and_then(Value::as_array) {
        for item in items {
            let Some(item_usage) = item
                .get("usage")
                .and_then(|u| token_pair(u, "prompt_tokens", "completion_tokens"))
            else {
                continue;
            };
            total = Some(total.unwrap_or_default().saturating_add(item_usage));
        }
    }

    total
}

/// 两个字段中至少一个为非负整数时匹配，另一个按 0 计
fn token_pair(usage: &Value, input_field: &str, output_field: &str) -> Option<TokenUsage> {
    let input = usage.get(input_field).and_then(Value::as_u64);
    let output = usage.get(output_field).and_then(Value::as_u64);
    if input.is_none() && output.is_none() {
        return None;
    }
    Some(TokenUsage::new(input.unwrap_or(0), output.unwrap_or(0)))
}

fn has_both(usage: &Value, first: &str, second: &str) -> bool {
    usage.get(first).and_then(Value::as_u64).is_some()
        && usage.get(second).and_then(Value::as_u64).is_some()
}
