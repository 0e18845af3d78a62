//! # 用量记录服务
//!
//! 响应发送完毕后解析响应体并写入用量账本。任何失败只记日志，不影响客户端。

use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;

use super::usage_extractor::{UsageExtraction, extract_usage};
use super::util::decompress_for_stats;
use crate::logging::{LogComponent, LogStage};
use crate::store::{TokenUsage, UsageBucket, UsageLedger};
use crate::{ldebug, linfo, lwarn};

/// 为统计而收集的响应体，超过上限后丢弃已收集内容
#[derive(Debug, Clone)]
pub struct BodyCollector {
    buf: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl BodyCollector {
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            overflowed: false,
        }
    }

    /// 追加一个分片
    pub fn push(&mut self, chunk: &[u8]) {
        if self.overflowed {
            return;
        }
        if self.buf.len() + chunk.len() > self.limit {
            self.overflowed = true;
            self.buf = Vec::new();
            return;
        }
        self.buf.extend_from_slice(chunk);
    }

    #[must_use]
    pub const fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}

/// 一次记录的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// 已写入账本
    Recorded(TokenUsage),
    /// 流式响应
    SkippedStreaming,
    /// 没有用量字段，或用量全为 0
    SkippedNoUsage,
    /// 响应体超过统计上限
    SkippedOversized,
    /// 解码/解析失败
    ParseFailed,
    /// 账本写入失败
    LedgerFailed,
}

/// 用量记录器
pub struct UsageRecorder {
    ledger: Arc<dyn UsageLedger>,
    max_body_bytes: usize,
}

impl UsageRecorder {
    #[must_use]
    pub fn new(ledger: Arc<dyn UsageLedger>, max_body_bytes: usize) -> Self {
        Self {
            ledger,
            max_body_bytes,
        }
    }

    /// 统计收集上限
    #[must_use]
    pub const fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// 新建一个与上限匹配的收集器
    #[must_use]
    pub const fn collector(&self) -> BodyCollector {
        BodyCollector::new(self.max_body_bytes)
    }

    /// 以本地时间所在月份记录
    pub async fn record(
        &self,
        request_id: &str,
        api_key_id: i32,
        content_encoding: Option<&str>,
        body: &BodyCollector,
    ) -> RecordOutcome {
        self.record_at(request_id, api_key_id, content_encoding, body, &Local::now())
            .await
    }

    /// 以给定时间所在月份记录
    pub async fn record_at<Tz: TimeZone>(
        &self,
        request_id: &str,
        api_key_id: i32,
        content_encoding: Option<&str>,
        body: &BodyCollector,
        at: &DateTime<Tz>,
    ) -> RecordOutcome
    where
        Tz::Offset: Send + Sync,
    {
        if body.is_overflowed() {
            lwarn!(
                request_id,
                LogStage::Statistics,
                LogComponent::Statistics,
                "body_too_large",
                "响应体超过统计上限，跳过用量统计",
                limit = body.limit()
            );
            return RecordOutcome::SkippedOversized;
        }

        let decoded = match decompress_for_stats(content_encoding, body.as_bytes(), self.max_body_bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                lwarn!(
                    request_id,
                    LogStage::Statistics,
                    LogComponent::Statistics,
                    "decode_failed",
                    &format!("响应体解码失败: {e}")
                );
                return RecordOutcome::ParseFailed;
            }
        };

        let usage = match extract_usage(&decoded) {
            Ok(UsageExtraction::Usage(usage)) if !usage.is_zero() => usage,
            Ok(UsageExtraction::Usage(_) | UsageExtraction::NoUsage) => {
                ldebug!(
                    request_id,
                    LogStage::Statistics,
                    LogComponent::Statistics,
                    "no_usage",
                    "响应中没有用量字段"
                );
                return RecordOutcome::SkippedNoUsage;
            }
            Ok(UsageExtraction::Streaming) => {
                ldebug!(
                    request_id,
                    LogStage::Statistics,
                    LogComponent::Statistics,
                    "streaming_skipped",
                    "流式响应，跳过用量统计"
                );
                return RecordOutcome::SkippedStreaming;
            }
            Err(e) => {
                lwarn!(
                    request_id,
                    LogStage::Statistics,
                    LogComponent::Statistics,
                    "usage_parse_failed",
                    &format!("用量解析失败: {e}"),
                    body_len = decoded.len()
                );
                return RecordOutcome::ParseFailed;
            }
        };

        let bucket = UsageBucket::from_datetime(at);
        if let Err(e) = self.ledger.increment(api_key_id, bucket, usage).await {
            lwarn!(
                request_id,
                LogStage::Statistics,
                LogComponent::UsageLedger,
                "ledger_write_failed",
                &format!("写入用量账本失败: {e}"),
                api_key_id = api_key_id
            );
            return RecordOutcome::LedgerFailed;
        }

        linfo!(
            request_id,
            LogStage::Statistics,
            LogComponent::UsageLedger,
            "usage_recorded",
            "用量已记录",
            api_key_id = api_key_id,
            year = bucket.year,
            month = bucket.month,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens
        );
        RecordOutcome::Recorded(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use crate::store::MemoryUsageLedger;
    use crate::testing::fixtures::{OPENAI_CHAT_BODY, SSE_STREAM_BODY};
    use crate::testing::mocks::MockUsageLedger;
    use chrono::Utc;

    fn collected(body: &str) -> BodyCollector {
        let mut collector = BodyCollector::new(1024);
        collector.push(body.as_bytes());
        collector
    }

    #[test]
    fn test_collector_overflow_drops_buffer() {
        let mut collector = BodyCollector::new(8);
        collector.push(b"1234");
        collector.push(b"5678");
        assert!(!collector.is_overflowed());
        collector.push(b"9");
        assert!(collector.is_overflowed());
        assert!(collector.as_bytes().is_empty());
        collector.push(b"0");
        assert!(collector.as_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_records_into_bucket_of_given_time() {
        let ledger = Arc::new(MemoryUsageLedger::new());
        let recorder = UsageRecorder::new(ledger.clone(), 1024);
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();

        let outcome = recorder
            .record_at("req", 3, None, &collected(OPENAI_CHAT_BODY), &at)
            .await;

        assert_eq!(outcome, RecordOutcome::Recorded(TokenUsage::new(10, 5)));
        let bucket = UsageBucket::new(2024, 2).unwrap();
        assert_eq!(ledger.get(3, bucket).await.unwrap(), TokenUsage::new(10, 5));
    }

    #[tokio::test]
    async fn test_skips_do_not_touch_ledger() {
        let ledger = Arc::new(MemoryUsageLedger::new());
        let recorder = UsageRecorder::new(ledger.clone(), 1024);

        assert_eq!(
            recorder.record("req", 1, None, &collected(SSE_STREAM_BODY)).await,
            RecordOutcome::SkippedStreaming
        );
        assert_eq!(
            recorder.record("req", 1, None, &collected("not json")).await,
            RecordOutcome::ParseFailed
        );
        assert_eq!(
            recorder
                .record("req", 1, None, &collected(r#"{"usage":{"prompt_tokens":0,"completion_tokens":0}}"#))
                .await,
            RecordOutcome::SkippedNoUsage
        );
        assert_eq!(
            recorder.record("req", 1, Some("gzip"), &collected(OPENAI_CHAT_BODY)).await,
            RecordOutcome::ParseFailed
        );

        let mut oversized = BodyCollector::new(4);
        oversized.push(OPENAI_CHAT_BODY.as_bytes());
        assert_eq!(
            recorder.record("req", 1, None, &oversized).await,
            RecordOutcome::SkippedOversized
        );

        assert_eq!(ledger.writes(), 0);
    }

    #[tokio::test]
    async fn test_ledger_failure_is_swallowed() {
        let mut ledger = MockUsageLedger::new();
        ledger
            .expect_increment()
            .times(1)
            .returning(|_, _, _| Err(ProxyError::database("磁盘已满")));
        let recorder = UsageRecorder::new(Arc::new(ledger), 1024);

        assert_eq!(
            recorder.record("req", 1, None, &collected(OPENAI_CHAT_BODY)).await,
            RecordOutcome::LedgerFailed
        );
    }
}
