//! # 路由分派
//!
//! 根据方法和路径决定请求走哪条处理路径

use axum::http::Method;

/// 预检请求无条件转发的路径
pub const PREFLIGHT_PATHS: &[&str] = &["/v1/chat/completions", "/v1/models"];

/// 模型列表探测路径
pub const MODELS_PATH: &str = "/v1/models";

/// 请求的处理路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `OPTIONS` 预检：不查密钥库，直接转发到预检上游
    Preflight,
    /// `GET /v1/models`：只接受 Bearer 凭证，不统计用量
    ListModels,
    /// `POST *`：任一凭证头，转发并统计用量
    Forward,
    /// 其它请求：纯文本 404
    NotFound,
}

impl Route {
    /// 分类请求
    #[must_use]
    pub fn classify(method: &Method, path: &str) -> Self {
        match *method {
            Method::OPTIONS if PREFLIGHT_PATHS.contains(&path) => Self::Preflight,
            Method::GET if path == MODELS_PATH => Self::ListModels,
            Method::POST => Self::Forward,
            _ => Self::NotFound,
        }
    }

    /// 是否需要统计用量
    #[must_use]
    pub const fn records_usage(self) -> bool {
        matches!(self, Self::Forward)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::ListModels => "list_models",
            Self::Forward => "forward",
            Self::NotFound => "not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Method::OPTIONS, "/v1/chat/completions", Route::Preflight)]
    #[case(Method::OPTIONS, "/v1/models", Route::Preflight)]
    #[case(Method::OPTIONS, "/v1/embeddings", Route::NotFound)]
    #[case(Method::GET, "/v1/models", Route::ListModels)]
    #[case(Method::GET, "/v1/models/gpt-4o", Route::NotFound)]
    #[case(Method::GET, "/v1/chat/completions", Route::NotFound)]
    #[case(Method::POST, "/v1/chat/completions", Route::Forward)]
    #[case(Method::POST, "/v1/messages", Route::Forward)]
    #[case(Method::POST, "/", Route::Forward)]
    #[case(Method::PUT, "/v1/models", Route::NotFound)]
    #[case(Method::DELETE, "/v1/files/1", Route::NotFound)]
    fn test_classify(#[case] method: Method, #[case] path: &str, #[case] expected: Route) {
        assert_eq!(Route::classify(&method, path), expected);
    }

    #[test]
    fn test_only_forward_records_usage() {
        assert!(Route::Forward.records_usage());
        assert!(!Route::ListModels.records_usage());
        assert!(!Route::Preflight.records_usage());
    }
}
