//! # 直接响应
//!
//! 代理自身生成的纯文本响应（401 / 404 / 500）

use axum::http::StatusCode;
use bytes::Bytes;
use pingora_core::Result as PingoraResult;
use pingora_http::ResponseHeader;
use pingora_proxy::Session;

/// 纯文本响应的 Content-Type
pub const PLAIN_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// 构造纯文本响应头
pub fn plain_response_header(status: StatusCode, body_len: usize) -> PingoraResult<ResponseHeader> {
    let mut resp = ResponseHeader::build(status.as_u16(), Some(3))?;
    resp.insert_header("content-type", PLAIN_CONTENT_TYPE)?;
    resp.insert_header("cache-control", "no-store")?;
    resp.set_content_length(body_len)?;
    Ok(resp)
}

/// 向客户端写出纯文本响应并结束请求
pub async fn write_plain_response(
    session: &mut Session,
    status: StatusCode,
    body: &str,
) -> PingoraResult<()> {
    let resp = plain_response_header(status, body.len())?;
    session.write_response_header(Box::new(resp), false).await?;
    session
        .write_response_body(Some(Bytes::copy_from_slice(body.as_bytes())), true)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_header() {
        let resp = plain_response_header(StatusCode::UNAUTHORIZED, 18).unwrap();
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers.get("content-type").unwrap(), PLAIN_CONTENT_TYPE);
        assert_eq!(resp.headers.get("content-length").unwrap(), "18");
    }
}
