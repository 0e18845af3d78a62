//! 统计通用工具

use std::borrow::Cow;
use std::io::Read;

/// 统计侧解码失败的原因
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{encoding} 解码失败")]
    Corrupt { encoding: String },
    #[error("解码后超过 {limit} 字节")]
    TooLarge { limit: usize },
}

/// 仅用于统计侧的限量解压（不影响下游透传）
///
/// 支持 gzip/deflate/br；对于逗号分隔的多编码，选择首个可识别的编码处理。
/// 未知编码或没有编码时原样返回。
pub fn decompress_for_stats<'a>(
    encoding: Option<&str>,
    input: &'a [u8],
    max_out: usize,
) -> Result<Cow<'a, [u8]>, DecodeError> {
    use flate2::read::{GzDecoder, ZlibDecoder};

    let normalize = |e: &str| {
        e.split(',')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    };
    let Some(enc) = encoding.map(normalize) else {
        return Ok(Cow::Borrowed(input));
    };

    let decoded = if enc.contains("gzip") {
        read_bounded(GzDecoder::new(input), &enc, max_out)?
    } else if enc.contains("deflate") {
        read_bounded(ZlibDecoder::new(input), &enc, max_out)?
    } else if enc == "br" || enc.contains("brotli") {
        read_bounded(
            brotli_decompressor::Decompressor::new(input, 4096),
            &enc,
            max_out,
        )?
    } else {
        return Ok(Cow::Borrowed(input));
    };

    Ok(Cow::Owned(decoded))
}

fn read_bounded(mut reader: impl Read, encoding: &str, max_out: usize) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(out),
            Ok(n) => {
                if out.len() + n > max_out {
                    return Err(DecodeError::TooLarge { limit: max_out });
                }
                out.extend_from_slice(&buf[..n]);
            }
            Err(_) => {
                return Err(DecodeError::Corrupt {
                    encoding: encoding.to_string(),
                });
            }
        }
    }
}
