// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求处理生命周期中可能出现的各类失败情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析错误、路径安全错误以及文件系统错误。
//! - **语义映射**：每个变体都有固定的 HTTP 状态码映射，供解析链中的
//!   具体 resolver 生成对应的错误响应。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地
//!   记录到日志或写入错误响应体。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，最终交由异常解析链
/// （`resolver` 模块）转化为 HTTP 响应。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    /// 这通常发生在请求头或正文包含非法字符时。
    RequestIsNotUtf8,
    /// 客户端使用了服务器暂不支持的 HTTP 方法（例如 PUT/DELETE）。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本（例如 HTTP/0.9 或过高的版本）。
    UnsupportedHttpVersion,
    /// 在指定的资源根目录下未找到所请求的文件。在 Web 语义中对应 `404 Not Found`。
    FileNotFound,
    /// 请求的路径格式非法或包含越权尝试（如目录遍历攻击）。对应 `400 Bad Request`。
    InvalidPath,
    /// 读取资源时发生了意料之外的 I/O 失败。对应 `500 Internal Server Error`。
    InternalError,
}

use Exception::*;

impl Exception {
    /// 返回该异常对应的 HTTP 状态码。
    ///
    /// 映射是固定约定：解析链中的 resolver 据此选取状态行与原因短语。
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 => 400,
            UnSupportedRequestMethod => 405,
            UnsupportedHttpVersion => 400,
            FileNotFound => 404,
            InvalidPath => 400,
            InternalError => 500,
        }
    }
}

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
///
/// 工业实践中，这些描述信息常用于系统日志（Logging）以及发送给开发者的调试响应体中。
impl fmt::Display for Exception {
    /// 根据错误类型写入人类可读的描述文本。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            FileNotFound => write!(f, "File not found (404)"),
            InvalidPath => write!(f, "Invalid path (400)"),
            InternalError => write!(f, "Unexpected I/O failure (500)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 状态码映射是固定约定
    #[test]
    fn test_status_code_mapping() {
        assert_eq!(RequestIsNotUtf8.status_code(), 400);
        assert_eq!(UnSupportedRequestMethod.status_code(), 405);
        assert_eq!(UnsupportedHttpVersion.status_code(), 400);
        assert_eq!(FileNotFound.status_code(), 404);
        assert_eq!(InvalidPath.status_code(), 400);
        assert_eq!(InternalError.status_code(), 500);
    }

    /// Display输出可直接写入日志与响应体
    #[test]
    fn test_display() {
        assert_eq!(FileNotFound.to_string(), "File not found (404)");
        assert_eq!(InvalidPath.to_string(), "Invalid path (400)");
    }
}
