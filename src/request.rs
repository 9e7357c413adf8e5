// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 该模块负责将 TCP 流中读取的原始字节码解析为强类型的 `Request` 结构体。
//! 它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、版本）。
//! 2. 常用 HTTP 标头（Headers）的提取。
//! 3. 内容协商（Content Negotiation）相关的 `Accept` 与 `Accept-Encoding` 解析。
//!
//! 解析产生的 `Request` 同时充当异常解析链的请求上下文：resolver 依据其中的
//! `Accept` 等字段决定以何种形式渲染错误响应。

use crate::{exception::Exception, param::*};
use log::error;

/// 表示一个完整的 HTTP 请求元数据。
///
/// 该结构体不包含请求体（Body）的大数据部分，主要用于路由分发与错误解析。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, POST 等）
    method: HttpRequestMethod,
    /// 请求的资源路径（包含查询字符串）
    path: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 客户端标识字符串
    user_agent: String,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    /// 客户端接受的内容类型（MIME）
    accept: Option<String>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 验证编码：确保请求数据是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、路径和协议版本。
    /// 3. 迭代解析标头：识别 `User-Agent`, `Accept`, `Accept-Encoding` 字段。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 全局请求 ID，用于在多线程环境下追踪日志。
    ///
    /// # 错误处理
    /// 如果请求格式不符合 HTTP 规范或使用了不支持的方法/版本，将返回相应的 `Exception`。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        // 1. 将字节流转换为字符串，失败则判定为非法的 HTTP 请求
        let request_string = match String::from_utf8(buffer.to_vec()) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let request_lines: Vec<&str> = request_string.split(CRLF).collect();

        // 2. 解析请求行 (e.g., "GET /index.html HTTP/1.1")
        let first_line_parts: Vec<&str> = request_lines[0].split(' ').collect();

        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_lines[0]);
            return Err(Exception::UnSupportedRequestMethod);
        }

        // 解析方法名
        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        // 解析协议版本
        let version_str = first_line_parts.last().unwrap().to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 解析路径（考虑到路径中可能包含空格的情况，虽然不规范但通过 join 尝试恢复）
        let path = if first_line_parts.len() == 3 {
            first_line_parts[1].to_string()
        } else {
            first_line_parts[1..first_line_parts.len() - 1].join(" ")
        };

        // 3. 迭代各行解析 Headers（字段名大小写不敏感）
        let mut user_agent = "".to_string();
        let mut accept_encoding = vec![];
        let mut accept = None;
        for line in &request_lines[1..] {
            let (name, value) = match line.split_once(": ") {
                Some(pair) => pair,
                None => continue,
            };
            match name.to_lowercase().as_str() {
                "user-agent" => user_agent = value.to_string(),
                "accept" => accept = Some(value.to_string()),
                "accept-encoding" => {
                    // 只要包含关键词即视为支持
                    if value.contains("gzip") {
                        accept_encoding.push(HttpEncoding::Gzip);
                    }
                    if value.contains("deflate") {
                        accept_encoding.push(HttpEncoding::Deflate);
                    }
                    if value.contains("br") {
                        accept_encoding.push(HttpEncoding::Br);
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            method,
            path,
            version,
            user_agent,
            accept_encoding,
            accept,
        })
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取请求路径（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// 获取客户端支持的压缩算法列表
    pub fn accept_encoding(&self) -> &Vec<HttpEncoding> {
        &self.accept_encoding
    }

    /// 获取客户端接受的文件 MIME 类型
    pub fn accept(&self) -> Option<&String> {
        self.accept.as_ref()
    }
}
