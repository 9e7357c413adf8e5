use crate::{
    cache::ResponseCache,
    config::Config,
    exception::Exception,
    key::{KeyArg, KeyGenerator},
    param::*,
    request::Request,
    resolver::ResponseContext,
    util::{format_file_size, HtmlBuilder},
};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};
use serde_derive::Serialize;

use std::{
    ffi::OsStr,
    fs::{metadata, File},
    io::{self, Read, Write},
    path::Path,
    sync::{Arc, Mutex},
};

/// JSON 错误响应体。`detail` 仅在配置允许暴露错误细节时出现。
#[derive(Serialize)]
struct ErrorBody<'a> {
    code: u16,
    reason: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: Some(ALLOWED_METHODS.to_vec()),
            content: None,
        }
    }

    /// 从文件构建响应体，优先命中缓存。
    ///
    /// 缓存键由注入的键派生器从（路径, 编码变体）两个参数折叠而来，
    /// 同一路径的不同压缩变体因此各占一个缓存槽位。键是散列键，
    /// 碰撞由缓存条目的修改时间比对兜底。
    fn from_file(
        path: &str,
        request: &Request,
        id: u128,
        cache: &Arc<Mutex<ResponseCache>>,
        keygen: &dyn KeyGenerator,
        headonly: bool,
        mime: &str,
        config: &Config,
    ) -> Result<Self, Exception> {
        let accept_encoding = request.accept_encoding().to_vec();
        let mut response = Self::new();
        response.allow = None;

        let file_path = Path::new(path);
        let file_metadata = match metadata(file_path) {
            Ok(meta) => meta,
            Err(e) => {
                error!("[ID{}]无法获取文件{}的元数据: {}", id, path, e);
                return Err(Exception::InternalError);
            }
        };
        let file_size = file_metadata.len();
        let file_modified_time = match file_metadata.modified() {
            Ok(time) => time,
            Err(e) => {
                error!("[ID{}]无法获取文件{}的修改时间: {}", id, path, e);
                return Err(Exception::InternalError);
            }
        };

        if headonly {
            // HEAD 只回元数据，不读文件也不参与缓存
            response.content_type = Some(mime.to_string());
            response.content_length = file_size;
            response.content = None;
            return Ok(response);
        }

        let skip_compression =
            should_skip_compression(mime) || file_size < config.compress_min_bytes();
        let mut content_encoding = if skip_compression {
            debug!("[ID{}]跳过压缩（类型: {}, 大小: {} bytes）", id, mime, file_size);
            None
        } else {
            let encoding = decide_encoding(&accept_encoding);
            debug!("[ID{}]决定使用编码: {:?}", id, encoding);
            encoding
        };

        let key = keygen.generate(
            "static",
            "GET",
            &[
                Some(KeyArg::Str(path.to_string())),
                Some(KeyArg::Str(encoding_variant(content_encoding).to_string())),
            ],
        );
        debug!("[ID{}]缓存键: {:?}", id, key);

        let mut cache_lock = match cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("[ID{}]缓存锁被污染，恢复并继续", id);
                poisoned.into_inner()
            }
        };

        let contents = match cache_lock.find(&key, file_modified_time) {
            Some(bytes) => {
                debug!(
                    "[ID{}]缓存命中，大小: {}",
                    id,
                    format_file_size(bytes.len() as u64)
                );
                bytes.clone()
            }
            None => {
                debug!("[ID{}]缓存未命中或文件已修改，读取文件: {}", id, path);
                let mut file = match File::open(path) {
                    Ok(f) => f,
                    Err(e) => {
                        error!("[ID{}]无法打开路径{}指定的文件。错误：{}", id, path, e);
                        return Err(Exception::InternalError);
                    }
                };
                let mut raw = Vec::new();
                if let Err(e) = file.read_to_end(&mut raw) {
                    error!("[ID{}]无法读取文件{}。错误：{}", id, path, e);
                    return Err(Exception::InternalError);
                }

                let encoded = match compress(raw.clone(), content_encoding) {
                    Ok(c) => c,
                    Err(e) => {
                        error!("[ID{}]压缩文件{}失败: {}，返回未压缩内容", id, path, e);
                        content_encoding = None;
                        raw
                    }
                };
                let encoded = Bytes::from(encoded);

                if ResponseCache::should_cache(file_size, config.cache_max_file_bytes()) {
                    // 以实际产生的变体为准重算键，压缩失败时回落到identity槽位
                    let final_key = keygen.generate(
                        "static",
                        "GET",
                        &[
                            Some(KeyArg::Str(path.to_string())),
                            Some(KeyArg::Str(encoding_variant(content_encoding).to_string())),
                        ],
                    );
                    cache_lock.push(final_key, encoded.clone(), file_modified_time);
                    debug!("[ID{}]文件已加入缓存", id);
                } else {
                    debug!("[ID{}]文件过大({} bytes)，跳过缓存", id, file_size);
                }
                encoded
            }
        };

        response.content_length = contents.len() as u64;
        response.content_type = Some(mime.to_string());
        response.content_encoding = content_encoding;
        response.content = Some(contents);
        Ok(response)
    }

    fn from_status_code(code: u16, note: Option<&str>, accept_encoding: Vec<HttpEncoding>, id: u128) -> Self {
        let mut response = Self::new();
        response.content_encoding = decide_encoding(&accept_encoding);
        if code == 204 {
            response.content = None;
            response.content_encoding = None;
            response.content_type = None;
            response.allow = Some(ALLOWED_METHODS.to_vec());
            response.set_code(code);
            return response;
        }
        response.allow = None;
        match response.content_encoding {
            Some(HttpEncoding::Gzip) => debug!("[ID{}]使用Gzip压缩编码", id),
            Some(HttpEncoding::Br) => debug!("[ID{}]使用Brotli压缩编码", id),
            Some(HttpEncoding::Deflate) => debug!("[ID{}]使用Deflate压缩编码", id),
            None => debug!("[ID{}]不进行压缩", id),
        };
        let content = HtmlBuilder::from_status_code(code, note).build();
        let content_compressed = compress(content.into_bytes(), response.content_encoding).unwrap();
        let bytes = Bytes::from(content_compressed);
        response.content_length = bytes.len() as u64;
        response.content = Some(bytes);
        response.content_type = Some("text/html;charset=utf-8".to_string());
        response.set_code(code);
        response
    }

    /// 将异常渲染为 HTML 错误页响应。
    ///
    /// 状态码来自异常的固定映射；配置允许时在页面中附上异常描述。
    pub fn error_page(exception: &Exception, request: &Request, ctx: &ResponseContext) -> Self {
        let code = exception.status_code();
        let note = if ctx.expose_error_detail() {
            Some(exception.to_string())
        } else {
            None
        };
        Self::from_status_code(code, note.as_deref(), request.accept_encoding().to_vec(), ctx.id())
            .set_date()
            .set_version()
            .set_server_name()
            .to_owned()
    }

    /// 将异常渲染为 JSON 错误响应（供接受 `application/json` 的客户端）。
    ///
    /// 错误体很小，不参与压缩。
    pub fn json_error(exception: &Exception, _request: &Request, ctx: &ResponseContext) -> Self {
        let code = exception.status_code();
        let reason = STATUS_CODES.get(&code).copied().unwrap_or("Unknown");
        let detail = if ctx.expose_error_detail() {
            Some(exception.to_string())
        } else {
            None
        };
        let body = serde_json::to_vec(&ErrorBody {
            code,
            reason,
            detail,
        })
        .unwrap();

        let mut response = Self::new();
        response.allow = None;
        response.content_length = body.len() as u64;
        response.content = Some(Bytes::from(body));
        response.content_type = Some("application/json".to_string());
        response.set_code(code);
        response
            .set_date()
            .set_version()
            .set_server_name()
            .to_owned()
    }

    fn set_date(&mut self) -> &mut Self {
        self.date = Utc::now();
        self
    }

    fn set_version(&mut self) -> &mut Self {
        self.version = HttpVersion::V1_1;
        self
    }

    fn set_server_name(&mut self) -> &mut Self {
        self.server_name = SERVER_NAME.to_string();
        self
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&information) => information.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                panic!();
            }
        };
        self
    }

    /// 从路由产出的物理路径构建响应。
    ///
    /// 与错误渲染解耦：任何失败都以 `Exception` 形式返回，
    /// 由调用方交给异常解析链去生成错误响应。
    pub fn from(
        path: &str,
        request: &Request,
        id: u128,
        cache: &Arc<Mutex<ResponseCache>>,
        keygen: &dyn KeyGenerator,
        config: &Config,
    ) -> Result<Response, Exception> {
        let accept_encoding = request.accept_encoding().to_vec();
        let method = request.method();

        if method != HttpRequestMethod::Get
            && method != HttpRequestMethod::Head
            && method != HttpRequestMethod::Options
        {
            return Err(Exception::UnSupportedRequestMethod);
        }

        if method == HttpRequestMethod::Options {
            debug!("[ID{}]请求方法为OPTIONS", id);
            return Ok(Self::from_status_code(204, None, accept_encoding, id)
                .set_date()
                .set_version()
                .set_server_name()
                .to_owned());
        }

        let headonly = match method {
            HttpRequestMethod::Head => {
                debug!("[ID{}]请求方法为HEAD", id);
                true
            }
            _ => false,
        };

        let file_metadata = match metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("[ID{}]无法获取{}的元数据：{}", id, path, e);
                return Err(Exception::InternalError);
            }
        };
        if file_metadata.is_dir() {
            debug!("[ID{}]请求的路径是目录，按未找到处理", id);
            return Err(Exception::FileNotFound);
        }

        let extension = match Path::new(path).extension() {
            Some(e) => e,
            None => {
                error!("[ID{}]无法确定请求路径{}的文件扩展名", id, path);
                return Err(Exception::FileNotFound);
            }
        };
        let mime = get_mime(extension);
        debug!("[ID{}]MIME类型: {}", id, mime);

        Ok(
            Self::from_file(path, request, id, cache, keygen, headonly, mime, config)?
                .set_date()
                .set_code(200)
                .set_version()
                .set_server_name()
                .to_owned(),
        )
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        if self.content == None && self.content_type == None {
            assert_eq!(self.content_encoding, None);
        }
        let version: &str = match self.version {
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);
        let server: &str = &self.server_name;

        let header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match self.content_encoding {
                Some(e) => ["Content-Encoding: ", &e.to_string(), CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            "Date: ",
            date,
            CRLF,
            "Server: ",
            server,
            CRLF,
            match &self.allow {
                Some(a) => {
                    let mut allow_str = String::new();
                    for (index, method) in a.iter().enumerate() {
                        allow_str.push_str(&format!("{}", method));
                        if index < a.len() - 1 {
                            allow_str.push_str(", ");
                        }
                    }
                    ["Allow: ", &allow_str, CRLF].concat()
                }
                None => "".to_string(),
            }
            .as_str(),
            CRLF,
        ]
        .concat();
        [
            header.as_bytes(),
            match &self.content {
                Some(c) => c,
                None => b"",
            },
        ]
        .concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

// 编码变体标记，参与缓存键派生
fn encoding_variant(encoding: Option<HttpEncoding>) -> &'static str {
    match encoding {
        Some(HttpEncoding::Gzip) => "gzip",
        Some(HttpEncoding::Deflate) => "deflate",
        Some(HttpEncoding::Br) => "br",
        None => "identity",
    }
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        let compressed_size = compressed.len();
        let ratio = if original_size > 0 {
            ((original_size as i64 - compressed_size as i64) as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes, 压缩率: {:.1}%",
            mode, original_size, compressed_size, ratio
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/x-icon",
        "video/",
        "audio/",
        "application/zip",
        "application/pdf",
        "font/woff",
        "font/woff2",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else if accept_encoding.contains(&HttpEncoding::Br) {
        Some(HttpEncoding::Br)
    } else {
        None
    }
}

fn get_mime(extension: &OsStr) -> &str {
    let extension = match extension.to_str() {
        Some(e) => e,
        None => {
            error!("无法将&OsStr转换为&str类型");
            return "application/octet-stream";
        }
    };
    match MIME_TYPES.get(extension) {
        Some(v) => v,
        None => "application/octet-stream",
    }
}
