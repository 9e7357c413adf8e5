// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 演示用静态文件服务器
//!
//! 该二进制把本库的各个构件装配成一个完整的异步 Web 服务器：
//! - 以派生键索引的响应缓存（LRU）
//! - 配置后冻结的异常解析链（JSON 协商优先，HTML 错误页兜底）
//! - 基于 Tokio 运行时的多线程异步 I/O 处理
//! - 带目录遍历防护的静态资源路由
//! - 后台管理控制台（CLI 指令交互）

use websupport::{
    cache::ResponseCache,
    config::Config,
    exception::Exception,
    key::DefaultKeyGenerator,
    param::HTML_INDEX,
    request::Request,
    resolver::{
        ErrorPageResolver, ExceptionResolver, ExceptionResolverComposite, JsonErrorResolver,
        ResponseContext,
    },
    response::Response,
};

use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use log4rs;
use regex::Regex;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Instant,
};

lazy_static! {
    /// 目录遍历攻击特征：路径中任何独立出现的".."分段
    static ref TRAVERSAL_PATTERN: Regex = Regex::new(r"(^|[/\\])\.\.([/\\]|$)").unwrap();
}

/// 解析链也放弃时回落的裸响应
const FALLBACK_500: &str =
    "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 21\r\n\r\nInternal Server Error";

/// # 程序入口点
///
/// 初始化系统环境、加载配置、装配解析链并启动主事件循环。
fn main() {
    // 1. 初始化日志系统：采用 log4rs 异步日志架构，通过外部 YAML 灵活配置级别与输出目的地
    log4rs::init_file("config/log4rs.yaml", Default::default()).unwrap();

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = Config::from_toml("config/development.toml");
    info!("配置文件已载入");
    let root = config.www_root().to_string();
    info!("www root: {}", &root);

    // 3. 异步运行时定制：根据配置文件动态分配工作线程数
    let worker_threads = config.worker_threads();
    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .unwrap();

    // 4. 共享资源初始化：
    // - 使用 Arc<Mutex<...>> 保证缓存系统在多线程环境下的线程安全
    // - 键派生器与解析链装配后冻结，只读共享，无需加锁
    let cache_size = config.cache_size();
    let cache = Arc::new(Mutex::new(ResponseCache::from_capacity(cache_size)));
    let keygen = Arc::new(DefaultKeyGenerator);
    let config_arc = Arc::new(config.clone());

    // 5. 装配异常解析链：列表顺序就是解析顺序，JSON 协商优先，HTML 错误页兜底
    let mut composite = ExceptionResolverComposite::new();
    composite.set_order(0);
    composite.set_resolvers(vec![Box::new(JsonErrorResolver), Box::new(ErrorPageResolver)]);
    info!("异常解析链装配完成，共{}个resolver", composite.resolvers().len());
    let chain = Arc::new(composite);

    runtime.block_on(async move {
        // 6. 网络层初始化：
        // 支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
        let port: u16 = config.port();
        info!("服务端将在{}端口上监听Socket连接", port);
        let address = match config.local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        info!("服务端将在{}地址上监听Socket连接", address);
        let socket = SocketAddrV4::new(address, port);

        // 绑定端口并启动监听器
        let listener = match TcpListener::bind(socket).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定端口：{}，错误：{}", port, e);
                panic!("无法绑定端口：{}，错误：{}", port, e);
            }
        };
        info!("端口{}绑定完成", port);

        // 7. 服务器状态与生命周期管理
        // shutdown_flag: 用于优雅停机 (Graceful Shutdown)
        // active_connection: 追踪当前并发连接数
        let shutdown_flag = Arc::new(Mutex::new(false));
        let active_connection = Arc::new(Mutex::new(0u32));

        // 8. 启动交互式管理控制台任务
        // 该任务运行在后台，不阻塞监听循环，提供运维指令支持
        tokio::spawn({
            let shutdown_flag = Arc::clone(&shutdown_flag);
            let active_connection = Arc::clone(&active_connection);
            async move {
                let stdin = tokio::io::stdin();
                let mut reader = BufReader::new(stdin);
                let mut input = String::new();
                loop {
                    input.clear();
                    if let Ok(n) = reader.read_line(&mut input).await {
                        if n == 0 {
                            break; // stdin已关闭
                        }
                        let cmd = input.trim();
                        match cmd {
                            "stop" => {
                                let mut flag = shutdown_flag.lock().unwrap();
                                *flag = true;
                                println!("停机指令已激活，服务器将在处理完下一个请求后关闭...");
                                break;
                            }
                            "help" => {
                                println!("== Websupport Help ==");
                                println!("stop   - 发出停机信号");
                                println!("status - 查看当前服务器运行状态");
                                println!("help   - 显示此帮助信息");
                                println!("=====================");
                            }
                            "status" => {
                                let active_count = *active_connection.lock().unwrap();
                                println!("== Websupport 状态 ==");
                                println!("当前活跃连接数: {}", active_count);
                                println!("=====================");
                            }
                            _ => {
                                println!("无效的命令：{}", cmd);
                            }
                        }
                    } else {
                        break;
                    }
                }
            }
        });

        let mut id: u128 = 0;

        // 9. 主事件循环 (Accept Loop)
        // 持续接收新连接并将其分发至 Tokio 线程池进行异步处理
        loop {
            // 检查停机标志位
            if *shutdown_flag.lock().unwrap() {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }

            // 等待新的 TCP 连接
            let (mut stream, addr) = listener.accept().await.unwrap();
            debug!("新的连接：{}", addr);

            // 为每个连接克隆资源句柄（Arc 引用计数增加）
            let active_connection_arc = Arc::clone(&active_connection);
            let root_clone = root.clone();
            let cache_arc = Arc::clone(&cache);
            let keygen_arc = Arc::clone(&keygen);
            let chain_arc = Arc::clone(&chain);
            let config_arc_clone = Arc::clone(&config_arc);

            debug!("[ID{}]TCP连接已建立", id);

            // 使用轻量级绿色线程处理具体请求，确保非阻塞 IO
            tokio::spawn(async move {
                {
                    // 连接计数加 1
                    let mut lock = active_connection_arc.lock().unwrap();
                    *lock += 1;
                }

                // 核心业务处理
                handle_connection(
                    &mut stream,
                    id,
                    &root_clone,
                    cache_arc,
                    keygen_arc,
                    chain_arc,
                    config_arc_clone,
                )
                .await;

                {
                    // 处理完成后连接计数减 1
                    let mut lock = active_connection_arc.lock().unwrap();
                    *lock -= 1;
                }
            });
            id += 1; // 增加请求唯一标识序列
        }
    });
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期：读取解析请求、执行路由逻辑、构建并发送响应。
/// 路由与响应构建过程中产生的任何 `Exception` 都交给异常解析链渲染；
/// 整条链都放弃时回落到裸 500（失败继续向上暴露）。
async fn handle_connection(
    stream: &mut TcpStream,
    id: u128,
    root: &str,
    cache: Arc<Mutex<ResponseCache>>,
    keygen: Arc<DefaultKeyGenerator>,
    chain: Arc<ExceptionResolverComposite>,
    config: Arc<Config>,
) {
    let mut buffer = vec![0; 1024];

    // 等待流进入可读状态
    if let Err(e) = stream.readable().await {
        error!("[ID{}]等待TCPStream可读时遇到错误: {}", id, e);
        return;
    }

    // 尝试非阻塞读取 HTTP 报文
    match stream.try_read(&mut buffer) {
        Ok(0) => return, // 客户端主动关闭连接
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
        _ => {}
    }
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();

    // 1. 协议解析阶段：将字节流转换为结构化的 Request 对象
    // 解析失败时没有可供解析链使用的请求上下文，直接回落到裸 400
    let request = match Request::try_from(&buffer, id) {
        Ok(req) => req,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {:?}", id, e);
            let response = "HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\n\r\nBad Request";
            let _ = stream.write_all(response.as_bytes()).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let ctx = ResponseContext::new(id, &config);

    // 2. 路由匹配阶段：确定资源在文件系统中的物理路径
    // 3. 响应构建阶段：失败连同处理器标识一并交给解析链
    let outcome = match route(request.path(), id, root) {
        Ok(path) => {
            debug!("[ID{}]HTTP路由解析完毕", id);
            match path.to_str() {
                Some(path_str) => {
                    Response::from(path_str, &request, id, &cache, keygen.as_ref(), &config)
                        .map_err(|e| (e, Some("static")))
                }
                None => {
                    error!("[ID{}]无法将路径转换为str", id);
                    Err((Exception::InvalidPath, Some("static")))
                }
            }
        }
        // 路由阶段的失败发生在处理器选定之前
        Err(e) => Err((e, None)),
    };

    let response = match outcome {
        Ok(response) => response,
        Err((exception, handler)) => {
            warn!("[ID{}]请求处理失败：{}，交给异常解析链", id, exception);
            match chain.resolve(&request, &ctx, handler, &exception) {
                Some(response) => response,
                None => {
                    warn!("[ID{}]异常解析链放弃处理，回落到裸500", id);
                    let _ = stream.write_all(FALLBACK_500.as_bytes()).await;
                    return;
                }
            }
        }
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );

    // 4. 结构化日志记录：便于后期审计与性能监控
    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, ",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    // 5. 数据发送阶段
    let response_bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, response_bytes.len());
    let _ = stream.write_all(&response_bytes).await;
    let _ = stream.flush().await;
}

/// # 路由引擎
///
/// 将抽象的 URI 映射到服务器本地的文件系统路径。
///
/// ## 路由规则：
/// 1. `*` -> OPTIONS 通配符，原样放行。
/// 2. 含目录遍历分段（`..`）的路径 -> 直接拒绝。
/// 3. `/` 与目录路径 -> 查找其下的 `index.html`。
/// 4. 其余路径 -> 拼接到 `www_root` 下进行查找。
fn route(path: &str, id: u128, root: &str) -> Result<PathBuf, Exception> {
    debug!("[ID{}]路由匹配开始: path='{}'", id, path);

    // 通配符处理
    if path == "*" {
        return Ok(PathBuf::from("*"));
    }

    // 安全检查：拒绝目录遍历尝试
    if TRAVERSAL_PATTERN.is_match(path) {
        warn!("[ID{}]路径{}包含目录遍历分段，拒绝", id, path);
        return Err(Exception::InvalidPath);
    }

    // 根目录特殊处理
    if path == "/" {
        let index_path = Path::new(root).join(HTML_INDEX);
        return match index_path.exists() {
            true => Ok(index_path),
            false => Err(Exception::FileNotFound),
        };
    }

    // 标准静态资源路径转换逻辑
    // 去除领先的 '/' 以便进行路径拼接
    let relative = path.strip_prefix('/').unwrap_or(path);
    let full_path = Path::new(root).join(relative);

    let path_str_ref = match full_path.to_str() {
        Some(s) => s,
        None => return Err(Exception::InvalidPath),
    };
    debug!("[ID{}]映射物理路径：{}", id, path_str_ref);

    // 目录路径回落到其下的索引页
    if full_path.is_dir() {
        let index_path = full_path.join(HTML_INDEX);
        return match index_path.exists() {
            true => Ok(index_path),
            false => Err(Exception::FileNotFound),
        };
    }

    match full_path.exists() {
        true => Ok(full_path),
        false => Err(Exception::FileNotFound),
    }
}
