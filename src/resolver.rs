// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Resolver 模块
//!
//! 该模块定义了异常解析链：把请求处理中产生的 `Exception` 转化为 HTTP 响应的
//! 可插拔扩展点。
//!
//! ## 设计意图
//! - **委托链**：`ExceptionResolverComposite` 持有一组有序的 resolver，逐个
//!   尝试，第一个给出响应的获胜（first-match-wins），其余不再被调用。
//! - **可拒绝**：每个 resolver 都可以通过返回 `None` 表示"本次失败不归我管"，
//!   整条链都拒绝时由调用方回落到默认的失败处理。
//! - **配置后冻结**：委托列表在启动阶段装配完成，之后只读使用（通常包在
//!   `Arc` 里跨任务共享）。链内部不加锁，也不会捕获委托的 panic。
//!
//! 组合器自身同样实现 `ExceptionResolver`，因此可以嵌套进外层机制；
//! 它携带的 order 值只供外层排序用，自己从不解释。

use log::debug;

use crate::{config::Config, exception::Exception, request::Request, response::Response};

/// 最低优先级（排在最后）。外层机制按 order 值升序排列多个顶层 resolver。
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 最高优先级（排在最前）。
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// 响应侧上下文：resolver 渲染错误响应时需要的请求周期信息。
///
/// 从 `Config` 中摘取与错误渲染相关的字段，避免把整份配置借给每个 resolver。
pub struct ResponseContext {
    id: u128,
    expose_error_detail: bool,
}

impl ResponseContext {
    pub fn new(id: u128, config: &Config) -> Self {
        Self {
            id,
            expose_error_detail: config.expose_error_detail(),
        }
    }

    /// 获取全局请求 ID（用于日志追踪）
    pub fn id(&self) -> u128 {
        self.id
    }

    /// 错误响应中是否允许附带异常描述
    pub fn expose_error_detail(&self) -> bool {
        self.expose_error_detail
    }
}

/// 一次失败解析尝试的能力。
///
/// `handler` 是处理器标识：失败发生在路由选定处理器之前时为 `None`。
/// 返回 `None` 表示拒绝处理，交给链中的下一个 resolver。
pub trait ExceptionResolver: Send + Sync {
    fn resolve(
        &self,
        request: &Request,
        ctx: &ResponseContext,
        handler: Option<&str>,
        exception: &Exception,
    ) -> Option<Response>;
}

/// 将多个 resolver 聚合为一个的组合器。
///
/// 委托列表的存储顺序就是解析顺序，组合器不会按各委托自身的优先级重排。
/// 列表为空（未配置）时对任何输入都返回 `None`。
pub struct ExceptionResolverComposite {
    resolvers: Vec<Box<dyn ExceptionResolver>>,
    order: i32,
}

impl ExceptionResolverComposite {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
            order: LOWEST_PRECEDENCE,
        }
    }

    /// 替换委托列表。应在并发使用开始前完成装配。
    pub fn set_resolvers(&mut self, resolvers: Vec<Box<dyn ExceptionResolver>>) {
        self.resolvers = resolvers;
    }

    /// 获取委托列表的只读视图，调用方无法借此改动链的内部状态。
    pub fn resolvers(&self) -> &[Box<dyn ExceptionResolver>] {
        &self.resolvers
    }

    /// 设置 order 值。该值只供外层机制排序使用，组合器自身不解释它。
    pub fn set_order(&mut self, order: i32) {
        self.order = order;
    }

    /// 获取 order 值
    pub fn order(&self) -> i32 {
        self.order
    }
}

impl Default for ExceptionResolverComposite {
    fn default() -> Self {
        Self::new()
    }
}

impl ExceptionResolver for ExceptionResolverComposite {
    /// 按存储顺序逐个调用委托，第一个返回响应的获胜并立即短路。
    ///
    /// 委托内部的 panic 原样向上传播，组合器不做捕获或翻译。
    fn resolve(
        &self,
        request: &Request,
        ctx: &ResponseContext,
        handler: Option<&str>,
        exception: &Exception,
    ) -> Option<Response> {
        for (index, resolver) in self.resolvers.iter().enumerate() {
            if let Some(response) = resolver.resolve(request, ctx, handler, exception) {
                debug!(
                    "[ID{}]第{}个resolver解析了异常：{}",
                    ctx.id(),
                    index,
                    exception
                );
                return Some(response);
            }
        }
        debug!("[ID{}]没有resolver愿意解析异常：{}", ctx.id(), exception);
        None
    }
}

/// 面向 API 客户端的 JSON 错误渲染。
///
/// 仅当请求的 `Accept` 包含 `application/json` 时出手，否则拒绝，
/// 把失败留给链中后续的 resolver。
pub struct JsonErrorResolver;

impl ExceptionResolver for JsonErrorResolver {
    fn resolve(
        &self,
        request: &Request,
        ctx: &ResponseContext,
        _handler: Option<&str>,
        exception: &Exception,
    ) -> Option<Response> {
        let wants_json = request
            .accept()
            .map_or(false, |a| a.contains("application/json"));
        if !wants_json {
            return None;
        }
        debug!("[ID{}]以JSON形式渲染异常：{}", ctx.id(), exception);
        Some(Response::json_error(exception, request, ctx))
    }
}

/// 面向浏览器的 HTML 错误页渲染。来者不拒，适合放在链的末位兜底。
pub struct ErrorPageResolver;

impl ExceptionResolver for ErrorPageResolver {
    fn resolve(
        &self,
        request: &Request,
        ctx: &ResponseContext,
        _handler: Option<&str>,
        exception: &Exception,
    ) -> Option<Response> {
        debug!("[ID{}]以HTML错误页渲染异常：{}", ctx.id(), exception);
        Some(Response::error_page(exception, request, ctx))
    }
}
