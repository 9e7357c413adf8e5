use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use websupport::{
    config::Config,
    exception::Exception,
    request::Request,
    resolver::{
        ErrorPageResolver, ExceptionResolver, ExceptionResolverComposite, ResponseContext,
    },
    response::Response,
};

struct DecliningResolver;

impl ExceptionResolver for DecliningResolver {
    fn resolve(
        &self,
        _request: &Request,
        _ctx: &ResponseContext,
        _handler: Option<&str>,
        _exception: &Exception,
    ) -> Option<Response> {
        None
    }
}

fn request() -> Request {
    Request::try_from(
        b"GET /missing.html HTTP/1.1\r\nHost: localhost\r\n\r\n".as_slice(),
        0,
    )
    .unwrap()
}

fn chain_depth_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_depth");

    // 前depth-1个委托全部拒绝，最后一个HTML错误页兜底
    for depth in [1usize, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let mut resolvers: Vec<Box<dyn ExceptionResolver>> = Vec::new();
            for _ in 1..depth {
                resolvers.push(Box::new(DecliningResolver));
            }
            resolvers.push(Box::new(ErrorPageResolver));

            let mut composite = ExceptionResolverComposite::new();
            composite.set_resolvers(resolvers);

            let request = request();
            let ctx = ResponseContext::new(0, &Config::new());

            b.iter(|| {
                composite.resolve(
                    black_box(&request),
                    &ctx,
                    Some("static"),
                    &Exception::FileNotFound,
                )
            });
        });
    }

    group.finish();
}

fn all_decline_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_all_decline");

    for depth in [4usize, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let resolvers: Vec<Box<dyn ExceptionResolver>> =
                (0..depth).map(|_| Box::new(DecliningResolver) as _).collect();

            let mut composite = ExceptionResolverComposite::new();
            composite.set_resolvers(resolvers);

            let request = request();
            let ctx = ResponseContext::new(0, &Config::new());

            b.iter(|| {
                composite.resolve(
                    black_box(&request),
                    &ctx,
                    None,
                    &Exception::InternalError,
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, chain_depth_benchmark, all_decline_benchmark);
criterion_main!(benches);
