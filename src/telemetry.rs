//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志与链路追踪的初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化 tracing
///
/// 库本身只发出 tracing 事件，是否安装 subscriber 由应用决定。
/// 此函数供二进制程序和示例使用，重复调用时后续调用不生效。
///
/// # 参数
///
/// * `service_name` - 服务名称，作为 tracer 名称
/// * `filter` - `EnvFilter` 指令，为 None 时读取 `RUST_LOG`，默认 `info`
/// * `with_opentelemetry` - 是否附加 OpenTelemetry layer
pub fn init_tracing(service_name: &str, filter: Option<&str>, with_opentelemetry: bool) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_span_events(FmtSpan::CLOSE);

    // 未配置 exporter 的 provider 不会导出任何数据，只保留 span 上下文
    let telemetry = with_opentelemetry.then(|| {
        let provider = SdkTracerProvider::builder().build();
        global::set_tracer_provider(provider.clone());
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(telemetry)
        .try_init();
}
