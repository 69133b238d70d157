use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "journal=info,warn";

/// stdout + 일 단위 롤링 파일 로그 초기화.
/// 반환된 guard 를 프로세스 종료 시까지 들고 있어야 버퍼된 로그가 유실되지 않는다.
pub fn init_tracing(log_dir: &Path) -> Vec<WorkerGuard> {
    if !log_dir.exists() {
        // 실패해도 stdout 로그는 동작해야 함
        let _ = fs::create_dir_all(log_dir);
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, "journal.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(stdout_filter);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    vec![file_guard]
}
