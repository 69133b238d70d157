pub mod analytics;
pub mod blob;
pub mod config;
pub mod feedback;
pub mod logger;
pub mod metrics;
pub mod record;
pub mod server;
pub mod session;
pub mod visibility;

/// 라이브러리 로드 시점에 .env 를 읽어 환경 변수로 등록
#[ctor::ctor]
fn load_dotenv() {
    dotenv::dotenv().ok();
}
