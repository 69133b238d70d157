pub mod fs;

use async_trait::async_trait;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};

pub use fs::FsBlobStore;

pub const WEBP_CONTENT_TYPE: &str = "image/webp";

/// 차트 이미지 저장소 인터페이스
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 업로드 후 공개 URL 반환
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Image decode/encode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// 업로드 전 이미지 정규화: 디코딩 -> 알파 채널 제거(RGB8) -> 무손실 WebP
pub fn normalize_image(bytes: &[u8]) -> Result<Vec<u8>, BlobError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded.to_rgb8();

    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;

    Ok(out)
}

/// 정규화(블로킹 작업) 후 업로드
pub async fn upload_chart(store: &dyn BlobStore, raw: Vec<u8>) -> Result<String, BlobError> {
    let webp = tokio::task::spawn_blocking(move || normalize_image(&raw))
        .await
        .map_err(|e| BlobError::Other(format!("Image task failed: {}", e)))??;

    store.upload(webp, WEBP_CONTENT_TYPE).await
}
