use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

use super::{BlobError, BlobStore};

/// 로컬 디렉토리에 차트 이미지를 저장하고, HTTP 서버가 그 디렉토리를 서빙한다.
pub struct FsBlobStore {
    dir: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn file_name(content_type: &str) -> String {
        let ext = match content_type {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            _ => "webp",
        };
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
        format!(
            "chart_{}_{}.{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            suffix,
            ext
        )
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = Self::file_name(content_type);
        tokio::fs::write(self.dir.join(&name), &bytes).await?;

        info!("Chart uploaded: {} ({} bytes)", name, bytes.len());
        Ok(format!("{}/{}", self.public_base_url, name))
    }
}
