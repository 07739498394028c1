use std::path::Path;

use base64::Engine;

use crate::domain::error::AnalysisError;
use crate::domain::image::{CapturedImage, ImageMime, ImageSource, MAX_IMAGE_BYTES};

/// 画像エンコードエラー
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Invalid image input: {0}")]
    InvalidInput(String),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Image too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("Failed to read image file: {0}")]
    Io(#[from] std::io::Error),
}

/// 画像ソースを検証し、送信可能な `CapturedImage` に正規化する
#[derive(Debug, Clone)]
pub struct ImageCodec {
    max_bytes: usize,
}

impl ImageCodec {
    pub fn new() -> Self {
        Self {
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// 上限を下げたコーデックを作る（`MAX_IMAGE_BYTES` を超える値は丸める）
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            max_bytes: max_bytes.min(MAX_IMAGE_BYTES),
        }
    }

    pub async fn encode(&self, source: ImageSource) -> Result<CapturedImage, ImageError> {
        match source {
            ImageSource::File(path) => self.encode_file(&path).await,
            ImageSource::Capture { data, mime } => self.encode_bytes(data, &mime),
            ImageSource::DataUrl(url) => self.decode_data_url(&url),
        }
    }

    async fn encode_file(&self, path: &Path) -> Result<CapturedImage, ImageError> {
        // 巨大ファイルは読み込む前に弾く
        let metadata = tokio::fs::metadata(path).await?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.max_bytes {
            return Err(ImageError::PayloadTooLarge {
                size,
                max: self.max_bytes,
            });
        }

        let data = tokio::fs::read(path).await?;
        let declared = mime_from_extension(path)
            .or_else(|| sniff(&data).map(|m| m.as_str()))
            .ok_or_else(|| {
                ImageError::UnsupportedFormat(format!("unknown file type: {}", path.display()))
            })?;

        self.encode_bytes(data, declared)
    }

    /// 生バイトと宣言 MIME から画像を生成する
    pub fn encode_bytes(&self, data: Vec<u8>, declared_mime: &str) -> Result<CapturedImage, ImageError> {
        let declared = declared_mime.trim().to_ascii_lowercase();
        if !declared.starts_with("image/") {
            return Err(ImageError::UnsupportedFormat(declared));
        }
        if data.is_empty() {
            return Err(ImageError::InvalidInput("image data is empty".to_string()));
        }
        if data.len() > self.max_bytes {
            return Err(ImageError::PayloadTooLarge {
                size: data.len(),
                max: self.max_bytes,
            });
        }

        let mime = ImageMime::from_mime(&declared)
            .ok_or_else(|| ImageError::UnsupportedFormat(declared.clone()))?;

        let mime = match image::guess_format(&data) {
            Ok(image::ImageFormat::Png) => ImageMime::Png,
            Ok(image::ImageFormat::Jpeg) => ImageMime::Jpeg,
            Ok(other) => {
                return Err(ImageError::UnsupportedFormat(format!(
                    "declared {declared}, content is {other:?}"
                )));
            }
            Err(_) => {
                log::debug!("画像形式を判別できないため宣言 MIME を使用: {declared}");
                mime
            }
        };

        if ImageMime::from_mime(&declared) != Some(mime) {
            log::warn!(
                "宣言 MIME と内容が一致しません: declared={declared}, actual={}",
                mime.as_str()
            );
        }

        Ok(CapturedImage::new(data, mime))
    }

    /// `data:image/...;base64,...` を解析する
    pub fn decode_data_url(&self, url: &str) -> Result<CapturedImage, ImageError> {
        let rest = url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ImageError::InvalidInput("not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ImageError::InvalidInput("data URL has no payload".to_string()))?;

        let mut parts = header.split(';');
        let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        if !mime.starts_with("image/") {
            return Err(ImageError::UnsupportedFormat(mime));
        }
        if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(ImageError::InvalidInput(
                "only base64 data URLs are supported".to_string(),
            ));
        }

        let payload = payload.trim();
        // デコード前に概算サイズで弾く
        let estimated = payload.len() / 4 * 3;
        if estimated > self.max_bytes + 3 {
            return Err(ImageError::PayloadTooLarge {
                size: estimated,
                max: self.max_bytes,
            });
        }

        let data = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| ImageError::InvalidInput(format!("base64 decode failed: {e}")))?;

        self.encode_bytes(data, &mime)
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ImageError> for AnalysisError {
    fn from(err: ImageError) -> Self {
        let message = match &err {
            ImageError::PayloadTooLarge { .. } => "이미지 크기가 너무 큽니다. 10MB 이하의 이미지를 사용해주세요.",
            ImageError::UnsupportedFormat(_) => "지원하지 않는 이미지 형식입니다. PNG 또는 JPEG 이미지를 사용해주세요.",
            ImageError::InvalidInput(_) | ImageError::Io(_) => "이미지 데이터를 읽을 수 없습니다.",
        };
        AnalysisError::validation(message, err.to_string())
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

fn sniff(data: &[u8]) -> Option<ImageMime> {
    match image::guess_format(data).ok()? {
        image::ImageFormat::Png => Some(ImageMime::Png),
        image::ImageFormat::Jpeg => Some(ImageMime::Jpeg),
        _ => None,
    }
}
