use std::path::PathBuf;

use base64::Engine;
use serde::{Deserialize, Serialize};

/// 送信可能な画像サイズの上限 (10 MiB)
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// 受け付ける画像の MIME タイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMime {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// MIME 文字列から解決する。パラメータ (`;charset=...`) と大文字小文字は無視。
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

/// 正規化済みの撮影/アップロード画像。
///
/// `ImageCodec` を通してのみ生成されるため、サイズ上限と MIME の制約を常に満たす。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    data: Vec<u8>,
    mime: ImageMime,
}

impl CapturedImage {
    pub(crate) fn new(data: Vec<u8>, mime: ImageMime) -> Self {
        Self { data, mime }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    /// バイトサイズ
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// `data:image/...;base64,...` 形式に変換する（セッション保存・インライン送信用）
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime.as_str(),
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// 画像の取得元
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// ディスク上のファイル（アップロード）
    File(PathBuf),
    /// ライブキャプチャの静止画（生バイト + 宣言 MIME）
    Capture { data: Vec<u8>, mime: String },
    /// `data:` URL 文字列
    DataUrl(String),
}

/// 分析リクエスト（送信直前に組み立て、保存しない）
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub image: CapturedImage,
    /// 任意の補足テキスト（コーディネートの説明など）
    pub context: Option<String>,
}
