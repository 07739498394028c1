use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::image::CapturedImage;
use super::season::Season;

/// 推奨/回避カラー（`colorHex` は `#RRGGBB`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorSwatch {
    pub name: String,
    pub color_hex: String,
}

/// 正規化済みの分析結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub season: Season,
    /// 信頼度 (0–100)
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub recommend: Vec<ColorSwatch>,
    #[serde(default)]
    pub avoid: Vec<ColorSwatch>,
    /// 上流レスポンスの原文（前方互換・デバッグ用）
    #[serde(default)]
    pub raw_response: serde_json::Value,
}

/// 画像の取得経路
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    Webcam,
    Upload,
    Memory,
}

impl ImageOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webcam => "webcam",
            Self::Upload => "upload",
            Self::Memory => "memory",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "webcam" => Some(Self::Webcam),
            "upload" => Some(Self::Upload),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// 分析前にユーザーが選んだ付帯情報（思い出の季節・コーデ説明）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_image_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outfit_description: Option<String>,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.selected_season.is_none()
            && self.selected_image_data.is_none()
            && self.outfit_description.is_none()
    }
}

/// ページ遷移をまたいで受け渡す分析結果一式
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub result: ClassificationResult,
    pub image: CapturedImage,
    pub context: Option<MemoryContext>,
}

/// 撮影画面から分析画面へ渡す未処理の入力
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingCapture {
    pub image: Option<CapturedImage>,
    pub origin: Option<ImageOrigin>,
    pub outfit_description: Option<String>,
    pub selected_season: Option<String>,
    /// 思い出の季節に紐づく画像情報（任意の JSON）
    pub selected_image_data: Option<serde_json::Value>,
}

/// シーズンごとの参照情報（表示用メタデータ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceColorType {
    pub title: String,
    pub description: String,
    pub characteristics: Vec<String>,
    pub recommended_colors: Vec<String>,
    pub avoid_colors: Vec<String>,
}

/// 参照データのスナップショット（キャッシュ単位）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceSnapshot {
    pub types: BTreeMap<Season, ReferenceColorType>,
}

impl ReferenceSnapshot {
    pub fn get(&self, season: Season) -> Option<&ReferenceColorType> {
        self.types.get(&season)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
