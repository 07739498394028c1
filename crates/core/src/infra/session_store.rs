//! ページ遷移をまたぐ分析結果の受け渡し（セッションスコープのキー・バリュー保存）。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;

use super::image_codec::ImageCodec;
use crate::domain::error::AnalysisError;
use crate::domain::image::CapturedImage;
use crate::domain::types::{
    ClassificationResult, ImageOrigin, MemoryContext, PendingCapture, SessionResult,
};

/// 保存キー
pub mod keys {
    pub const ANALYSIS_RESULT: &str = "analysisResult";
    pub const ANALYZED_IMAGE: &str = "analyzedImage";
    pub const MEMORY_PAGE_DATA: &str = "memoryPageData";
    pub const CAPTURED_IMAGE: &str = "capturedImage";
    pub const IMAGE_SOURCE: &str = "imageSource";
    pub const SELECTED_SEASON: &str = "selectedSeason";
    pub const SELECTED_IMAGE_DATA: &str = "selectedImageData";
    pub const OUTFIT_DESCRIPTION: &str = "outfitDescription";

    pub const RESULT_KEYS: &[&str] = &[ANALYSIS_RESULT, ANALYZED_IMAGE, MEMORY_PAGE_DATA];
    pub const PENDING_KEYS: &[&str] = &[
        CAPTURED_IMAGE,
        IMAGE_SOURCE,
        SELECTED_SEASON,
        SELECTED_IMAGE_DATA,
        OUTFIT_DESCRIPTION,
    ];
}

/// 文字列キー・バリューのセッションストレージ
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: String);
    fn remove_item(&self, key: &str);
    fn clear(&self);
}

/// プロセス内メモリのストレージ
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: String) {
        self.items().insert(key.to_string(), value);
    }

    fn remove_item(&self, key: &str) {
        self.items().remove(key);
    }

    fn clear(&self) {
        self.items().clear();
    }
}

/// セッション保存エラー
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to serialize session data: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<SessionError> for AnalysisError {
    fn from(err: SessionError) -> Self {
        AnalysisError::schema("분석 결과를 저장하지 못했습니다. 다시 시도해주세요.", err.to_string())
    }
}

/// 分析結果と付帯情報をセッションに保存・復元する
#[derive(Clone)]
pub struct SessionResultStore {
    storage: Arc<dyn SessionStorage>,
    codec: ImageCodec,
}

impl SessionResultStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            codec: ImageCodec::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStorage::new()))
    }

    /// 結果を保存する。直前の保存内容は丸ごと置き換わる。
    pub fn save(
        &self,
        result: &ClassificationResult,
        image: &CapturedImage,
        context: Option<&MemoryContext>,
    ) -> Result<(), SessionError> {
        // 直列化を先に済ませ、失敗時に中途半端な状態を残さない
        let result_json = serde_json::to_string(result)?;
        let context_json = match context.filter(|c| !c.is_empty()) {
            Some(context) => Some(serde_json::to_string(context)?),
            None => None,
        };

        self.storage.set_item(keys::ANALYSIS_RESULT, result_json);
        self.storage.set_item(keys::ANALYZED_IMAGE, image.to_data_url());
        match context_json {
            Some(json) => self.storage.set_item(keys::MEMORY_PAGE_DATA, json),
            None => self.storage.remove_item(keys::MEMORY_PAGE_DATA),
        }

        log::info!(
            "分析結果を保存: season={}, image={} bytes",
            result.season,
            image.size()
        );
        Ok(())
    }

    /// 結果を復元する。結果か画像のどちらかが欠けていれば `None`。
    pub fn load(&self) -> Option<SessionResult> {
        let result = self.read_json::<ClassificationResult>(keys::ANALYSIS_RESULT)?;
        let image = self.read_image(keys::ANALYZED_IMAGE)?;
        let context = self.read_json::<MemoryContext>(keys::MEMORY_PAGE_DATA);

        Some(SessionResult {
            result,
            image,
            context,
        })
    }

    pub fn clear(&self) {
        for key in keys::RESULT_KEYS {
            self.storage.remove_item(key);
        }
    }

    /// 分析前の入力を保存する
    pub fn save_pending(&self, pending: &PendingCapture) -> Result<(), SessionError> {
        let image_data = match &pending.selected_image_data {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        self.put(keys::CAPTURED_IMAGE, pending.image.as_ref().map(CapturedImage::to_data_url));
        self.put(keys::IMAGE_SOURCE, pending.origin.map(|o| o.as_str().to_string()));
        self.put(keys::OUTFIT_DESCRIPTION, pending.outfit_description.clone());
        self.put(keys::SELECTED_SEASON, pending.selected_season.clone());
        self.put(keys::SELECTED_IMAGE_DATA, image_data);
        Ok(())
    }

    pub fn load_pending(&self) -> PendingCapture {
        PendingCapture {
            image: self.read_image(keys::CAPTURED_IMAGE),
            origin: self
                .storage
                .get_item(keys::IMAGE_SOURCE)
                .and_then(|s| ImageOrigin::parse(&s)),
            outfit_description: self.storage.get_item(keys::OUTFIT_DESCRIPTION),
            selected_season: self.storage.get_item(keys::SELECTED_SEASON),
            selected_image_data: self.read_json(keys::SELECTED_IMAGE_DATA),
        }
    }

    pub fn clear_pending(&self) {
        for key in keys::PENDING_KEYS {
            self.storage.remove_item(key);
        }
    }

    fn put(&self, key: &str, value: Option<String>) {
        match value {
            Some(value) => self.storage.set_item(key, value),
            None => self.storage.remove_item(key),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.storage.get_item(key)?;
        serde_json::from_str(&raw)
            .map_err(|e| log::warn!("セッションデータが破損しています: key={key}, {e}"))
            .ok()
    }

    fn read_image(&self, key: &str) -> Option<CapturedImage> {
        let raw = self.storage.get_item(key)?;
        self.codec
            .decode_data_url(&raw)
            .map_err(|e| log::warn!("セッション画像を復元できません: key={key}, {e}"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::ImageMime;
    use crate::domain::season::Season;
    use serde_json::json;

    fn result(season: Season) -> ClassificationResult {
        ClassificationResult {
            season,
            confidence: 92.0,
            reason: Some("대비가 강합니다".into()),
            description: None,
            features: vec!["높은 대비".into()],
            recommend: vec![],
            avoid: vec![],
            raw_response: json!({"season": season.korean_label()}),
        }
    }

    fn image() -> CapturedImage {
        CapturedImage::new(vec![0x89, b'P', b'N', b'G', 1, 2, 3], ImageMime::Png)
    }

    #[test]
    fn save_then_load_roundtrip() {
        let store = SessionResultStore::in_memory();
        let context = MemoryContext {
            selected_season: Some("겨울".into()),
            selected_image_data: Some(json!({"id": 3})),
            outfit_description: Some("검은 코트".into()),
        };
        store.save(&result(Season::WinterCool), &image(), Some(&context)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.result, result(Season::WinterCool));
        assert_eq!(loaded.image, image());
        assert_eq!(loaded.context, Some(context));
    }

    #[test]
    fn last_write_wins() {
        let store = SessionResultStore::in_memory();
        let context = MemoryContext {
            outfit_description: Some("x".into()),
            ..Default::default()
        };
        store.save(&result(Season::SpringWarm), &image(), Some(&context)).unwrap();
        store.save(&result(Season::AutumnWarm), &image(), None).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.result.season, Season::AutumnWarm);
        assert_eq!(loaded.context, None);
    }

    #[test]
    fn missing_image_is_not_found() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = SessionResultStore::new(storage.clone());
        store.save(&result(Season::SummerCool), &image(), None).unwrap();

        storage.remove_item(keys::ANALYZED_IMAGE);
        assert!(store.load().is_none());
    }

    #[test]
    fn corrupt_result_is_not_found() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = SessionResultStore::new(storage.clone());
        store.save(&result(Season::SummerCool), &image(), None).unwrap();

        storage.set_item(keys::ANALYSIS_RESULT, "{not json".into());
        assert!(store.load().is_none());
    }

    #[test]
    fn clear_removes_result() {
        let store = SessionResultStore::in_memory();
        store.save(&result(Season::SpringWarm), &image(), None).unwrap();
        store.clear();
        assert!(store.load().is_none());
    }

    #[test]
    fn pending_roundtrip_and_clear() {
        let store = SessionResultStore::in_memory();
        let pending = PendingCapture {
            image: Some(image()),
            origin: Some(ImageOrigin::Upload),
            outfit_description: Some("린넨 셔츠".into()),
            selected_season: None,
            selected_image_data: Some(json!({"src": "memory-1"})),
        };
        store.save_pending(&pending).unwrap();
        assert_eq!(store.load_pending(), pending);

        store.clear_pending();
        assert_eq!(store.load_pending(), PendingCapture::default());
    }

    #[test]
    fn pending_overwrite_removes_absent_fields() {
        let store = SessionResultStore::in_memory();
        store
            .save_pending(&PendingCapture {
                selected_season: Some("봄".into()),
                ..Default::default()
            })
            .unwrap();
        store
            .save_pending(&PendingCapture {
                image: Some(image()),
                origin: Some(ImageOrigin::Webcam),
                ..Default::default()
            })
            .unwrap();

        let loaded = store.load_pending();
        assert_eq!(loaded.selected_season, None);
        assert_eq!(loaded.origin, Some(ImageOrigin::Webcam));
    }
}
