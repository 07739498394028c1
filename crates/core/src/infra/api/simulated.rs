use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use super::palette;
use super::{ApiError, ClassificationApi};
use crate::domain::image::ClassificationRequest;
use crate::domain::season::Season;

/// ネットワークを使わない分類 API（デモ・オフライン用）。
///
/// 一定の遅延のあと、確率 `failure_rate` で 503 相当の失敗を返す。
pub struct SimulatedClassificationApi {
    rng: Mutex<StdRng>,
    failure_rate: f64,
    latency: Duration,
}

impl SimulatedClassificationApi {
    pub fn new(failure_rate: f64, latency: Duration) -> Self {
        Self::with_rng(StdRng::from_os_rng(), failure_rate, latency)
    }

    /// 再現可能な乱数列で生成する（テスト用）
    pub fn with_seed(seed: u64, failure_rate: f64, latency: Duration) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), failure_rate, latency)
    }

    fn with_rng(rng: StdRng, failure_rate: f64, latency: Duration) -> Self {
        let failure_rate = if failure_rate.is_finite() {
            failure_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            rng: Mutex::new(rng),
            failure_rate,
            latency,
        }
    }

    /// 失敗判定とシーズン・信頼度の抽選
    fn draw(&self) -> Option<(Season, u32)> {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if rng.random_bool(self.failure_rate) {
            return None;
        }
        let season = Season::ALL[rng.random_range(0..Season::ALL.len())];
        let confidence = rng.random_range(80..100);
        Some((season, confidence))
    }
}

#[async_trait]
impl ClassificationApi for SimulatedClassificationApi {
    async fn classify(&self, request: &ClassificationRequest) -> Result<Value, ApiError> {
        log::debug!(
            "シミュレーション分析: size={}, mime={}",
            request.image.size(),
            request.image.mime().as_str()
        );

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.draw() {
            Some((season, confidence)) => Ok(palette::simulated_payload(season, confidence)),
            None => {
                log::warn!("シミュレーション分析で疑似障害が発生しました");
                Err(ApiError::Status {
                    status: 503,
                    message: "simulated outage".to_string(),
                })
            }
        }
    }

    async fn fetch_color_types(&self) -> Result<Value, ApiError> {
        Ok(palette::reference_payload())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
