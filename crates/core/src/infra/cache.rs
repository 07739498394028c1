use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::types::ReferenceSnapshot;

/// キャッシュ対象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ColorTypes,
}

/// 参照データのキャッシュ。スナップショット単位で丸ごと置き換える。
#[derive(Debug, Default)]
pub struct ReferenceCache {
    snapshot: Option<(Arc<ReferenceSnapshot>, Instant)>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `max_age` 未満のスナップショットを返す
    pub fn get_fresh(&self, max_age: Duration) -> Option<Arc<ReferenceSnapshot>> {
        let (snapshot, stored_at) = self.snapshot.as_ref()?;
        (stored_at.elapsed() < max_age).then(|| snapshot.clone())
    }

    pub fn store(&mut self, snapshot: ReferenceSnapshot) -> Arc<ReferenceSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.snapshot = Some((snapshot.clone(), Instant::now()));
        snapshot
    }

    pub fn clear(&mut self) {
        self.snapshot = None;
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none()
    }
}
