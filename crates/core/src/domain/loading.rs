use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

/// ロード状態を追跡する操作名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    #[serde(rename = "analyzeImage")]
    AnalyzeImage,
    #[serde(rename = "getColorTypes")]
    GetColorTypes,
}

impl Operation {
    pub const ALL: [Operation; 2] = [Operation::AnalyzeImage, Operation::GetColorTypes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeImage => "analyzeImage",
            Self::GetColorTypes => "getColorTypes",
        }
    }
}

/// ロード状態の遷移通知
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadingEvent {
    pub operation: Operation,
    pub loading: bool,
}

const EVENT_CAPACITY: usize = 64;

/// 操作ごとのロード状態コンテナ。
///
/// 同一操作の呼び出しが重なった場合は実行中の件数で管理し、
/// 最後の呼び出しが終わった時点でのみ false に戻す。
/// 状態が変わるたびに `LoadingEvent` を購読者へ配信する。
pub struct LoadingState {
    in_flight: Mutex<HashMap<Operation, u32>>,
    events: broadcast::Sender<LoadingEvent>,
}

impl LoadingState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let in_flight = Operation::ALL.iter().map(|op| (*op, 0)).collect();
        Self {
            in_flight: Mutex::new(in_flight),
            events,
        }
    }

    pub fn is_loading(&self, operation: Operation) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.get(&operation).copied().unwrap_or(0) > 0
    }

    /// 状態遷移イベントを購読する
    pub fn subscribe(&self) -> broadcast::Receiver<LoadingEvent> {
        self.events.subscribe()
    }

    /// 操作を開始する。返したガードが破棄されると必ず解除される。
    pub(crate) fn begin(&self, operation: Operation) -> LoadingGuard<'_> {
        self.enter(operation);
        LoadingGuard {
            state: self,
            operation,
        }
    }

    fn enter(&self, operation: Operation) {
        let became_loading = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            let count = in_flight.entry(operation).or_insert(0);
            *count += 1;
            *count == 1
        };
        if became_loading {
            self.publish(operation, true);
        }
    }

    fn leave(&self, operation: Operation) {
        let became_idle = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            let count = in_flight.entry(operation).or_insert(0);
            if *count == 0 {
                false
            } else {
                *count -= 1;
                *count == 0
            }
        };
        if became_idle {
            self.publish(operation, false);
        }
    }

    fn publish(&self, operation: Operation, loading: bool) {
        log::debug!("ロード状態変更: {} = {loading}", operation.as_str());
        // 購読者がいない場合の送信エラーは無視
        let _ = self.events.send(LoadingEvent { operation, loading });
    }
}

impl Default for LoadingState {
    fn default() -> Self {
        Self::new()
    }
}

/// スコープ終了時にロード状態を解除するガード
pub struct LoadingGuard<'a> {
    state: &'a LoadingState,
    operation: Operation,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.leave(self.operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_for_every_operation() {
        let state = LoadingState::new();
        for op in Operation::ALL {
            assert!(!state.is_loading(op));
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        let state = LoadingState::new();
        {
            let _guard = state.begin(Operation::AnalyzeImage);
            assert!(state.is_loading(Operation::AnalyzeImage));
            assert!(!state.is_loading(Operation::GetColorTypes));
        }
        assert!(!state.is_loading(Operation::AnalyzeImage));
    }

    #[test]
    fn guard_releases_on_early_return() {
        fn run(state: &LoadingState, fail: bool) -> Result<(), String> {
            let _guard = state.begin(Operation::GetColorTypes);
            if fail {
                return Err("boom".to_string());
            }
            Ok(())
        }

        let state = LoadingState::new();
        assert!(run(&state, true).is_err());
        assert!(!state.is_loading(Operation::GetColorTypes));
    }

    #[test]
    fn overlapping_calls_clear_after_last_exit() {
        let state = LoadingState::new();
        let first = state.begin(Operation::AnalyzeImage);
        let second = state.begin(Operation::AnalyzeImage);

        drop(first);
        assert!(state.is_loading(Operation::AnalyzeImage));

        drop(second);
        assert!(!state.is_loading(Operation::AnalyzeImage));
    }

    #[test]
    fn publishes_only_transitions() {
        let state = LoadingState::new();
        let mut rx = state.subscribe();

        let a = state.begin(Operation::AnalyzeImage);
        let b = state.begin(Operation::AnalyzeImage);
        drop(a);
        drop(b);

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert_eq!(
            events,
            vec![
                LoadingEvent { operation: Operation::AnalyzeImage, loading: true },
                LoadingEvent { operation: Operation::AnalyzeImage, loading: false },
            ]
        );
    }
}
