//! 上流レスポンスの正規化。
//!
//! 上流はバージョンにより形が異なる:
//! - 旧形式: `{colorType, confidence}`
//! - 現行形式: `{season, probabilities, reason, description, feature, recommend, avoid}`
//!
//! まず判別済みの `UpstreamPayload` に分解し、そこから単一の
//! `ClassificationResult` へ写像する。UI はどの形式だったかを知らなくてよい。

use serde_json::{Map, Value};

use crate::domain::error::AnalysisError;
use crate::domain::season::{self, Season};
use crate::domain::types::{ClassificationResult, ColorSwatch, ReferenceColorType, ReferenceSnapshot};

/// 正規化エラー（再試行しても直らない）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no season")]
    MissingSeason,
    #[error("unresolved season label: {0}")]
    UnresolvedSeason(String),
    #[error("reference payload has no season types")]
    MissingReferenceTypes,
}

impl From<SchemaError> for AnalysisError {
    fn from(err: SchemaError) -> Self {
        AnalysisError::schema("서버 응답 형식이 올바르지 않습니다.", err.to_string())
    }
}

// ─── Upstream shapes ─────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct LegacyFields {
    color_type: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Default, PartialEq)]
struct CurrentFields {
    season: Option<String>,
    probabilities: Option<Map<String, Value>>,
    reason: Option<String>,
    description: Option<String>,
    features: Vec<String>,
    recommend: Vec<ColorSwatch>,
    avoid: Vec<ColorSwatch>,
}

/// 判別済みの上流ペイロード
#[derive(Debug, PartialEq)]
enum UpstreamPayload {
    Legacy(LegacyFields),
    Current(CurrentFields),
    Hybrid {
        current: CurrentFields,
        legacy: LegacyFields,
    },
}

const CURRENT_KEYS: &[&str] = &[
    "season",
    "probabilities",
    "reason",
    "description",
    "feature",
    "features",
    "recommend",
    "avoid",
];
const LEGACY_KEYS: &[&str] = &["colorType", "confidence"];

/// ネストされた `apiResponse` / `colorResult` も含めて値を探す（外側優先）
struct Layers<'a>(Vec<&'a Map<String, Value>>);

impl<'a> Layers<'a> {
    fn of(body: &'a Map<String, Value>) -> Self {
        let mut layers = vec![body];
        for nested in ["apiResponse", "colorResult"] {
            if let Some(inner) = body.get(nested).and_then(Value::as_object) {
                layers.push(inner);
            }
        }
        Self(layers)
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.0
            .iter()
            .find_map(|layer| layer.get(key).filter(|v| !v.is_null()))
    }

    fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.get(key).is_some())
    }

    fn string(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn carries_result(body: &Map<String, Value>) -> bool {
    let layers = Layers::of(body);
    layers.has_any(CURRENT_KEYS) || layers.has_any(LEGACY_KEYS)
}

/// `{success, data}` エンベロープを外す。
///
/// 結果が外側にだけある場合（`data` が付随情報のみ）は外側を使う。
fn unwrap_envelope(raw: &Value) -> Result<&Map<String, Value>, SchemaError> {
    let object = raw.as_object().ok_or(SchemaError::NotAnObject)?;
    match object.get("data") {
        Some(Value::Object(data)) if carries_result(data) || !carries_result(object) => Ok(data),
        _ => Ok(object),
    }
}

/// `ClassificationResult` を外部表現にしたものか（正規キーの season、旧形式・確率マップなし）
fn is_external_form(body: &Map<String, Value>) -> bool {
    let canonical = body
        .get("season")
        .and_then(Value::as_str)
        .is_some_and(|s| Season::ALL.iter().any(|season| season.as_str() == s));
    canonical && !body.contains_key("probabilities") && !body.contains_key("colorType")
}

impl UpstreamPayload {
    fn parse(body: &Map<String, Value>) -> Result<Self, SchemaError> {
        let layers = Layers::of(body);
        let has_current = layers.has_any(CURRENT_KEYS);
        let has_legacy = layers.has_any(LEGACY_KEYS);

        let legacy = || LegacyFields {
            color_type: layers.string("colorType"),
            confidence: layers.get("confidence").and_then(parse_percent),
        };
        let current = || CurrentFields {
            season: layers.string("season"),
            probabilities: layers.get("probabilities").and_then(Value::as_object).cloned(),
            reason: layers.string("reason"),
            description: layers.string("description"),
            features: layers
                .get("feature")
                .or_else(|| layers.get("features"))
                .map(parse_features)
                .unwrap_or_default(),
            recommend: layers.get("recommend").map(parse_swatches).unwrap_or_default(),
            avoid: layers.get("avoid").map(parse_swatches).unwrap_or_default(),
        };

        match (has_current, has_legacy) {
            (true, true) => Ok(Self::Hybrid {
                current: current(),
                legacy: legacy(),
            }),
            (true, false) => Ok(Self::Current(current())),
            (false, true) => Ok(Self::Legacy(legacy())),
            (false, false) => Err(SchemaError::MissingSeason),
        }
    }

    fn into_parts(self) -> (CurrentFields, LegacyFields) {
        match self {
            Self::Legacy(legacy) => (CurrentFields::default(), legacy),
            Self::Current(current) => (current, LegacyFields::default()),
            Self::Hybrid { current, legacy } => (current, legacy),
        }
    }
}

// ─── Field parsers ───────────────────────────────────────────────

/// 数値または "92%" 形式の文字列を 0–100 に丸めて読む
fn parse_percent(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then(|| number.clamp(0.0, 100.0))
}

fn parse_features(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// `#RRGGBB` に正規化する。`#` なしも受け付ける。
fn normalize_hex(value: &str) -> Option<String> {
    let digits = value.trim();
    let digits = digits.strip_prefix('#').unwrap_or(digits);
    (digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()))
        .then(|| format!("#{}", digits.to_ascii_uppercase()))
}

fn parse_swatch(entry: &Value) -> Option<ColorSwatch> {
    let (name, hex) = match entry {
        Value::String(s) => (None, s.as_str()),
        Value::Object(obj) => {
            let hex = ["colorHex", "rgb", "hex", "color"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))
                .unwrap_or_default();
            let name = ["name", "label"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str));
            (name, hex)
        }
        _ => (None, ""),
    };

    match normalize_hex(hex) {
        Some(color_hex) => Some(ColorSwatch {
            name: name.map(str::to_string).unwrap_or_else(|| color_hex.clone()),
            color_hex,
        }),
        None => {
            log::warn!("不正なカラー値を除外しました: {entry}");
            None
        }
    }
}

fn parse_swatches(value: &Value) -> Vec<ColorSwatch> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_swatch).collect(),
        _ => Vec::new(),
    }
}

/// 確率マップから該当シーズンのエントリを探す（完全一致 → 主要語の部分一致）
fn lookup_probability(probabilities: &Map<String, Value>, season: Season) -> Option<f64> {
    let exact = probabilities
        .iter()
        .find(|(key, _)| Season::resolve(key) == Some(season));

    let partial = || {
        probabilities.iter().find(|(key, _)| {
            let key = season::compact(key);
            season
                .primary_terms()
                .iter()
                .any(|term| key.starts_with(term) || key.contains(term))
        })
    };

    exact.or_else(partial).and_then(|(_, value)| parse_percent(value))
}

// ─── Normalizer ──────────────────────────────────────────────────

/// 上流ペイロードを `ClassificationResult` に正規化する
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultNormalizer;

impl ResultNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &Value) -> Result<ClassificationResult, SchemaError> {
        let body = unwrap_envelope(raw)?;
        let (current, legacy) = UpstreamPayload::parse(body)?.into_parts();

        // 正規フィールドがあれば旧フィールドは使わない
        let season = match current.season.as_deref().or(legacy.color_type.as_deref()) {
            Some(label) => Season::resolve(label)
                .ok_or_else(|| SchemaError::UnresolvedSeason(label.to_string()))?,
            None => return Err(SchemaError::MissingSeason),
        };

        let from_probabilities = current
            .probabilities
            .as_ref()
            .and_then(|p| lookup_probability(p, season));
        let confidence = match from_probabilities.or(legacy.confidence) {
            Some(value) => value,
            None => {
                log::warn!("信頼度を特定できないため 0 とします: season={season}");
                0.0
            }
        };

        // 正規化済み結果を再投入した場合のみ埋め込みの原文を引き継ぐ
        let raw_response = body
            .get("rawResponse")
            .filter(|v| !v.is_null() && is_external_form(body))
            .cloned()
            .unwrap_or_else(|| raw.clone());

        Ok(ClassificationResult {
            season,
            confidence,
            reason: current.reason,
            description: current.description,
            features: current.features,
            recommend: current.recommend,
            avoid: current.avoid,
            raw_response,
        })
    }

    /// `/colorTypes` レスポンスを参照スナップショットに正規化する
    pub fn normalize_reference(&self, raw: &Value) -> Result<ReferenceSnapshot, SchemaError> {
        let body = unwrap_envelope(raw)?;
        let types = body.get("types").and_then(Value::as_object).unwrap_or(body);

        let mut snapshot = ReferenceSnapshot::default();
        for (key, entry) in types {
            let Some(season) = Season::resolve(key) else {
                log::warn!("未知のシーズンキーを無視します: {key}");
                continue;
            };
            let Some(entry) = entry.as_object() else {
                log::warn!("参照データの形式が不正です: {key}");
                continue;
            };
            let layers = Layers(vec![entry]);
            let colors = |name: &str| -> Vec<String> {
                layers
                    .get(name)
                    .map(parse_swatches)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|swatch| swatch.color_hex)
                    .collect()
            };

            snapshot.types.insert(
                season,
                ReferenceColorType {
                    title: layers
                        .string("title")
                        .unwrap_or_else(|| season.korean_label().to_string()),
                    description: layers.string("description").unwrap_or_default(),
                    characteristics: layers
                        .get("characteristics")
                        .map(parse_features)
                        .unwrap_or_default(),
                    recommended_colors: colors("recommendedColors"),
                    avoid_colors: colors("avoidColors"),
                },
            );
        }

        if snapshot.is_empty() {
            return Err(SchemaError::MissingReferenceTypes);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize(raw: Value) -> Result<ClassificationResult, SchemaError> {
        ResultNormalizer::new().normalize(&raw)
    }

    #[test]
    fn korean_label_with_percent_probability() {
        let result = normalize(json!({
            "success": true,
            "data": {
                "season": "겨울 쿨톤",
                "probabilities": {"봄 웜톤": "3%", "겨울 쿨톤": "92%"},
                "reason": "대비가 강합니다",
                "feature": ["또렷한 인상"],
                "recommend": [{"name": "체리 레드", "rgb": "#e40046"}],
                "avoid": [{"name": "베이지", "rgb": "#F5F5DC"}]
            }
        }))
        .unwrap();

        assert_eq!(result.season, Season::WinterCool);
        assert_eq!(result.confidence, 92.0);
        assert_eq!(result.reason.as_deref(), Some("대비가 강합니다"));
        assert_eq!(result.features, vec!["또렷한 인상"]);
        assert_eq!(result.recommend[0].color_hex, "#E40046");
        assert_eq!(result.avoid[0].name, "베이지");
    }

    #[test]
    fn english_label_resolves() {
        let result = normalize(json!({
            "season": "Winter Cool",
            "probabilities": {"winter": 0.92e2}
        }))
        .unwrap();
        assert_eq!(result.season, Season::WinterCool);
        assert_eq!(result.confidence, 92.0);
    }

    #[test]
    fn unknown_season_is_unresolved() {
        let err = normalize(json!({"season": "autumn teal"})).unwrap_err();
        assert_eq!(err, SchemaError::UnresolvedSeason("autumn teal".into()));
    }

    #[test]
    fn canonical_season_wins_over_legacy() {
        let result = normalize(json!({
            "season": "여름 쿨톤",
            "colorType": "spring",
            "confidence": 71
        }))
        .unwrap();
        assert_eq!(result.season, Season::SummerCool);
        // 確率マップがないので旧スカラーを採用
        assert_eq!(result.confidence, 71.0);
    }

    #[test]
    fn unresolvable_canonical_does_not_fall_back_to_legacy() {
        let err = normalize(json!({"season": "??", "colorType": "spring"})).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedSeason(_)));
    }

    #[test]
    fn legacy_shape() {
        let result = normalize(json!({"colorType": "fall-warm", "confidence": "88"})).unwrap();
        assert_eq!(result.season, Season::AutumnWarm);
        assert_eq!(result.confidence, 88.0);
        assert!(result.recommend.is_empty());
        assert_eq!(result.reason, None);
    }

    #[test]
    fn nested_api_response_is_merged() {
        let result = normalize(json!({
            "colorType": "winter",
            "apiResponse": {
                "season": "가을 웜톤",
                "probabilities": {"가을": "64%"}
            }
        }))
        .unwrap();
        assert_eq!(result.season, Season::AutumnWarm);
        assert_eq!(result.confidence, 64.0);
    }

    #[test]
    fn partial_probability_key_matches_primary_term() {
        let result = normalize(json!({
            "season": "spring-warm",
            "probabilities": {"Spring (warm, bright)": "77.5%"}
        }))
        .unwrap();
        assert_eq!(result.confidence, 77.5);
    }

    #[test]
    fn missing_probability_defaults_to_zero() {
        let result = normalize(json!({
            "season": "봄 웜톤",
            "probabilities": {"겨울 쿨톤": "90%"}
        }))
        .unwrap();
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn confidence_is_clamped() {
        let result = normalize(json!({"colorType": "winter", "confidence": 140})).unwrap();
        assert_eq!(result.confidence, 100.0);
    }

    #[test]
    fn malformed_colors_are_dropped() {
        let result = normalize(json!({
            "season": "summer",
            "recommend": [
                {"name": "ok", "colorHex": "#7A9CC6"},
                {"name": "short", "colorHex": "#FFF"},
                {"name": "bad", "rgb": "rgb(1,2,3)"},
                "aec9c9",
                42
            ]
        }))
        .unwrap();

        let hexes: Vec<_> = result.recommend.iter().map(|c| c.color_hex.as_str()).collect();
        assert_eq!(hexes, vec!["#7A9CC6", "#AEC9C9"]);
        assert_eq!(result.recommend[1].name, "#AEC9C9");
    }

    #[test]
    fn discriminates_payload_shapes() {
        let parse = |v: Value| UpstreamPayload::parse(v.as_object().unwrap());
        assert!(matches!(
            parse(json!({"colorType": "spring"})),
            Ok(UpstreamPayload::Legacy(_))
        ));
        assert!(matches!(
            parse(json!({"season": "spring"})),
            Ok(UpstreamPayload::Current(_))
        ));
        assert!(matches!(
            parse(json!({"season": "spring", "confidence": 80})),
            Ok(UpstreamPayload::Hybrid { .. })
        ));
        assert_eq!(parse(json!({"other": 1})), Err(SchemaError::MissingSeason));
    }

    #[test]
    fn missing_season_and_non_object() {
        assert_eq!(normalize(json!({"success": true, "data": {}})), Err(SchemaError::MissingSeason));
        assert_eq!(normalize(json!({"reason": "x"})), Err(SchemaError::MissingSeason));
        assert_eq!(normalize(json!([1, 2])), Err(SchemaError::NotAnObject));
        assert_eq!(normalize(Value::Null), Err(SchemaError::NotAnObject));
    }

    #[test]
    fn raw_response_keeps_upstream_payload() {
        let raw = json!({"success": true, "data": {"season": "봄", "extra": {"model": "v2"}}});
        let result = normalize(raw.clone()).unwrap();
        assert_eq!(result.raw_response, raw);
    }

    #[test]
    fn upstream_raw_response_field_does_not_replace_payload() {
        let raw = json!({"season": "봄 웜톤", "rawResponse": {"model": "v3"}});
        let result = normalize(raw.clone()).unwrap();
        assert_eq!(result.raw_response, raw);

        let raw = json!({
            "season": "spring-warm",
            "probabilities": {"spring": "80%"},
            "rawResponse": {"model": "v3"}
        });
        assert_eq!(normalize(raw.clone()).unwrap().raw_response, raw);
    }

    #[test]
    fn season_outside_data_envelope_is_used() {
        let result = normalize(json!({
            "season": "봄 웜톤",
            "probabilities": {"봄 웜톤": "81%"},
            "data": {"imageUrl": "x"}
        }))
        .unwrap();
        assert_eq!(result.season, Season::SpringWarm);
        assert_eq!(result.confidence, 81.0);
    }

    #[test]
    fn data_envelope_wins_when_both_carry_results() {
        let result = normalize(json!({
            "colorType": "winter",
            "data": {"season": "여름 쿨톤"}
        }))
        .unwrap();
        assert_eq!(result.season, Season::SummerCool);
    }

    #[test]
    fn normalizing_is_idempotent() {
        let first = normalize(json!({
            "data": {
                "season": "겨울 쿨톤",
                "probabilities": {"겨울 쿨톤": "92%"},
                "description": "선명한 색",
                "feature": "높은 대비",
                "recommend": [{"name": "로열 블루", "rgb": "#1168d9"}],
                "avoid": ["#F5F5DC"]
            }
        }))
        .unwrap();

        let external = serde_json::to_value(&first).unwrap();
        let second = normalize(external).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn reference_payload_is_normalized() {
        let snapshot = ResultNormalizer::new()
            .normalize_reference(&json!({
                "success": true,
                "data": {
                    "spring-warm": {
                        "title": "봄 웜톤",
                        "description": "밝은 색",
                        "characteristics": ["밝은 피부톤"],
                        "recommendedColors": ["#FF9E2C", "nope"],
                        "avoidColors": ["#808080"]
                    },
                    "fall-warm": {"title": "가을 웜톤"},
                    "mystery": {"title": "?"}
                }
            }))
            .unwrap();

        assert_eq!(snapshot.len(), 2);
        let spring = snapshot.get(Season::SpringWarm).unwrap();
        assert_eq!(spring.recommended_colors, vec!["#FF9E2C"]);
        assert!(snapshot.get(Season::AutumnWarm).is_some());
    }

    #[test]
    fn reference_accepts_types_map() {
        let snapshot = ResultNormalizer::new()
            .normalize_reference(&json!({"data": {"types": {"winter-cool": {}}}}))
            .unwrap();
        assert_eq!(
            snapshot.get(Season::WinterCool).unwrap().title,
            "겨울 쿨톤"
        );
    }

    #[test]
    fn empty_reference_is_error() {
        let err = ResultNormalizer::new()
            .normalize_reference(&json!({"success": true, "data": {}}))
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingReferenceTypes);
    }
}
