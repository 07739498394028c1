//! オフライン用のシーズン別パレット定義。

use serde_json::{json, Value};

use crate::domain::season::Season;

pub(crate) struct SeasonProfile {
    /// 参照データのキー（上流互換のため秋は "fall-warm"）
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub characteristics: &'static [&'static str],
    pub reason: &'static str,
    pub recommend: &'static [(&'static str, &'static str)],
    pub avoid: &'static [(&'static str, &'static str)],
}

const SPRING: SeasonProfile = SeasonProfile {
    key: "spring-warm",
    title: "봄 웜톤",
    description: "밝고 선명한 웜 컬러가 잘 어울리는 타입입니다.",
    characteristics: &["밝은 피부톤", "노란 기가 도는 피부", "생기 있는 인상"],
    reason: "피부에 노란 기가 돌고 밝은 명도의 색에서 혈색이 살아납니다.",
    recommend: &[
        ("망고 오렌지", "#FF9E2C"),
        ("레몬 옐로우", "#FFE143"),
        ("비비드 오렌지", "#FF5C00"),
        ("살구 오렌지", "#FFA629"),
        ("선플라워", "#FFCA3E"),
        ("코랄 핑크", "#FF8674"),
    ],
    avoid: &[
        ("그레이", "#808080"),
        ("네이비", "#000080"),
        ("인디고", "#4B0082"),
        ("올리브 드랍", "#6B8E23"),
        ("슬레이트 그레이", "#708090"),
    ],
};

const SUMMER: SeasonProfile = SeasonProfile {
    key: "summer-cool",
    title: "여름 쿨톤",
    description: "부드럽고 차분한 파스텔 쿨 컬러가 잘 어울리는 타입입니다.",
    characteristics: &["붉은 기가 도는 피부", "부드러운 인상", "낮은 대비"],
    reason: "푸른 기가 있는 부드러운 색에서 피부가 맑아 보입니다.",
    recommend: &[
        ("파우더 블루", "#7A9CC6"),
        ("로즈 베이지", "#E8C6C6"),
        ("민트 아이스", "#D2E8E8"),
        ("라벤더 그레이", "#C2C2D1"),
        ("세이지 블루", "#AEC9C9"),
        ("모브", "#BDABBE"),
    ],
    avoid: &[
        ("펌킨 오렌지", "#FF7518"),
        ("오렌지", "#FFA500"),
        ("시에나", "#A0522D"),
        ("카키", "#F0E68C"),
        ("페루", "#CD853F"),
    ],
};

const AUTUMN: SeasonProfile = SeasonProfile {
    key: "fall-warm",
    title: "가을 웜톤",
    description: "깊고 차분한 어스 톤이 잘 어울리는 타입입니다.",
    characteristics: &["황금빛 피부", "차분하고 성숙한 인상", "깊은 눈동자"],
    reason: "채도가 낮고 깊은 웜 컬러에서 얼굴에 윤기가 더해집니다.",
    recommend: &[
        ("브론즈", "#825C06"),
        ("카멜", "#987D51"),
        ("브라운", "#814E18"),
        ("코코아", "#6F5946"),
        ("테라코타 베이지", "#BE8A4A"),
        ("머스터드 카키", "#947A45"),
    ],
    avoid: &[
        ("핫 핑크", "#FF80AB"),
        ("아쿠아", "#80DEEA"),
        ("라일락", "#B39DDB"),
        ("라벤더", "#E6E6FA"),
        ("블랙", "#000000"),
    ],
};

const WINTER: SeasonProfile = SeasonProfile {
    key: "winter-cool",
    title: "겨울 쿨톤",
    description: "선명하고 대비가 강한 쿨 컬러가 잘 어울리는 타입입니다.",
    characteristics: &["푸른 기가 도는 피부", "또렷한 인상", "높은 대비"],
    reason: "명암 대비가 뚜렷한 색에서 이목구비가 선명해 보입니다.",
    recommend: &[
        ("체리 레드", "#E40046"),
        ("로열 블루", "#1168D9"),
        ("딥 틸", "#26648E"),
        ("블랙", "#000000"),
        ("퓨어 화이트", "#FFFFFF"),
        ("사파이어", "#0F52BA"),
    ],
    avoid: &[
        ("페일 골든로드", "#EEE8AA"),
        ("카키", "#F0E68C"),
        ("다크 카키", "#BDB76B"),
        ("피치 퍼프", "#FFDAB9"),
        ("베이지", "#F5F5DC"),
    ],
};

pub(crate) fn profile(season: Season) -> &'static SeasonProfile {
    match season {
        Season::SpringWarm => &SPRING,
        Season::SummerCool => &SUMMER,
        Season::AutumnWarm => &AUTUMN,
        Season::WinterCool => &WINTER,
    }
}

fn swatches(list: &[(&str, &str)]) -> Value {
    list.iter()
        .map(|(name, hex)| json!({ "name": name, "rgb": hex }))
        .collect()
}

fn hexes(list: &[(&str, &str)]) -> Value {
    list.iter().map(|(_, hex)| json!(hex)).collect()
}

/// `/colorTypes` 相当のレスポンスボディ
pub(crate) fn reference_payload() -> Value {
    let data: serde_json::Map<String, Value> = Season::ALL
        .into_iter()
        .map(|season| {
            let p = profile(season);
            (
                p.key.to_string(),
                json!({
                    "title": p.title,
                    "description": p.description,
                    "characteristics": p.characteristics,
                    "recommendedColors": hexes(p.recommend),
                    "avoidColors": hexes(p.avoid),
                }),
            )
        })
        .collect();

    json!({ "success": true, "data": data })
}

/// `/analyze` 相当のレスポンスボディ（現行形式）
pub(crate) fn simulated_payload(season: Season, confidence: u32) -> Value {
    let p = profile(season);
    json!({
        "success": true,
        "data": {
            "season": season.korean_label(),
            "probabilities": { (season.korean_label()): format!("{confidence}%") },
            "reason": p.reason,
            "description": p.description,
            "feature": p.characteristics,
            "recommend": swatches(p.recommend),
            "avoid": swatches(p.avoid),
        }
    })
}
