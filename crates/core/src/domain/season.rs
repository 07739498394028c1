use serde::{Deserialize, Serialize};

// ─── Season ──────────────────────────────────────────────────────

/// パーソナルカラーの4シーズン（内部の正規形）。
///
/// 上流サービスはローカライズされたラベル（例: "겨울 쿨톤", "Winter Cool",
/// "ブルベ冬"）を返すため、`Season::resolve` で必ずこの列挙に写像する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Season {
    SpringWarm,
    SummerCool,
    AutumnWarm,
    WinterCool,
}

impl Season {
    pub const ALL: [Season; 4] = [
        Season::SpringWarm,
        Season::SummerCool,
        Season::AutumnWarm,
        Season::WinterCool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpringWarm => "spring-warm",
            Self::SummerCool => "summer-cool",
            Self::AutumnWarm => "autumn-warm",
            Self::WinterCool => "winter-cool",
        }
    }

    /// 上流 LLM が返す韓国語ラベル
    pub fn korean_label(&self) -> &'static str {
        match self {
            Self::SpringWarm => "봄 웜톤",
            Self::SummerCool => "여름 쿨톤",
            Self::AutumnWarm => "가을 웜톤",
            Self::WinterCool => "겨울 쿨톤",
        }
    }

    /// 可視化シンクへ送る整数コード
    pub fn code(&self) -> u8 {
        match self {
            Self::SpringWarm => 1,
            Self::SummerCool => 2,
            Self::AutumnWarm => 3,
            Self::WinterCool => 4,
        }
    }

    /// 季節を表す主要語。確率マップの部分一致に使う。
    pub fn primary_terms(&self) -> &'static [&'static str] {
        match self {
            Self::SpringWarm => &["spring", "봄", "春"],
            Self::SummerCool => &["summer", "여름", "夏"],
            Self::AutumnWarm => &["autumn", "fall", "가을", "秋"],
            Self::WinterCool => &["winter", "겨울", "冬"],
        }
    }

    /// 空白・ハイフン・アンダースコアを除去し小文字化した別名
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::SpringWarm => &[
                "springwarm", "spring", "springwarmtone",
                "봄웜톤", "봄웜", "봄",
                "春", "イエベ春", "春タイプ", "スプリング",
            ],
            Self::SummerCool => &[
                "summercool", "summer", "summercooltone",
                "여름쿨톤", "여름쿨", "여름",
                "夏", "ブルベ夏", "夏タイプ", "サマー",
            ],
            Self::AutumnWarm => &[
                "autumnwarm", "autumn", "autumnwarmtone",
                "fallwarm", "fall", "fallwarmtone",
                "가을웜톤", "가을웜", "가을",
                "秋", "イエベ秋", "秋タイプ", "オータム",
            ],
            Self::WinterCool => &[
                "wintercool", "winter", "wintercooltone",
                "겨울쿨톤", "겨울쿨", "겨울",
                "冬", "ブルベ冬", "冬タイプ", "ウィンター",
            ],
        }
    }

    /// ラベルを正規形に解決する。大文字小文字・区切り文字・言語差を吸収するが、
    /// 既知の別名に一致しない場合は推測せず `None` を返す。
    pub fn resolve(label: &str) -> Option<Season> {
        let key = compact(label);
        if key.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|season| season.aliases().contains(&key.as_str()))
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 比較用にラベルを圧縮する（小文字化 + 区切り文字除去）
pub(crate) fn compact(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
