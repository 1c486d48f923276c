//! Question-language detection.
//!
//! A character-class frequency heuristic across common scripts, used to steer
//! the model into answering in the language the question was asked in. Short
//! queries carry few characters, so a single CJK/Hangul character is already
//! decisive.

/// Detected language of a user question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Chinese,
    Japanese,
    Korean,
    English,
}

impl Lang {
    /// Human label embedded in the system prompt.
    pub fn name(&self) -> &'static str {
        match self {
            Lang::Chinese => "中文",
            Lang::Japanese => "日本語",
            Lang::Korean => "한국어",
            Lang::English => "English",
        }
    }

    /// Answer-language directive for the system prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            Lang::Chinese => "請用繁體中文回答問題。",
            Lang::Japanese => "日本語で回答してください。",
            Lang::Korean => "한국어로 답변해 주세요.",
            Lang::English => "Please answer in English.",
        }
    }
}

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{309f}').contains(&c) || ('\u{30a0}'..='\u{30ff}').contains(&c)
}

fn is_hangul(c: char) -> bool {
    ('\u{ac00}'..='\u{d7af}').contains(&c)
}

/// Detect the primary language of a text.
///
/// Kana wins over ideographs (Japanese text mixes both), otherwise any CJK
/// or Hangul presence decides; everything else is treated as English.
pub fn detect(text: &str) -> Lang {
    let mut chinese = 0usize;
    let mut japanese = 0usize;
    let mut korean = 0usize;

    for c in text.chars() {
        if is_kana(c) {
            japanese += 1;
        } else if is_cjk_ideograph(c) {
            chinese += 1;
        } else if is_hangul(c) {
            korean += 1;
        }
    }

    if japanese > 0 {
        Lang::Japanese
    } else if chinese > 0 {
        Lang::Chinese
    } else if korean > 0 {
        Lang::Korean
    } else {
        Lang::English
    }
}

/// Markers that flag an answer as incomplete, per detected language.
///
/// Matched case-insensitively against the final answer to decide whether the
/// fallback keyword search should be appended.
pub fn incomplete_answer_markers() -> &'static [&'static str] {
    &[
        "i cannot",
        "i can't",
        "i don't have",
        "no information",
        "not found",
        "unable to",
        "無法",
        "找不到",
        "沒有資訊",
        "情報がありません",
        "見つかりません",
    ]
}
