//! 语言分类器
//!
//! 基于字符脚本频率的启发式判定，无外部模型依赖。只统计可分类
//! 字符（谚文、假名、汉字、拉丁字母），数字、标点与空白不参与
//! 比例计算，因此 "3.14%" 这类纯符号文本会落入 `Mixed`。

use serde::{Deserialize, Serialize};

/// 判定出的文本语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Korean,
    Japanese,
    Chinese,
    English,
    /// 无法归类或多脚本混合的文本，保守地视为可能需要翻译
    Mixed,
}

impl Language {
    /// 语言的 BCP-47 风格代码（与翻译服务和设置存储约定一致）
    pub fn code(&self) -> &'static str {
        match self {
            Language::Korean => "ko",
            Language::Japanese => "ja",
            Language::Chinese => "zh",
            Language::English => "en",
            Language::Mixed => "mixed",
        }
    }

    /// 判定结果是否匹配给定的源语言代码
    ///
    /// `Mixed` 永远放行：无法确定语言的文本宁可多翻一次，
    /// 也不要漏掉用户看不懂的内容。
    pub fn matches_source(&self, source_code: &str) -> bool {
        match self {
            Language::Mixed => true,
            other => other.code() == source_code,
        }
    }
}

pub(crate) fn is_hangul(c: char) -> bool {
    matches!(c,
        '\u{AC00}'..='\u{D7AF}'   // 谚文音节
        | '\u{1100}'..='\u{11FF}' // 谚文字母
        | '\u{3130}'..='\u{318F}' // 谚文兼容字母
    )
}

fn is_kana(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'   // 平假名
        | '\u{30A0}'..='\u{30FF}' // 片假名
        | '\u{31F0}'..='\u{31FF}' // 片假名音标扩展
    )
}

fn is_cjk_ideograph(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'   // 统一表意文字
        | '\u{3400}'..='\u{4DBF}' // 扩展A
        | '\u{F900}'..='\u{FAFF}' // 兼容表意文字
    )
}

pub(crate) fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic()
        || matches!(c, '\u{00C0}'..='\u{024F}') // 带变音符的拉丁字母
}

/// 各脚本在可分类字符中的占比
#[derive(Debug, Clone, Copy, Default)]
struct ScriptRatios {
    hangul: f32,
    kana: f32,
    cjk: f32,
    latin: f32,
}

fn script_ratios(text: &str) -> Option<ScriptRatios> {
    let mut hangul = 0usize;
    let mut kana = 0usize;
    let mut cjk = 0usize;
    let mut latin = 0usize;

    for c in text.chars() {
        if is_hangul(c) {
            hangul += 1;
        } else if is_kana(c) {
            kana += 1;
        } else if is_cjk_ideograph(c) {
            cjk += 1;
        } else if is_latin(c) {
            latin += 1;
        }
    }

    let total = hangul + kana + cjk + latin;
    if total == 0 {
        return None;
    }
    let total = total as f32;
    Some(ScriptRatios {
        hangul: hangul as f32 / total,
        kana: kana as f32 / total,
        cjk: cjk as f32 / total,
        latin: latin as f32 / total,
    })
}

/// 判定文本的主导语言
///
/// 判定顺序即优先级：谚文压倒性占比先于假名，假名先于汉字
/// （日文混用汉字，假名占比是比汉字更强的日文信号），最后才把
/// 几乎纯拉丁的文本归为英文。
pub fn detect(text: &str) -> Language {
    let Some(r) = script_ratios(text) else {
        return Language::Mixed;
    };

    if r.hangul > 0.6 {
        Language::Korean
    } else if r.kana > 0.3 {
        Language::Japanese
    } else if r.cjk > 0.5 && r.kana < 0.1 {
        Language::Chinese
    } else if r.hangul < 0.1 && r.kana < 0.1 && r.cjk < 0.1 {
        // 可分类字符几乎全是拉丁字母
        debug_assert!(r.latin > 0.0);
        Language::English
    } else {
        Language::Mixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_korean() {
        assert_eq!(detect("안녕하세요 세계"), Language::Korean);
        assert_eq!(detect("오늘은 날씨가 좋다"), Language::Korean);
    }

    #[test]
    fn test_detect_japanese_with_kanji() {
        // 汉字假名混写，假名占比应压过汉字
        assert_eq!(detect("今日はいい天気ですね"), Language::Japanese);
        assert_eq!(detect("カタカナのテキスト"), Language::Japanese);
    }

    #[test]
    fn test_detect_chinese() {
        assert_eq!(detect("今天天气很好"), Language::Chinese);
        assert_eq!(detect("简体中文的一段话"), Language::Chinese);
    }

    #[test]
    fn test_detect_english() {
        assert_eq!(detect("Hello world"), Language::English);
        assert_eq!(detect("The quick brown fox."), Language::English);
    }

    #[test]
    fn test_symbols_only_is_mixed() {
        assert_eq!(detect("3.14 + 2.71 = ?"), Language::Mixed);
        assert_eq!(detect("...!!!"), Language::Mixed);
        assert_eq!(detect(""), Language::Mixed);
    }

    #[test]
    fn test_heavy_mixture_is_mixed() {
        // 韩英对半混排，谚文达不到0.6阈值
        assert_eq!(detect("안녕 hello 세계 world wide web"), Language::Mixed);
    }

    #[test]
    fn test_matches_source() {
        assert!(Language::Korean.matches_source("ko"));
        assert!(!Language::Korean.matches_source("en"));
        assert!(Language::Mixed.matches_source("ko"));
        assert!(Language::Mixed.matches_source("en"));
    }
}
