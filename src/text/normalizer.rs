//! 文本规范化
//!
//! 把阅读器里的全角标点组合替换成解析器认识的单个字符。

/// 替换表，按优先级排列：长的模式在前，避免被短模式提前吃掉一部分
const REPLACEMENTS: &[(&str, &str)] = &[
    ("．．．", "…"),
    ("．．", "…"),
    ("！！", "‼"),
    ("！？", "“⁉"),
];

/// 规范化一段原始文本
///
/// 按 `REPLACEMENTS` 的顺序依次做全量替换，其他字符原样保留。
pub fn normalize(raw: &str) -> String {
    REPLACEMENTS
        .iter()
        .fold(raw.to_string(), |text, (pattern, replacement)| {
            if text.contains(pattern) {
                text.replace(pattern, replacement)
            } else {
                text
            }
        })
}
