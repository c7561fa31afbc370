//! TEXT / MTEXT 内容解码：去除格式控制码，保留可显示文本与宽度、字高信息。

use std::iter::Peekable;
use std::str::Chars;

/// `\H` 给出的字高。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextHeight {
    Absolute(f64),
    /// `\H2x;` 形式，相对实体字高的倍数。
    Relative(f64),
}

impl TextHeight {
    pub fn apply(self, base: f64) -> f64 {
        match self {
            TextHeight::Absolute(value) => value,
            TextHeight::Relative(factor) => base * factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedText {
    pub content: String,
    pub width_factor: Option<f64>,
    pub height: Option<TextHeight>,
}

fn read_until_semicolon(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut value = String::new();
    for ch in chars.by_ref() {
        if ch == ';' {
            break;
        }
        value.push(ch);
    }
    value
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn decode_unicode(chars: &mut Peekable<Chars<'_>>) -> Option<char> {
    if chars.peek() != Some(&'+') {
        return None;
    }
    chars.next();
    let mut digits = String::with_capacity(4);
    while digits.len() < 4 {
        match chars.peek() {
            Some(ch) if ch.is_ascii_hexdigit() => {
                digits.push(*ch);
                chars.next();
            }
            _ => break,
        }
    }
    u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
}

/// 解码 MTEXT 内联格式码，结果再经过 `%%` 特殊码替换。
pub fn decode_mtext(raw: &str) -> DecodedText {
    let mut decoded = DecodedText::default();
    let mut content = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' | '}' => {}
            '\\' => {
                let Some(code) = chars.next() else {
                    break;
                };
                match code {
                    'P' | 'X' => content.push('\n'),
                    '~' => content.push('\u{a0}'),
                    '\\' | '{' | '}' => content.push(code),
                    'W' => {
                        let value = read_until_semicolon(&mut chars);
                        if let Some(factor) = parse_number(&value) {
                            decoded.width_factor = Some(factor);
                        }
                    }
                    'H' => {
                        let value = read_until_semicolon(&mut chars);
                        let value = value.trim();
                        decoded.height = match value.strip_suffix(['x', 'X']) {
                            Some(relative) => parse_number(relative).map(TextHeight::Relative),
                            None => parse_number(value).map(TextHeight::Absolute),
                        }
                        .or(decoded.height);
                    }
                    'S' => {
                        let value = read_until_semicolon(&mut chars);
                        let mut parts = value.splitn(2, ['^', '/', '#']);
                        let upper = parts.next().unwrap_or_default().trim();
                        match parts.next() {
                            Some(lower) => {
                                content.push_str(upper);
                                content.push('/');
                                content.push_str(lower.trim());
                            }
                            None => content.push_str(upper),
                        }
                    }
                    'U' => match decode_unicode(&mut chars) {
                        Some(decoded_char) => content.push(decoded_char),
                        None => content.push('U'),
                    },
                    'f' | 'F' | 'C' | 'c' | 'A' | 'T' | 'Q' | 'p' => {
                        read_until_semicolon(&mut chars);
                    }
                    'L' | 'l' | 'O' | 'o' | 'K' | 'k' => {}
                    other => content.push(other),
                }
            }
            other => content.push(other),
        }
    }

    decoded.content = decode_special_codes(&content);
    decoded
}

/// 替换 `%%c`、`%%d`、`%%p`、`%%%` 与三位数字字符码，去掉 `%%u`/`%%o` 开关。
pub fn decode_special_codes(raw: &str) -> String {
    if !raw.contains("%%") {
        return raw.to_string();
    }
    let chars: Vec<char> = raw.chars().collect();
    let mut output = String::with_capacity(raw.len());
    let mut index = 0;
    while index < chars.len() {
        let is_code = chars[index] == '%' && chars.get(index + 1) == Some(&'%');
        if !is_code {
            output.push(chars[index]);
            index += 1;
            continue;
        }
        let Some(code) = chars.get(index + 2) else {
            output.push_str("%%");
            break;
        };
        match code.to_ascii_lowercase() {
            'c' => output.push('\u{2300}'),
            'd' => output.push('\u{b0}'),
            'p' => output.push('\u{b1}'),
            '%' => output.push('%'),
            'u' | 'o' | 'k' => {}
            digit if digit.is_ascii_digit() => {
                let digits: String = chars[index + 2..]
                    .iter()
                    .take(3)
                    .take_while(|ch| ch.is_ascii_digit())
                    .collect();
                let decoded = if digits.len() == 3 {
                    digits.parse::<u32>().ok().and_then(char::from_u32)
                } else {
                    None
                };
                match decoded {
                    Some(ch) => {
                        output.push(ch);
                        index += 5;
                    }
                    None => {
                        output.push_str("%%");
                        index += 2;
                    }
                }
                continue;
            }
            other => {
                output.push_str("%%");
                output.push(other);
            }
        }
        index += 3;
    }
    output
}
