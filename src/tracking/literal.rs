//! Decoder for stringified container literals.
//!
//! Clients and upstream frameworks often send structured parameters as the
//! `repr` of a dict or list: single-quoted strings, `True`/`False`/`None`,
//! tuples. This reads that literal grammar into a [`Value`] so the redactor
//! can see the keys inside.
//!
//! Only literals are accepted. Names, calls and operators other than a sign
//! on a number are rejected, as is nesting deeper than [`MAX_LITERAL_DEPTH`].

use serde_json::{Map, Number, Value};

/// Deepest container nesting the decoder will follow.
pub const MAX_LITERAL_DEPTH: usize = 128;

/// Parse `text` as a container literal.
///
/// Dicts become objects; lists, tuples and sets become arrays. Returns
/// `None` on any syntax error or trailing input.
pub fn parse_literal(text: &str) -> Option<Value> {
    let mut cursor = Cursor::new(text);
    let value = cursor.value(0)?;
    cursor.skip_whitespace();
    if cursor.is_done() {
        Some(value)
    } else {
        None
    }
}

/// Parse `text` only if it holds a dict or list literal.
///
/// Tuples and sets at the top level stay strings.
pub(crate) fn parse_container(text: &str) -> Option<Value> {
    match text.as_bytes().first()? {
        b'[' => parse_literal(text).filter(Value::is_array),
        b'{' => parse_literal(text).filter(Value::is_object),
        _ => None,
    }
}

struct Cursor<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, position: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.text[self.position..]
    }

    fn is_done(&self) -> bool {
        self.position >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self, ch: char) {
        self.position += ch.len_utf8();
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.advance(ch);
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance(ch);
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.advance(expected);
            true
        } else {
            false
        }
    }

    fn value(&mut self, depth: usize) -> Option<Value> {
        if depth > MAX_LITERAL_DEPTH {
            return None;
        }

        self.skip_whitespace();
        match self.peek()? {
            '[' => {
                self.advance('[');
                self.sequence(']', depth).map(|(items, _)| Value::Array(items))
            }
            '(' => {
                self.advance('(');
                let (items, trailing_comma) = self.sequence(')', depth)?;
                // `(x)` is a parenthesized value, `(x,)` a one-item tuple
                if items.len() == 1 && !trailing_comma {
                    items.into_iter().next()
                } else {
                    Some(Value::Array(items))
                }
            }
            '{' => {
                self.advance('{');
                self.braced(depth)
            }
            '\'' | '"' => self.string(false),
            '-' | '+' | '.' | '0'..='9' => self.number(),
            _ => self.word(),
        }
    }

    /// Items up to `close`, and whether the last item had a trailing comma.
    fn sequence(&mut self, close: char, depth: usize) -> Option<(Vec<Value>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.eat(close) {
                return Some((items, trailing_comma));
            }
            items.push(self.value(depth + 1)?);
            trailing_comma = self.eat(',');
            if !trailing_comma {
                return self.eat(close).then_some((items, false));
            }
        }
    }

    /// A dict or a set, decided by the first separator.
    fn braced(&mut self, depth: usize) -> Option<Value> {
        if self.eat('}') {
            return Some(Value::Object(Map::new()));
        }

        let first = self.value(depth + 1)?;
        if self.eat(':') {
            let mut map = Map::new();
            let mut key = first;
            loop {
                let value = self.value(depth + 1)?;
                map.insert(key_text(key)?, value);
                if !self.eat(',') {
                    return self.eat('}').then_some(Value::Object(map));
                }
                if self.eat('}') {
                    return Some(Value::Object(map));
                }
                key = self.value(depth + 1)?;
                if !self.eat(':') {
                    return None;
                }
            }
        } else {
            let mut items = vec![first];
            while self.eat(',') {
                if self.eat('}') {
                    return Some(Value::Array(items));
                }
                items.push(self.value(depth + 1)?);
            }
            self.eat('}').then_some(Value::Array(items))
        }
    }

    /// One or more adjacent quoted literals, concatenated.
    fn string(&mut self, raw: bool) -> Option<Value> {
        let mut out = self.quoted(raw)?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('\'' | '"') => out.push_str(&self.quoted(false)?),
                _ => return Some(Value::String(out)),
            }
        }
    }

    fn quoted(&mut self, raw: bool) -> Option<String> {
        let quote = self.next_char()?;
        let mut out = String::new();
        loop {
            match self.next_char()? {
                ch if ch == quote => return Some(out),
                '\n' => return None,
                '\\' if raw => {
                    out.push('\\');
                    out.push(self.next_char()?);
                }
                '\\' => self.escape(&mut out)?,
                other => out.push(other),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Option<()> {
        let ch = self.next_char()?;
        match ch {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(ch),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Some(())
    }

    fn hex_escape(&mut self, digits: usize) -> Option<char> {
        let hex = self.remaining().get(..digits)?;
        let code = u32::from_str_radix(hex, 16).ok()?;
        self.position += digits;
        char::from_u32(code)
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.position;
        if let Some(sign @ ('-' | '+')) = self.peek() {
            self.advance(sign);
            self.skip_whitespace();
        }
        let digits_start = self.position;
        while let Some(ch) = self.peek() {
            if !(ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '_')) {
                // Exponent sign
                if matches!(ch, '-' | '+')
                    && matches!(self.text[..self.position].chars().last(), Some('e' | 'E'))
                {
                    self.advance(ch);
                    continue;
                }
                break;
            }
            self.advance(ch);
        }

        let negative = self.text[start..digits_start].starts_with('-');
        let literal: String = self.text[digits_start..self.position]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        if literal.is_empty() {
            return None;
        }

        let number = if literal.contains(['.', 'e', 'E']) {
            let parsed: f64 = literal.parse().ok()?;
            Number::from_f64(if negative { -parsed } else { parsed })?
        } else if negative {
            Number::from(format!("-{}", literal).parse::<i64>().ok()?)
        } else {
            Number::from(literal.parse::<u64>().ok()?)
        };
        Some(Value::Number(number))
    }

    /// Keywords and string prefixes.
    fn word(&mut self) -> Option<Value> {
        let rest = self.remaining();
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..end];

        let value = match word {
            "True" => Value::Bool(true),
            "False" => Value::Bool(false),
            "None" => Value::Null,
            _ => {
                let prefix = word.to_ascii_lowercase();
                let is_prefix = matches!(prefix.as_str(), "u" | "r" | "b" | "br" | "rb");
                let quoted = matches!(rest[end..].chars().next(), Some('\'' | '"'));
                if !(is_prefix && quoted) {
                    return None;
                }
                self.position += end;
                return self.string(prefix.contains('r'));
            }
        };

        self.position += end;
        Some(value)
    }
}

/// Object key text for a decoded dict key.
fn key_text(key: Value) -> Option<String> {
    match key {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Null => Some("None".to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_quoted_dict() {
        assert_eq!(
            parse_literal("{'token': 'abc', 'page': 2}"),
            Some(json!({"token": "abc", "page": 2}))
        );
    }

    #[test]
    fn test_keywords_and_numbers() {
        assert_eq!(
            parse_literal("[True, False, None, -3, 2.5, 1e3, 1_000]"),
            Some(json!([true, false, null, -3, 2.5, 1000.0, 1000]))
        );
    }

    #[test]
    fn test_tuples_and_sets_become_arrays() {
        assert_eq!(parse_literal("(1, 'a')"), Some(json!([1, "a"])));
        assert_eq!(parse_literal("(1,)"), Some(json!([1])));
        assert_eq!(parse_literal("()"), Some(json!([])));
        assert_eq!(parse_literal("(1)"), Some(json!(1)));
        assert_eq!(parse_literal("{1, 2}"), Some(json!([1, 2])));
    }

    #[test]
    fn test_nested_containers() {
        assert_eq!(
            parse_literal("[{'user': {'password': \"x\"}}, ('k', [1, 2])]"),
            Some(json!([{"user": {"password": "x"}}, ["k", [1, 2]]]))
        );
    }

    #[test]
    fn test_trailing_commas_and_whitespace() {
        assert_eq!(
            parse_literal(" { 'a' : 1 , 'b' : [ 2 , ] , } "),
            Some(json!({"a": 1, "b": [2]}))
        );
    }

    #[test]
    fn test_string_escapes_and_prefixes() {
        assert_eq!(
            parse_literal(r#"['it\'s', "tab\there", u'\x41é', r'\d+', 'a' 'b']"#),
            Some(json!(["it's", "tab\there", "A\u{e9}", "\\d+", "ab"]))
        );
    }

    #[test]
    fn test_non_string_keys() {
        assert_eq!(
            parse_literal("{1: 'a', True: 'b', None: 'c'}"),
            Some(json!({"1": "a", "True": "b", "None": "c"}))
        );
        assert_eq!(parse_literal("{(1, 2): 'a'}"), None);
    }

    #[test]
    fn test_rejects_non_literals() {
        assert_eq!(parse_literal("{'a': open('x')}"), None);
        assert_eq!(parse_literal("[1, 2"), None);
        assert_eq!(parse_literal("{'a' 1}"), None);
        assert_eq!(parse_literal("['a'] + ['b']"), None);
        assert_eq!(parse_literal("'unterminated"), None);
        assert_eq!(parse_literal("[nan]"), None);
    }

    #[test]
    fn test_depth_limit() {
        let levels = MAX_LITERAL_DEPTH + 2;
        let deep = format!("{}{}", "[".repeat(levels), "]".repeat(levels));
        assert_eq!(parse_literal(&deep), None);

        let shallow = format!("{}{}", "[".repeat(10), "]".repeat(10));
        assert!(parse_literal(&shallow).is_some());
    }

    #[test]
    fn test_container_only_dicts_and_lists() {
        assert!(parse_container("{'a': 1}").is_some());
        assert!(parse_container("['a']").is_some());
        assert_eq!(parse_container("('a', 'b')"), None);
        assert_eq!(parse_container("{'a', 'b'}"), None);
        assert_eq!(parse_container("'a'"), None);
    }
}
