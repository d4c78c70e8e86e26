use crate::error::SqlTemplateError;

/// A slice of template source: literal SQL or the inside of a `{{ ... }}` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Piece<'a> {
    Text(&'a str),
    Action { body: &'a str, offset: usize },
}

#[derive(Clone, Copy)]
enum State {
    Normal,
    DoubleQuoted,
    RawQuoted,
    Comment,
}

/// Split template source into text and actions, applying `{{-` / `-}}` trim markers.
pub(super) fn split(source: &str) -> Result<Vec<Piece<'_>>, SqlTemplateError> {
    let mut pieces = Vec::new();
    let mut rest_start = 0;
    let mut trim_next = false;

    while let Some(found) = source[rest_start..].find("{{") {
        let open = rest_start + found;
        let mut body_start = open + 2;
        let mut text = &source[rest_start..open];
        if trim_next {
            text = text.trim_start();
        }
        if is_trim_left(source, body_start) {
            text = text.trim_end();
            body_start += 1;
        }
        if !text.is_empty() {
            pieces.push(Piece::Text(text));
        }

        let close = find_close(source, body_start, open)?;
        let mut body_end = close;
        trim_next = false;
        if is_trim_right(source, close) {
            body_end -= 1;
            trim_next = true;
        }
        pieces.push(Piece::Action {
            body: source[body_start..body_end].trim(),
            offset: open,
        });
        rest_start = close + 2;
    }

    let mut tail = &source[rest_start..];
    if trim_next {
        tail = tail.trim_start();
    }
    if !tail.is_empty() {
        pieces.push(Piece::Text(tail));
    }
    Ok(pieces)
}

// `{{- ` trims, `{{-3}}` would not; the marker must be followed by whitespace.
fn is_trim_left(source: &str, body_start: usize) -> bool {
    let bytes = source.as_bytes();
    bytes.get(body_start) == Some(&b'-')
        && bytes
            .get(body_start + 1)
            .is_some_and(u8::is_ascii_whitespace)
}

fn is_trim_right(source: &str, close: usize) -> bool {
    let bytes = source.as_bytes();
    close >= 2 && bytes[close - 1] == b'-' && bytes[close - 2].is_ascii_whitespace()
}

/// Index of the `}}` closing the action whose body starts at `start`.
fn find_close(source: &str, start: usize, open: usize) -> Result<usize, SqlTemplateError> {
    let bytes = source.as_bytes();
    let mut state = State::Normal;
    let mut idx = start;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::RawQuoted,
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::Comment;
                    idx += 1;
                }
                b'}' if bytes.get(idx + 1) == Some(&b'}') => return Ok(idx),
                _ => {}
            },
            State::DoubleQuoted => match b {
                b'\\' => idx += 1, // skip escaped char
                b'"' => state = State::Normal,
                _ => {}
            },
            State::RawQuoted => {
                if b == b'`' {
                    state = State::Normal;
                }
            }
            State::Comment => {
                if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    Err(SqlTemplateError::TemplateError(format!(
        "unclosed action starting at {}",
        position(source, open)
    )))
}

/// Tokens inside a single action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Token {
    Ident(String),
    Str(String),
    Number(u32),
    LParen,
    RParen,
}

pub(super) fn tokenize(body: &str) -> Result<Vec<Token>, String> {
    let bytes = body.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match b {
            _ if b.is_ascii_whitespace() => idx += 1,
            b'(' => {
                tokens.push(Token::LParen);
                idx += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                idx += 1;
            }
            b'"' => {
                let (value, next) = scan_quoted(body, idx)?;
                tokens.push(Token::Str(value));
                idx = next;
            }
            b'`' => {
                let end = body[idx + 1..]
                    .find('`')
                    .map(|i| idx + 1 + i)
                    .ok_or_else(|| "unterminated raw string".to_string())?;
                tokens.push(Token::Str(body[idx + 1..end].to_string()));
                idx = end + 1;
            }
            _ if b.is_ascii_digit() => {
                let end = scan_while(bytes, idx, |c| c.is_ascii_digit());
                let digits = &body[idx..end];
                let number = digits
                    .parse::<u32>()
                    .map_err(|e| format!("invalid number '{digits}': {e}"))?;
                tokens.push(Token::Number(number));
                idx = end;
            }
            _ if b.is_ascii_alphabetic() || b == b'_' => {
                let end = scan_while(bytes, idx, |c| c.is_ascii_alphanumeric() || c == b'_');
                tokens.push(Token::Ident(body[idx..end].to_string()));
                idx = end;
            }
            _ => {
                return Err(format!(
                    "unexpected character '{}'",
                    body[idx..].chars().next().unwrap_or('?')
                ));
            }
        }
    }

    Ok(tokens)
}

fn scan_while(bytes: &[u8], start: usize, pred: impl Fn(u8) -> bool) -> usize {
    let mut idx = start;
    while idx < bytes.len() && pred(bytes[idx]) {
        idx += 1;
    }
    idx
}

fn scan_quoted(body: &str, start: usize) -> Result<(String, usize), String> {
    let mut value = String::new();
    let mut chars = body[start + 1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((value, start + 1 + i + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, other)) => value.push(other),
                None => break,
            },
            other => value.push(other),
        }
    }
    Err("unterminated string".to_string())
}

/// Human readable `line:column` for a byte offset.
pub(super) fn position(source: &str, offset: usize) -> String {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
    format!("line {line}, column {column}")
}
