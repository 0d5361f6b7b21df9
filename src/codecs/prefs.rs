//! Non-default-preferences header field: a hand-rolled little grammar of
//! `<type-letter> <id> <value>` tokens, string values bracketed by a
//! delimiter character chosen to not occur in the value.
//!
//! `spec.md` §4.2: "a text payload of the form `B <id> <0|1> b <id> <0|1>
//! I <id> <value> i <id> <value> S <id> <delim><value><delim> s <id>
//! <delim><value><delim>`". Upper-case letters are database-scope
//! preferences, lower-case are some other scope; "emit only database-scope
//! preferences; on read accept any scope."

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefScope {
    Database,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    pub id: u32,
    pub scope: PrefScope,
    pub value: PrefValue,
}

impl Preference {
    pub fn database(id: u32, value: PrefValue) -> Self {
        Preference {
            id,
            scope: PrefScope::Database,
            value,
        }
    }
}

/// Decodes the whole non-default-preferences payload.
pub fn decode(bytes: &[u8]) -> Result<Vec<Preference>> {
    let text = String::from_utf8_lossy(bytes);
    let mut chars = text.chars().peekable();
    let mut out = Vec::new();

    loop {
        skip_spaces(&mut chars);
        let Some(&letter) = chars.peek() else {
            break;
        };

        let (kind, scope) = match letter {
            'B' => ('B', PrefScope::Database),
            'b' => ('B', PrefScope::Other),
            'I' => ('I', PrefScope::Database),
            'i' => ('I', PrefScope::Other),
            'S' => ('S', PrefScope::Database),
            's' => ('S', PrefScope::Other),
            other => {
                return Err(Error::MalformedContainer(format!(
                    "unexpected preference type letter '{other}'"
                )))
            }
        };
        chars.next();

        skip_spaces(&mut chars);
        let id = read_uint(&mut chars)?;

        skip_spaces(&mut chars);
        let value = match kind {
            'B' => {
                let digit = chars
                    .next()
                    .ok_or_else(|| Error::MalformedContainer("truncated boolean preference".into()))?;
                match digit {
                    '0' => PrefValue::Bool(false),
                    '1' => PrefValue::Bool(true),
                    other => {
                        return Err(Error::MalformedContainer(format!(
                            "boolean preference must be 0 or 1, got '{other}'"
                        )))
                    }
                }
            }
            'I' => {
                let n = read_int(&mut chars)?;
                PrefValue::Int(n)
            }
            'S' => {
                let delim = chars
                    .next()
                    .ok_or_else(|| Error::MalformedContainer("truncated string preference".into()))?;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == delim => break,
                        Some(c) => s.push(c),
                        None => return Err(Error::MalformedContainer("unterminated string preference".into())),
                    }
                }
                PrefValue::Str(s)
            }
            _ => unreachable!(),
        };

        out.push(Preference { id, scope, value });
    }

    Ok(out)
}

/// Encodes only database-scope preferences (`spec.md`: "Codec policy: emit
/// only database-scope preferences").
pub fn encode(prefs: &[Preference]) -> Vec<u8> {
    let mut out = String::new();
    for pref in prefs {
        if pref.scope != PrefScope::Database {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        match &pref.value {
            PrefValue::Bool(b) => {
                out.push('B');
                out.push(' ');
                out.push_str(&pref.id.to_string());
                out.push(' ');
                out.push(if *b { '1' } else { '0' });
            }
            PrefValue::Int(n) => {
                out.push('I');
                out.push(' ');
                out.push_str(&pref.id.to_string());
                out.push(' ');
                out.push_str(&n.to_string());
            }
            PrefValue::Str(s) => {
                out.push('S');
                out.push(' ');
                out.push_str(&pref.id.to_string());
                out.push(' ');
                let delim = pick_delimiter(s);
                out.push(delim);
                out.push_str(s);
                out.push(delim);
            }
        }
    }
    out.into_bytes()
}

fn pick_delimiter(value: &str) -> char {
    for candidate in ['"', '\'', '|', '~', '`', '^'] {
        if !value.contains(candidate) {
            return candidate;
        }
    }
    // Exhaustive fallback: scan printable ASCII for something absent.
    (0x21u8..0x7f)
        .map(char::from)
        .find(|c| !value.contains(*c))
        .unwrap_or('"')
}

fn skip_spaces(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
        chars.next();
    }
}

fn read_uint(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<u32> {
    let mut digits = String::new();
    while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
        digits.push(chars.next().unwrap());
    }
    digits
        .parse()
        .map_err(|_| Error::MalformedContainer("expected a preference id".into()))
}

fn read_int(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<i64> {
    let mut digits = String::new();
    if matches!(chars.peek(), Some('-')) {
        digits.push(chars.next().unwrap());
    }
    while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
        digits.push(chars.next().unwrap());
    }
    digits
        .parse()
        .map_err(|_| Error::MalformedContainer("expected an integer preference value".into()))
}
