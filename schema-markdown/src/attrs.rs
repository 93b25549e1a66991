use crate::error::AttrsError;
use crate::types::Attr;

/// Parse the contents of a Schema Markdown attribute clause into an `Attr`.
///
/// The input is the text between the clause delimiters, e.g. the
/// `nullable, >= 0, < 10` of `int(nullable, >= 0, < 10)`. Accepted items:
///   - `nullable`
///   - `OP NUMBER` with OP one of `<`, `<=`, `>`, `>=`, `==` and NUMBER
///     matching `-?\d+(\.\d+)?`
///   - `len OP INTEGER`
///
/// Returns `Ok(None)` for an empty clause. A repeated bound overrides the
/// earlier one.
pub fn parse_attrs(input: &str) -> Result<Option<Attr>, AttrsError> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut pos = 0;
    let mut attr: Option<Attr> = None;

    skip_whitespace(&chars, &mut pos);
    if pos >= len {
        return Ok(None);
    }

    loop {
        let item = attr.get_or_insert_with(Attr::default);

        // Keyword items: `nullable` or `len OP INTEGER`.
        let word_start = pos;
        while pos < len && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
            pos += 1;
        }
        let word: String = chars[word_start..pos].iter().collect();
        match word.as_str() {
            "nullable" => item.nullable = true,
            "len" => {
                skip_whitespace(&chars, &mut pos);
                let op = scan_op(&chars, &mut pos)?;
                skip_whitespace(&chars, &mut pos);
                let value = scan_integer(&chars, &mut pos)?;
                match op {
                    Op::Lt => item.len_lt = Some(value),
                    Op::Lte => item.len_lte = Some(value),
                    Op::Gt => item.len_gt = Some(value),
                    Op::Gte => item.len_gte = Some(value),
                    Op::Eq => item.len_eq = Some(value),
                }
            }
            "" => {
                let op = scan_op(&chars, &mut pos)?;
                skip_whitespace(&chars, &mut pos);
                let value = scan_number(&chars, &mut pos)?;
                match op {
                    Op::Lt => item.lt = Some(value),
                    Op::Lte => item.lte = Some(value),
                    Op::Gt => item.gt = Some(value),
                    Op::Gte => item.gte = Some(value),
                    Op::Eq => item.eq = Some(value),
                }
            }
            other => {
                return Err(AttrsError {
                    message: format!("unknown attribute '{other}'"),
                    position: word_start,
                });
            }
        }

        // Separator or end of clause.
        skip_whitespace(&chars, &mut pos);
        if pos >= len {
            break;
        }
        if chars[pos] != ',' {
            return Err(AttrsError {
                message: format!("unexpected character '{}'", chars[pos]),
                position: pos,
            });
        }
        pos += 1; // consume `,`
        skip_whitespace(&chars, &mut pos);
        if pos >= len {
            return Err(AttrsError {
                message: "missing attribute after ','".into(),
                position: pos,
            });
        }
    }

    Ok(attr)
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

fn skip_whitespace(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

fn scan_op(chars: &[char], pos: &mut usize) -> Result<Op, AttrsError> {
    let next = chars.get(*pos + 1).copied();
    let (op, width) = match (chars.get(*pos).copied(), next) {
        (Some('<'), Some('=')) => (Op::Lte, 2),
        (Some('<'), _) => (Op::Lt, 1),
        (Some('>'), Some('=')) => (Op::Gte, 2),
        (Some('>'), _) => (Op::Gt, 1),
        (Some('='), Some('=')) => (Op::Eq, 2),
        _ => {
            return Err(AttrsError {
                message: "expected comparison operator".into(),
                position: *pos,
            });
        }
    };
    *pos += width;
    Ok(op)
}

fn scan_digits(chars: &[char], pos: &mut usize) -> usize {
    let start = *pos;
    while *pos < chars.len() && chars[*pos].is_ascii_digit() {
        *pos += 1;
    }
    *pos - start
}

fn scan_integer(chars: &[char], pos: &mut usize) -> Result<u64, AttrsError> {
    let start = *pos;
    if scan_digits(chars, pos) == 0 {
        return Err(AttrsError {
            message: "expected integer".into(),
            position: start,
        });
    }
    let text: String = chars[start..*pos].iter().collect();
    text.parse().map_err(|_| AttrsError {
        message: format!("integer out of range '{text}'"),
        position: start,
    })
}

fn scan_number(chars: &[char], pos: &mut usize) -> Result<f64, AttrsError> {
    let start = *pos;
    if chars.get(*pos) == Some(&'-') {
        *pos += 1;
    }
    if scan_digits(chars, pos) == 0 {
        return Err(AttrsError {
            message: "expected number".into(),
            position: start,
        });
    }
    if chars.get(*pos) == Some(&'.') {
        let dot = *pos;
        *pos += 1;
        if scan_digits(chars, pos) == 0 {
            return Err(AttrsError {
                message: "expected fraction digits".into(),
                position: dot,
            });
        }
    }
    let text: String = chars[start..*pos].iter().collect();
    text.parse().map_err(|_| AttrsError {
        message: format!("invalid number '{text}'"),
        position: start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_empty_attrs() {
        assert_eq!(parse_attrs("").unwrap(), None);
        assert_eq!(parse_attrs("   ").unwrap(), None);
    }

    #[test]
    fn parse_nullable() {
        let attr = parse_attrs("nullable").unwrap().unwrap();
        assert!(attr.nullable);
        assert!(attr.bounds().is_empty());
    }

    #[test]
    fn parse_numeric_bounds() {
        let attr = parse_attrs(">= 1, < 10.5").unwrap().unwrap();
        assert_eq!(attr.gte, Some(1.0));
        assert_eq!(attr.lt, Some(10.5));
        assert_eq!(attr.gt, None);
    }

    #[test]
    fn parse_negative_and_eq() {
        let attr = parse_attrs("== -7").unwrap().unwrap();
        assert_eq!(attr.eq, Some(-7.0));
    }

    #[test]
    fn parse_length_bounds() {
        let attr = parse_attrs("len > 0,len<=  32").unwrap().unwrap();
        assert_eq!(attr.len_gt, Some(0));
        assert_eq!(attr.len_lte, Some(32));
    }

    #[test]
    fn parse_mixed() {
        let attr = parse_attrs(" nullable , len == 2 ").unwrap().unwrap();
        assert!(attr.nullable);
        assert_eq!(attr.len_eq, Some(2));
    }

    #[test]
    fn operator_without_space() {
        let attr = parse_attrs(">=0").unwrap().unwrap();
        assert_eq!(attr.gte, Some(0.0));
    }

    #[test]
    fn reject_unknown_keyword() {
        let err = parse_attrs("required").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("required"));
    }

    #[test]
    fn reject_trailing_comma() {
        assert!(parse_attrs("nullable,").is_err());
    }

    #[test]
    fn reject_negative_length() {
        assert!(parse_attrs("len > -1").is_err());
    }

    #[test]
    fn reject_bare_fraction_dot() {
        assert!(parse_attrs("< 1.").is_err());
    }

    #[test]
    fn reject_missing_separator() {
        assert!(parse_attrs("nullable > 1").is_err());
    }
}
