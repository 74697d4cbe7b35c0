// ==========================================
// FinView 导入引擎 - 表达式词法分析
// ==========================================

use crate::importer::expression::error::{EvalError, EvalResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Double(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    // 运算符
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Question,
    Colon,
    // 分隔符
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

/// 带位置（字符偏移）的 token
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub fn tokenize(source: &str) -> EvalResult<Vec<Spanned>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let (token, next) = lex_number(&chars, i)?;
            match token {
                Token::Int(_) | Token::Double(_) => tokens.push(Spanned {
                    token,
                    position: start,
                }),
                // 仅 i64::MIN 的绝对值会走到这里: 必须紧跟在一元负号之后
                _ if unary_minus_before(&tokens) => {
                    if let Some(minus) = tokens.last_mut() {
                        minus.token = Token::Int(i64::MIN);
                    }
                }
                _ => {
                    let text: String = chars[start..next].iter().collect();
                    return Err(EvalError::syntax(
                        start,
                        format!("整数超出范围 '{}'", text),
                    ));
                }
            }
            i = next;
            continue;
        }

        if c == '\'' || c == '"' {
            let (text, next) = lex_string(&chars, i)?;
            tokens.push(Spanned {
                token: Token::Str(text),
                position: start,
            });
            i = next;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut end = i;
            while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            let word: String = chars[i..end].iter().collect();
            let token = match word.as_str() {
                "true" => Token::True,
                "false" => Token::False,
                "null" => Token::Null,
                _ => Token::Ident(word),
            };
            tokens.push(Spanned {
                token,
                position: start,
            });
            i = end;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('&', Some('&')) => (Token::AndAnd, 2),
            ('|', Some('|')) => (Token::OrOr, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('!', _) => (Token::Bang, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            _ => {
                return Err(EvalError::syntax(start, format!("非法字符 '{}'", c)));
            }
        };
        tokens.push(Spanned {
            token,
            position: start,
        });
        i += width;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        position: chars.len(),
    });
    Ok(tokens)
}

/// 末尾的 '-' 处于一元位置（前面不是操作数）
fn unary_minus_before(tokens: &[Spanned]) -> bool {
    match tokens {
        [.., before, last] if last.token == Token::Minus => !matches!(
            before.token,
            Token::Int(_)
                | Token::Double(_)
                | Token::Str(_)
                | Token::Ident(_)
                | Token::True
                | Token::False
                | Token::Null
                | Token::RParen
                | Token::RBracket
        ),
        [last] => last.token == Token::Minus,
        _ => false,
    }
}

/// 数字: 123 / 1.5 / 1e3 / 2.5E-2
///
/// 整数字面量 9223372036854775808 返回 `Token::Minus` 占位，
/// 由 tokenize 与前面的一元负号合并为 i64::MIN
fn lex_number(chars: &[char], start: usize) -> EvalResult<(Token, usize)> {
    let mut end = start;
    let mut is_double = false;

    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }

    // 小数部分: '.' 后必须紧跟数字，否则视为成员调用
    if end + 1 < chars.len() && chars[end] == '.' && chars[end + 1].is_ascii_digit() {
        is_double = true;
        end += 1;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
    }

    if end < chars.len() && (chars[end] == 'e' || chars[end] == 'E') {
        let mut exp_end = end + 1;
        if exp_end < chars.len() && (chars[exp_end] == '+' || chars[exp_end] == '-') {
            exp_end += 1;
        }
        if exp_end < chars.len() && chars[exp_end].is_ascii_digit() {
            while exp_end < chars.len() && chars[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            is_double = true;
            end = exp_end;
        }
    }

    let text: String = chars[start..end].iter().collect();
    let token = if is_double {
        text.parse::<f64>()
            .map(Token::Double)
            .map_err(|_| EvalError::syntax(start, format!("非法数字 '{}'", text)))?
    } else if text.parse::<u64>() == Ok(i64::MIN.unsigned_abs()) {
        Token::Minus
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| EvalError::syntax(start, format!("整数超出范围 '{}'", text)))?
    };
    Ok((token, end))
}

/// 字符串: 单引号或双引号，支持 \\ \' \" \n \t 转义
fn lex_string(chars: &[char], start: usize) -> EvalResult<(String, usize)> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| EvalError::syntax(i, "字符串以转义符结尾"))?;
                match escaped {
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    other => {
                        return Err(EvalError::syntax(i, format!("未知转义序列 '\\{}'", other)));
                    }
                }
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(EvalError::syntax(start, "字符串未闭合"))
}
