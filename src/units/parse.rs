//! Unit string parser: products, quotients, parentheses and integer powers of named units.

use super::{Dimension, Unit};
use crate::error::ApiError;

const L: Dimension = Dimension::of([1, 0, 0, 0, 0, 0]);
const M: Dimension = Dimension::of([0, 1, 0, 0, 0, 0]);
const T: Dimension = Dimension::of([0, 0, 1, 0, 0, 0]);
const THETA: Dimension = Dimension::of([0, 0, 0, 1, 0, 0]);
const I: Dimension = Dimension::of([0, 0, 0, 0, 1, 0]);
const N: Dimension = Dimension::of([0, 0, 0, 0, 0, 1]);
const AREA: Dimension = Dimension::of([2, 0, 0, 0, 0, 0]);
const VOLUME: Dimension = Dimension::of([3, 0, 0, 0, 0, 0]);
const FORCE: Dimension = Dimension::of([1, 1, -2, 0, 0, 0]);
const PRESSURE: Dimension = Dimension::of([-1, 1, -2, 0, 0, 0]);
const ENERGY: Dimension = Dimension::of([2, 1, -2, 0, 0, 0]);
const POWER: Dimension = Dimension::of([2, 1, -3, 0, 0, 0]);
const FREQUENCY: Dimension = Dimension::of([0, 0, -1, 0, 0, 0]);

/// (name, unit, accepts SI prefixes)
const NAMED_UNITS: &[(&str, Unit, bool)] = &[
    ("m", Unit::new(1.0, L), true),
    ("in", Unit::new(0.0254, L), false),
    ("inch", Unit::new(0.0254, L), false),
    ("ft", Unit::new(0.3048, L), false),
    ("yd", Unit::new(0.9144, L), false),
    ("mi", Unit::new(1609.344, L), false),
    ("g", Unit::new(1e-3, M), true),
    ("lb", Unit::new(0.45359237, M), false),
    ("lbm", Unit::new(0.45359237, M), false),
    ("s", Unit::new(1.0, T), true),
    ("min", Unit::new(60.0, T), false),
    ("h", Unit::new(3600.0, T), false),
    ("hr", Unit::new(3600.0, T), false),
    ("d", Unit::new(86400.0, T), false),
    ("day", Unit::new(86400.0, T), false),
    ("yr", Unit::new(31_557_600.0, T), false),
    ("K", Unit::new(1.0, THETA), false),
    ("deg_C", Unit::affine(1.0, 273.15, THETA), false),
    ("degC", Unit::affine(1.0, 273.15, THETA), false),
    ("Celsius", Unit::affine(1.0, 273.15, THETA), false),
    ("deg_F", Unit::affine(5.0 / 9.0, 459.67 * 5.0 / 9.0, THETA), false),
    ("degF", Unit::affine(5.0 / 9.0, 459.67 * 5.0 / 9.0, THETA), false),
    ("Fahrenheit", Unit::affine(5.0 / 9.0, 459.67 * 5.0 / 9.0, THETA), false),
    ("deg_R", Unit::new(5.0 / 9.0, THETA), false),
    ("degR", Unit::new(5.0 / 9.0, THETA), false),
    ("Rankine", Unit::new(5.0 / 9.0, THETA), false),
    ("A", Unit::new(1.0, I), true),
    ("mol", Unit::new(1.0, N), true),
    ("N", Unit::new(1.0, FORCE), true),
    ("dyn", Unit::new(1e-5, FORCE), false),
    ("lbf", Unit::new(4.4482216152605, FORCE), false),
    ("Pa", Unit::new(1.0, PRESSURE), true),
    ("bar", Unit::new(1e5, PRESSURE), true),
    ("atm", Unit::new(101_325.0, PRESSURE), false),
    ("psi", Unit::new(6894.757293168361, PRESSURE), false),
    ("J", Unit::new(1.0, ENERGY), true),
    ("erg", Unit::new(1e-7, ENERGY), false),
    ("eV", Unit::new(1.602176634e-19, ENERGY), true),
    ("cal", Unit::new(4.184, ENERGY), true),
    ("BTU", Unit::new(1055.05585262, ENERGY), false),
    ("Btu", Unit::new(1055.05585262, ENERGY), false),
    ("W", Unit::new(1.0, POWER), true),
    ("Hz", Unit::new(1.0, FREQUENCY), true),
    ("L", Unit::new(1e-3, VOLUME), true),
    ("l", Unit::new(1e-3, VOLUME), true),
    ("barn", Unit::new(1e-28, AREA), false),
    ("b", Unit::new(1e-28, AREA), false),
];

const PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("Y", 1e24),
    ("Z", 1e21),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
    ("a", 1e-18),
];

fn lookup(name: &str) -> Option<Unit> {
    if let Some((_, unit, _)) = NAMED_UNITS.iter().find(|(n, _, _)| *n == name) {
        return Some(*unit);
    }
    for (prefix, factor) in PREFIXES {
        if let Some(base) = name.strip_prefix(prefix) {
            if let Some((_, unit, true)) = NAMED_UNITS.iter().find(|(n, _, _)| *n == base) {
                return Some(Unit::new(unit.scale * factor, unit.dimension));
            }
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i32),
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' | '.' | '·' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '-' | '+' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i32>()
                    .map_err(|_| format!("invalid exponent '{}'", text))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn product(&mut self) -> Result<Unit, String> {
        let mut unit = self.power()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    unit = unit.mul(&self.power()?);
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    unit = unit.mul(&self.power()?.powi(-1));
                }
                Some(Token::Ident(_)) | Some(Token::LParen) => {
                    unit = unit.mul(&self.power()?);
                }
                _ => return Ok(unit),
            }
        }
    }

    fn power(&mut self) -> Result<Unit, String> {
        let base = self.primary()?;
        match self.peek() {
            Some(Token::Pow) => {
                self.pos += 1;
                let exponent = self.exponent()?;
                Ok(base.powi(exponent))
            }
            Some(Token::Int(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(base.powi(n))
            }
            _ => Ok(base),
        }
    }

    fn exponent(&mut self) -> Result<i32, String> {
        match self.next() {
            Some(Token::Int(n)) => Ok(n),
            Some(Token::LParen) => {
                let n = match self.next() {
                    Some(Token::Int(n)) => n,
                    other => return Err(format!("expected integer exponent, found {:?}", other)),
                };
                match self.next() {
                    Some(Token::RParen) => Ok(n),
                    other => Err(format!("expected ')', found {:?}", other)),
                }
            }
            other => Err(format!("expected integer exponent, found {:?}", other)),
        }
    }

    fn primary(&mut self) -> Result<Unit, String> {
        match self.next() {
            Some(Token::Ident(name)) => {
                lookup(&name).ok_or_else(|| format!("unknown unit '{}'", name))
            }
            Some(Token::Int(1)) => Ok(Unit::dimensionless()),
            Some(Token::LParen) => {
                let inner = self.product()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    other => Err(format!("expected ')', found {:?}", other)),
                }
            }
            other => Err(format!("unexpected token {:?}", other)),
        }
    }
}

/// Parse a unit expression such as `MPa`, `J/kg`, `BTU/(kg*K)` or `kg m**-3`
pub fn parse_unit(input: &str) -> Result<Unit, ApiError> {
    let err = |message: String| ApiError::UnitError {
        unit: input.to_string(),
        message,
    };
    let tokens = tokenize(input).map_err(err)?;
    if tokens.is_empty() {
        return Ok(Unit::dimensionless());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let unit = parser.product().map_err(err)?;
    if parser.pos < parser.tokens.len() {
        return Err(err(format!(
            "unexpected trailing input {:?}",
            &parser.tokens[parser.pos..]
        )));
    }
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_units() {
        let km = parse_unit("km").unwrap();
        assert_eq!(km.scale, 1e3);
        assert_eq!(km.dimension, L);

        let kg = parse_unit("kg").unwrap();
        assert_eq!(kg.scale, 1.0);
        assert_eq!(kg.dimension, M);

        let min = parse_unit("min").unwrap();
        assert_eq!(min.scale, 60.0);
    }

    #[test]
    fn test_compound_units() {
        let density = parse_unit("kg/m^3").unwrap();
        assert_eq!(density.dimension, Dimension::of([-3, 1, 0, 0, 0, 0]));

        let flux = parse_unit("W m**-2").unwrap();
        assert_eq!(flux.dimension, Dimension::of([0, 1, -3, 0, 0, 0]));

        let cp = parse_unit("J / (kg * K)").unwrap();
        assert_eq!(cp.dimension, Dimension::of([2, 0, -2, -1, 0, 0]));

        let rate = parse_unit("1/s").unwrap();
        assert_eq!(rate.dimension, FREQUENCY);

        let area = parse_unit("cm2").unwrap();
        assert!((area.scale - 1e-4).abs() < 1e-18);
    }

    #[test]
    fn test_offset_dropped_in_compound() {
        let bare = parse_unit("degC").unwrap();
        assert_eq!(bare.offset, 273.15);
        let rate = parse_unit("degC/s").unwrap();
        assert_eq!(rate.offset, 0.0);
    }

    #[test]
    fn test_unknown_unit() {
        let err = parse_unit("furlong").unwrap_err();
        assert!(matches!(err, ApiError::UnitError { .. }));
        assert!(parse_unit("m^").is_err());
        assert!(parse_unit("(m").is_err());
    }
}
