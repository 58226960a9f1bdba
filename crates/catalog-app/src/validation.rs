// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    Blank,
    InvalidMoney,
    InvalidInt,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => f.write_str("value is required"),
            Self::InvalidMoney => f.write_str("invalid money value"),
            Self::InvalidInt => f.write_str("invalid integer value"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

pub fn parse_required_text(input: &str) -> ValidationResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank);
    }
    Ok(trimmed.to_owned())
}

/// Parses a decimal amount into cents. Accepts an optional sign, `$` and
/// thousands separators; at most two fractional digits.
pub fn parse_required_cents(input: &str) -> ValidationResult<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank);
    }
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let cents = parse_cents(unsigned)?;
    if negative { Ok(-cents) } else { Ok(cents) }
}

pub fn parse_required_int(input: &str) -> ValidationResult<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank);
    }
    trimmed
        .replace(',', "")
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidInt)
}

pub fn format_cents(cents: i64) -> String {
    let (sign, cents) = normalize_sign(cents);
    let dollars = cents / 100;
    let remainder = cents % 100;
    format!("{sign}${}.{:02}", comma_format(dollars), remainder)
}

/// Renders cents back into the plain decimal form the price field accepts.
pub fn format_cents_input(cents: i64) -> String {
    let (sign, cents) = normalize_sign(cents);
    let dollars = cents / 100;
    let remainder = cents % 100;
    if remainder == 0 {
        return format!("{sign}{dollars}");
    }
    format!("{sign}{dollars}.{remainder:02}")
}

fn parse_cents(input: &str) -> ValidationResult<i64> {
    let clean = input.replace(',', "");
    let clean = clean.strip_prefix('$').unwrap_or(&clean);
    if clean.is_empty() {
        return Err(ValidationError::InvalidMoney);
    }

    let parts = clean.split('.').collect::<Vec<_>>();
    if parts.len() > 2 {
        return Err(ValidationError::InvalidMoney);
    }

    let whole = parse_digits(parts[0], parts.len() == 2)?;
    if whole > i64::MAX / 100 {
        return Err(ValidationError::InvalidMoney);
    }

    let mut frac = 0i64;
    if parts.len() == 2 {
        if parts[1].len() > 2 {
            return Err(ValidationError::InvalidMoney);
        }
        frac = parse_digits(parts[1], false)?;
        if parts[1].len() == 1 {
            frac = frac.checked_mul(10).ok_or(ValidationError::InvalidMoney)?;
        }
    }

    whole
        .checked_mul(100)
        .and_then(|value| value.checked_add(frac))
        .ok_or(ValidationError::InvalidMoney)
}

fn parse_digits(input: &str, allow_empty: bool) -> ValidationResult<i64> {
    if input.is_empty() {
        if allow_empty {
            return Ok(0);
        }
        return Err(ValidationError::InvalidMoney);
    }
    if !input.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::InvalidMoney);
    }
    input
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidMoney)
}

fn comma_format(value: i64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let mut chars = digits.chars().collect::<Vec<_>>();
    let mut count = 0usize;
    while let Some(ch) = chars.pop() {
        if count == 3 {
            out.push(',');
            count = 0;
        }
        out.push(ch);
        count += 1;
    }
    out.chars().rev().collect()
}

fn normalize_sign(cents: i64) -> (&'static str, i64) {
    if cents >= 0 {
        return ("", cents);
    }
    if cents == i64::MIN {
        ("-", i64::MAX)
    } else {
        ("-", -cents)
    }
}
