//! The `parser` module contains the rule-based parser the [`crate::validator`] uses to pull a
//! house number, street, locality and postcode out of unstructured address text, using `nom`
//! combinators over the UK-style components this domain matches against.
use nom::character::complete::{alpha1, digit1, space0};
use nom::combinator::opt;
use nom::sequence::pair;
use nom::IResult;
use regex::Regex;
use std::sync::LazyLock;

static POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z]{1,2}\d[A-Z\d]?\s*\d[A-Z]{2}$").expect("valid postcode regex")
});

/// A freshly parsed address, as returned by [`Parser::parse`]. Distinct from
/// [`crate::components::Components`], which models the richer, already-parsed component set the
/// corpus and source documents carry; `ParsedAddress` is only what the rule-based parser itself
/// can recover from a single unstructured string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAddress {
    /// Leading numeric (optionally suffixed) token, e.g. "14" or "12A".
    pub house_number: Option<String>,
    /// The text between the house number and the trailing locality/postcode.
    pub street: Option<String>,
    /// The token(s) between the street and the postcode, when present.
    pub locality: Option<String>,
    /// A trailing UK-shaped postcode, when present.
    pub postcode: Option<String>,
    /// The original input, unmodified.
    pub raw: String,
}

/// Stateless rule-based address parser.
#[derive(Debug, Copy, Clone)]
pub struct Parser;

impl Parser {
    /// Parses `input` into a [`ParsedAddress`]. Never fails: any component that cannot be
    /// recovered is left `None`, since an unparseable source address is an input defect to be
    /// downgraded downstream, not a fatal error here.
    pub fn parse(input: &str) -> ParsedAddress {
        let raw = input.to_string();
        let trimmed = input.trim();

        let (house_number, remainder) = match Self::house_number(trimmed) {
            Ok((rem, Some(number))) => (Some(number), rem),
            _ => (None, trimmed),
        };

        let mut parts: Vec<&str> = remainder
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let postcode = parts
            .last()
            .filter(|candidate| POSTCODE.is_match(candidate))
            .map(|s| s.to_uppercase());
        if postcode.is_some() {
            parts.pop();
        }

        let street = parts.first().map(|s| s.trim().to_string());
        let locality = if parts.len() > 1 {
            Some(parts[1..].join(", "))
        } else {
            None
        };

        ParsedAddress {
            house_number,
            street,
            locality,
            postcode,
            raw,
        }
    }

    /// Consumes a leading digit run with an optional trailing alpha suffix (e.g. "12A"),
    /// stripping leading whitespace first. Returns `None` for the house number, without erroring,
    /// when the input does not start with a digit.
    fn house_number(input: &str) -> IResult<&str, Option<String>> {
        let (rem, _) = space0(input)?;
        match pair(digit1, opt(alpha1::<&str, nom::error::Error<&str>>))(rem) {
            Ok((rem, (digits, suffix))) => {
                let (rem, _) = space0(rem)?;
                let number = match suffix {
                    Some(s) if s.len() <= 2 => format!("{digits}{s}"),
                    _ => digits.to_string(),
                };
                Ok((rem, Some(number)))
            }
            Err(_) => Ok((input, None)),
        }
    }
}
