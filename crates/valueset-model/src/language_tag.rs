//! BCP-47 language tag parser using nom.
//!
//! Covers the `langtag` production of RFC 5646: language, extended language,
//! script, region, variants, extensions and a private-use tail. Grandfathered
//! and private-use-only tags are rejected.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while_m_n},
    character::complete::{char, satisfy},
    combinator::{all_consuming, eof, opt, peek, recognize},
    multi::{many0, many1, many_m_n},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::{ModelError, ModelResult};

/// A parsed BCP-47 language tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LanguageTag {
    /// Primary language subtag.
    pub language: String,
    /// Extended language subtags.
    pub extlang: Vec<String>,
    /// Script subtag.
    pub script: Option<String>,
    /// Region subtag.
    pub region: Option<String>,
    /// Variant subtags.
    pub variants: Vec<String>,
    /// Extension sequences, singleton included (e.g. `u-co-phonebk`).
    pub extensions: Vec<String>,
    /// Private-use subtags following `x`.
    pub private_use: Vec<String>,
}

impl LanguageTag {
    /// Reports whether the named subtag kind is present.
    ///
    /// Property names follow the BCP-47 code system definition: `ext-lang`,
    /// `script`, `region`, `variant`, `extension`, `private-use`. Returns
    /// `None` for any other name.
    pub fn has_property(&self, property: &str) -> Option<bool> {
        match property {
            "ext-lang" => Some(!self.extlang.is_empty()),
            "script" => Some(self.script.is_some()),
            "region" => Some(self.region.is_some()),
            "variant" => Some(!self.variants.is_empty()),
            "extension" => Some(!self.extensions.is_empty()),
            "private-use" => Some(!self.private_use.is_empty()),
            _ => None,
        }
    }
}

/// Parses a BCP-47 language tag.
///
/// # Examples
///
/// ```rust
/// use valueset_model::parse_language_tag;
///
/// let tag = parse_language_tag("zh-Hant-TW").unwrap();
/// assert_eq!(tag.language, "zh");
/// assert_eq!(tag.script.as_deref(), Some("Hant"));
/// assert_eq!(tag.region.as_deref(), Some("TW"));
/// ```
pub fn parse_language_tag(input: &str) -> ModelResult<LanguageTag> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ModelError::EmptyLanguageTag);
    }

    match all_consuming(langtag)(input) {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ModelError::InvalidLanguageTag {
            tag: input.to_string(),
            position: input.len() - e.input.len(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ModelError::InvalidLanguageTag {
            tag: input.to_string(),
            position: input.len(),
        }),
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_alphanum(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

fn is_singleton(c: char) -> bool {
    c.is_ascii_alphanumeric() && c != 'x' && c != 'X'
}

/// Subtag boundary: end of input or the next `-`.
fn boundary(input: &str) -> IResult<&str, &str> {
    peek(alt((eof, tag("-"))))(input)
}

fn subtag<'a>(
    min: usize,
    max: usize,
    pred: fn(char) -> bool,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(take_while_m_n(min, max, pred), boundary)
}

fn langtag(input: &str) -> IResult<&str, LanguageTag> {
    let (input, language) = subtag(2, 8, is_alpha)(input)?;

    let (input, extlang) = if language.len() <= 3 {
        many_m_n(0, 3, preceded(char('-'), subtag(3, 3, is_alpha)))(input)?
    } else {
        (input, Vec::new())
    };

    let (input, script) = opt(preceded(char('-'), subtag(4, 4, is_alpha)))(input)?;
    let (input, region) = opt(preceded(char('-'), region))(input)?;
    let (input, variants) = many0(preceded(char('-'), variant))(input)?;
    let (input, extensions) = many0(preceded(char('-'), extension))(input)?;
    let (input, private_use) = opt(preceded(char('-'), private_use))(input)?;

    Ok((
        input,
        LanguageTag {
            language: language.to_string(),
            extlang: extlang.into_iter().map(str::to_string).collect(),
            script: script.map(str::to_string),
            region: region.map(str::to_string),
            variants: variants.into_iter().map(str::to_string).collect(),
            extensions: extensions.into_iter().map(str::to_string).collect(),
            private_use: private_use.unwrap_or_default(),
        },
    ))
}

fn region(input: &str) -> IResult<&str, &str> {
    alt((subtag(2, 2, is_alpha), subtag(3, 3, is_digit)))(input)
}

fn variant(input: &str) -> IResult<&str, &str> {
    alt((
        subtag(5, 8, is_alphanum),
        terminated(
            recognize(pair(satisfy(is_digit), take_while_m_n(3, 3, is_alphanum))),
            boundary,
        ),
    ))(input)
}

fn extension(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        terminated(satisfy(is_singleton), boundary),
        many1(preceded(char('-'), subtag(2, 8, is_alphanum))),
    )))(input)
}

fn private_use(input: &str) -> IResult<&str, Vec<String>> {
    let (input, parts) = preceded(
        terminated(tag_no_case("x"), boundary),
        many1(preceded(char('-'), subtag(1, 8, is_alphanum))),
    )(input)?;
    Ok((input, parts.into_iter().map(str::to_string).collect()))
}
