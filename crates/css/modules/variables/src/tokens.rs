//! Parsing of raw declaration values into substitution-ready components.
//! Spec: <https://www.w3.org/TR/css-variables-1/#using-variables>

use crate::errors::VarError;
use css_syntax::is_custom_property_name;
use cssparser::{
    BasicParseError, ParseError, ParseErrorKind, Parser, ParserInput, ToCss as _, Token,
    TokenSerializationType,
};
use std::sync::Arc;
use url::Url;

/// One piece of a parsed declaration value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Component {
    /// Source text copied to the output unchanged.
    Verbatim(Verbatim),
    /// A `var()` function.
    Reference(Reference),
    /// The raw, unresolved argument of a `url()` token.
    Url(String),
}

/// A run of source tokens, with the serialization types of its first and last
/// token so that substitution can keep neighbouring tokens apart.
/// Spec: <https://www.w3.org/TR/css-syntax-3/#serialization>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verbatim {
    css: String,
    first_token_type: TokenSerializationType,
    last_token_type: TokenSerializationType,
}

impl Verbatim {
    /// Tokenize `css` to find its first and last token types.
    pub fn new(css: &str) -> Self {
        let (first_token_type, last_token_type) = token_types(css);
        Self {
            css: css.to_owned(),
            first_token_type,
            last_token_type,
        }
    }

    #[inline]
    pub fn css(&self) -> &str {
        &self.css
    }

    #[inline]
    pub const fn first_token_type(&self) -> TokenSerializationType {
        self.first_token_type
    }

    #[inline]
    pub const fn last_token_type(&self) -> TokenSerializationType {
        self.last_token_type
    }
}

/// Serialization types of the first and last top-level tokens of `css`.
fn token_types(css: &str) -> (TokenSerializationType, TokenSerializationType) {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut first = TokenSerializationType::Nothing;
    let mut last = TokenSerializationType::Nothing;
    while let Ok(token) = parser.next_including_whitespace_and_comments() {
        let token_type = token.serialization_type();
        first.set_if_nothing(token_type);
        last = token_type;
    }
    (first, last)
}

/// A `var(--name[, fallback])` occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    /// Referenced name, including the leading `--`.
    name: String,
    /// Fallback components, if a comma followed the name. May be empty.
    fallback: Option<Vec<Component>>,
}

impl Reference {
    /// Referenced custom property name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fallback components, if the reference has a fallback.
    #[inline]
    pub fn fallback(&self) -> Option<&[Component]> {
        self.fallback.as_deref()
    }
}

/// A declaration value kept in component form together with the base URL of
/// the stylesheet that wrote it.
///
/// Values containing `var()` stay pending until cascade-resolution time; values
/// without references go through the same path so their `url()`s resolve too.
#[derive(Clone, Debug)]
pub struct PendingValue {
    css: String,
    base_url: Arc<Url>,
    components: Vec<Component>,
    has_references: bool,
}

impl PendingValue {
    /// Parse `css` as a `<declaration-value>`, capturing `base_url` as the
    /// URL that relative `url()`s in this value resolve against.
    ///
    /// # Errors
    /// - `InvalidSyntax` for bad strings/urls, unbalanced closing brackets, or a
    ///   top-level `;` or `!`.
    /// - `InvalidName` when a `var()` does not start with a custom property name.
    /// - `MalformedFallback` when a `var()` fallback is not a declaration value.
    pub fn parse(css: &str, base_url: &Arc<Url>) -> Result<Self, VarError> {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut components = Vec::new();
        parse_components(&mut parser, &mut components, false)?;
        let has_references = components.iter().any(component_has_references);
        Ok(Self {
            css: css.to_owned(),
            base_url: Arc::clone(base_url),
            components,
            has_references,
        })
    }

    /// The value as authored.
    #[inline]
    pub fn css(&self) -> &str {
        &self.css
    }

    /// URL of the stylesheet this value was written in.
    #[inline]
    pub fn base_url(&self) -> &Arc<Url> {
        &self.base_url
    }

    /// Parsed components in source order.
    #[inline]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Whether the value contains at least one `var()`, i.e. is a
    /// pending-substitution value.
    #[inline]
    pub fn has_references(&self) -> bool {
        self.has_references
    }

    /// Names referenced anywhere in the value, fallbacks included, in source order.
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_names(&self.components, &mut names);
        names
    }
}

/// CSS-wide keywords, valid as an entire value and as a `var()` fallback.
/// Spec: <https://www.w3.org/TR/css-cascade-5/#defaulting-keywords>
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CssWideKeyword {
    Initial,
    Inherit,
    Unset,
    Revert,
    RevertLayer,
}

impl CssWideKeyword {
    /// Match a whole value (surrounding whitespace ignored) against the keywords.
    pub fn from_value(value: &str) -> Option<Self> {
        let keyword = value.trim();
        [
            ("initial", Self::Initial),
            ("inherit", Self::Inherit),
            ("unset", Self::Unset),
            ("revert", Self::Revert),
            ("revert-layer", Self::RevertLayer),
        ]
        .into_iter()
        .find_map(|(text, parsed)| keyword.eq_ignore_ascii_case(text).then_some(parsed))
    }
}

fn component_has_references(component: &Component) -> bool {
    matches!(component, Component::Reference(_))
}

fn collect_names<'value>(components: &'value [Component], names: &mut Vec<&'value str>) {
    for component in components {
        if let Component::Reference(reference) = component {
            names.push(reference.name());
            if let Some(fallback) = reference.fallback() {
                collect_names(fallback, names);
            }
        }
    }
}

/// Append the text of tokens whose outer serialization types are `first`
/// and `last`, merging with a preceding verbatim run.
fn push_verbatim(
    out: &mut Vec<Component>,
    text: &str,
    first: TokenSerializationType,
    last: TokenSerializationType,
) {
    if text.is_empty() {
        return;
    }
    if let Some(Component::Verbatim(previous)) = out.last_mut() {
        previous.css.push_str(text);
        previous.first_token_type.set_if_nothing(first);
        previous.last_token_type = last;
        return;
    }
    out.push(Component::Verbatim(Verbatim {
        css: text.to_owned(),
        first_token_type: first,
        last_token_type: last,
    }));
}

/// Append a single token's text.
fn push_token(out: &mut Vec<Component>, text: &str, token: &Token<'_>) {
    let token_type = token.serialization_type();
    push_verbatim(out, text, token_type, token_type);
}

/// Append a closing bracket.
fn push_close(out: &mut Vec<Component>, close: &str) {
    push_verbatim(
        out,
        close,
        TokenSerializationType::Other,
        TokenSerializationType::Other,
    );
}

/// Map a nested-block parse error back to the error produced inside it.
fn unwrap_nested_error(error: ParseError<'_, VarError>) -> VarError {
    match error.kind {
        ParseErrorKind::Custom(inner) => inner,
        ParseErrorKind::Basic(_) => VarError::InvalidSyntax,
    }
}

/// Closing text for a token that opens a block.
const fn closing_for(token: &Token<'_>) -> &'static str {
    match token {
        Token::SquareBracketBlock => "]",
        Token::CurlyBracketBlock => "}",
        _ => ")",
    }
}

/// Parse tokens until the end of `input`.
///
/// `;` and `!` are only rejected at the top level of a value; inside blocks they
/// are ordinary tokens.
/// Spec: <https://www.w3.org/TR/css-syntax-3/#typedef-declaration-value>
fn parse_components(
    input: &mut Parser<'_, '_>,
    out: &mut Vec<Component>,
    nested: bool,
) -> Result<(), VarError> {
    loop {
        let token_start = input.position();
        let token = match input.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::BadUrl(_)
            | Token::BadString(_)
            | Token::CloseParenthesis
            | Token::CloseSquareBracket
            | Token::CloseCurlyBracket => return Err(VarError::InvalidSyntax),
            Token::Semicolon | Token::Delim('!') if !nested => {
                return Err(VarError::InvalidSyntax);
            }
            Token::UnquotedUrl(raw) => out.push(Component::Url(raw.as_ref().to_owned())),
            Token::Function(ref name) if name.eq_ignore_ascii_case("var") => {
                let reference = input
                    .parse_nested_block(|block| {
                        parse_var_arguments(block).map_err(|err| block.new_custom_error(err))
                    })
                    .map_err(unwrap_nested_error)?;
                out.push(Component::Reference(reference));
            }
            Token::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                let opening = input.slice_from(token_start).to_owned();
                parse_url_function(input, &opening, out)?;
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                push_token(out, input.slice_from(token_start), &token);
                input
                    .parse_nested_block(|block| {
                        parse_components(block, out, true)
                            .map_err(|err| block.new_custom_error(err))
                    })
                    .map_err(unwrap_nested_error)?;
                push_close(out, closing_for(&token));
            }
            _ => push_token(out, input.slice_from(token_start), &token),
        }
    }
}

/// Parse the body of a `url(` function token. A lone string argument becomes a
/// `Url` component; anything else is kept as an ordinary function body.
fn parse_url_function(
    input: &mut Parser<'_, '_>,
    opening: &str,
    out: &mut Vec<Component>,
) -> Result<(), VarError> {
    let mut body = Vec::new();
    let quoted = input
        .parse_nested_block(|block| {
            let url_arg = block.try_parse(|args| {
                let text = args.expect_string_cloned()?;
                args.expect_exhausted()?;
                Ok::<_, BasicParseError<'_>>(text.as_ref().to_owned())
            });
            if let Ok(text) = url_arg {
                return Ok(Some(text));
            }
            parse_components(block, &mut body, true)
                .map_err(|err| block.new_custom_error(err))?;
            Ok(None)
        })
        .map_err(unwrap_nested_error)?;
    if let Some(text) = quoted {
        out.push(Component::Url(text));
        return Ok(());
    }
    push_verbatim(
        out,
        opening,
        TokenSerializationType::Function,
        TokenSerializationType::Function,
    );
    for component in body {
        match component {
            Component::Verbatim(text) => {
                push_verbatim(out, &text.css, text.first_token_type, text.last_token_type);
            }
            other @ (Component::Reference(_) | Component::Url(_)) => out.push(other),
        }
    }
    push_close(out, ")");
    Ok(())
}

/// Parse `--name [, fallback]` inside `var(`.
/// Spec: <https://www.w3.org/TR/css-variables-1/#funcdef-var>
fn parse_var_arguments(input: &mut Parser<'_, '_>) -> Result<Reference, VarError> {
    let name = match input.next() {
        Ok(Token::Ident(ident)) => ident.as_ref().to_owned(),
        Ok(other) => {
            return Err(VarError::InvalidName {
                name: other.to_css_string(),
            });
        }
        Err(_) => {
            return Err(VarError::InvalidName {
                name: String::new(),
            });
        }
    };
    if !is_custom_property_name(&name) {
        return Err(VarError::InvalidName { name });
    }
    if input.is_exhausted() {
        return Ok(Reference {
            name,
            fallback: None,
        });
    }
    if input.expect_comma().is_err() {
        return Err(VarError::InvalidSyntax);
    }
    input.skip_whitespace();
    let mut fallback = Vec::new();
    if parse_components(input, &mut fallback, false).is_err() {
        return Err(VarError::MalformedFallback { name });
    }
    trim_trailing_whitespace(&mut fallback);
    Ok(Reference {
        name,
        fallback: Some(fallback),
    })
}

fn trim_trailing_whitespace(components: &mut Vec<Component>) {
    let Some(Component::Verbatim(text)) = components.last() else {
        return;
    };
    let trimmed = text.css.trim_end();
    if trimmed.len() == text.css.len() {
        return;
    }
    let replacement = (!trimmed.is_empty()).then(|| Verbatim::new(trimmed));
    components.pop();
    components.extend(replacement.map(Component::Verbatim));
}
