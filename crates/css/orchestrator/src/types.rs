//! Stylesheet inputs as seen by the orchestrator.

use css_syntax::parse_stylesheet;
use std::sync::Arc;
use url::Url;

/// Cascade origin of a stylesheet.
/// Spec: <https://www.w3.org/TR/css-cascade-4/#cascading-origins>
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    UserAgent,
    User,
    Author,
}

#[derive(Clone, Debug)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub origin: Origin,
    pub prelude: String,
    pub declarations: Vec<Declaration>,
}

/// A parsed stylesheet and the URL its relative references resolve against.
#[derive(Clone, Debug)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
    pub origin: Origin,
    pub url: Arc<Url>,
}

impl Stylesheet {
    /// Parse `css` fetched from `url`. Rules keep their order in the sheet.
    pub fn parse(css: &str, url: &Arc<Url>, origin: Origin) -> Self {
        let rules = parse_stylesheet(css)
            .rules
            .into_iter()
            .map(|rule| Rule {
                origin,
                prelude: rule.prelude,
                declarations: rule
                    .declarations
                    .into_iter()
                    .map(|decl| Declaration {
                        name: decl.name,
                        value: decl.value,
                        important: decl.important,
                    })
                    .collect(),
            })
            .collect();
        Self {
            rules,
            origin,
            url: Arc::clone(url),
        }
    }
}
