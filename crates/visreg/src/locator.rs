//! Element locators compiled to DOM query expressions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quote a string as a JavaScript string literal
pub(crate) fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    /// `id` attribute
    Id(String),
    /// `name` attribute
    Name(String),
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
    /// Anchor whose visible text equals the value
    LinkText(String),
}

impl Locator {
    /// Locate by `id`
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Locate by `name`
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Locate by XPath
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Locate a link by its text
    #[must_use]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self::LinkText(text.into())
    }

    /// JavaScript expression yielding the first matching element or `null`
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Id(id) => format!("document.getElementById({})", js_str(id)),
            Self::Name(name) => format!("(document.getElementsByName({})[0] || null)", js_str(name)),
            Self::Css(s) => format!("document.querySelector({})", js_str(s)),
            Self::XPath(expr) => xpath_query(expr),
            Self::LinkText(text) => xpath_query(&link_xpath(text)),
        }
    }

    /// JavaScript expression yielding the number of matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        match self {
            Self::Id(id) => format!("(document.getElementById({}) ? 1 : 0)", js_str(id)),
            Self::Name(name) => format!("document.getElementsByName({}).length", js_str(name)),
            Self::Css(s) => format!("document.querySelectorAll({}).length", js_str(s)),
            Self::XPath(expr) => xpath_count(expr),
            Self::LinkText(text) => xpath_count(&link_xpath(text)),
        }
    }
}

fn link_xpath(text: &str) -> String {
    format!("//a[normalize-space(.)={}]", xpath_literal(text))
}

/// XPath 1.0 string literal; text holding both quote kinds goes through `concat()`
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let parts: Vec<String> = text.split('\'').map(|part| format!("'{part}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

fn xpath_query(expr: &str) -> String {
    format!(
        "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
        js_str(expr)
    )
}

fn xpath_count(expr: &str) -> String {
    format!(
        "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength",
        js_str(expr)
    )
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(v) => write!(f, "id={v}"),
            Self::Name(v) => write!(f, "name={v}"),
            Self::Css(v) => write!(f, "css={v}"),
            Self::XPath(v) => write!(f, "xpath={v}"),
            Self::LinkText(v) => write!(f, "link={v}"),
        }
    }
}
