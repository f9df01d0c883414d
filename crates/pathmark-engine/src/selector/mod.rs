//! Query languages used to find captured elements again.
//!
//! Only the subsets the locator generator emits (plus the obvious neighbours
//! a user might hand-edit into a record) are supported; anything else is a
//! [`SelectorError`], which callers treat as "not found".

pub mod css;
pub mod xpath;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Invalid CSS selector '{selector}': {reason}")]
    InvalidCss { selector: String, reason: String },

    #[error("Invalid XPath '{expression}': {reason}")]
    InvalidXPath { expression: String, reason: String },
}
