//! UI deep links built from path templates.

use std::collections::BTreeMap;

/// Key under which dispatch attaches deep links to results and list items.
pub const DEEP_LINK_KEY: &str = "_deepLink";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeepLinkError {
    #[error("unresolved deep link tokens: {}", .tokens.join(", "))]
    Unresolved { tokens: Vec<String> },
}

/// Expands `template` against `params` and appends it to `base_url`.
///
/// `{accountId}` takes `account_id`; every other `{key}` takes the
/// percent-encoded `params[key]`.
///
/// # Errors
///
/// Returns [`DeepLinkError::Unresolved`] listing every token with no value.
pub fn build_deep_link(
    base_url: &str,
    account_id: &str,
    template: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, DeepLinkError> {
    let mut path = template.replace("{accountId}", &urlencoding::encode(account_id));
    let mut unresolved = Vec::new();

    for token in template_tokens(template) {
        if token == "accountId" {
            continue;
        }
        match params.get(token) {
            Some(value) => {
                path = path.replace(&format!("{{{token}}}"), &urlencoding::encode(value));
            }
            None => {
                if !unresolved.iter().any(|t: &String| t == token) {
                    unresolved.push(token.to_string());
                }
            }
        }
    }

    if !unresolved.is_empty() {
        return Err(DeepLinkError::Unresolved { tokens: unresolved });
    }

    Ok(format!("{}{path}", base_url.trim_end_matches('/')))
}

/// The `{token}` names in `template`, in order of appearance.
#[must_use]
pub fn template_tokens(template: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let token = &after[..close];
        if !token.is_empty() {
            tokens.push(token);
        }
        rest = &after[close + 1..];
    }
    tokens
}
