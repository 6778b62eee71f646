use serde_json::{Map, Value as JsonValue};

use crate::{
    options::ResolvedConfiguration, HttpCallError, RequestDescriptor, ResolvedBody,
    ResolvedRequest, Result,
};

pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Merges a descriptor with the instance configuration.
///
/// Pure: identical inputs always produce identical output.
pub(crate) fn compose(
    descriptor: &RequestDescriptor,
    config: &ResolvedConfiguration,
) -> Result<ResolvedRequest> {
    let base_data = config.base_data.as_ref();

    let url = match &config.base_url {
        Some(base) => format!("{base}{}", descriptor.url),
        None => descriptor.url.clone(),
    };
    let url = substitute_url_vars(&url, &descriptor.url_vars);

    let mut headers = config.base_headers.clone();
    headers.extend(
        descriptor
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone())),
    );

    let query = descriptor
        .query
        .as_ref()
        .map(|query| {
            merge_over(base_data, query)
                .into_iter()
                .map(|(name, value)| (name, scalar_string(&value)))
                .collect()
        })
        .unwrap_or_default();

    let body = match (&descriptor.form, &descriptor.body) {
        (Some(form), _) => {
            let pairs: Vec<(String, String)> = merge_over(base_data, form)
                .into_iter()
                .map(|(name, value)| (name, scalar_string(&value)))
                .collect();
            let encoded = serde_urlencoded::to_string(&pairs)
                .map_err(|err| HttpCallError::Encode(format!("form body: {err}")))?;
            headers.insert("content-type".to_owned(), FORM_CONTENT_TYPE.to_owned());
            Some(ResolvedBody::Form(encoded))
        }
        (None, Some(JsonValue::Object(fields))) => Some(ResolvedBody::Json(JsonValue::Object(
            merge_over(base_data, fields),
        ))),
        (None, Some(other)) => Some(ResolvedBody::Json(other.clone())),
        (None, None) => None,
    };

    Ok(ResolvedRequest {
        method: descriptor.method.clone(),
        url,
        headers,
        query,
        body,
    })
}

/// Shallow merge; `overrides` wins on key collision.
fn merge_over(
    base: Option<&Map<String, JsonValue>>,
    overrides: &Map<String, JsonValue>,
) -> Map<String, JsonValue> {
    let mut merged = base.cloned().unwrap_or_default();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// String form of a value as it appears in a URL or form field.
fn scalar_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Replaces every `:name` marker with the percent-encoded value.
///
/// A marker only matches when the next character cannot continue a name, so
/// `:id` leaves `:idx` alone. Names absent from the URL are ignored.
fn substitute_url_vars(url: &str, vars: &Map<String, JsonValue>) -> String {
    let mut resolved = url.to_owned();
    for (name, value) in vars {
        let marker = format!(":{name}");
        let encoded = urlencoding::encode(&scalar_string(value)).into_owned();
        resolved = replace_marker(&resolved, &marker, &encoded);
    }
    resolved
}

fn replace_marker(haystack: &str, marker: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = rest.find(marker) {
        let after = &rest[pos + marker.len()..];
        let continues_name = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        out.push_str(&rest[..pos]);
        if continues_name {
            out.push_str(marker);
        } else {
            out.push_str(replacement);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}
