use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Media type used when the request neither names one nor carries a data-URI prefix.
pub const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:([^;,]+);base64,").expect("data-URI pattern is valid")
});

/// Inbound body of the evaluation endpoint.
///
/// Required fields are optional here so that a missing field is reported as a
/// client error by [`EvaluationRequest::validate`] instead of failing the parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    /// Raw base64 or a `data:<mime>;base64,<payload>` URI.
    #[serde(default)]
    pub image: Option<String>,
    /// Explicit MIME type, e.g. `image/png`.
    #[serde(default)]
    pub image_type: Option<String>,
    /// Display category label. Free text, interpolated into the prompt as is; scalar
    /// values such as numbers are accepted and rendered as text.
    #[serde(default)]
    pub fixture_type: Option<Value>,
}

impl EvaluationRequest {
    /// Checks that both the image and the fixture type are present and non-empty.
    pub fn validate(&self) -> Result<Submission<'_>, Error> {
        let image = non_empty(self.image.as_deref()).ok_or(Error::MissingFields)?;
        let fixture_type = self
            .fixture_type
            .as_ref()
            .and_then(fixture_label)
            .ok_or(Error::MissingFields)?;

        Ok(Submission {
            image,
            image_type: non_empty(self.image_type.as_deref()),
            fixture_type,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Text form of a fixture type. `null`, `false`, `0` and `""` count as missing;
/// arrays and objects are rendered as compact JSON.
fn fixture_label(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(label) => non_empty(Some(label.as_str())).map(Cow::Borrowed),
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        Value::Number(number) => Some(Cow::Owned(number.to_string())),
        other => Some(Cow::Owned(other.to_string())),
    }
}

/// A request that passed validation, borrowed from the [`EvaluationRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submission<'a> {
    pub image: &'a str,
    pub image_type: Option<&'a str>,
    pub fixture_type: Cow<'a, str>,
}

impl<'a> Submission<'a> {
    /// Resolves the media type: explicit field, then data-URI prefix, then [`DEFAULT_MEDIA_TYPE`].
    pub fn media_type(&self) -> &'a str {
        if let Some(image_type) = self.image_type {
            return image_type;
        }

        DATA_URI
            .captures(self.image)
            .and_then(|captures| captures.get(1))
            .map(|mime| mime.as_str())
            .unwrap_or(DEFAULT_MEDIA_TYPE)
    }

    /// The image payload with everything up to the first comma removed.
    pub fn image_data(&self) -> &'a str {
        self.image
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or(self.image)
    }
}

/// Successful response of the evaluation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// Model output, passed through verbatim.
    pub evaluation: String,
}

/// Failure response of the evaluation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
