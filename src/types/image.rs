//! Image generation result

use serde::{Deserialize, Serialize};

/// Raw image returned by the image model, passed through untouched
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Media type reported by the model, e.g. `image/png`
    pub mime_type: String,
    /// Base64-encoded image bytes
    pub data: String,
}
