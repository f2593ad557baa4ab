//! Uploaded-file records.
//!
//! A successful chunked upload answers with `{"file": {...}}`; [`File`] is
//! the typed view of that record. Files are stored on Google's servers for
//! 48 hours and are referenced in later requests by their URI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::payload::Payload;

/// An uploaded file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// The resource name of the file (e.g., "files/abc123")
    #[serde(default)]
    pub name: String,

    /// User-provided display name for the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Size of the file in bytes. The wire carries int64 values as strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,

    /// When the file will be automatically deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,

    /// Base64-encoded SHA-256 hash of the uploaded bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256_hash: Option<String>,

    /// URI to reference this file in API calls
    #[serde(default)]
    pub uri: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_uri: Option<String>,

    /// Processing state of the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<FileState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<FileSource>,

    /// Error information if processing failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FileError>,

    /// Video metadata (if this is a video file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_metadata: Option<VideoMetadata>,
}

impl File {
    /// Returns true if the file is still being processed.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        matches!(self.state, Some(FileState::Processing))
    }

    /// Returns true if the file is ready to use.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, Some(FileState::Active))
    }

    /// Returns true if file processing failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state, Some(FileState::Failed))
    }

    /// Parses `size_bytes`, if present and valid.
    ///
    /// ```
    /// # use genai_transport::File;
    /// # let file: File = serde_json::from_str(r#"{"name":"files/abc","uri":"","sizeBytes":"1234567"}"#).unwrap();
    /// assert_eq!(file.size_bytes_as_u64(), Some(1_234_567));
    /// ```
    #[must_use]
    pub fn size_bytes_as_u64(&self) -> Option<u64> {
        self.size_bytes.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Processing state of an uploaded file.
///
/// Unrecognized values land in `Unknown` with the original value preserved,
/// and serialize back unchanged.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum FileState {
    Unspecified,
    /// File is being processed
    Processing,
    /// File is ready to use
    Active,
    /// File processing failed
    Failed,
    /// Unknown state (for forward compatibility).
    Unknown {
        /// The unrecognized state string from the API
        state_type: String,
        /// The raw JSON value
        data: Value,
    },
}

impl FileState {
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    /// Returns the state type name if this is an unknown state.
    #[must_use]
    pub fn unknown_state_type(&self) -> Option<&str> {
        match self {
            Self::Unknown { state_type, .. } => Some(state_type),
            _ => None,
        }
    }
}

impl Serialize for FileState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Unspecified => serializer.serialize_str("STATE_UNSPECIFIED"),
            Self::Processing => serializer.serialize_str("PROCESSING"),
            Self::Active => serializer.serialize_str("ACTIVE"),
            Self::Failed => serializer.serialize_str("FAILED"),
            Self::Unknown { data, .. } => data.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FileState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        match value.as_str() {
            Some("STATE_UNSPECIFIED") => Ok(Self::Unspecified),
            Some("PROCESSING") => Ok(Self::Processing),
            Some("ACTIVE") => Ok(Self::Active),
            Some("FAILED") => Ok(Self::Failed),
            Some(other) => {
                warn!(
                    state = other,
                    "Encountered unknown FileState, preserving it in the Unknown variant"
                );
                Ok(Self::Unknown {
                    state_type: other.to_string(),
                    data: value,
                })
            }
            None => {
                warn!(%value, "FileState received non-string value");
                Ok(Self::Unknown {
                    state_type: format!("<non-string: {value}>"),
                    data: value,
                })
            }
        }
    }
}

/// Where a file came from.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum FileSource {
    Unspecified,
    /// Uploaded by the user.
    Uploaded,
    /// Generated by the model.
    Generated,
    /// Unknown source (for forward compatibility).
    Unknown {
        source_type: String,
        data: Value,
    },
}

impl Serialize for FileSource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Unspecified => serializer.serialize_str("SOURCE_UNSPECIFIED"),
            Self::Uploaded => serializer.serialize_str("UPLOADED"),
            Self::Generated => serializer.serialize_str("GENERATED"),
            Self::Unknown { data, .. } => data.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FileSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        Ok(match value.as_str() {
            Some("SOURCE_UNSPECIFIED") => Self::Unspecified,
            Some("UPLOADED") => Self::Uploaded,
            Some("GENERATED") => Self::Generated,
            other => {
                let source_type = other.map_or_else(|| format!("<non-string: {value}>"), String::from);
                warn!(source = %source_type, "Encountered unknown FileSource");
                Self::Unknown {
                    source_type,
                    data: value,
                }
            }
        })
    }
}

/// Error status of a failed file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Payload>,
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(msg)) => write!(f, "error {code}: {msg}"),
            (Some(code), None) => write!(f, "error {code}"),
            (None, Some(msg)) => write!(f, "{msg}"),
            (None, None) => write!(f, "unknown error"),
        }
    }
}

/// Metadata for video files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    /// Duration of the video, e.g. `"12.5s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<String>,

    #[serde(flatten)]
    pub extra: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_deserializes_upload_record() {
        let file: File = serde_json::from_value(json!({
            "name": "files/abc123",
            "displayName": "notes.txt",
            "mimeType": "text/plain",
            "sizeBytes": "42",
            "createTime": "2024-05-01T10:00:00.123456Z",
            "updateTime": "2024-05-01T10:00:00.123456Z",
            "expirationTime": "2024-05-03T10:00:00.123456Z",
            "sha256Hash": "ZmFrZQ==",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc123",
            "state": "ACTIVE",
            "source": "UPLOADED"
        }))
        .unwrap();

        assert_eq!(file.name, "files/abc123");
        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(file.size_bytes_as_u64(), Some(42));
        assert!(file.is_active());
        assert_eq!(file.source, Some(FileSource::Uploaded));
        assert!(file.create_time.is_some());
    }

    #[test]
    fn test_file_state_unknown_roundtrip() {
        let state: FileState = serde_json::from_value(json!("ARCHIVED")).unwrap();
        assert!(state.is_unknown());
        assert_eq!(state.unknown_state_type(), Some("ARCHIVED"));
        assert_eq!(serde_json::to_value(&state).unwrap(), json!("ARCHIVED"));
    }

    #[test]
    fn test_file_state_non_string() {
        let state: FileState = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(state.unknown_state_type(), Some("<non-string: 3>"));
        assert_eq!(serde_json::to_value(&state).unwrap(), json!(3));
    }

    #[test]
    fn test_file_source_unknown_roundtrip() {
        let source: FileSource = serde_json::from_value(json!("REGISTERED")).unwrap();
        assert!(matches!(source, FileSource::Unknown { ref source_type, .. } if source_type == "REGISTERED"));
        assert_eq!(serde_json::to_value(&source).unwrap(), json!("REGISTERED"));
    }

    #[test]
    fn test_failed_file_error() {
        let file: File = serde_json::from_value(json!({
            "name": "files/x",
            "state": "FAILED",
            "error": {"code": 3, "message": "unsupported format"}
        }))
        .unwrap();
        assert!(file.is_failed());
        assert_eq!(file.error.unwrap().to_string(), "error 3: unsupported format");
    }

    #[test]
    fn test_video_metadata_keeps_extra_fields() {
        let meta: VideoMetadata =
            serde_json::from_value(json!({"videoDuration": "12.5s", "fps": 30})).unwrap();
        assert_eq!(meta.video_duration.as_deref(), Some("12.5s"));
        assert_eq!(meta.extra["fps"], 30);
    }
}
