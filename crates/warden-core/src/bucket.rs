//! Blob-storage container metadata.

use serde::{Deserialize, Serialize};

/// Who may upload into a bucket.
///
/// Catalog metadata only; the target never sees it. The validator uses it
/// to check that the bucket's upload rule matches its intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadScope {
    /// Verified subjects, under a folder named after their own id.
    Owner,
    /// Admins only, any path.
    Admin,
    /// Any verified subject, any path.
    Verified,
}

/// A blob-storage bucket declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Bucket id and name.
    pub name: String,
    /// Objects are readable without authentication.
    pub public: bool,
    /// Accepted content types.
    pub allowed_mime_types: Vec<String>,
    /// Maximum object size in bytes.
    pub file_size_limit: u64,
    /// Intended uploaders.
    pub upload_scope: UploadScope,
    /// Human-readable purpose.
    #[serde(default)]
    pub description: String,
}

impl Bucket {
    /// A bucket with no MIME restriction list yet.
    pub fn new(name: impl Into<String>, public: bool, file_size_limit: u64) -> Self {
        Self {
            name: name.into(),
            public,
            allowed_mime_types: Vec::new(),
            file_size_limit,
            upload_scope: UploadScope::Verified,
            description: String::new(),
        }
    }

    /// Sets the accepted MIME types.
    pub fn with_mime_types<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the upload scope.
    pub fn with_upload_scope(mut self, scope: UploadScope) -> Self {
        self.upload_scope = scope;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether an object of `mime_type` and `size` bytes fits the bucket limits.
    pub fn accepts(&self, mime_type: &str, size: u64) -> bool {
        size <= self.file_size_limit
            && (self.allowed_mime_types.is_empty()
                || self.allowed_mime_types.iter().any(|m| m == mime_type))
    }

    /// Insert-or-replace statement keyed by the bucket id.
    ///
    /// Re-running it overwrites `public`, `file_size_limit` and
    /// `allowed_mime_types`, so repeated runs converge.
    pub fn to_upsert_sql(&self) -> String {
        let name = quote(&self.name);
        let mimes: Vec<String> = self.allowed_mime_types.iter().map(|m| quote(m)).collect();
        format!(
            "INSERT INTO storage.buckets (id, name, public, file_size_limit, allowed_mime_types) \
             VALUES ({name}, {name}, {}, {}, ARRAY[{}]::text[]) \
             ON CONFLICT (id) DO UPDATE SET \
             public = EXCLUDED.public, \
             file_size_limit = EXCLUDED.file_size_limit, \
             allowed_mime_types = EXCLUDED.allowed_mime_types;",
            self.public,
            self.file_size_limit,
            mimes.join(", ")
        )
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
