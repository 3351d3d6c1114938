use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Separates the field values of a record in its line form.
pub const FIELD_SEPARATOR: &str = " : ";

/// A shortened URL owned by a user.
///
/// `id` and `url` are each unique within a store. `deleted` is a soft-delete
/// flag: once set it is never cleared, and readers treat the record as gone
/// while the record itself stays in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortUrl {
    /// The short identifier used as the redirection key.
    pub id: String,
    /// The original URL that was shortened.
    pub url: String,
    /// Identifier of the owning user.
    pub uid: String,
    /// Soft-delete flag.
    pub deleted: bool,
}

impl ShortUrl {
    /// Creates a live record.
    pub fn new(id: impl Into<String>, url: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            uid: uid.into(),
            deleted: false,
        }
    }

    /// Creates a deletion request entry: only the id and its claimed owner are set.
    pub fn owned_by(id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uid: uid.into(),
            ..Self::default()
        }
    }

    /// Serializes the record as one newline-terminated line.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }

    /// Checks that the line form of this record parses back to it.
    ///
    /// A field holding [`FIELD_SEPARATOR`] or a line break would split or end
    /// the line early.
    pub fn check_line_safe(&self) -> Result<(), StorageError> {
        let unsafe_field = [&self.id, &self.url, &self.uid]
            .into_iter()
            .find(|field| field.contains(FIELD_SEPARATOR) || field.contains(['\n', '\r']));

        match unsafe_field {
            Some(field) => Err(StorageError::InvalidData(format!(
                "field cannot be stored on one line: {field:?}"
            ))),
            None => Ok(()),
        }
    }

    /// Generates the full short link based on the provided base URL.
    pub fn short_link(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.id)
    }
}

impl Display for ShortUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.id,
            self.url,
            self.uid,
            self.deleted,
            sep = FIELD_SEPARATOR
        )
    }
}

impl FromStr for ShortUrl {
    type Err = StorageError;

    /// Parses a line without its terminator. Anything other than exactly four
    /// fields is rejected; the flag is `true` only for the literal `"true"`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        let [id, url, uid, deleted] = fields.as_slice() else {
            return Err(StorageError::RepoEntryInvalid(line.to_string()));
        };

        Ok(Self {
            id: id.to_string(),
            url: url.to_string(),
            uid: uid.to_string(),
            deleted: *deleted == "true",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_round_trip() {
        for deleted in [false, true] {
            let record = ShortUrl {
                deleted,
                ..ShortUrl::new("a1b2c3d", "https://example.com/path?q=1", "u1")
            };

            let line = record.to_line();
            assert!(line.ends_with('\n'));

            let parsed: ShortUrl = line.trim_end_matches('\n').parse().unwrap();
            assert_eq!(parsed, record);
        }
    }

    #[test]
    fn line_layout() {
        let record = ShortUrl::new("abc", "https://example.com", "u1");
        assert_eq!(record.to_line(), "abc : https://example.com : u1 : false\n");
    }

    #[test]
    fn rejects_wrong_field_count() {
        let short = "abc : https://example.com : u1".parse::<ShortUrl>();
        assert!(matches!(short, Err(StorageError::RepoEntryInvalid(_))));

        let long = "abc : https://example.com : u1 : false : extra".parse::<ShortUrl>();
        assert!(matches!(long, Err(StorageError::RepoEntryInvalid(_))));

        assert!("".parse::<ShortUrl>().is_err());
    }

    #[test]
    fn unknown_flag_reads_as_live() {
        let parsed: ShortUrl = "abc : https://example.com : u1 : yes".parse().unwrap();
        assert!(!parsed.deleted);
    }

    #[test]
    fn line_safe_fields() {
        assert!(ShortUrl::new("abc", "https://example.com/a:b", "u1")
            .check_line_safe()
            .is_ok());

        for record in [
            ShortUrl::new("abc", "https://example.com/?q=a : b", "u1"),
            ShortUrl::new("abc", "https://example.com/\nx", "u1"),
            ShortUrl::new("abc", "https://example.com", "u1\r"),
            ShortUrl::new("a : b", "https://example.com", "u1"),
        ] {
            assert!(
                matches!(record.check_line_safe(), Err(StorageError::InvalidData(_))),
                "{record:?}"
            );
        }
    }

    #[test]
    fn short_link_trims_trailing_slash() {
        let record = ShortUrl::new("abc123", "https://example.com", "u1");
        assert_eq!(record.short_link("http://localhost:8080"), "http://localhost:8080/abc123");
        assert_eq!(record.short_link("http://localhost:8080/"), "http://localhost:8080/abc123");
    }

    #[test]
    fn owned_by_carries_only_id_and_owner() {
        let entry = ShortUrl::owned_by("abc", "u1");
        assert_eq!(entry.id, "abc");
        assert_eq!(entry.uid, "u1");
        assert!(entry.url.is_empty());
        assert!(!entry.deleted);
    }
}
