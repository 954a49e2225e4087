use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};

/// Tag recording when an object was copied into the destination.
pub const CREATED_AT_TAG: &str = "CreateAt";

/// `base` plus a creation timestamp in RFC 3339 UTC.
pub fn creation_tags(base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut tags = base.clone();
    tags.insert(
        CREATED_AT_TAG.to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    tags
}
