//! Response shaping
//!
//! Stored documents are BSON; clients get plain JSON with ids as hex strings
//! and dates as RFC 3339 timestamps.

use bson::{Bson, Document};
use serde_json::{json, Map, Value};

use crate::db::store::get_path;

pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or_else(|_| Value::from(dt.timestamp_millis())),
        Bson::Document(doc) => document_to_json(doc),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(n) => Value::from(*n),
        Bson::Int64(n) => Value::from(*n),
        Bson::Double(n) => Value::from(*n),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.clone().into_relaxed_extjson(),
    }
}

pub fn document_to_json(doc: &Document) -> Value {
    let map: Map<String, Value> = doc
        .iter()
        .map(|(key, value)| (key.clone(), bson_to_json(value)))
        .collect();
    Value::Object(map)
}

/// Paging window a list was served for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
    pub page: u64,
}

/// List envelope: data plus paging counters
pub fn list_body(docs: &[Document], total: u64, window: Window) -> Value {
    let size = docs.len() as u64;
    let pages = if window.limit == 0 {
        0
    } else {
        total.div_ceil(window.limit)
    };
    let last_modified = docs
        .iter()
        .filter_map(|doc| match get_path(doc, "metadata.updatedAt") {
            Some(Bson::DateTime(dt)) => Some(*dt),
            _ => None,
        })
        .max()
        .map(|dt| bson_to_json(&Bson::DateTime(dt)))
        .unwrap_or(Value::Null);

    json!({
        "data": docs.iter().map(document_to_json).collect::<Vec<_>>(),
        "total": total,
        "size": size,
        "limit": window.limit,
        "skip": window.skip,
        "page": window.page,
        "pages": pages,
        "hasMore": window.skip + size < total,
        "lastModified": last_modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId, DateTime};

    #[test]
    fn test_document_to_json() {
        let id = ObjectId::new();
        let at = DateTime::parse_rfc3339_str("2024-03-01T10:00:00Z").unwrap();
        let json = document_to_json(&doc! {
            "_id": id,
            "publishedAt": at,
            "owner": { "_id": id, "name": "Red Cross" },
            "number": 3_i64,
            "boundary": Bson::Null,
        });

        assert_eq!(json["_id"], id.to_hex());
        assert_eq!(json["publishedAt"], "2024-03-01T10:00:00Z");
        assert_eq!(json["owner"]["_id"], id.to_hex());
        assert_eq!(json["number"], 3);
        assert!(json["boundary"].is_null());
    }

    #[test]
    fn test_list_body_counters() {
        let older = DateTime::from_millis(1_000);
        let newer = DateTime::from_millis(2_000);
        let docs = vec![
            doc! { "metadata": { "updatedAt": older } },
            doc! { "metadata": { "updatedAt": newer } },
        ];

        let body = list_body(&docs, 5, Window { skip: 2, limit: 2, page: 2 });
        assert_eq!(body["size"], 2);
        assert_eq!(body["pages"], 3);
        assert_eq!(body["hasMore"], true);
        assert_eq!(body["lastModified"], bson_to_json(&Bson::DateTime(newer)));

        let body = list_body(&[], 0, Window { skip: 0, limit: 10, page: 1 });
        assert_eq!(body["pages"], 0);
        assert_eq!(body["hasMore"], false);
        assert!(body["lastModified"].is_null());
    }
}
