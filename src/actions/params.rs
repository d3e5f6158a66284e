//! List query parameters
//!
//! `page`, `limit`, `skip`, `q`, `sort`, and filters given either as
//! `filter[field]=value` or as a bare `field=value` for filterable fields.

use crate::actions::json::Window;
use crate::config::PageLimits;
use crate::db::store::{ListQuery, SortDirection, TextSearch, DEFAULT_SORT_FIELD};
use crate::schema::EntitySchema;
use crate::types::PlanError;

const RESERVED: [&str; 5] = ["page", "limit", "skip", "q", "sort"];

/// A parsed list request
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub query: ListQuery,
    pub page: u64,
}

impl ListParams {
    pub fn window(&self) -> Window {
        Window {
            skip: self.query.skip,
            limit: self.query.limit,
            page: self.page,
        }
    }
}

/// Decode `a=1&b=two%20words` into pairs, keeping order and repeats
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

fn positive(name: &str, raw: &str) -> Result<u64, PlanError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| PlanError::BadRequest(format!("'{name}' must be a positive integer")))
}

fn parse_sort(schema: &EntitySchema, raw: &str) -> Result<(String, SortDirection), PlanError> {
    let raw = raw.trim();
    let (field, direction) = match raw.strip_prefix('-') {
        Some(field) => (field, SortDirection::Desc),
        None => (raw.strip_prefix('+').unwrap_or(raw), SortDirection::Asc),
    };
    if field.is_empty() || !schema.is_sortable(field) {
        return Err(PlanError::BadRequest(format!("cannot sort by '{raw}'")));
    }
    Ok((field.to_string(), direction))
}

/// Build the store query for a list request against `schema`
pub fn list_params(raw_query: &str, schema: &EntitySchema, limits: PageLimits) -> Result<ListParams, PlanError> {
    let mut page = None;
    let mut limit = None;
    let mut skip = None;
    let mut query = ListQuery {
        sort: (DEFAULT_SORT_FIELD.to_string(), SortDirection::Desc),
        ..Default::default()
    };

    for (key, value) in parse_query(raw_query) {
        match key.as_str() {
            "page" => page = Some(positive("page", &value)?),
            "limit" => limit = Some(positive("limit", &value)?),
            "skip" => {
                let n = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| PlanError::BadRequest("'skip' must be a non-negative integer".into()))?;
                skip = Some(n);
            }
            "q" => {
                let text = value.trim();
                if !text.is_empty() {
                    query.search = Some(TextSearch {
                        fields: schema.searchable_fields(),
                        text: text.to_string(),
                    });
                }
            }
            "sort" => query.sort = parse_sort(schema, &value)?,
            _ => {
                if let Some(field) = key.strip_prefix("filter[").and_then(|k| k.strip_suffix(']')) {
                    let bson = schema.filter_value(field, &value)?;
                    query.filters.push((field.to_string(), bson));
                } else if !RESERVED.contains(&key.as_str())
                    && schema.get(&key).is_some_and(|f| f.is_filterable())
                {
                    let bson = schema.filter_value(&key, &value)?;
                    query.filters.push((key, bson));
                }
                // Anything else (cache busters, unknown keys) is ignored
            }
        }
    }

    let limit = limit
        .unwrap_or(limits.default_limit as u64)
        .min(limits.max_limit as u64)
        .max(1);
    let (skip, page) = match skip {
        Some(skip) => (skip, skip / limit + 1),
        None => {
            let page = page.unwrap_or(1);
            ((page - 1).saturating_mul(limit), page)
        }
    };

    query.skip = skip;
    query.limit = limit;
    Ok(ListParams { query, page })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, RefTarget};
    use bson::{oid::ObjectId, Bson};

    fn schema() -> EntitySchema {
        EntitySchema::new("Plan", "plans", "plans")
            .field(FieldSpec::reference("owner", RefTarget::Party).index().taggable())
            .field(FieldSpec::string("description").index().searchable())
            .field(FieldSpec::date("publishedAt").index())
    }

    #[test]
    fn test_defaults() {
        let params = list_params("", &schema(), PageLimits::default()).unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.query.skip, 0);
        assert_eq!(params.query.limit, 10);
        assert_eq!(
            params.query.sort,
            ("metadata.updatedAt".to_string(), SortDirection::Desc)
        );
        assert!(params.query.filters.is_empty());
        assert!(params.query.search.is_none());
    }

    #[test]
    fn test_paging_and_cap() {
        let params = list_params("page=3&limit=20", &schema(), PageLimits::default()).unwrap();
        assert_eq!(params.query.skip, 40);
        assert_eq!(params.page, 3);

        let params = list_params("limit=1000", &schema(), PageLimits::default()).unwrap();
        assert_eq!(params.query.limit, 100);

        let params = list_params("page=9&skip=25&limit=10", &schema(), PageLimits::default()).unwrap();
        assert_eq!(params.query.skip, 25);
        assert_eq!(params.page, 3);

        assert!(list_params("page=0", &schema(), PageLimits::default()).is_err());
        assert!(list_params("limit=abc", &schema(), PageLimits::default()).is_err());
    }

    #[test]
    fn test_search_sort_and_filters() {
        let owner = ObjectId::new();
        let raw = format!(
            "q=flood+response&sort=-publishedAt&filter%5Bowner%5D={}&description=Drill&_=123",
            owner.to_hex()
        );
        let params = list_params(&raw, &schema(), PageLimits::default()).unwrap();

        let search = params.query.search.unwrap();
        assert_eq!(search.text, "flood response");
        assert_eq!(search.fields, vec!["description"]);
        assert_eq!(params.query.sort, ("publishedAt".to_string(), SortDirection::Desc));
        assert_eq!(
            params.query.filters,
            vec![
                ("owner".to_string(), Bson::ObjectId(owner)),
                ("description".to_string(), Bson::String("Drill".into())),
            ]
        );
    }

    #[test]
    fn test_rejects_unknown_sort_and_filter() {
        assert!(matches!(
            list_params("sort=password", &schema(), PageLimits::default()),
            Err(PlanError::BadRequest(_))
        ));
        assert!(matches!(
            list_params("filter[password]=x", &schema(), PageLimits::default()),
            Err(PlanError::BadRequest(_))
        ));
        assert!(matches!(
            list_params("filter[owner]=nope", &schema(), PageLimits::default()),
            Err(PlanError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_query_decodes() {
        assert_eq!(
            parse_query("a=1&b=two%20words&c&&d=x+y"),
            vec![
                ("a".into(), "1".into()),
                ("b".into(), "two words".into()),
                ("c".into(), "".into()),
                ("d".into(), "x y".into()),
            ]
        );
    }
}
