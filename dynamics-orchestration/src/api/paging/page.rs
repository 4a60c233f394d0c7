//! Collection page shapes the iterator can traverse

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::constants::{COLLECTION_VALUE_KEY, DELTA_LINK_KEY, NEXT_LINK_KEY};

/// A decoded page of a collection response
///
/// Typed link accessors are consulted first; when they have nothing the
/// provided [`next_link`](CollectionPage::next_link) and
/// [`delta_link`](CollectionPage::delta_link) fall back to the page's
/// additional-data bag. Empty links count as absent.
pub trait CollectionPage {
    type Item;

    /// Move the items out of the page; `None` if the page has no item collection at all
    fn take_items(&mut self) -> Option<Vec<Self::Item>>;

    fn odata_next_link(&self) -> Option<&str> {
        None
    }

    fn odata_delta_link(&self) -> Option<&str> {
        None
    }

    /// Properties the page type does not model
    fn additional_data(&self) -> Option<&Map<String, Value>> {
        None
    }

    fn next_link(&self) -> Option<&str> {
        non_empty(self.odata_next_link()).or_else(|| bag_link(self.additional_data(), NEXT_LINK_KEY))
    }

    fn delta_link(&self) -> Option<&str> {
        non_empty(self.odata_delta_link()).or_else(|| bag_link(self.additional_data(), DELTA_LINK_KEY))
    }
}

fn non_empty(link: Option<&str>) -> Option<&str> {
    link.filter(|link| !link.is_empty())
}

fn bag_link<'a>(bag: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a str> {
    non_empty(bag.and_then(|bag| bag.get(key)).and_then(Value::as_str))
}

/// Standard OData collection page: `value` plus paging annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ODataPage<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<T>>,
    #[serde(rename = "@odata.nextLink", default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink", default, skip_serializing_if = "Option::is_none")]
    pub delta_link: Option<String>,
    #[serde(flatten)]
    pub additional_data: Map<String, Value>,
}

impl<T> ODataPage<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            value: Some(items),
            next_link: None,
            delta_link: None,
            additional_data: Map::new(),
        }
    }

    pub fn with_next_link(mut self, link: impl Into<String>) -> Self {
        self.next_link = Some(link.into());
        self
    }

    pub fn with_delta_link(mut self, link: impl Into<String>) -> Self {
        self.delta_link = Some(link.into());
        self
    }
}

impl<T> CollectionPage for ODataPage<T> {
    type Item = T;

    fn take_items(&mut self) -> Option<Vec<T>> {
        self.value.take()
    }

    fn odata_next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    fn odata_delta_link(&self) -> Option<&str> {
        self.delta_link.as_deref()
    }

    fn additional_data(&self) -> Option<&Map<String, Value>> {
        Some(&self.additional_data)
    }
}

/// Untyped pages: items come from the `value` array, links from the object itself
impl CollectionPage for Value {
    type Item = Value;

    fn take_items(&mut self) -> Option<Vec<Value>> {
        match self.get_mut(COLLECTION_VALUE_KEY)? {
            Value::Array(items) => Some(std::mem::take(items)),
            _ => None,
        }
    }

    fn additional_data(&self) -> Option<&Map<String, Value>> {
        self.as_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_odata_page_decodes_annotations() {
        let mut page: ODataPage<Value> = serde_json::from_value(json!({
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#users",
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/users?$skiptoken=X",
            "value": [{"id": "1"}, {"id": "2"}]
        }))
        .unwrap();

        assert_eq!(page.next_link(), Some("https://graph.microsoft.com/v1.0/users?$skiptoken=X"));
        assert_eq!(page.delta_link(), None);
        assert!(page.additional_data.contains_key("@odata.context"));
        assert_eq!(page.take_items().map(|items| items.len()), Some(2));
        assert!(page.take_items().is_none());
    }

    #[test]
    fn test_typed_link_wins_over_bag() {
        let mut page = ODataPage::new(vec![1, 2]).with_delta_link("https://typed");
        page.additional_data
            .insert(DELTA_LINK_KEY.to_string(), json!("https://bag"));
        page.additional_data
            .insert(NEXT_LINK_KEY.to_string(), json!("https://bag-next"));

        assert_eq!(page.delta_link(), Some("https://typed"));
        assert_eq!(page.next_link(), Some("https://bag-next"));
    }

    #[test]
    fn test_empty_link_is_absent() {
        let page = ODataPage::new(vec![1]).with_next_link("");
        assert_eq!(page.next_link(), None);
    }

    #[test]
    fn test_untyped_page() {
        let mut page = json!({
            "value": [{"id": "a"}],
            "@odata.deltaLink": "https://graph.microsoft.com/v1.0/users/delta?$deltatoken=T"
        });

        assert_eq!(
            page.delta_link(),
            Some("https://graph.microsoft.com/v1.0/users/delta?$deltatoken=T")
        );
        assert_eq!(page.take_items(), Some(vec![json!({"id": "a"})]));

        let mut no_items = json!({"id": "not-a-collection"});
        assert!(no_items.take_items().is_none());
    }
}
