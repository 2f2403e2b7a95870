use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::Action;

/// One node of a record's composite payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataElement {
    /// Leaf value.
    Atomic(DataAtomic),
    /// Container of further elements.
    Group(DataGroup),
    /// Reference to another stored record.
    RecordLink(DataRecordLink),
    /// Reference to a binary resource stream.
    ResourceLink(DataResourceLink),
}

impl DataElement {
    /// Returns the element name used for schema lookups.
    #[must_use]
    pub fn name_in_data(&self) -> &str {
        match self {
            Self::Atomic(atomic) => atomic.name_in_data.as_str(),
            Self::Group(group) => group.name_in_data.as_str(),
            Self::RecordLink(link) => link.name_in_data.as_str(),
            Self::ResourceLink(link) => link.name_in_data.as_str(),
        }
    }

    /// Returns whether the element points at another record or resource.
    #[must_use]
    pub fn is_link(&self) -> bool {
        matches!(self, Self::RecordLink(_) | Self::ResourceLink(_))
    }

    /// Returns one attribute value when the element kind carries attributes.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        let attributes = match self {
            Self::Atomic(atomic) => &atomic.attributes,
            Self::Group(group) => &group.attributes,
            Self::RecordLink(link) => &link.attributes,
            Self::ResourceLink(_) => return None,
        };

        attributes.get(name).map(String::as_str)
    }

    /// Returns the element as a group.
    #[must_use]
    pub fn as_group(&self) -> Option<&DataGroup> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }
}

impl From<DataAtomic> for DataElement {
    fn from(value: DataAtomic) -> Self {
        Self::Atomic(value)
    }
}

impl From<DataGroup> for DataElement {
    fn from(value: DataGroup) -> Self {
        Self::Group(value)
    }
}

impl From<DataRecordLink> for DataElement {
    fn from(value: DataRecordLink) -> Self {
        Self::RecordLink(value)
    }
}

impl From<DataResourceLink> for DataElement {
    fn from(value: DataResourceLink) -> Self {
        Self::ResourceLink(value)
    }
}

/// Leaf value in a composite payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAtomic {
    name_in_data: String,
    value: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repeat_id: Option<String>,
}

impl DataAtomic {
    /// Creates an atomic value.
    #[must_use]
    pub fn new(name_in_data: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name_in_data: name_in_data.into(),
            value: value.into(),
            attributes: BTreeMap::new(),
            repeat_id: None,
        }
    }

    /// Adds one attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the repeat identifier.
    #[must_use]
    pub fn with_repeat_id(mut self, repeat_id: impl Into<String>) -> Self {
        self.repeat_id = Some(repeat_id.into());
        self
    }

    /// Returns the element name.
    #[must_use]
    pub fn name_in_data(&self) -> &str {
        self.name_in_data.as_str()
    }

    /// Returns the stored value.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    /// Returns the repeat identifier.
    #[must_use]
    pub fn repeat_id(&self) -> Option<&str> {
        self.repeat_id.as_deref()
    }
}

/// Container node in a composite payload. Stored records are root groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataGroup {
    name_in_data: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repeat_id: Option<String>,
    #[serde(default)]
    children: Vec<DataElement>,
}

impl DataGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(name_in_data: impl Into<String>) -> Self {
        Self {
            name_in_data: name_in_data.into(),
            attributes: BTreeMap::new(),
            repeat_id: None,
            children: Vec::new(),
        }
    }

    /// Adds one attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the repeat identifier.
    #[must_use]
    pub fn with_repeat_id(mut self, repeat_id: impl Into<String>) -> Self {
        self.repeat_id = Some(repeat_id.into());
        self
    }

    /// Appends one child.
    #[must_use]
    pub fn with_child(mut self, child: impl Into<DataElement>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Appends a `recordInfo` group holding the record id and its type link.
    #[must_use]
    pub fn with_record_info(self, record_type: &str, record_id: &str) -> Self {
        self.with_child(
            DataGroup::new("recordInfo")
                .with_child(DataAtomic::new("id", record_id))
                .with_child(DataRecordLink::new("type", "recordType", record_type)),
        )
    }

    /// Appends one child in place.
    pub fn add_child(&mut self, child: impl Into<DataElement>) {
        self.children.push(child.into());
    }

    /// Returns the element name.
    #[must_use]
    pub fn name_in_data(&self) -> &str {
        self.name_in_data.as_str()
    }

    /// Returns all attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Returns one attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns the repeat identifier.
    #[must_use]
    pub fn repeat_id(&self) -> Option<&str> {
        self.repeat_id.as_deref()
    }

    /// Returns the children in document order.
    #[must_use]
    pub fn children(&self) -> &[DataElement] {
        &self.children
    }

    /// Returns mutable children in document order.
    pub fn children_mut(&mut self) -> &mut [DataElement] {
        &mut self.children
    }

    /// Iterates children with the given name.
    pub fn children_with_name<'a, 'n>(
        &'a self,
        name_in_data: &'n str,
    ) -> impl Iterator<Item = &'a DataElement> + use<'a, 'n> {
        self.children
            .iter()
            .filter(move |child| child.name_in_data() == name_in_data)
    }

    /// Returns whether any child has the given name.
    #[must_use]
    pub fn contains_child(&self, name_in_data: &str) -> bool {
        self.children_with_name(name_in_data).next().is_some()
    }

    /// Returns the value of the first atomic child with the given name.
    #[must_use]
    pub fn first_atomic_value(&self, name_in_data: &str) -> Option<&str> {
        self.children_with_name(name_in_data)
            .find_map(|child| match child {
                DataElement::Atomic(atomic) => Some(atomic.value()),
                _ => None,
            })
    }

    /// Returns the first group child with the given name.
    #[must_use]
    pub fn first_group(&self, name_in_data: &str) -> Option<&DataGroup> {
        self.groups_with_name(name_in_data).next()
    }

    /// Returns the first record link child with the given name.
    #[must_use]
    pub fn first_record_link(&self, name_in_data: &str) -> Option<&DataRecordLink> {
        self.record_links_with_name(name_in_data).next()
    }

    /// Iterates group children with the given name.
    pub fn groups_with_name<'a, 'n>(
        &'a self,
        name_in_data: &'n str,
    ) -> impl Iterator<Item = &'a DataGroup> + use<'a, 'n> {
        self.children_with_name(name_in_data)
            .filter_map(DataElement::as_group)
    }

    /// Iterates record link children with the given name.
    pub fn record_links_with_name<'a, 'n>(
        &'a self,
        name_in_data: &'n str,
    ) -> impl Iterator<Item = &'a DataRecordLink> + use<'a, 'n> {
        self.children_with_name(name_in_data)
            .filter_map(|child| match child {
                DataElement::RecordLink(link) => Some(link),
                _ => None,
            })
    }

    /// Returns whether the atomic child with the given name holds `"true"`.
    #[must_use]
    pub fn flag(&self, name_in_data: &str) -> bool {
        self.first_atomic_value(name_in_data) == Some("true")
    }

    /// Returns the id stored under `recordInfo/id`.
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        self.first_group("recordInfo")
            .and_then(|record_info| record_info.first_atomic_value("id"))
    }
}

/// Reference from one record to another stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecordLink {
    name_in_data: String,
    linked_record_type: String,
    linked_record_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repeat_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    actions: BTreeSet<Action>,
}

impl DataRecordLink {
    /// Creates a record link.
    #[must_use]
    pub fn new(
        name_in_data: impl Into<String>,
        linked_record_type: impl Into<String>,
        linked_record_id: impl Into<String>,
    ) -> Self {
        Self {
            name_in_data: name_in_data.into(),
            linked_record_type: linked_record_type.into(),
            linked_record_id: linked_record_id.into(),
            attributes: BTreeMap::new(),
            repeat_id: None,
            actions: BTreeSet::new(),
        }
    }

    /// Adds one attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the repeat identifier.
    #[must_use]
    pub fn with_repeat_id(mut self, repeat_id: impl Into<String>) -> Self {
        self.repeat_id = Some(repeat_id.into());
        self
    }

    /// Returns the element name.
    #[must_use]
    pub fn name_in_data(&self) -> &str {
        self.name_in_data.as_str()
    }

    /// Returns the record type of the linked record.
    #[must_use]
    pub fn linked_record_type(&self) -> &str {
        self.linked_record_type.as_str()
    }

    /// Returns the id of the linked record.
    #[must_use]
    pub fn linked_record_id(&self) -> &str {
        self.linked_record_id.as_str()
    }

    /// Returns one attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns actions granted on the link.
    #[must_use]
    pub fn actions(&self) -> &BTreeSet<Action> {
        &self.actions
    }

    /// Grants one action on the link.
    pub fn add_action(&mut self, action: Action) {
        self.actions.insert(action);
    }
}

/// Reference from one record to a binary resource stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataResourceLink {
    name_in_data: String,
    stream_id: String,
    mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repeat_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    actions: BTreeSet<Action>,
}

impl DataResourceLink {
    /// Creates a resource link.
    #[must_use]
    pub fn new(
        name_in_data: impl Into<String>,
        stream_id: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            name_in_data: name_in_data.into(),
            stream_id: stream_id.into(),
            mime_type: mime_type.into(),
            repeat_id: None,
            actions: BTreeSet::new(),
        }
    }

    /// Returns the element name.
    #[must_use]
    pub fn name_in_data(&self) -> &str {
        self.name_in_data.as_str()
    }

    /// Returns the stream identifier.
    #[must_use]
    pub fn stream_id(&self) -> &str {
        self.stream_id.as_str()
    }

    /// Returns the mime type.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        self.mime_type.as_str()
    }

    /// Returns actions granted on the link.
    #[must_use]
    pub fn actions(&self) -> &BTreeSet<Action> {
        &self.actions
    }

    /// Grants one action on the link.
    pub fn add_action(&mut self, action: Action) {
        self.actions.insert(action);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DataAtomic, DataElement, DataGroup, DataRecordLink, DataResourceLink};

    fn book() -> DataGroup {
        DataGroup::new("book")
            .with_record_info("book", "book:1")
            .with_child(DataAtomic::new("title", "Dune"))
            .with_child(DataAtomic::new("public", "true"))
            .with_child(DataRecordLink::new("author", "person", "person:7"))
            .with_child(DataResourceLink::new("cover", "stream-1", "image/png"))
    }

    #[test]
    fn record_id_reads_record_info() {
        assert_eq!(book().record_id(), Some("book:1"));
        assert_eq!(DataGroup::new("book").record_id(), None);
    }

    #[test]
    fn lookups_skip_children_of_other_kinds() {
        let group = book();
        assert_eq!(group.first_atomic_value("title"), Some("Dune"));
        assert!(group.first_group("title").is_none());
        assert_eq!(
            group
                .first_record_link("author")
                .map(DataRecordLink::linked_record_id),
            Some("person:7")
        );
        assert!(group.flag("public"));
        assert!(!group.flag("archived"));
    }

    fn lookup_with_owned_name<'a, T: ?Sized>(
        group: &'a DataGroup,
        name: &str,
        lookup: impl Fn(&'a DataGroup, &str) -> Option<&'a T>,
    ) -> Option<&'a T> {
        let owned = name.to_owned();
        lookup(group, owned.as_str())
    }

    #[test]
    fn lookups_outlive_the_name_they_were_given() {
        let group = book()
            .with_child(DataGroup::new("series").with_child(DataAtomic::new("part", "1")));

        let title = lookup_with_owned_name(&group, "title", DataGroup::first_atomic_value);
        let series = lookup_with_owned_name(&group, "series", DataGroup::first_group);
        let author = lookup_with_owned_name(&group, "author", DataGroup::first_record_link);

        assert_eq!(title, Some("Dune"));
        assert_eq!(
            series.and_then(|series| series.first_atomic_value("part")),
            Some("1")
        );
        assert_eq!(author.map(DataRecordLink::linked_record_type), Some("person"));
    }

    #[test]
    fn only_link_kinds_report_is_link() {
        let group = book();
        let links: Vec<&str> = group
            .children()
            .iter()
            .filter(|child| child.is_link())
            .map(DataElement::name_in_data)
            .collect();
        assert_eq!(links, vec!["author", "cover"]);
    }

    #[test]
    fn elements_serialize_with_kind_tag() {
        let element = DataElement::from(DataAtomic::new("title", "Dune"));
        let value = serde_json::to_value(&element).unwrap_or_default();
        assert_eq!(
            value,
            json!({"kind": "atomic", "name_in_data": "title", "value": "Dune"})
        );

        let restored: Result<DataGroup, _> =
            serde_json::from_value(serde_json::to_value(book()).unwrap_or_default());
        assert!(restored.is_ok());
        assert_eq!(restored.unwrap_or_else(|_| unreachable!()), book());
    }
}
