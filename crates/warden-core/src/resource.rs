//! Resource types, the type registry and row values.
//!
//! A [`ResourceType`] names a table of the community platform. Its
//! [`ResourceSpec`] describes the columns policies care about: whether
//! rows carry a `tenant_id`, which column records ownership, and which
//! column (if any) marks a row as publicly visible.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Resource types
// ============================================================================

/// Enumerable tag for every table guarded by policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// An isolated community.
    Tenant,
    /// A platform account.
    User,
    /// News article.
    Article,
    /// Community event.
    Event,
    /// Attendance reply to an event.
    EventRsvp,
    /// Marketplace listing.
    MarketplaceItem,
    /// Professional services profile.
    ProfessionalProfile,
    /// Forum category.
    ForumCategory,
    /// Forum thread.
    ForumThread,
    /// Reply inside a forum thread.
    ForumPost,
    /// Request for a tutorial.
    TutorialRequest,
    /// Shared document.
    Document,
    /// Gamification badge definition.
    Badge,
    /// Badge awarded to a user.
    UserBadge,
    /// Points balance of a user.
    UserPoints,
    /// Content waiting for moderation.
    ModerationQueueItem,
    /// Logged moderator decision.
    ModerationAction,
    /// Object stored in a blob-storage bucket.
    StorageObject,
}

/// Shape of a resource type, as far as policies are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSpec {
    /// The type this spec describes.
    pub resource_type: ResourceType,
    /// Table name in the target system.
    pub table: &'static str,
    /// Rows carry a `tenant_id` column.
    pub tenant_scoped: bool,
    /// Column holding the owning subject's id.
    pub owner_field: Option<&'static str>,
    /// Column whose `public` value widens visibility.
    pub visibility_column: Option<&'static str>,
    /// Parent type and foreign key through which tenancy is inherited.
    pub parent: Option<(ResourceType, &'static str)>,
}

impl ResourceSpec {
    /// Rows belong to one tenant, directly or through their parent.
    pub fn tenant_bound(&self) -> bool {
        self.tenant_scoped || self.parent.is_some()
    }
}

impl ResourceType {
    /// Every known resource type, in catalog order.
    pub const ALL: [ResourceType; 18] = [
        ResourceType::Tenant,
        ResourceType::User,
        ResourceType::Article,
        ResourceType::Event,
        ResourceType::EventRsvp,
        ResourceType::MarketplaceItem,
        ResourceType::ProfessionalProfile,
        ResourceType::ForumCategory,
        ResourceType::ForumThread,
        ResourceType::ForumPost,
        ResourceType::TutorialRequest,
        ResourceType::Document,
        ResourceType::Badge,
        ResourceType::UserBadge,
        ResourceType::UserPoints,
        ResourceType::ModerationQueueItem,
        ResourceType::ModerationAction,
        ResourceType::StorageObject,
    ];

    /// Static shape of this resource type.
    pub fn spec(self) -> ResourceSpec {
        use ResourceType::*;

        let (table, tenant_scoped, owner_field, visibility_column, parent) = match self {
            Tenant => ("tenants", false, None, None, None),
            User => ("users", true, Some("id"), None, None),
            Article => ("articles", true, Some("author_id"), None, None),
            Event => ("events", true, Some("organizer_id"), Some("event_type"), None),
            EventRsvp => ("event_rsvps", false, Some("user_id"), None, Some((Event, "event_id"))),
            MarketplaceItem => ("marketplace_items", true, Some("seller_id"), None, None),
            ProfessionalProfile => ("professional_profiles", true, Some("user_id"), None, None),
            ForumCategory => ("forum_categories", true, None, None, None),
            ForumThread => ("forum_threads", true, Some("author_id"), None, None),
            ForumPost => (
                "forum_posts",
                false,
                Some("author_id"),
                None,
                Some((ForumThread, "thread_id")),
            ),
            TutorialRequest => ("tutorial_requests", true, Some("requester_id"), None, None),
            Document => ("documents", true, None, None, None),
            Badge => ("badges", true, None, None, None),
            UserBadge => (
                "user_badges",
                false,
                Some("user_id"),
                None,
                Some((Badge, "badge_id")),
            ),
            UserPoints => ("user_points", true, Some("user_id"), None, None),
            ModerationQueueItem => ("moderation_queue", true, None, None, None),
            ModerationAction => ("moderation_actions_log", true, Some("moderator_id"), None, None),
            StorageObject => ("storage.objects", false, None, None, None),
        };

        ResourceSpec {
            resource_type: self,
            table,
            tenant_scoped,
            owner_field,
            visibility_column,
            parent,
        }
    }

    /// Table name in the target system.
    pub fn table(self) -> &'static str {
        self.spec().table
    }

    /// Snake-case tag, e.g. `"marketplace_item"`.
    pub fn name(self) -> &'static str {
        use ResourceType::*;
        match self {
            Tenant => "tenant",
            User => "user",
            Article => "article",
            Event => "event",
            EventRsvp => "event_rsvp",
            MarketplaceItem => "marketplace_item",
            ProfessionalProfile => "professional_profile",
            ForumCategory => "forum_category",
            ForumThread => "forum_thread",
            ForumPost => "forum_post",
            TutorialRequest => "tutorial_request",
            Document => "document",
            Badge => "badge",
            UserBadge => "user_badge",
            UserPoints => "user_points",
            ModerationQueueItem => "moderation_queue_item",
            ModerationAction => "moderation_action",
            StorageObject => "storage_object",
        }
    }

    /// Looks a type up by its tag or table name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rt| rt.name() == s || rt.table() == s)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Type registry
// ============================================================================

/// The set of resource types a target schema knows about.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    specs: BTreeMap<ResourceType, ResourceSpec>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry containing every built-in type.
    pub fn standard() -> Self {
        Self::from_types(ResourceType::ALL)
    }

    /// Registry containing only `types`.
    pub fn from_types(types: impl IntoIterator<Item = ResourceType>) -> Self {
        let mut registry = Self::new();
        for rt in types {
            registry.register(rt.spec());
        }
        registry
    }

    /// Add or replace a spec.
    pub fn register(&mut self, spec: ResourceSpec) {
        self.specs.insert(spec.resource_type, spec);
    }

    /// Spec for `rt`, if registered.
    pub fn get(&self, rt: ResourceType) -> Option<&ResourceSpec> {
        self.specs.get(&rt)
    }

    /// Whether `rt` is registered.
    pub fn contains(&self, rt: ResourceType) -> bool {
        self.specs.contains_key(&rt)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

// ============================================================================
// Rows
// ============================================================================

/// A column value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL; compares unequal to everything.
    #[default]
    Null,
    /// Boolean column.
    Bool(bool),
    /// Text column.
    Text(String),
}

impl Value {
    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// SQL literal for this value.
    pub fn to_sql(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A row of some resource type, as an attribute map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Type of the row.
    pub resource_type: ResourceType,
    /// Column values; missing columns read as NULL.
    pub attributes: BTreeMap<String, Value>,
}

static NULL: Value = Value::Null;

impl Resource {
    /// An empty row of type `rt`.
    pub fn new(rt: ResourceType) -> Self {
        Self {
            resource_type: rt,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets a column.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }

    /// Reads a column; absent columns are NULL.
    pub fn get(&self, column: &str) -> &Value {
        self.attributes.get(column).unwrap_or(&NULL)
    }

    /// The row's `id` column as text.
    pub fn id(&self) -> Option<&str> {
        self.get("id").as_text()
    }
}

/// Lookup of rows referenced through foreign keys.
///
/// Used by predicates that inherit tenancy from a parent row.
pub trait RelatedRows {
    /// Row of type `rt` whose `id` is `id`.
    fn find(&self, rt: ResourceType, id: &str) -> Option<&Resource>;
}

impl RelatedRows for Vec<Resource> {
    fn find(&self, rt: ResourceType, id: &str) -> Option<&Resource> {
        self.iter()
            .find(|row| row.resource_type == rt && row.id() == Some(id))
    }
}

// ============================================================================
// Storage objects
// ============================================================================

/// An object in a blob-storage bucket.
///
/// Ownership follows a naming convention: the first folder of the path is
/// the owning subject's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObject {
    /// Bucket holding the object.
    pub bucket_id: String,
    /// Object path within the bucket.
    pub path: String,
}

impl StorageObject {
    /// Creates a storage object reference.
    pub fn new(bucket_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            path: path.into(),
        }
    }

    /// First folder of the path; `None` for objects at the bucket root.
    pub fn owner_segment(&self) -> Option<&str> {
        owner_segment(&self.path)
    }

    /// Row form used for policy evaluation (`bucket_id`, `name`).
    pub fn to_resource(&self) -> Resource {
        Resource::new(ResourceType::StorageObject)
            .with("bucket_id", self.bucket_id.as_str())
            .with("name", self.path.as_str())
    }
}

/// First folder of an object path.
pub fn owner_segment(path: &str) -> Option<&str> {
    let (first, rest) = path.split_once('/')?;
    if first.is_empty() || rest.is_empty() {
        None
    } else {
        Some(first)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_tables() {
        assert_eq!(ResourceType::ModerationQueueItem.table(), "moderation_queue");
        assert_eq!(ResourceType::StorageObject.table(), "storage.objects");
        assert_eq!(
            ResourceType::MarketplaceItem.spec().owner_field,
            Some("seller_id")
        );
    }

    #[test]
    fn test_tenancy() {
        let moderation = ResourceType::ModerationAction.spec();
        assert!(moderation.tenant_scoped);
        assert_eq!(moderation.parent, None);

        let user_badge = ResourceType::UserBadge.spec();
        assert!(!user_badge.tenant_scoped);
        assert_eq!(user_badge.parent, Some((ResourceType::Badge, "badge_id")));

        // Every row is bound to a tenant, directly or through its parent.
        for rt in ResourceType::ALL {
            let spec = rt.spec();
            if !matches!(rt, ResourceType::Tenant | ResourceType::StorageObject) {
                assert!(spec.tenant_bound(), "{rt} is unbound");
            }
        }
    }

    #[test]
    fn test_parse_by_name_or_table() {
        assert_eq!(ResourceType::parse("event_rsvp"), Some(ResourceType::EventRsvp));
        assert_eq!(ResourceType::parse("event_rsvps"), Some(ResourceType::EventRsvp));
        assert_eq!(ResourceType::parse("nope"), None);
    }

    #[test]
    fn test_every_type_has_a_unique_table() {
        let mut tables: Vec<_> = ResourceType::ALL.iter().map(|rt| rt.table()).collect();
        tables.sort();
        tables.dedup();
        assert_eq!(tables.len(), ResourceType::ALL.len());
    }

    #[test]
    fn test_registry() {
        let registry = TypeRegistry::from_types([ResourceType::Event]);
        assert!(registry.contains(ResourceType::Event));
        assert!(!registry.contains(ResourceType::Badge));
        assert_eq!(TypeRegistry::standard().len(), ResourceType::ALL.len());
    }

    #[test]
    fn test_resource_missing_column_is_null() {
        let row = Resource::new(ResourceType::Article).with("status", "draft");
        assert_eq!(row.get("status"), &Value::from("draft"));
        assert_eq!(row.get("tenant_id"), &Value::Null);
    }

    #[test]
    fn test_value_sql_escaping() {
        assert_eq!(Value::from("it's").to_sql(), "'it''s'");
        assert_eq!(Value::from(true).to_sql(), "true");
        assert_eq!(Value::Null.to_sql(), "NULL");
    }

    #[test]
    fn test_owner_segment() {
        assert_eq!(owner_segment("u1/pic.png"), Some("u1"));
        assert_eq!(owner_segment("u1/a/b.png"), Some("u1"));
        assert_eq!(owner_segment("pic.png"), None);
        assert_eq!(owner_segment("/pic.png"), None);
    }

    #[test]
    fn test_storage_object_row() {
        let row = StorageObject::new("profile-avatars", "u1/pic.png").to_resource();
        assert_eq!(row.resource_type, ResourceType::StorageObject);
        assert_eq!(row.get("bucket_id").as_text(), Some("profile-avatars"));
        assert_eq!(row.get("name").as_text(), Some("u1/pic.png"));
    }

    #[test]
    fn test_related_rows_lookup() {
        let rows = vec![
            Resource::new(ResourceType::Event)
                .with("id", "e1")
                .with("tenant_id", "t1"),
        ];
        assert!(rows.find(ResourceType::Event, "e1").is_some());
        assert!(rows.find(ResourceType::Event, "e2").is_none());
        assert!(rows.find(ResourceType::ForumThread, "e1").is_none());
    }
}
