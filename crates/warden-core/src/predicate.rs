//! Composable capability checks.
//!
//! A [`Predicate`] is a small boolean expression over a subject and a row.
//! The same value is used three ways:
//!
//! - evaluated in-process through an [`Evaluation`],
//! - rendered to the target's SQL dialect with [`Predicate::to_sql`],
//! - inspected structurally by the catalog validator
//!   ([`Predicate::requires_tenant_match`] and friends).
//!
//! Conjunctions and disjunctions built through [`Predicate::and`] and
//! [`Predicate::or`] keep their operands sorted by [`Predicate::cost`], so a
//! wrong-tenant row is rejected before any role or verification lookup runs.

use std::cell::OnceCell;

use serde::{Deserialize, Serialize};

use crate::resource::{RelatedRows, Resource, ResourceType, Value, owner_segment};
use crate::subject::Capabilities;

// ============================================================================
// Predicate AST
// ============================================================================

/// A boolean condition over the acting subject and a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Always true.
    Always,
    /// `column` equals the subject's tenant.
    TenantMatches {
        /// Column holding the row's tenant.
        column: String,
    },
    /// `column` equals the subject's id.
    SubjectIs {
        /// Ownership column.
        column: String,
    },
    /// `column` equals a literal.
    Equals {
        /// Compared column.
        column: String,
        /// Expected value.
        value: Value,
    },
    /// `column` is one of the listed literals.
    OneOf {
        /// Compared column.
        column: String,
        /// Accepted values.
        values: Vec<Value>,
    },
    /// The object path's first folder equals the subject's id.
    PathOwner,
    /// Subject is a tenant admin or above.
    IsAdmin,
    /// Subject is a platform-wide admin.
    IsSuperAdmin,
    /// Subject's account is verified.
    IsVerified,
    /// The parent row referenced by `foreign_key` belongs to the subject's tenant.
    ParentInTenant {
        /// Parent resource type.
        parent: ResourceType,
        /// Column referencing the parent's id.
        foreign_key: String,
    },
    /// All operands hold.
    And(Vec<Predicate>),
    /// At least one operand holds.
    Or(Vec<Predicate>),
    /// Operand does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// `tenant_id = tenant_of(subject)`.
    pub fn tenant() -> Self {
        Self::TenantMatches {
            column: "tenant_id".to_string(),
        }
    }

    /// `column = subject.id`.
    pub fn owner(column: impl Into<String>) -> Self {
        Self::SubjectIs {
            column: column.into(),
        }
    }

    /// `column = value`.
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    /// `column IN (values...)`.
    pub fn one_of<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::OneOf {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// First path folder equals the subject's id.
    pub fn path_owner() -> Self {
        Self::PathOwner
    }

    /// Subject is admin.
    pub fn is_admin() -> Self {
        Self::IsAdmin
    }

    /// Subject is super admin.
    pub fn is_super_admin() -> Self {
        Self::IsSuperAdmin
    }

    /// Subject is verified.
    pub fn is_verified() -> Self {
        Self::IsVerified
    }

    /// Parent row (through `foreign_key`) is in the subject's tenant.
    pub fn parent_in_tenant(parent: ResourceType, foreign_key: impl Into<String>) -> Self {
        Self::ParentInTenant {
            parent,
            foreign_key: foreign_key.into(),
        }
    }

    /// Conjunction, flattened and ordered cheapest first.
    pub fn and(operands: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for p in operands {
            match p {
                Self::And(inner) => flat.extend(inner),
                Self::Always => {}
                other => flat.push(other),
            }
        }
        flat.sort_by_key(Predicate::cost);
        match flat.len() {
            0 => Self::Always,
            1 => flat.remove(0),
            _ => Self::And(flat),
        }
    }

    /// Disjunction, flattened and ordered cheapest first.
    pub fn or(operands: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for p in operands {
            match p {
                Self::Or(inner) => flat.extend(inner),
                Self::Always => return Self::Always,
                other => flat.push(other),
            }
        }
        flat.sort_by_key(Predicate::cost);
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::Or(flat)
        }
    }

    /// Negation.
    pub fn negate(inner: Predicate) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Relative evaluation cost, used to order operands.
    ///
    /// Tenant equality < column comparison < role < verification < related-row lookup.
    pub fn cost(&self) -> u8 {
        match self {
            Self::Always => 0,
            Self::TenantMatches { .. } => 1,
            Self::SubjectIs { .. }
            | Self::Equals { .. }
            | Self::OneOf { .. }
            | Self::PathOwner => 2,
            Self::IsAdmin | Self::IsSuperAdmin => 3,
            Self::IsVerified => 4,
            Self::ParentInTenant { .. } => 5,
            Self::And(ops) | Self::Or(ops) => ops.iter().map(Predicate::cost).max().unwrap_or(0),
            Self::Not(inner) => inner.cost(),
        }
    }

    // ------------------------------------------------------------------------
    // Structural queries
    // ------------------------------------------------------------------------

    /// True when every way of satisfying this predicate satisfies a leaf
    /// accepted by `leaf`.
    ///
    /// A conjunction requires it if any operand does; a disjunction only if
    /// all branches do. Negations never count.
    pub fn requires(&self, leaf: &dyn Fn(&Predicate) -> bool) -> bool {
        match self {
            Self::And(ops) => ops.iter().any(|p| p.requires(leaf)),
            Self::Or(ops) => !ops.is_empty() && ops.iter().all(|p| p.requires(leaf)),
            Self::Not(_) => false,
            other => leaf(other),
        }
    }

    /// Always pins the row (or its parent) to the subject's tenant.
    pub fn requires_tenant_match(&self) -> bool {
        self.requires(&|p| {
            matches!(
                p,
                Self::TenantMatches { .. } | Self::ParentInTenant { .. }
            )
        })
    }

    /// Always pins `column` to the subject's id.
    pub fn requires_owner(&self, column: &str) -> bool {
        self.requires(&|p| matches!(p, Self::SubjectIs { column: c } if c == column))
    }

    /// Always pins the object path to the subject's id.
    pub fn requires_path_owner(&self) -> bool {
        self.requires(&|p| matches!(p, Self::PathOwner))
    }

    /// Always requires admin (or super admin).
    pub fn requires_admin(&self) -> bool {
        self.requires(&|p| matches!(p, Self::IsAdmin | Self::IsSuperAdmin))
    }

    /// Always requires a verified subject.
    pub fn requires_verified(&self) -> bool {
        self.requires(&|p| matches!(p, Self::IsVerified))
    }

    /// Whether `column` appears anywhere in the predicate.
    pub fn mentions_column(&self, column: &str) -> bool {
        match self {
            Self::TenantMatches { column: c }
            | Self::SubjectIs { column: c }
            | Self::Equals { column: c, .. }
            | Self::OneOf { column: c, .. } => c == column,
            Self::ParentInTenant { foreign_key, .. } => foreign_key == column,
            Self::PathOwner => column == "name",
            Self::And(ops) | Self::Or(ops) => ops.iter().any(|p| p.mentions_column(column)),
            Self::Not(inner) => inner.mentions_column(column),
            Self::Always | Self::IsAdmin | Self::IsSuperAdmin | Self::IsVerified => false,
        }
    }

    /// Literal text values compared against `column`, in order of appearance.
    pub fn literals_for(&self, column: &str) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_literals(column, &mut out);
        out
    }

    fn collect_literals<'a>(&'a self, column: &str, out: &mut Vec<&'a str>) {
        match self {
            Self::Equals { column: c, value } if c == column => {
                out.extend(value.as_text());
            }
            Self::OneOf { column: c, values } if c == column => {
                out.extend(values.iter().filter_map(Value::as_text));
            }
            Self::And(ops) | Self::Or(ops) => {
                for p in ops {
                    p.collect_literals(column, out);
                }
            }
            Self::Not(inner) => inner.collect_literals(column, out),
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // SQL rendering
    // ------------------------------------------------------------------------

    /// Render as a SQL boolean expression for a policy on `table`.
    pub fn to_sql(&self, table: &str) -> String {
        match self {
            Self::Always => "true".to_string(),
            Self::TenantMatches { column } => format!("{column} = public.get_user_tenant_id()"),
            Self::SubjectIs { column } => format!("{column} = auth.uid()"),
            Self::Equals { column, value } => format!("{column} = {}", value.to_sql()),
            Self::OneOf { values, .. } if values.is_empty() => "false".to_string(),
            Self::OneOf { column, values } => {
                let list: Vec<String> = values.iter().map(Value::to_sql).collect();
                format!("{column} IN ({})", list.join(", "))
            }
            Self::PathOwner => "(storage.foldername(name))[1] = auth.uid()::text".to_string(),
            Self::IsAdmin => "public.is_admin()".to_string(),
            Self::IsSuperAdmin => {
                "EXISTS (SELECT 1 FROM users WHERE id = auth.uid() AND role = 'super_admin')"
                    .to_string()
            }
            Self::IsVerified => "public.is_verified()".to_string(),
            Self::ParentInTenant {
                parent,
                foreign_key,
            } => {
                let pt = parent.table();
                format!(
                    "EXISTS (SELECT 1 FROM {pt} WHERE {pt}.id = {table}.{foreign_key} \
                     AND {pt}.tenant_id = public.get_user_tenant_id())"
                )
            }
            Self::And(ops) => join_sql(ops, " AND ", table),
            Self::Or(ops) if ops.is_empty() => "false".to_string(),
            Self::Or(ops) => join_sql(ops, " OR ", table),
            Self::Not(inner) => format!("NOT ({})", inner.to_sql(table)),
        }
    }
}

fn join_sql(ops: &[Predicate], sep: &str, table: &str) -> String {
    ops.iter()
        .map(|p| match p {
            Predicate::And(_) | Predicate::Or(_) => format!("({})", p.to_sql(table)),
            _ => p.to_sql(table),
        })
        .collect::<Vec<_>>()
        .join(sep)
}

// ============================================================================
// Evaluation
// ============================================================================

/// One access check against one subject.
///
/// Capability lookups are cached for the lifetime of the evaluation only.
/// Build a fresh `Evaluation` per request: subject state may change between
/// requests.
pub struct Evaluation<'a, C: Capabilities + ?Sized> {
    subject: &'a C,
    related: Option<&'a dyn RelatedRows>,
    admin: OnceCell<bool>,
    super_admin: OnceCell<bool>,
    verified: OnceCell<bool>,
}

impl<'a, C: Capabilities + ?Sized> Evaluation<'a, C> {
    /// Starts an access check for `subject`.
    pub fn new(subject: &'a C) -> Self {
        Self {
            subject,
            related: None,
            admin: OnceCell::new(),
            super_admin: OnceCell::new(),
            verified: OnceCell::new(),
        }
    }

    /// Supplies parent rows for tenancy inherited through foreign keys.
    pub fn with_related(mut self, related: &'a dyn RelatedRows) -> Self {
        self.related = Some(related);
        self
    }

    /// Cached `is_admin`.
    pub fn is_admin(&self) -> bool {
        *self.admin.get_or_init(|| self.subject.is_admin())
    }

    /// Cached `is_super_admin`.
    pub fn is_super_admin(&self) -> bool {
        *self.super_admin.get_or_init(|| self.subject.is_super_admin())
    }

    /// Cached `is_verified`.
    pub fn is_verified(&self) -> bool {
        *self.verified.get_or_init(|| self.subject.is_verified())
    }

    /// Evaluate `predicate` against `row`.
    pub fn check(&self, predicate: &Predicate, row: &Resource) -> bool {
        match predicate {
            Predicate::Always => true,
            Predicate::TenantMatches { column } => {
                matches_text(row.get(column), self.subject.tenant_of())
            }
            Predicate::SubjectIs { column } => {
                matches_text(row.get(column), self.subject.subject_id())
            }
            Predicate::Equals { column, value } => {
                *value != Value::Null && row.get(column) == value
            }
            Predicate::OneOf { column, values } => {
                let actual = row.get(column);
                *actual != Value::Null && values.contains(actual)
            }
            Predicate::PathOwner => {
                let segment = row.get("name").as_text().and_then(owner_segment);
                segment.is_some() && segment == self.subject.subject_id()
            }
            Predicate::IsAdmin => self.is_admin(),
            Predicate::IsSuperAdmin => self.is_super_admin(),
            Predicate::IsVerified => self.is_verified(),
            Predicate::ParentInTenant {
                parent,
                foreign_key,
            } => {
                let (Some(related), Some(parent_id)) =
                    (self.related, row.get(foreign_key).as_text())
                else {
                    return false;
                };
                related
                    .find(*parent, parent_id)
                    .is_some_and(|p| matches_text(p.get("tenant_id"), self.subject.tenant_of()))
            }
            Predicate::And(ops) => ops.iter().all(|p| self.check(p, row)),
            Predicate::Or(ops) => ops.iter().any(|p| self.check(p, row)),
            Predicate::Not(inner) => !self.check(inner, row),
        }
    }
}

fn matches_text(value: &Value, expected: Option<&str>) -> bool {
    match (value.as_text(), expected) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::subject::Subject;
    use std::cell::Cell;

    /// Capabilities that count how often each lookup runs.
    struct Counting {
        admin_calls: Cell<u32>,
        verified_calls: Cell<u32>,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                admin_calls: Cell::new(0),
                verified_calls: Cell::new(0),
            }
        }
    }

    impl Capabilities for Counting {
        fn subject_id(&self) -> Option<&str> {
            Some("u1")
        }
        fn tenant_of(&self) -> Option<&str> {
            Some("t1")
        }
        fn is_admin(&self) -> bool {
            self.admin_calls.set(self.admin_calls.get() + 1);
            true
        }
        fn is_super_admin(&self) -> bool {
            false
        }
        fn is_verified(&self) -> bool {
            self.verified_calls.set(self.verified_calls.get() + 1);
            true
        }
    }

    fn article(tenant: &str) -> Resource {
        Resource::new(ResourceType::Article)
            .with("tenant_id", tenant)
            .with("author_id", "u1")
            .with("status", "published")
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    #[test]
    fn test_and_orders_cheapest_first() {
        let p = Predicate::and([
            Predicate::is_verified(),
            Predicate::owner("seller_id"),
            Predicate::tenant(),
        ]);
        assert_eq!(
            p,
            Predicate::And(vec![
                Predicate::tenant(),
                Predicate::owner("seller_id"),
                Predicate::IsVerified,
            ])
        );
    }

    #[test]
    fn test_and_flattens_and_drops_always() {
        let p = Predicate::and([
            Predicate::Always,
            Predicate::and([Predicate::tenant(), Predicate::is_admin()]),
        ]);
        assert_eq!(p, Predicate::And(vec![Predicate::tenant(), Predicate::IsAdmin]));
        assert_eq!(Predicate::and([]), Predicate::Always);
        assert_eq!(Predicate::and([Predicate::IsAdmin]), Predicate::IsAdmin);
    }

    #[test]
    fn test_or_with_always_is_always() {
        assert_eq!(
            Predicate::or([Predicate::IsAdmin, Predicate::Always]),
            Predicate::Always
        );
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    #[test]
    fn test_tenant_match() {
        let subject = Subject::member("u1", "t1");
        let eval = Evaluation::new(&subject);
        assert!(eval.check(&Predicate::tenant(), &article("t1")));
        assert!(!eval.check(&Predicate::tenant(), &article("t2")));
    }

    #[test]
    fn test_anonymous_never_matches_tenant_or_owner() {
        let subject = Subject::anonymous();
        let eval = Evaluation::new(&subject);
        let row = Resource::new(ResourceType::Article);
        assert!(!eval.check(&Predicate::tenant(), &row));
        assert!(!eval.check(&Predicate::owner("author_id"), &row));
    }

    #[test]
    fn test_null_never_equals() {
        let subject = Subject::member("u1", "t1");
        let eval = Evaluation::new(&subject);
        let row = Resource::new(ResourceType::Article);
        assert!(!eval.check(&Predicate::equals("status", Value::Null), &row));
        assert!(!eval.check(&Predicate::one_of("status", ["published"]), &row));
    }

    #[test]
    fn test_short_circuit_on_wrong_tenant() {
        let subject = Counting::new();
        let eval = Evaluation::new(&subject);
        let p = Predicate::and([Predicate::is_verified(), Predicate::is_admin(), Predicate::tenant()]);

        assert!(!eval.check(&p, &article("other")));
        assert_eq!(subject.admin_calls.get(), 0);
        assert_eq!(subject.verified_calls.get(), 0);
    }

    #[test]
    fn test_capabilities_cached_within_one_check() {
        let subject = Counting::new();
        let eval = Evaluation::new(&subject);
        let p = Predicate::and([Predicate::is_admin(), Predicate::tenant()]);

        assert!(eval.check(&p, &article("t1")));
        assert!(eval.check(&p, &article("t1")));
        assert_eq!(subject.admin_calls.get(), 1);

        // A new evaluation looks the capability up again.
        let again = Evaluation::new(&subject);
        assert!(again.is_admin());
        assert_eq!(subject.admin_calls.get(), 2);
    }

    #[test]
    fn test_path_owner() {
        let subject = Subject::member("u1", "t1");
        let eval = Evaluation::new(&subject);
        let own = crate::StorageObject::new("profile-avatars", "u1/pic.png").to_resource();
        let other = crate::StorageObject::new("profile-avatars", "u2/pic.png").to_resource();
        let root = crate::StorageObject::new("profile-avatars", "pic.png").to_resource();
        assert!(eval.check(&Predicate::path_owner(), &own));
        assert!(!eval.check(&Predicate::path_owner(), &other));
        assert!(!eval.check(&Predicate::path_owner(), &root));
    }

    #[test]
    fn test_parent_in_tenant() {
        let subject = Subject::member("u1", "t1");
        let parents = vec![
            Resource::new(ResourceType::Event)
                .with("id", "e1")
                .with("tenant_id", "t1"),
            Resource::new(ResourceType::Event)
                .with("id", "e2")
                .with("tenant_id", "t2"),
        ];
        let eval = Evaluation::new(&subject).with_related(&parents);
        let p = Predicate::parent_in_tenant(ResourceType::Event, "event_id");

        let rsvp = |event: &str| Resource::new(ResourceType::EventRsvp).with("event_id", event);
        assert!(eval.check(&p, &rsvp("e1")));
        assert!(!eval.check(&p, &rsvp("e2")));
        assert!(!eval.check(&p, &rsvp("missing")));

        // Without related rows the lookup fails closed.
        let bare = Evaluation::new(&subject);
        assert!(!bare.check(&p, &rsvp("e1")));
    }

    #[test]
    fn test_not() {
        let subject = Subject::member("u1", "t1");
        let eval = Evaluation::new(&subject);
        assert!(eval.check(&Predicate::negate(Predicate::IsAdmin), &article("t1")));
    }

    // ------------------------------------------------------------------------
    // Structural queries
    // ------------------------------------------------------------------------

    #[test]
    fn test_requires_tenant_match() {
        assert!(Predicate::and([Predicate::tenant(), Predicate::IsAdmin]).requires_tenant_match());
        assert!(
            Predicate::and([
                Predicate::tenant(),
                Predicate::or([Predicate::owner("organizer_id"), Predicate::IsAdmin]),
            ])
            .requires_tenant_match()
        );
        assert!(!Predicate::or([Predicate::tenant(), Predicate::IsAdmin]).requires_tenant_match());
        assert!(!Predicate::negate(Predicate::tenant()).requires_tenant_match());
        assert!(
            Predicate::parent_in_tenant(ResourceType::Event, "event_id").requires_tenant_match()
        );
    }

    #[test]
    fn test_requires_owner_or_admin() {
        let p = Predicate::or([Predicate::owner("organizer_id"), Predicate::IsAdmin]);
        assert!(!p.requires_owner("organizer_id"));
        assert!(!p.requires_admin());
        assert!(p.requires(&|leaf| {
            matches!(leaf, Predicate::IsAdmin)
                || matches!(leaf, Predicate::SubjectIs { column } if column == "organizer_id")
        }));
    }

    #[test]
    fn test_literals_for() {
        let p = Predicate::and([
            Predicate::one_of("bucket_id", ["a", "b"]),
            Predicate::equals("bucket_id", "c"),
            Predicate::equals("status", "x"),
        ]);
        assert_eq!(p.literals_for("bucket_id"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_mentions_column() {
        let p = Predicate::and([Predicate::tenant(), Predicate::equals("event_type", "public")]);
        assert!(p.mentions_column("event_type"));
        assert!(!p.mentions_column("status"));
    }

    // ------------------------------------------------------------------------
    // SQL rendering
    // ------------------------------------------------------------------------

    #[test]
    fn test_sql_rendering() {
        let p = Predicate::and([
            Predicate::or([Predicate::owner("organizer_id"), Predicate::is_admin()]),
            Predicate::tenant(),
        ]);
        assert_eq!(
            p.to_sql("events"),
            "tenant_id = public.get_user_tenant_id() AND (organizer_id = auth.uid() OR public.is_admin())"
        );
    }

    #[test]
    fn test_sql_parent_and_path() {
        let p = Predicate::parent_in_tenant(ResourceType::Event, "event_id");
        assert_eq!(
            p.to_sql("event_rsvps"),
            "EXISTS (SELECT 1 FROM events WHERE events.id = event_rsvps.event_id \
             AND events.tenant_id = public.get_user_tenant_id())"
        );
        assert_eq!(
            Predicate::path_owner().to_sql("storage.objects"),
            "(storage.foldername(name))[1] = auth.uid()::text"
        );
        assert_eq!(
            Predicate::one_of("bucket_id", ["a", "b"]).to_sql("storage.objects"),
            "bucket_id IN ('a', 'b')"
        );
    }

    #[test]
    fn test_empty_one_of_is_false() {
        let p = Predicate::one_of("bucket_id", Vec::<&str>::new());
        assert_eq!(p.to_sql("storage.objects"), "false");

        let subject = Subject::anonymous();
        let object = crate::StorageObject::new("docs", "u1/a.pdf").to_resource();
        assert!(!Evaluation::new(&subject).check(&p, &object));
    }

    #[test]
    fn test_predicate_serializes() {
        let p = Predicate::and([Predicate::tenant(), Predicate::IsAdmin]);
        let json = serde_json::to_string(&p).unwrap();
        let back: Predicate = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
