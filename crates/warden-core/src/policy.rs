//! Named access rules and their combined evaluation.
//!
//! A [`Policy`] gates one action on one resource type. Several policies may
//! target the same `(resource type, action)` pair; [`PolicySet::authorize`]
//! combines them with OR, the way a row-security evaluator treats permissive
//! policies. A policy for [`Action::All`] applies to each of the four
//! concrete actions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::predicate::{Evaluation, Predicate};
use crate::resource::{RelatedRows, Resource, ResourceType};
use crate::subject::Capabilities;

// ============================================================================
// Actions
// ============================================================================

/// Operation a policy gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read existing rows.
    Select,
    /// Create rows.
    Insert,
    /// Modify rows.
    Update,
    /// Remove rows.
    Delete,
    /// Every action above.
    All,
}

impl Action {
    /// The four concrete actions.
    pub const CONCRETE: [Action; 4] = [Action::Select, Action::Insert, Action::Update, Action::Delete];

    /// Whether a policy for `self` applies to the concrete `action`.
    pub fn covers(self, action: Action) -> bool {
        self == Action::All || self == action
    }

    /// Whether this action can change data.
    pub fn is_mutating(self) -> bool {
        self != Action::Select
    }

    /// SQL keyword used in `FOR <action>`.
    pub fn sql_keyword(self) -> &'static str {
        match self {
            Action::Select => "SELECT",
            Action::Insert => "INSERT",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::All => "ALL",
        }
    }

    /// Parses a lowercase action name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Some(Action::Select),
            "insert" => Some(Action::Insert),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            "all" => Some(Action::All),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_keyword().to_ascii_lowercase())
    }
}

// ============================================================================
// Policy
// ============================================================================

/// A declarative rule gating one action on one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique policy name.
    pub name: String,
    /// Guarded resource type.
    pub resource_type: ResourceType,
    /// Gated action.
    pub action: Action,
    /// Condition on existing rows.
    pub using: Option<Predicate>,
    /// Condition on new or modified row values.
    pub check: Option<Predicate>,
    /// Intentionally not scoped to the subject's tenant.
    pub tenant_global: bool,
}

impl Policy {
    /// A policy with no predicates yet.
    pub fn new(name: impl Into<String>, resource_type: ResourceType, action: Action) -> Self {
        Self {
            name: name.into(),
            resource_type,
            action,
            using: None,
            check: None,
            tenant_global: false,
        }
    }

    /// `FOR SELECT` policy.
    pub fn select(name: impl Into<String>, resource_type: ResourceType) -> Self {
        Self::new(name, resource_type, Action::Select)
    }

    /// `FOR INSERT` policy.
    pub fn insert(name: impl Into<String>, resource_type: ResourceType) -> Self {
        Self::new(name, resource_type, Action::Insert)
    }

    /// `FOR UPDATE` policy.
    pub fn update(name: impl Into<String>, resource_type: ResourceType) -> Self {
        Self::new(name, resource_type, Action::Update)
    }

    /// `FOR DELETE` policy.
    pub fn delete(name: impl Into<String>, resource_type: ResourceType) -> Self {
        Self::new(name, resource_type, Action::Delete)
    }

    /// `FOR ALL` policy.
    pub fn all(name: impl Into<String>, resource_type: ResourceType) -> Self {
        Self::new(name, resource_type, Action::All)
    }

    /// Sets the using predicate.
    pub fn using(mut self, predicate: Predicate) -> Self {
        self.using = Some(predicate);
        self
    }

    /// Sets the check predicate.
    pub fn check(mut self, predicate: Predicate) -> Self {
        self.check = Some(predicate);
        self
    }

    /// Marks the policy as intentionally tenant-global.
    pub fn tenant_global(mut self) -> Self {
        self.tenant_global = true;
        self
    }

    /// Target table.
    pub fn table(&self) -> &'static str {
        self.resource_type.table()
    }

    /// Predicate applied to new row values: the check, or the using
    /// predicate when no check is given.
    pub fn effective_check(&self) -> Option<&Predicate> {
        self.check.as_ref().or(self.using.as_ref())
    }

    /// `CREATE POLICY` statement for this rule.
    pub fn to_sql(&self) -> String {
        let table = self.table();
        let mut sql = format!(
            "CREATE POLICY \"{}\" ON {table} FOR {}",
            self.name.replace('"', "\"\""),
            self.action.sql_keyword()
        );
        if self.action != Action::Insert {
            if let Some(using) = &self.using {
                sql.push_str(&format!(" USING ({})", using.to_sql(table)));
            }
        }
        if let Some(check) = &self.check {
            sql.push_str(&format!(" WITH CHECK ({})", check.to_sql(table)));
        }
        sql.push(';');
        sql
    }
}

// ============================================================================
// Access requests and decisions
// ============================================================================

/// One attempted access, described by the rows involved.
#[derive(Clone, Copy)]
pub struct AccessRequest<'a> {
    /// Concrete action attempted.
    pub action: Action,
    /// Row as it exists (select, update, delete).
    pub existing: Option<&'a Resource>,
    /// Row as it would be written (insert, update).
    pub proposed: Option<&'a Resource>,
    /// Parent rows for inherited tenancy.
    pub related: Option<&'a dyn RelatedRows>,
}

impl<'a> AccessRequest<'a> {
    /// Read `row`.
    pub fn select(row: &'a Resource) -> Self {
        Self::new(Action::Select, Some(row), None)
    }

    /// Create `row`.
    pub fn insert(row: &'a Resource) -> Self {
        Self::new(Action::Insert, None, Some(row))
    }

    /// Change `old` into `new`.
    pub fn update(old: &'a Resource, new: &'a Resource) -> Self {
        Self::new(Action::Update, Some(old), Some(new))
    }

    /// Remove `row`.
    pub fn delete(row: &'a Resource) -> Self {
        Self::new(Action::Delete, Some(row), None)
    }

    fn new(action: Action, existing: Option<&'a Resource>, proposed: Option<&'a Resource>) -> Self {
        Self {
            action,
            existing,
            proposed,
            related: None,
        }
    }

    /// Supplies parent rows.
    pub fn with_related(mut self, related: &'a dyn RelatedRows) -> Self {
        self.related = Some(related);
        self
    }

    /// Type of the rows involved.
    pub fn resource_type(&self) -> Option<ResourceType> {
        self.existing.or(self.proposed).map(|r| r.resource_type)
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Decision {
    /// Whether access is granted.
    pub allowed: bool,
    /// Names of the policies that granted it.
    pub granted_by: Vec<String>,
}

impl Decision {
    /// A denial.
    pub fn deny() -> Self {
        Self::default()
    }

    fn from_grants(granted_by: Vec<String>) -> Self {
        Self {
            allowed: !granted_by.is_empty(),
            granted_by,
        }
    }
}

// ============================================================================
// Policy set
// ============================================================================

/// An ordered collection of policies evaluated together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Wraps `policies`.
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    /// Appends a policy.
    pub fn push(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    /// Policies in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Policies that apply to `action` on `resource_type`.
    pub fn matching(
        &self,
        resource_type: ResourceType,
        action: Action,
    ) -> impl Iterator<Item = &Policy> {
        self.policies
            .iter()
            .filter(move |p| p.resource_type == resource_type && p.action.covers(action))
    }

    /// Decide `request` for `subject`.
    ///
    /// Select and delete pass when any matching using predicate accepts the
    /// existing row. Insert passes when any matching check accepts the new
    /// row. Update needs both: some using predicate accepting the old row and
    /// some check accepting the new one. Without a matching policy the
    /// request is denied.
    pub fn authorize<C: Capabilities + ?Sized>(
        &self,
        subject: &C,
        request: &AccessRequest<'_>,
    ) -> Decision {
        let Some(resource_type) = request.resource_type() else {
            return Decision::deny();
        };

        let mut eval = Evaluation::new(subject);
        if let Some(related) = request.related {
            eval = eval.with_related(related);
        }

        let grants_using = |row: &Resource| -> Vec<String> {
            self.matching(resource_type, request.action)
                .filter(|p| p.using.as_ref().is_some_and(|u| eval.check(u, row)))
                .map(|p| p.name.clone())
                .collect()
        };
        let grants_check = |row: &Resource| -> Vec<String> {
            self.matching(resource_type, request.action)
                .filter(|p| p.effective_check().is_some_and(|c| eval.check(c, row)))
                .map(|p| p.name.clone())
                .collect()
        };

        match (request.action, request.existing, request.proposed) {
            (Action::Select | Action::Delete, Some(row), _) => {
                Decision::from_grants(grants_using(row))
            }
            (Action::Insert, _, Some(row)) => Decision::from_grants(grants_check(row)),
            (Action::Update, Some(old), Some(new)) => {
                let visible = grants_using(old);
                if visible.is_empty() || grants_check(new).is_empty() {
                    Decision::deny()
                } else {
                    Decision::from_grants(visible)
                }
            }
            _ => Decision::deny(),
        }
    }
}

impl From<Vec<Policy>> for PolicySet {
    fn from(policies: Vec<Policy>) -> Self {
        Self::new(policies)
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<I: IntoIterator<Item = Policy>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
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

    fn marketplace() -> PolicySet {
        PolicySet::new(vec![
            Policy::select("Approved items are viewable", ResourceType::MarketplaceItem)
                .using(Predicate::and([
                    Predicate::tenant(),
                    Predicate::equals("status", "approved"),
                ])),
            Policy::select("Sellers can view own items", ResourceType::MarketplaceItem)
                .using(Predicate::and([Predicate::tenant(), Predicate::owner("seller_id")])),
            Policy::insert("Verified users can create items", ResourceType::MarketplaceItem)
                .check(Predicate::and([
                    Predicate::is_verified(),
                    Predicate::tenant(),
                    Predicate::owner("seller_id"),
                ])),
            Policy::update("Sellers can update own items", ResourceType::MarketplaceItem)
                .using(Predicate::and([Predicate::tenant(), Predicate::owner("seller_id")]))
                .check(Predicate::and([Predicate::tenant(), Predicate::owner("seller_id")])),
            Policy::all("Admins can manage items", ResourceType::MarketplaceItem)
                .using(Predicate::and([Predicate::is_admin(), Predicate::tenant()])),
        ])
    }

    fn item(tenant: &str, seller: &str, status: &str) -> Resource {
        Resource::new(ResourceType::MarketplaceItem)
            .with("tenant_id", tenant)
            .with("seller_id", seller)
            .with("status", status)
    }

    #[test]
    fn test_action_covers() {
        assert!(Action::All.covers(Action::Delete));
        assert!(Action::Select.covers(Action::Select));
        assert!(!Action::Select.covers(Action::Insert));
        assert_eq!(Action::parse("UPDATE"), Some(Action::Update));
        assert_eq!(Action::parse("merge"), None);
    }

    #[test]
    fn test_select_is_or_of_matching_policies() {
        let set = marketplace();
        let seller = Subject::member("u1", "t1");

        let pending_own = item("t1", "u1", "pending");
        let decision = set.authorize(&seller, &AccessRequest::select(&pending_own));
        assert!(decision.allowed);
        assert_eq!(decision.granted_by, vec!["Sellers can view own items"]);

        let approved_other = item("t1", "u2", "approved");
        assert!(set.authorize(&seller, &AccessRequest::select(&approved_other)).allowed);

        let pending_other = item("t1", "u2", "pending");
        assert!(!set.authorize(&seller, &AccessRequest::select(&pending_other)).allowed);
    }

    #[test]
    fn test_insert_requires_self_assignment() {
        let set = marketplace();
        let seller = Subject::member("u1", "t1").verified();

        let own = item("t1", "u1", "pending");
        assert!(set.authorize(&seller, &AccessRequest::insert(&own)).allowed);

        let forged = item("t1", "u2", "pending");
        assert!(!set.authorize(&seller, &AccessRequest::insert(&forged)).allowed);
    }

    #[test]
    fn test_insert_requires_verification() {
        let set = marketplace();
        let pending = Subject::member("u1", "t1");
        let own = item("t1", "u1", "pending");
        assert!(!set.authorize(&pending, &AccessRequest::insert(&own)).allowed);
    }

    #[test]
    fn test_update_checks_old_and_new_rows() {
        let set = marketplace();
        let seller = Subject::member("u1", "t1");

        let old = item("t1", "u1", "pending");
        let keep = item("t1", "u1", "sold");
        assert!(set.authorize(&seller, &AccessRequest::update(&old, &keep)).allowed);

        let give_away = item("t1", "u2", "sold");
        assert!(!set.authorize(&seller, &AccessRequest::update(&old, &give_away)).allowed);
    }

    #[test]
    fn test_all_policy_expands_to_every_action() {
        let set = marketplace();
        let admin = Subject::admin("a1", "t1");
        let row = item("t1", "u9", "pending");
        let moved = item("t1", "u9", "rejected");

        assert!(set.authorize(&admin, &AccessRequest::select(&row)).allowed);
        assert!(set.authorize(&admin, &AccessRequest::insert(&row)).allowed);
        assert!(set.authorize(&admin, &AccessRequest::update(&row, &moved)).allowed);
        assert!(set.authorize(&admin, &AccessRequest::delete(&row)).allowed);

        let foreign = item("t2", "u9", "pending");
        assert!(!set.authorize(&admin, &AccessRequest::delete(&foreign)).allowed);
    }

    #[test]
    fn test_no_matching_policy_denies() {
        let set = marketplace();
        let admin = Subject::admin("a1", "t1");
        let doc = Resource::new(ResourceType::Document).with("tenant_id", "t1");
        assert_eq!(set.authorize(&admin, &AccessRequest::select(&doc)), Decision::deny());
    }

    #[test]
    fn test_policy_sql() {
        let insert = Policy::insert("Verified users can create events", ResourceType::Event).check(
            Predicate::and([
                Predicate::is_verified(),
                Predicate::tenant(),
                Predicate::owner("organizer_id"),
            ]),
        );
        assert_eq!(
            insert.to_sql(),
            "CREATE POLICY \"Verified users can create events\" ON events FOR INSERT \
             WITH CHECK (tenant_id = public.get_user_tenant_id() AND organizer_id = auth.uid() \
             AND public.is_verified());"
        );

        let update = Policy::update("Own", ResourceType::User)
            .using(Predicate::owner("id"))
            .check(Predicate::owner("id"));
        assert_eq!(
            update.to_sql(),
            "CREATE POLICY \"Own\" ON users FOR UPDATE USING (id = auth.uid()) WITH CHECK (id = auth.uid());"
        );
    }

    #[test]
    fn test_policy_name_quoting() {
        let p = Policy::select("say \"hi\"", ResourceType::Tenant).using(Predicate::Always);
        assert!(p.to_sql().starts_with("CREATE POLICY \"say \"\"hi\"\"\" ON tenants"));
    }

    #[test]
    fn test_effective_check_falls_back_to_using() {
        let p = Policy::all("x", ResourceType::Badge).using(Predicate::is_admin());
        assert_eq!(p.effective_check(), Some(&Predicate::IsAdmin));
    }
}
