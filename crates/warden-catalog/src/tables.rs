//! Row policies for the platform's tables.
//!
//! Policies are grouped by table and listed in deployment order. Mutating
//! rules that were historically tenant-agnostic (owner updates, badge and
//! points administration, moderation logs, RSVPs and forum posts) carry an
//! explicit tenant clause, directly or through their parent row.

use warden_core::{Policy, Predicate, ResourceType};

use ResourceType::*;

fn admin_in_tenant() -> Predicate {
    Predicate::and([Predicate::is_admin(), Predicate::tenant()])
}

fn verified_in_tenant() -> Predicate {
    Predicate::and([Predicate::tenant(), Predicate::is_verified()])
}

fn own_in_tenant(owner: &str) -> Predicate {
    Predicate::and([Predicate::tenant(), Predicate::owner(owner)])
}

fn verified_owner_in_tenant(owner: &str) -> Predicate {
    Predicate::and([
        Predicate::is_verified(),
        Predicate::tenant(),
        Predicate::owner(owner),
    ])
}

fn in_tenant_with_status(status: &str) -> Predicate {
    Predicate::and([Predicate::tenant(), Predicate::equals("status", status)])
}

/// Every row policy, in deployment order.
pub fn policies() -> Vec<Policy> {
    let mut out = Vec::new();
    out.extend(tenants());
    out.extend(users());
    out.extend(articles());
    out.extend(events());
    out.extend(marketplace());
    out.extend(professional_profiles());
    out.extend(forums());
    out.extend(tutorials());
    out.extend(documents());
    out.extend(gamification());
    out.extend(moderation());
    out
}

fn tenants() -> Vec<Policy> {
    vec![
        Policy::select("Tenants are viewable by everyone", Tenant)
            .using(Predicate::equals("is_active", true))
            .tenant_global(),
        Policy::all("Only super_admin can modify tenants", Tenant)
            .using(Predicate::is_super_admin())
            .tenant_global(),
    ]
}

fn users() -> Vec<Policy> {
    vec![
        Policy::select("Users can view verified users in same tenant", User).using(
            Predicate::and([
                Predicate::tenant(),
                Predicate::equals("verification_status", "approved"),
            ]),
        ),
        Policy::update("Users can update own profile", User)
            .using(own_in_tenant("id"))
            .check(own_in_tenant("id")),
        Policy::select("Admins can view all users", User).using(admin_in_tenant()),
        Policy::update("Admins can update users", User).using(admin_in_tenant()),
    ]
}

fn articles() -> Vec<Policy> {
    vec![
        Policy::select("Published articles are viewable", Article)
            .using(in_tenant_with_status("published")),
        Policy::select("Admins can view all articles", Article).using(admin_in_tenant()),
        Policy::all("Admins can manage articles", Article).using(admin_in_tenant()),
    ]
}

fn events() -> Vec<Policy> {
    let own_rsvp = || {
        Predicate::and([
            Predicate::owner("user_id"),
            Predicate::is_verified(),
            Predicate::parent_in_tenant(Event, "event_id"),
        ])
    };

    vec![
        Policy::select("Public events are viewable", Event).using(Predicate::and([
            Predicate::tenant(),
            Predicate::equals("event_type", "public"),
        ])),
        Policy::select("Private events for verified users", Event).using(Predicate::and([
            Predicate::tenant(),
            Predicate::or([
                Predicate::equals("event_type", "public"),
                Predicate::is_verified(),
            ]),
        ])),
        Policy::insert("Verified users can create events", Event)
            .check(verified_owner_in_tenant("organizer_id")),
        Policy::all("Organizers and admins can manage events", Event).using(Predicate::and([
            Predicate::tenant(),
            Predicate::or([Predicate::owner("organizer_id"), Predicate::is_admin()]),
        ])),
        // RSVPs inherit tenancy from their event.
        Policy::select("Users can view event RSVPs", EventRsvp)
            .using(Predicate::parent_in_tenant(Event, "event_id")),
        Policy::all("Users can manage own RSVPs", EventRsvp)
            .using(own_rsvp())
            .check(own_rsvp()),
    ]
}

fn marketplace() -> Vec<Policy> {
    vec![
        Policy::select("Approved marketplace items are viewable", MarketplaceItem)
            .using(in_tenant_with_status("approved")),
        Policy::select("Sellers can view own items", MarketplaceItem)
            .using(own_in_tenant("seller_id")),
        Policy::select("Admins can view all marketplace items", MarketplaceItem)
            .using(admin_in_tenant()),
        Policy::insert("Verified users can create marketplace items", MarketplaceItem)
            .check(verified_owner_in_tenant("seller_id")),
        Policy::update("Sellers can update own items", MarketplaceItem)
            .using(own_in_tenant("seller_id"))
            .check(own_in_tenant("seller_id")),
        Policy::update("Admins can update marketplace items", MarketplaceItem)
            .using(admin_in_tenant()),
    ]
}

fn professional_profiles() -> Vec<Policy> {
    vec![
        Policy::select("Approved profiles are viewable", ProfessionalProfile).using(
            Predicate::and([
                in_tenant_with_status("approved"),
                Predicate::is_verified(),
            ]),
        ),
        Policy::select("Users can view own profiles", ProfessionalProfile)
            .using(own_in_tenant("user_id")),
        Policy::insert("Verified users can create profiles", ProfessionalProfile)
            .check(verified_owner_in_tenant("user_id")),
        Policy::update("Users can update own profiles", ProfessionalProfile)
            .using(own_in_tenant("user_id"))
            .check(own_in_tenant("user_id")),
        Policy::all("Admins can manage profiles", ProfessionalProfile).using(admin_in_tenant()),
    ]
}

fn forums() -> Vec<Policy> {
    let thread_in_tenant = || Predicate::parent_in_tenant(ForumThread, "thread_id");

    vec![
        Policy::select("Forum categories viewable by verified users", ForumCategory)
            .using(verified_in_tenant()),
        Policy::select("Approved threads viewable", ForumThread).using(Predicate::and([
            in_tenant_with_status("approved"),
            Predicate::is_verified(),
        ])),
        Policy::insert("Verified users can create threads", ForumThread)
            .check(verified_owner_in_tenant("author_id")),
        Policy::update("Authors can update own threads", ForumThread)
            .using(own_in_tenant("author_id"))
            .check(own_in_tenant("author_id")),
        Policy::all("Admins can manage threads", ForumThread).using(admin_in_tenant()),
        // Posts inherit tenancy from their thread.
        Policy::select("Approved posts viewable", ForumPost).using(Predicate::and([
            Predicate::equals("status", "approved"),
            Predicate::is_verified(),
            thread_in_tenant(),
        ])),
        Policy::insert("Verified users can create posts", ForumPost).check(Predicate::and([
            Predicate::is_verified(),
            Predicate::owner("author_id"),
            thread_in_tenant(),
        ])),
        Policy::update("Authors can update own posts", ForumPost)
            .using(Predicate::and([Predicate::owner("author_id"), thread_in_tenant()]))
            .check(Predicate::and([Predicate::owner("author_id"), thread_in_tenant()])),
        Policy::all("Admins can manage posts", ForumPost)
            .using(Predicate::and([Predicate::is_admin(), thread_in_tenant()])),
    ]
}

fn tutorials() -> Vec<Policy> {
    vec![
        Policy::select("Verified users can view tutorials", TutorialRequest)
            .using(verified_in_tenant()),
        Policy::insert("Verified users can create tutorial requests", TutorialRequest)
            .check(verified_owner_in_tenant("requester_id")),
        Policy::all("Admins can manage tutorial requests", TutorialRequest)
            .using(admin_in_tenant()),
    ]
}

fn documents() -> Vec<Policy> {
    vec![
        Policy::select("Verified users can view documents", Document).using(verified_in_tenant()),
        Policy::all("Admins can manage documents", Document).using(admin_in_tenant()),
    ]
}

fn gamification() -> Vec<Policy> {
    // Awards inherit tenancy from their badge.
    let badge_in_tenant = || Predicate::parent_in_tenant(Badge, "badge_id");

    vec![
        Policy::select("Badges viewable by verified users", Badge).using(verified_in_tenant()),
        Policy::select("User badges viewable", UserBadge)
            .using(Predicate::and([Predicate::is_verified(), badge_in_tenant()])),
        Policy::select("Users can view own points", UserPoints).using(own_in_tenant("user_id")),
        Policy::all("Admins can manage badges", Badge).using(admin_in_tenant()),
        Policy::all("Admins can manage user badges", UserBadge)
            .using(Predicate::and([Predicate::is_admin(), badge_in_tenant()])),
        Policy::all("Admins can manage user points", UserPoints).using(admin_in_tenant()),
    ]
}

fn moderation() -> Vec<Policy> {
    vec![
        Policy::select("Admins can view moderation queue", ModerationQueueItem)
            .using(admin_in_tenant()),
        Policy::all("Admins can manage moderation queue", ModerationQueueItem)
            .using(admin_in_tenant()),
        Policy::select("Admins can view moderation actions", ModerationAction)
            .using(admin_in_tenant()),
        Policy::insert("Admins can create moderation actions", ModerationAction).check(
            Predicate::and([
                Predicate::is_admin(),
                Predicate::tenant(),
                Predicate::owner("moderator_id"),
            ]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_policy_count() {
        assert_eq!(policies().len(), 50);
    }

    #[test]
    fn test_policy_names_unique() {
        let all = policies();
        let names: HashSet<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_every_table_covered() {
        let covered: HashSet<_> = policies().iter().map(|p| p.resource_type).collect();
        for rt in ResourceType::ALL {
            if rt != StorageObject {
                assert!(covered.contains(&rt), "{rt} has no policy");
            }
        }
    }

    #[test]
    fn test_rsvp_sql_inherits_event_tenant() {
        let all = policies();
        let rsvp = all
            .iter()
            .find(|p| p.name == "Users can view event RSVPs")
            .map(Policy::to_sql)
            .unwrap_or_default();
        assert!(rsvp.contains("events.id = event_rsvps.event_id"));
    }

    #[test]
    fn test_user_badge_sql_inherits_badge_tenant() {
        let all = policies();
        let manage = all
            .iter()
            .find(|p| p.name == "Admins can manage user badges")
            .map(Policy::to_sql)
            .unwrap_or_default();
        assert!(manage.contains("badges.id = user_badges.badge_id"));
        assert!(manage.contains("badges.tenant_id = public.get_user_tenant_id()"));
    }
}
