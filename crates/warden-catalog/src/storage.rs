//! Buckets and object access rules.

use warden_core::{Bucket, Policy, Predicate, ResourceType, UploadScope};

const MB: u64 = 1024 * 1024;

const WEB_IMAGES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Bucket declarations, in provisioning order.
pub fn buckets() -> Vec<Bucket> {
    vec![
        Bucket::new("marketplace-images", true, 5 * MB)
            .with_mime_types(["image/jpeg", "image/png", "image/webp", "image/gif"])
            .with_upload_scope(UploadScope::Owner)
            .with_description("Images for marketplace items"),
        Bucket::new("event-images", true, 5 * MB)
            .with_mime_types(WEB_IMAGES)
            .with_upload_scope(UploadScope::Verified)
            .with_description("Images for events"),
        Bucket::new("profile-avatars", true, 2 * MB)
            .with_mime_types(WEB_IMAGES)
            .with_upload_scope(UploadScope::Owner)
            .with_description("User profile avatars"),
        Bucket::new("tenant-logos", true, MB)
            .with_mime_types(["image/jpeg", "image/png", "image/svg+xml"])
            .with_upload_scope(UploadScope::Admin)
            .with_description("Tenant logos"),
        Bucket::new("documents", false, 10 * MB)
            .with_mime_types([
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ])
            .with_upload_scope(UploadScope::Admin)
            .with_description("Private documents for verified users"),
    ]
}

fn in_bucket(name: &str) -> Predicate {
    Predicate::equals("bucket_id", name)
}

/// Object rules for `buckets`, in deployment order.
///
/// The public-read rule lists whichever buckets are flagged public.
pub fn policies(buckets: &[Bucket]) -> Vec<Policy> {
    use ResourceType::StorageObject;

    let public: Vec<&str> = buckets
        .iter()
        .filter(|b| b.public)
        .map(|b| b.name.as_str())
        .collect();

    vec![
        Policy::select("Public buckets are viewable by everyone", StorageObject)
            .using(Predicate::one_of("bucket_id", public))
            .tenant_global(),
        Policy::insert("Verified users can upload marketplace images", StorageObject).check(
            Predicate::and([
                in_bucket("marketplace-images"),
                Predicate::path_owner(),
                Predicate::is_verified(),
            ]),
        ),
        Policy::insert("Verified users can upload event images", StorageObject).check(
            Predicate::and([in_bucket("event-images"), Predicate::is_verified()]),
        ),
        Policy::insert("Users can upload own avatar", StorageObject).check(Predicate::and([
            in_bucket("profile-avatars"),
            Predicate::path_owner(),
            Predicate::is_verified(),
        ])),
        Policy::insert("Admins can upload tenant logos", StorageObject)
            .check(Predicate::and([in_bucket("tenant-logos"), Predicate::is_admin()])),
        Policy::select("Verified users can view documents", StorageObject)
            .using(Predicate::and([in_bucket("documents"), Predicate::is_verified()])),
        Policy::insert("Admins can upload documents", StorageObject)
            .check(Predicate::and([in_bucket("documents"), Predicate::is_admin()])),
        Policy::update("Users can update own uploads", StorageObject)
            .using(Predicate::or([Predicate::path_owner(), Predicate::is_admin()])),
        Policy::delete("Users can delete own uploads", StorageObject)
            .using(Predicate::or([Predicate::path_owner(), Predicate::is_admin()])),
    ]
}
