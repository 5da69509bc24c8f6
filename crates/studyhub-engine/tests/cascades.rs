mod common;

use chrono::Utc;
use serde_json::json;
use studyhub_common::error::{IdentityFailure, StudyHubError};
use studyhub_common::models::{ContentKind, Identity, JoinCommunityRequest, NotificationType, UserProfile};
use studyhub_db::paths;
use studyhub_db::repository::cascades::{self, CascadeKind};
use studyhub_db::repository::{join_requests, memberships, users};
use studyhub_db::storage::{self, BlobStore};
use studyhub_db::store::{fields, DocPath, Fault, OpKind};
use studyhub_engine::{IdentityOutcome, JoinOutcome, StepOutcome};
use uuid::Uuid;

use common::{draft, fixture, message, user, Fixture, StaticIdentity};

async fn post(f: &Fixture, community_id: Uuid, kind: ContentKind, author: Uuid, key: &str) {
    f.db.store
        .set(
            &DocPath::new(paths::content_collection(community_id, kind), key),
            fields(json!({ kind.author_field(): author.to_string(), "body": "notes" })),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn every_member_is_notified_even_when_a_membership_delete_fails() {
    let f = fixture();
    let admin = user("Ada");
    let c = f.engine.create_community(&admin, draft("Algorithms", false)).await.unwrap();
    let members: Vec<_> = ["Ben", "Cy", "Dee"].into_iter().map(user).collect();
    for m in &members {
        f.engine.join_community(m, c.id, JoinCommunityRequest::default()).await.unwrap();
    }
    post(&f, c.id, ContentKind::Messages, members[0].uid, "m1").await;
    post(&f, c.id, ContentKind::Announcements, admin.uid, "a1").await;

    let stuck = paths::membership(members[1].uid, c.id).to_string();
    f.store.inject(Fault::unavailable(OpKind::Delete, stuck));

    let report = f.engine.delete_community(admin.uid, c.id).await.unwrap();

    assert!(matches!(report.outcome_of("memberships"), Some(StepOutcome::Failed { .. })));
    assert_eq!(report.outcome_of("community"), Some(&StepOutcome::Done { affected: 1 }));
    assert_eq!(report.notified, 3);
    assert!(f.community(c.id).await.is_none());
    assert_eq!(f.store.count(&paths::content_collection(c.id, ContentKind::Messages)), 0);
    assert_eq!(f.store.count(&paths::content_collection(c.id, ContentKind::Announcements)), 0);
    assert_eq!(f.store.count(&paths::roles_collection(c.id)), 0);
    assert_eq!(memberships::list_for_community(&f.db, c.id).await.unwrap().len(), 1);
    for m in &members {
        let inbox = f.notifications_for(m.uid).await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationType::CommunityDeleted);
        assert_eq!(inbox[0].data["communityName"], "Algorithms");
    }
    assert!(f.notifications_for(admin.uid).await.is_empty());
}

#[tokio::test]
async fn rerunning_a_partial_cascade_finishes_without_double_notifying() {
    let f = fixture();
    let admin = user("Ada");
    let c = f.engine.create_community(&admin, draft("Algorithms", false)).await.unwrap();
    let members: Vec<_> = ["Ben", "Cy"].into_iter().map(user).collect();
    for m in &members {
        f.engine.join_community(m, c.id, JoinCommunityRequest::default()).await.unwrap();
    }
    f.store.inject(Fault::unavailable(
        OpKind::Delete,
        paths::membership(members[0].uid, c.id).to_string(),
    ));
    let first = f.engine.delete_community(admin.uid, c.id).await.unwrap();
    assert!(!first.is_clean());
    assert!(!first.resumed);

    f.store.clear_faults();
    let second = f.engine.delete_community(admin.uid, c.id).await.unwrap();

    assert!(second.resumed);
    assert!(second.is_clean());
    assert_eq!(second.outcome_of("memberships"), Some(&StepOutcome::Done { affected: 1 }));
    assert_eq!(second.outcome_of("community"), Some(&StepOutcome::Skipped));
    assert_eq!(second.notified, 0);
    assert_eq!(f.store.count(paths::MEMBERSHIPS), 0);
    assert_eq!(f.store.count(paths::NOTIFICATIONS), 2);

    let log = cascades::load(&f.db, CascadeKind::CommunityDeletion, c.id).await.unwrap().unwrap();
    assert!(log.is_finished());

    // Finished and gone: a third call has nothing to resume.
    let third = f.engine.delete_community(admin.uid, c.id).await;
    assert!(matches!(third, Err(StudyHubError::NotFound { .. })));
}

#[tokio::test]
async fn only_admins_can_delete_a_community() {
    let f = fixture();
    let (admin, member) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&admin, draft("Algorithms", false)).await.unwrap();
    f.engine.join_community(&member, c.id, JoinCommunityRequest::default()).await.unwrap();

    let result = f.engine.delete_community(member.uid, c.id).await;
    assert!(matches!(result, Err(StudyHubError::Forbidden { .. })));
    assert!(f.community(c.id).await.is_some());
}

/// The user owns one community, belongs to another, and has a pending request in a third.
struct World {
    me: Identity,
    owned: Uuid,
    joined: Uuid,
    applied: Uuid,
    other_owner: Identity,
    member_of_owned: Identity,
}

async fn world(f: &Fixture) -> World {
    let me = user("Una");
    let other_owner = user("Oli");
    let member_of_owned = user("Max");

    let owned = f.engine.create_community(&me, draft("Owned", false)).await.unwrap().id;
    f.engine
        .join_community(&member_of_owned, owned, JoinCommunityRequest::default())
        .await
        .unwrap();

    let joined = f.engine.create_community(&other_owner, draft("Joined", false)).await.unwrap().id;
    f.engine.join_community(&me, joined, JoinCommunityRequest::default()).await.unwrap();
    post(f, joined, ContentKind::Messages, me.uid, "mine").await;
    post(f, joined, ContentKind::Resources, me.uid, "my-notes").await;
    post(f, joined, ContentKind::Messages, other_owner.uid, "theirs").await;

    let applied = f.engine.create_community(&other_owner, draft("Applied", true)).await.unwrap().id;
    let JoinOutcome::Requested(_) = f.engine.join_community(&me, applied, message("hi")).await.unwrap() else {
        panic!("expected a join request");
    };

    let profile = UserProfile {
        uid: me.uid,
        display_name: me.display_name.clone(),
        email: me.email.clone(),
        photo_url: None,
        avatar_key: Some(storage::avatar_key(me.uid)),
        bio: None,
        created_at: Utc::now(),
    };
    users::put_profile(&f.db, &profile).await.unwrap();
    f.blobs.put_object(&storage::avatar_key(me.uid), b"png".to_vec()).await.unwrap();

    World {
        me,
        owned,
        joined,
        applied,
        other_owner,
        member_of_owned,
    }
}

#[tokio::test]
async fn account_deletion_removes_everything_then_the_identity() {
    let f = fixture();
    let w = world(&f).await;
    assert_eq!(join_requests::list_pending_for_user(&f.db, w.me.uid).await.unwrap().len(), 1);

    let identity = StaticIdentity::new(w.me.clone());
    let report = f.engine.delete_user_account(&identity).await.unwrap();

    assert_eq!(report.identity, IdentityOutcome::Deleted);
    assert_eq!(identity.delete_calls(), 1);
    assert_eq!(report.communities_deleted, 1);
    assert!(report.cascade.is_clean());

    // Owned community torn down, its member told.
    assert!(f.community(w.owned).await.is_none());
    let inbox = f.notifications_for(w.member_of_owned.uid).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationType::CommunityDeleted);

    // Joined community keeps going without the user or their content.
    let joined = f.community(w.joined).await.unwrap();
    assert_eq!(joined.member_count, 1);
    assert!(memberships::find(&f.db, w.me.uid, w.joined).await.unwrap().is_none());
    assert_eq!(f.store.count(&paths::content_collection(w.joined, ContentKind::Messages)), 1);
    assert_eq!(f.store.count(&paths::content_collection(w.joined, ContentKind::Resources)), 0);

    // Pending request withdrawn and the mirror rebuilt.
    assert!(join_requests::list_pending_for_user(&f.db, w.me.uid).await.unwrap().is_empty());
    assert_eq!(f.community(w.applied).await.unwrap().pending_requests_count, 0);

    assert!(users::find_profile(&f.db, w.me.uid).await.unwrap().is_none());
    assert!(!f.blobs.contains(&storage::avatar_key(w.me.uid)));
    assert!(f.notifications_for(w.me.uid).await.is_empty());
    assert!(f.community(w.joined).await.unwrap().created_by == w.other_owner.uid);
}

#[tokio::test]
async fn stale_credentials_still_count_as_deleted() {
    let f = fixture();
    let w = world(&f).await;
    let identity = StaticIdentity::failing_with(w.me.clone(), IdentityFailure::RequiresRecentLogin);

    let report = f.engine.delete_user_account(&identity).await.unwrap();

    assert_eq!(report.identity, IdentityOutcome::StaleCredential);
    assert!(users::find_profile(&f.db, w.me.uid).await.unwrap().is_none());
    let log = cascades::load(&f.db, CascadeKind::AccountDeletion, w.me.uid).await.unwrap().unwrap();
    assert!(log.is_finished());
}

#[tokio::test]
async fn rate_limited_identity_delete_surfaces_its_own_error() {
    let f = fixture();
    let w = world(&f).await;
    let identity = StaticIdentity::failing_with(w.me.clone(), IdentityFailure::TooManyRequests);

    let result = f.engine.delete_user_account(&identity).await;
    assert!(matches!(result, Err(StudyHubError::Identity(IdentityFailure::TooManyRequests))));
}

#[tokio::test]
async fn failed_cleanup_keeps_the_identity_for_a_retry() {
    let f = fixture();
    let w = world(&f).await;
    f.store.inject(Fault::unavailable(OpKind::Delete, paths::user(w.me.uid).to_string()));
    let identity = StaticIdentity::new(w.me.clone());

    let report = f.engine.delete_user_account(&identity).await.unwrap();
    assert_eq!(report.identity, IdentityOutcome::Retained);
    assert_eq!(identity.delete_calls(), 0);
    assert!(matches!(report.cascade.outcome_of("profile"), Some(StepOutcome::Failed { .. })));
    // Everything else still ran.
    assert!(f.community(w.owned).await.is_none());

    f.store.clear_faults();
    let retry = f.engine.delete_user_account(&identity).await.unwrap();
    assert_eq!(retry.identity, IdentityOutcome::Deleted);
    assert!(retry.cascade.resumed);
    assert_eq!(retry.cascade.outcome_of("notifications"), Some(&StepOutcome::Skipped));
    assert_eq!(identity.delete_calls(), 1);
}
