mod common;

use common::{draft, fixture, message, user};
use studyhub_common::error::StudyHubError;
use studyhub_common::models::{JoinCommunityRequest, JoinRequestStatus, MemberRole, NotificationType};
use studyhub_db::paths;
use studyhub_db::repository::{join_requests, memberships, roles};
use studyhub_db::store::{Fault, OpKind};
use studyhub_engine::JoinOutcome;
use uuid::Uuid;

#[tokio::test]
async fn direct_join_counts_the_new_member() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));

    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();
    let stored = f.community(c.id).await.unwrap();
    assert_eq!(stored.member_count, 1);
    assert_eq!(roles::role_of(&f.db, c.id, a.uid).await.unwrap(), Some(MemberRole::Admin));

    let outcome = f.engine.join_community(&b, c.id, JoinCommunityRequest::default()).await.unwrap();
    assert!(matches!(outcome, JoinOutcome::Joined(_)));
    assert_eq!(f.community(c.id).await.unwrap().member_count, 2);
    assert_eq!(roles::role_of(&f.db, c.id, b.uid).await.unwrap(), Some(MemberRole::Member));
    assert_eq!(f.store.count(paths::JOIN_REQUESTS), 0);
}

#[tokio::test]
async fn approval_flow_admits_and_notifies() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();

    let JoinOutcome::Requested(request) = f.engine.join_community(&b, c.id, message("please add me")).await.unwrap() else {
        panic!("expected a join request");
    };
    assert_eq!(request.message, "please add me");
    let stored = f.community(c.id).await.unwrap();
    assert_eq!(stored.member_count, 1);
    assert_eq!(stored.pending_join_requests.len(), 1);
    assert_eq!(stored.pending_requests_count, 1);
    assert_eq!(join_requests::list_pending(&f.db, c.id).await.unwrap().len(), 1);

    f.engine.approve_join_request(a.uid, request.id).await.unwrap();

    let reviewed = join_requests::find_by_id(&f.db, request.id).await.unwrap().unwrap();
    assert_eq!(reviewed.status, JoinRequestStatus::Approved);
    assert_eq!(reviewed.reviewed_by, Some(a.uid));
    let stored = f.community(c.id).await.unwrap();
    assert_eq!(stored.member_count, 2);
    assert_eq!(stored.pending_requests_count, 0);
    assert!(memberships::find(&f.db, b.uid, c.id).await.unwrap().is_some());
    assert_eq!(roles::role_of(&f.db, c.id, b.uid).await.unwrap(), Some(MemberRole::Member));

    let inbox = f.notifications_for(b.uid).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationType::JoinApproved);
    assert!(!inbox[0].read);
}

#[tokio::test]
async fn leaving_restores_the_count_and_removes_both_rows() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();
    f.engine.join_community(&b, c.id, JoinCommunityRequest::default()).await.unwrap();

    f.engine.leave_community(b.uid, c.id).await.unwrap();

    assert_eq!(f.community(c.id).await.unwrap().member_count, 1);
    assert!(memberships::find(&f.db, b.uid, c.id).await.unwrap().is_none());
    assert!(roles::find(&f.db, c.id, b.uid).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_direct_joins_admit_exactly_once() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();

    let (first, second) = tokio::join!(
        f.engine.join_community(&b, c.id, JoinCommunityRequest::default()),
        f.engine.join_community(&b, c.id, JoinCommunityRequest::default()),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(StudyHubError::AlreadyMember)))
            .count(),
        1
    );
    assert_eq!(memberships::list_for_community(&f.db, c.id).await.unwrap().len(), 2);
    assert_eq!(f.community(c.id).await.unwrap().member_count, 2);
}

#[tokio::test]
async fn second_request_while_pending_is_rejected_before_writing() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();

    f.engine.join_community(&b, c.id, message("hi")).await.unwrap();
    let again = f.engine.join_community(&b, c.id, message("hi again")).await;

    assert!(matches!(again, Err(StudyHubError::RequestPending)));
    assert_eq!(f.store.count(paths::JOIN_REQUESTS), 1);
    assert_eq!(f.community(c.id).await.unwrap().pending_requests_count, 1);
}

#[tokio::test]
async fn members_cannot_join_twice() {
    let f = fixture();
    let a = user("Ada");
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();

    let result = f.engine.join_community(&a, c.id, message("me again")).await;
    assert!(matches!(result, Err(StudyHubError::AlreadyMember)));
}

#[tokio::test]
async fn leaving_without_membership_reports_not_found() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();

    let result = f.engine.leave_community(b.uid, c.id).await;
    assert!(matches!(result, Err(StudyHubError::NotFound { .. })));
    assert_eq!(f.community(c.id).await.unwrap().member_count, 1);

    let missing = f.engine.leave_community(b.uid, Uuid::now_v7()).await;
    assert!(matches!(missing, Err(StudyHubError::NotFound { .. })));
}

#[tokio::test]
async fn the_creator_cannot_leave_or_be_removed() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();
    f.engine.join_community(&b, c.id, JoinCommunityRequest::default()).await.unwrap();
    f.engine.set_member_role(a.uid, c.id, b.uid, MemberRole::Admin).await.unwrap();

    assert!(matches!(f.engine.leave_community(a.uid, c.id).await, Err(StudyHubError::Forbidden { .. })));
    assert!(matches!(
        f.engine.remove_member(b.uid, c.id, a.uid).await,
        Err(StudyHubError::Forbidden { .. })
    ));
    assert!(matches!(
        f.engine.set_member_role(b.uid, c.id, a.uid, MemberRole::Member).await,
        Err(StudyHubError::Forbidden { .. })
    ));
}

#[tokio::test]
async fn review_requires_an_admin_and_happens_once() {
    let f = fixture();
    let (a, b, outsider) = (user("Ada"), user("Ben"), user("Eve"));
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();
    let JoinOutcome::Requested(request) = f.engine.join_community(&b, c.id, message("hi")).await.unwrap() else {
        panic!("expected a join request");
    };

    let denied = f.engine.approve_join_request(outsider.uid, request.id).await;
    assert!(matches!(denied, Err(StudyHubError::Forbidden { .. })));

    f.engine.approve_join_request(a.uid, request.id).await.unwrap();
    let twice = f.engine.reject_join_request(a.uid, request.id).await;
    assert!(matches!(twice, Err(StudyHubError::AlreadyReviewed)));
    assert_eq!(f.community(c.id).await.unwrap().member_count, 2);
}

#[tokio::test]
async fn rejection_clears_the_mirror_and_notifies() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();
    let JoinOutcome::Requested(request) = f.engine.join_community(&b, c.id, message("hi")).await.unwrap() else {
        panic!("expected a join request");
    };

    let rejected = f.engine.reject_join_request(a.uid, request.id).await.unwrap();
    assert_eq!(rejected.status, JoinRequestStatus::Rejected);

    let stored = f.community(c.id).await.unwrap();
    assert_eq!(stored.member_count, 1);
    assert!(stored.pending_join_requests.is_empty());
    assert!(memberships::find(&f.db, b.uid, c.id).await.unwrap().is_none());
    let inbox = f.notifications_for(b.uid).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationType::JoinRejected);

    // A rejected request no longer blocks a fresh one.
    assert!(f.engine.join_community(&b, c.id, message("second try")).await.is_ok());
}

#[tokio::test]
async fn requester_can_cancel_without_notification() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();
    let JoinOutcome::Requested(request) = f.engine.join_community(&b, c.id, message("hi")).await.unwrap() else {
        panic!("expected a join request");
    };

    let stranger = f.engine.cancel_join_request(a.uid, request.id).await;
    assert!(matches!(stranger, Err(StudyHubError::Forbidden { .. })));

    f.engine.cancel_join_request(b.uid, request.id).await.unwrap();
    assert_eq!(f.community(c.id).await.unwrap().pending_requests_count, 0);
    assert!(f.notifications_for(b.uid).await.is_empty());
}

#[tokio::test]
async fn mirror_repair_recomputes_from_pending_rows() {
    let f = fixture();
    let a = user("Ada");
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();
    for name in ["Ben", "Cy", "Dee"] {
        f.engine.join_community(&user(name), c.id, message("hi")).await.unwrap();
    }
    // Lose the mirror entirely, as a failed best-effort write would.
    studyhub_db::repository::communities::replace_pending(&f.db, c.id, &[]).await.unwrap();
    assert_eq!(f.community(c.id).await.unwrap().pending_requests_count, 0);

    let rebuilt = f.engine.repair_pending_mirror(a.uid, c.id).await.unwrap();
    assert_eq!(rebuilt.len(), 3);
    let stored = f.community(c.id).await.unwrap();
    assert_eq!(stored.pending_requests_count, 3);
    assert_eq!(stored.pending_join_requests.len(), 3);
    assert_eq!(f.engine.list_pending_requests(a.uid, c.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn admins_can_remove_members_and_others_cannot() {
    let f = fixture();
    let (a, b, d) = (user("Ada"), user("Ben"), user("Dee"));
    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();
    f.engine.join_community(&b, c.id, JoinCommunityRequest::default()).await.unwrap();
    f.engine.join_community(&d, c.id, JoinCommunityRequest::default()).await.unwrap();

    let denied = f.engine.remove_member(b.uid, c.id, d.uid).await;
    assert!(matches!(denied, Err(StudyHubError::Forbidden { .. })));

    f.engine.remove_member(a.uid, c.id, d.uid).await.unwrap();
    assert_eq!(f.community(c.id).await.unwrap().member_count, 2);
    assert!(!memberships::is_member_direct(&f.db, d.uid, c.id).await.unwrap());
}

#[tokio::test]
async fn promotion_rebuilds_the_admin_list() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();
    f.engine.join_community(&b, c.id, JoinCommunityRequest::default()).await.unwrap();

    let admins = f.engine.set_member_role(a.uid, c.id, b.uid, MemberRole::Admin).await.unwrap();
    assert_eq!(admins, vec![a.uid, b.uid]);
    assert!(f.engine.is_admin(b.uid, c.id).await.unwrap());
    assert_eq!(f.community(c.id).await.unwrap().admins, vec![a.uid, b.uid]);

    let admins = f.engine.set_member_role(a.uid, c.id, b.uid, MemberRole::Member).await.unwrap();
    assert_eq!(admins, vec![a.uid]);
    assert!(!f.engine.is_admin(b.uid, c.id).await.unwrap());

    // A departing admin drops out of the derived list.
    f.engine.set_member_role(a.uid, c.id, b.uid, MemberRole::Admin).await.unwrap();
    f.engine.leave_community(b.uid, c.id).await.unwrap();
    assert_eq!(f.community(c.id).await.unwrap().admins, vec![a.uid]);
}

#[tokio::test]
async fn creator_keeps_admin_rights_without_a_role_record() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();
    roles::delete(&f.db, c.id, a.uid).await.unwrap();
    memberships::set_role(
        &f.db,
        &memberships::find(&f.db, a.uid, c.id).await.unwrap().unwrap().key,
        MemberRole::Member,
    )
    .await
    .unwrap();

    let JoinOutcome::Requested(request) = f.engine.join_community(&b, c.id, message("hi")).await.unwrap() else {
        panic!("expected a join request");
    };
    assert!(f.engine.approve_join_request(a.uid, request.id).await.is_ok());
}

#[tokio::test]
async fn community_limit_is_enforced() {
    let mut f = fixture();
    f.engine = studyhub_engine::Engine::new(
        f.db.clone(),
        studyhub_common::config::EngineConfig {
            role_write_delay_ms: 0,
            max_communities_per_user: 1,
        },
        f.blobs.clone(),
    );
    let a = user("Ada");
    f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();
    let second = f.engine.create_community(&a, draft("Research", false)).await;
    assert!(matches!(second, Err(StudyHubError::LimitReached { .. })));
}

#[tokio::test]
async fn invalid_drafts_are_rejected_before_any_write() {
    let f = fixture();
    let result = f.engine.create_community(&user("Ada"), draft("  ", false)).await;
    assert!(matches!(result, Err(StudyHubError::Validation { .. })));
    assert_eq!(f.store.count(paths::COMMUNITIES), 0);
}

#[tokio::test]
async fn a_role_left_behind_by_leave_does_not_block_rejoining() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();
    f.engine.join_community(&b, c.id, JoinCommunityRequest::default()).await.unwrap();

    f.store.inject(Fault::unavailable(OpKind::Delete, paths::roles_collection(c.id)).times(1));
    f.engine.leave_community(b.uid, c.id).await.unwrap();
    assert!(roles::find(&f.db, c.id, b.uid).await.unwrap().is_some());
    assert_eq!(f.community(c.id).await.unwrap().member_count, 1);

    let outcome = f.engine.join_community(&b, c.id, JoinCommunityRequest::default()).await.unwrap();
    assert!(matches!(outcome, JoinOutcome::Joined(_)));
    assert_eq!(f.community(c.id).await.unwrap().member_count, 2);

    f.engine.leave_community(b.uid, c.id).await.unwrap();
    assert_eq!(f.community(c.id).await.unwrap().member_count, 1);
    assert!(roles::find(&f.db, c.id, b.uid).await.unwrap().is_none());
    assert!(!memberships::is_member_direct(&f.db, b.uid, c.id).await.unwrap());
}

#[tokio::test]
async fn leaving_again_clears_a_stray_role_and_reports_not_found() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();
    f.engine.join_community(&b, c.id, JoinCommunityRequest::default()).await.unwrap();

    f.store.inject(Fault::unavailable(OpKind::Delete, paths::roles_collection(c.id)).times(1));
    f.engine.leave_community(b.uid, c.id).await.unwrap();

    let err = f.engine.leave_community(b.uid, c.id).await.unwrap_err();
    assert!(matches!(err, StudyHubError::NotFound { .. }));
    assert!(roles::find(&f.db, c.id, b.uid).await.unwrap().is_none());
    assert_eq!(f.community(c.id).await.unwrap().member_count, 1);
}

#[tokio::test]
async fn join_request_survives_a_failed_mirror_update() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();

    f.store.inject(Fault::unavailable(OpKind::Update, paths::community(c.id).to_string()));
    let outcome = f.engine.join_community(&b, c.id, message("please add me")).await.unwrap();
    let JoinOutcome::Requested(request) = outcome else {
        panic!("expected a pending request");
    };
    assert!(join_requests::find_by_id(&f.db, request.id).await.unwrap().unwrap().is_pending());
    assert_eq!(f.community(c.id).await.unwrap().pending_requests_count, 0);

    f.store.clear_faults();
    let mirror = f.engine.repair_pending_mirror(a.uid, c.id).await.unwrap();
    assert_eq!(mirror.len(), 1);
    assert_eq!(mirror[0].request_id, request.id);
    assert_eq!(f.community(c.id).await.unwrap().pending_requests_count, 1);
}

#[tokio::test]
async fn approval_commits_despite_failed_mirror_and_notification() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();
    let JoinOutcome::Requested(request) = f.engine.join_community(&b, c.id, message("hi")).await.unwrap() else {
        panic!("expected a pending request");
    };

    f.store.inject(Fault::unavailable(OpKind::Update, paths::community(c.id).to_string()));
    f.store.inject(Fault::unavailable(OpKind::Set, paths::NOTIFICATIONS));
    let membership = f.engine.approve_join_request(a.uid, request.id).await.unwrap();
    assert_eq!(membership.user_id, b.uid);

    let reviewed = join_requests::find_by_id(&f.db, request.id).await.unwrap().unwrap();
    assert_eq!(reviewed.status, JoinRequestStatus::Approved);
    assert!(memberships::find(&f.db, b.uid, c.id).await.unwrap().is_some());
    assert!(f.notifications_for(b.uid).await.is_empty());
    // The stale mirror still lists the approved request.
    assert_eq!(f.community(c.id).await.unwrap().pending_requests_count, 1);

    f.store.clear_faults();
    assert!(f.engine.repair_pending_mirror(a.uid, c.id).await.unwrap().is_empty());
    let stored = f.community(c.id).await.unwrap();
    assert_eq!(stored.pending_requests_count, 0);
    assert!(stored.pending_join_requests.is_empty());
}

#[tokio::test]
async fn rejection_commits_despite_failed_mirror_and_notification() {
    let f = fixture();
    let (a, b) = (user("Ada"), user("Ben"));
    let c = f.engine.create_community(&a, draft("Research", true)).await.unwrap();
    let JoinOutcome::Requested(request) = f.engine.join_community(&b, c.id, message("hi")).await.unwrap() else {
        panic!("expected a pending request");
    };

    f.store.inject(Fault::unavailable(OpKind::Update, paths::community(c.id).to_string()));
    f.store.inject(Fault::unavailable(OpKind::Set, paths::NOTIFICATIONS));
    let rejected = f.engine.reject_join_request(a.uid, request.id).await.unwrap();
    assert_eq!(rejected.status, JoinRequestStatus::Rejected);
    assert_eq!(
        join_requests::find_by_id(&f.db, request.id).await.unwrap().unwrap().status,
        JoinRequestStatus::Rejected
    );
    assert!(memberships::find(&f.db, b.uid, c.id).await.unwrap().is_none());
    assert!(f.notifications_for(b.uid).await.is_empty());

    f.store.clear_faults();
    assert!(f.engine.repair_pending_mirror(a.uid, c.id).await.unwrap().is_empty());
    assert_eq!(f.community(c.id).await.unwrap().pending_requests_count, 0);
}

#[tokio::test]
async fn a_sole_admin_creator_cannot_step_down() {
    let f = fixture();
    let a = user("Ada");
    let c = f.engine.create_community(&a, draft("Algorithms", false)).await.unwrap();

    let err = f.engine.set_member_role(a.uid, c.id, a.uid, MemberRole::Member).await.unwrap_err();
    assert!(matches!(err, StudyHubError::Forbidden { .. }));
    assert_eq!(f.engine.rebuild_admin_list(c.id).await.unwrap(), vec![a.uid]);
    assert!(f.engine.is_admin(a.uid, c.id).await.unwrap());
}
