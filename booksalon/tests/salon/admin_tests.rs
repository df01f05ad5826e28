use super::support::*;
use booksalon::{
    models::{ReportStatus, ReportType, UserRole},
    services::admin::NewReport,
};

fn isbn(index: usize) -> String {
    format!("97800000000{index:02}")
}

async fn seed_forums(salon: &Salon<MemoryStore>, count: usize) {
    let creator = member(salon, "creator").await;
    for index in 0..count {
        seed_forum(salon, &creator, &isbn(index), &format!("책 {index}")).await;
    }
}

#[tokio::test]
async fn exactly_one_page_has_no_more() {
    let salon = memory_salon();
    let admin = admin(&salon, "admin").await;
    seed_forums(&salon, 20).await;

    let page = salon.admin().forums_page(&admin, 20, None).await.expect("page");
    assert_eq!(page.items.len(), 20);
    assert!(!page.has_more);
}

#[tokio::test]
async fn one_extra_document_sets_has_more() {
    let salon = memory_salon();
    let admin = admin(&salon, "admin").await;
    seed_forums(&salon, 21).await;

    let first = salon.admin().forums_page(&admin, 20, None).await.expect("first page");
    assert_eq!(first.items.len(), 20);
    assert!(first.has_more);

    let second = salon
        .admin()
        .forums_page(&admin, 20, first.last_cursor.clone())
        .await
        .expect("second page");
    assert_eq!(second.items.len(), 1);
    assert!(!second.has_more);
    assert!(first.items.iter().all(|forum| forum.isbn != second.items[0].isbn));
}

#[tokio::test]
async fn regular_users_cannot_page() {
    let salon = memory_salon();
    let user = member(&salon, "user").await;
    let err = salon.admin().users_page(&user, 20, None).await.expect_err("not admin");
    assert!(matches!(err, SalonError::AdminRequired));
}

#[tokio::test]
async fn report_moves_through_review() {
    let salon = memory_salon();
    let admin = admin(&salon, "admin").await;
    let reporter = member(&salon, "reporter").await;

    let report = salon
        .admin()
        .create_report(
            &reporter,
            NewReport {
                kind: ReportType::User,
                target_id: "spammer".into(),
                reason: "광고".into(),
                description: "같은 글을 반복해서 올립니다".into(),
            },
        )
        .await
        .expect("report");
    assert_eq!(report.status, ReportStatus::Pending);

    let pending = salon
        .admin()
        .reports_page(&admin, Some(ReportStatus::Pending), 10, None)
        .await
        .expect("pending");
    assert_eq!(pending.items.len(), 1);

    let resolved = salon
        .admin()
        .update_report_status(&admin, &report.id, ReportStatus::Resolved)
        .await
        .expect("resolve");
    assert_eq!(resolved.resolved_by.as_deref(), Some("admin"));
    assert!(resolved.resolved_at.is_some());

    let err = salon
        .admin()
        .update_report_status(&admin, &report.id, ReportStatus::Reviewing)
        .await
        .expect_err("terminal");
    assert!(matches!(err, SalonError::Validation(_)));

    let dashboard = salon.admin().dashboard(&admin, 7).await.expect("dashboard");
    assert_eq!(dashboard.total_users, 2);
    assert_eq!(dashboard.pending_reports, 0);
}

#[tokio::test]
async fn deleting_a_forum_removes_its_content() {
    let salon = memory_salon();
    let admin = admin(&salon, "admin").await;
    let owner = member(&salon, "owner").await;
    seed_forum(&salon, &owner, &isbn(1), "사라질 책").await;
    let post = seed_post(&salon, &owner, &isbn(1), "사라질 글").await;
    salon
        .forums()
        .create_comment(&owner, &isbn(1), &post.id, "사라질 댓글")
        .await
        .expect("comment");
    salon.ratings().rate_book(&owner, &isbn(1), 5).await.expect("rate");

    salon.admin().delete_forum(&admin, &isbn(1)).await.expect("delete");

    assert!(salon.forums().forum(&isbn(1)).await.expect("read").is_none());
    assert!(salon.forums().post(&isbn(1), &post.id).await.expect("read").is_none());
    assert_eq!(salon.ratings().user_rating("owner", &isbn(1)).await.expect("rating"), None);
    let profile = salon.users().require_profile("owner").await.expect("profile");
    assert_eq!((profile.forum_count, profile.post_count, profile.comment_count), (0, 0, 0));
}

#[tokio::test]
async fn admins_grant_roles() {
    let salon = memory_salon();
    let admin = admin(&salon, "admin").await;
    let user = member(&salon, "user").await;

    salon.admin().set_role(&admin, "user", UserRole::Admin).await.expect("promote");
    assert!(salon.users().require_profile("user").await.expect("profile").is_admin());
    assert!(salon.admin().users_page(&user, 5, None).await.is_ok());
}
