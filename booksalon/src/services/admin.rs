//! Moderation: cursor pages over collections, reports, and privileged deletes.

use futures_util::future::try_join;
use log::info;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    auth::Session,
    errors::{SalonError, ValidationError, Validator},
    id::generate_document_id,
    keys::{self, BOOK_RATINGS, DAILY_METRICS, FORUMS, REPORTS, STATS, TOTALS_DOC, USERS},
    models::{DailyMetrics, Forum, Post, Report, ReportStatus, ReportType, Totals, UserProfile, UserRole},
    store::{Cursor, DocumentStore, FieldOp, Filter, Query, SortOrder},
    timestamp::Timestamp,
};

use super::{
    forums::ForumService,
    require_admin, to_value,
    users::{UserService, UserStat},
};

const REASON_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 1_000;

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Pass to the next request to continue after the last item.
    pub last_cursor: Option<Cursor>,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub kind: ReportType,
    pub target_id: String,
    pub reason: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_users: usize,
    pub total_forums: usize,
    pub pending_reports: usize,
    pub totals: Totals,
    /// Newest first.
    pub recent_metrics: Vec<DailyMetrics>,
}

#[derive(Clone)]
pub struct AdminService<S> {
    store: S,
}

impl<S: DocumentStore> AdminService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Runs `query` for `limit + 1` documents; the extra one only signals `has_more`.
    async fn page<T: DeserializeOwned>(&self, query: Query, limit: usize, after: Option<Cursor>) -> Result<Page<T>, SalonError> {
        let mut query = query.limit(limit + 1);
        if let Some(cursor) = after {
            query = query.start_after(cursor);
        }
        let mut documents = self.store.query(&query).await?;
        let has_more = documents.len() > limit;
        documents.truncate(limit);
        let last_cursor = documents.last().map(|document| document.cursor(&query.order_by));
        let items = documents
            .iter()
            .map(|document| document.decode())
            .collect::<Result<Vec<T>, _>>()?;
        Ok(Page {
            items,
            last_cursor,
            has_more,
        })
    }

    pub async fn users_page(&self, session: &Session, limit: usize, after: Option<Cursor>) -> Result<Page<UserProfile>, SalonError> {
        require_admin(&self.store, session).await?;
        let query = Query::collection(USERS).order_by("createdAt", SortOrder::Desc);
        self.page(query, limit, after).await
    }

    pub async fn forums_page(&self, session: &Session, limit: usize, after: Option<Cursor>) -> Result<Page<Forum>, SalonError> {
        require_admin(&self.store, session).await?;
        let query = Query::collection(FORUMS).order_by("createdAt", SortOrder::Desc);
        self.page(query, limit, after).await
    }

    pub async fn posts_page(
        &self,
        session: &Session,
        isbn: &str,
        limit: usize,
        after: Option<Cursor>,
    ) -> Result<Page<Post>, SalonError> {
        require_admin(&self.store, session).await?;
        let query = Query::collection(keys::posts(isbn)).order_by("createdAt", SortOrder::Desc);
        self.page(query, limit, after).await
    }

    pub async fn reports_page(
        &self,
        session: &Session,
        status: Option<ReportStatus>,
        limit: usize,
        after: Option<Cursor>,
    ) -> Result<Page<Report>, SalonError> {
        require_admin(&self.store, session).await?;
        let mut query = Query::collection(REPORTS);
        if let Some(status) = status {
            query = query.filter(Filter::eq("status", status.as_str()));
        }
        self.page(query.order_by("createdAt", SortOrder::Desc), limit, after).await
    }

    /// Files a report; any signed-in user may report.
    pub async fn create_report(&self, session: &Session, report: NewReport) -> Result<Report, SalonError> {
        let identity = session.require()?;
        Validator::new()
            .text("reason", &report.reason, 1, REASON_MAX_CHARS)
            .text("description", &report.description, 0, DESCRIPTION_MAX_CHARS)
            .text("targetId", &report.target_id, 1, 200)
            .finish()?;
        let record = Report {
            id: generate_document_id(),
            reporter_id: identity.uid.clone(),
            kind: report.kind,
            target_id: report.target_id,
            reason: report.reason.trim().to_string(),
            description: report.description.trim().to_string(),
            status: ReportStatus::Pending,
            resolved_by: None,
            created_at: Timestamp::now(),
            resolved_at: None,
        };
        self.store.create(REPORTS, &record.id, to_value(&record)?).await?;
        info!("report {} filed against {:?} {}", record.id, record.kind, record.target_id);
        Ok(record)
    }

    pub async fn update_report_status(&self, session: &Session, id: &str, status: ReportStatus) -> Result<Report, SalonError> {
        let admin = require_admin(&self.store, session).await?;
        let report: Report = self
            .store
            .fetch(REPORTS, id)
            .await?
            .ok_or_else(|| SalonError::not_found("report", id))?;
        if !report.status.can_transition_to(status) {
            return Err(ValidationError::single(
                "status",
                "validation.transition",
                format!("cannot move a report from {} to {}", report.status.as_str(), status.as_str()),
            )
            .into());
        }

        let mut ops = vec![FieldOp::set("status", status.as_str())];
        if status.is_terminal() {
            ops.push(FieldOp::set("resolvedBy", admin.uid.as_str()));
            ops.push(FieldOp::set("resolvedAt", Timestamp::now().to_value()));
        }
        self.store.update(REPORTS, id, &ops).await?;
        self.store
            .fetch(REPORTS, id)
            .await?
            .ok_or_else(|| SalonError::not_found("report", id))
    }

    /// Removes a forum with every post, comment, index entry and rating under it.
    pub async fn delete_forum(&self, session: &Session, isbn: &str) -> Result<(), SalonError> {
        let admin = require_admin(&self.store, session).await?;
        let forums = ForumService::new(self.store.clone());
        let forum = forums.require_forum(isbn).await?;

        let posts: Vec<Post> = self.store.fetch_all(&Query::collection(keys::posts(isbn))).await?;
        for post in &posts {
            forums.purge_post(isbn, post).await?;
        }
        let ratings = self
            .store
            .query(&Query::collection(BOOK_RATINGS).filter(Filter::eq("isbn", isbn)))
            .await?;
        for rating in &ratings {
            self.store.delete(BOOK_RATINGS, &rating.id).await?;
        }
        self.store.delete(FORUMS, isbn).await?;

        if let Some(creator) = &forum.created_by {
            UserService::new(self.store.clone())
                .increment_stat(creator, UserStat::Forums, -1)
                .await?;
        }
        info!(
            "admin {} deleted forum {} ({} posts, {} ratings)",
            admin.uid,
            isbn,
            posts.len(),
            ratings.len()
        );
        Ok(())
    }

    pub async fn delete_post_as_admin(&self, session: &Session, isbn: &str, post_id: &str) -> Result<(), SalonError> {
        let admin = require_admin(&self.store, session).await?;
        let forums = ForumService::new(self.store.clone());
        let post = forums.require_post(isbn, post_id).await?;
        forums.purge_post(isbn, &post).await?;
        info!("admin {} deleted post {isbn}/{post_id}", admin.uid);
        Ok(())
    }

    pub async fn dashboard(&self, session: &Session, days: usize) -> Result<Dashboard, SalonError> {
        require_admin(&self.store, session).await?;
        let users_query = Query::collection(USERS);
        let forums_query = Query::collection(FORUMS);
        let (users, forums) = try_join(self.store.query(&users_query), self.store.query(&forums_query)).await?;
        let pending_query = Query::collection(REPORTS).filter(Filter::eq("status", ReportStatus::Pending.as_str()));
        let pending = self.store.query(&pending_query).await?;
        let totals: Totals = self.store.fetch(STATS, TOTALS_DOC).await?.unwrap_or_default();
        let recent_metrics = self
            .store
            .fetch_all(
                &Query::collection(DAILY_METRICS)
                    .order_by("date", SortOrder::Desc)
                    .limit(days),
            )
            .await?;
        Ok(Dashboard {
            total_users: users.len(),
            total_forums: forums.len(),
            pending_reports: pending.len(),
            totals,
            recent_metrics,
        })
    }

    pub async fn set_role(&self, session: &Session, uid: &str, role: UserRole) -> Result<(), SalonError> {
        let admin = require_admin(&self.store, session).await?;
        UserService::new(self.store.clone()).write_role(uid, role).await?;
        info!("admin {} set role of {uid} to {}", admin.uid, role.as_str());
        Ok(())
    }
}
