//! Review queue service.
//!
//! Thin tenant-scoped façade over the queue repository. Listing releases
//! stale claims first so the view never shows timed-out claims as
//! unavailable; the same sweep is exposed for periodic background runs.

use chrono::Duration;
use tracing::info;

use crate::models::ReviewQueueItem;
use crate::repository::{ReviewQueueRepository, ReviewResult};
use crate::tenant::TenantContext;

/// Operations reviewers drive the queue with.
pub struct ReviewQueueService {
    repo: ReviewQueueRepository,
    claim_timeout: Duration,
}

impl ReviewQueueService {
    pub fn new(repo: ReviewQueueRepository, claim_timeout_minutes: i64) -> Self {
        Self {
            repo,
            claim_timeout: Duration::minutes(claim_timeout_minutes),
        }
    }

    /// Pending items by priority desc, then age. Stale claims are released
    /// before the query so their items show up again.
    pub fn list(&self, ctx: &TenantContext) -> ReviewResult<Vec<ReviewQueueItem>> {
        self.repo.release_stale(ctx.tenant_id(), self.claim_timeout)?;
        self.repo.list_pending(ctx.tenant_id())
    }

    /// Claim a pending item for exclusive review.
    pub fn claim(
        &self,
        ctx: &TenantContext,
        item_id: &str,
        user: &str,
    ) -> ReviewResult<ReviewQueueItem> {
        let item = self.repo.claim(ctx.tenant_id(), item_id, user)?;
        info!(
            tenant_id = ctx.tenant_id(),
            item_id,
            user,
            "review item claimed"
        );
        Ok(item)
    }

    /// Complete a claimed item. Caller must hold the claim.
    pub fn complete(
        &self,
        ctx: &TenantContext,
        item_id: &str,
        user: &str,
    ) -> ReviewResult<ReviewQueueItem> {
        let item = self.repo.complete(ctx.tenant_id(), item_id, user)?;
        info!(
            tenant_id = ctx.tenant_id(),
            item_id,
            user,
            "review item completed"
        );
        Ok(item)
    }

    /// Skip an item: directly from pending, or by the claim holder.
    pub fn skip(
        &self,
        ctx: &TenantContext,
        item_id: &str,
        user: &str,
    ) -> ReviewResult<ReviewQueueItem> {
        let item = self.repo.skip(ctx.tenant_id(), item_id, user)?;
        info!(
            tenant_id = ctx.tenant_id(),
            item_id,
            user,
            "review item skipped"
        );
        Ok(item)
    }

    /// Release claims past the timeout. Idempotent; also runs before every
    /// listing.
    pub fn sweep(&self, ctx: &TenantContext) -> ReviewResult<usize> {
        self.repo.release_stale(ctx.tenant_id(), self.claim_timeout)
    }

    /// Fetch one item.
    pub fn get(&self, ctx: &TenantContext, item_id: &str) -> ReviewResult<ReviewQueueItem> {
        self.repo.get(ctx.tenant_id(), item_id)
    }

    /// The queue item for an extraction, if one exists.
    pub fn get_by_extraction(
        &self,
        ctx: &TenantContext,
        extraction_id: &str,
    ) -> ReviewResult<Option<ReviewQueueItem>> {
        self.repo.find_by_extraction(ctx.tenant_id(), extraction_id)
    }

    /// Item counts per status.
    pub fn status_counts(
        &self,
        ctx: &TenantContext,
    ) -> ReviewResult<Vec<(crate::models::ReviewStatus, u64)>> {
        self.repo.status_counts(ctx.tenant_id())
    }
}
