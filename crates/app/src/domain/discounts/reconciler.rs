//! Sibling discount tag reconciler.

use std::{slice, sync::Arc};

use async_trait::async_trait;
use bursar::{
    ids::StudentId,
    lifecycle::DiscountType,
    tags::{TagPlan, plan_sibling_tags},
};
use mockall::automock;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::{
    batch::{BatchOutcome, report},
    context::OrgContext,
    domain::discounts::{errors::TagReconcilerError, ports::TagStore},
};

#[automock]
#[async_trait]
pub trait DiscountTagReconcilerService: Send + Sync {
    /// Recompute the sibling discount tags of every student in `students`,
    /// treating the others in the set as their siblings.
    ///
    /// A student that fails is reported in the outcome; the rest are still
    /// reconciled.
    async fn reconcile_sibling_tags(
        &self,
        ctx: &OrgContext,
        students: &[StudentId],
    ) -> BatchOutcome;
}

pub struct DiscountTagReconciler {
    store: Arc<dyn TagStore>,
}

impl DiscountTagReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn TagStore>) -> Self {
        Self { store }
    }

    /// Replace one student's sibling tags; returns how many were written.
    async fn reconcile_student(
        &self,
        ctx: &OrgContext,
        student: &StudentId,
        siblings: &[StudentId],
    ) -> Result<usize, TagReconcilerError> {
        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(TagReconcilerError::storage(student, "begin transaction"))?;

        let own = tx
            .active_trackers_of(slice::from_ref(student), DiscountType::Sibling)
            .await
            .map_err(TagReconcilerError::storage(student, "load own trackers"))?;

        let sibling_trackers = tx
            .active_trackers_of(siblings, DiscountType::Sibling)
            .await
            .map_err(TagReconcilerError::storage(student, "load sibling trackers"))?;

        let tag_ids = tx
            .discount_tag_ids(DiscountType::Sibling)
            .await
            .map_err(TagReconcilerError::storage(student, "load sibling discount tags"))?;

        let plan = plan_sibling_tags(student, &own, &sibling_trackers, &tag_ids);

        let removed = tx
            .soft_delete_user_tags(student, DiscountType::Sibling)
            .await
            .map_err(TagReconcilerError::storage(student, "remove sibling tags"))?;

        if let TagPlan::Replace(tags) = &plan {
            tx.insert_user_tags(tags)
                .await
                .map_err(TagReconcilerError::storage(student, "insert sibling tags"))?;
        }

        tx.commit()
            .await
            .map_err(TagReconcilerError::storage(student, "commit sibling tags"))?;

        debug!(
            student_id = %student,
            removed,
            written = plan.tags().len(),
            "replaced sibling discount tags"
        );

        Ok(plan.tags().len())
    }
}

impl std::fmt::Debug for DiscountTagReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscountTagReconciler").finish_non_exhaustive()
    }
}

#[async_trait]
impl DiscountTagReconcilerService for DiscountTagReconciler {
    #[tracing::instrument(
        name = "discounts.reconciler.reconcile_sibling_tags",
        skip(self, ctx, students),
        fields(organization = %ctx.organization, students = students.len())
    )]
    async fn reconcile_sibling_tags(
        &self,
        ctx: &OrgContext,
        students: &[StudentId],
    ) -> BatchOutcome {
        let mut seen = FxHashSet::default();
        let students: Vec<&StudentId> = students
            .iter()
            .filter(|student| !student.is_empty() && seen.insert(*student))
            .collect();

        let mut outcome = BatchOutcome::new();

        for student in &students {
            let siblings: Vec<StudentId> = students
                .iter()
                .filter(|other| *other != student)
                .map(|other| (*other).clone())
                .collect();

            match self.reconcile_student(ctx, student, &siblings).await {
                Ok(_) => outcome.record_success(),
                Err(error) => {
                    warn!(student_id = %student, error = %report(&error), "failed to reconcile sibling tags");

                    outcome.record_failure(&error);
                }
            }
        }

        outcome
    }
}
