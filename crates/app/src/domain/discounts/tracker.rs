//! Discount tracker service.

use std::sync::Arc;

use async_trait::async_trait;
use bursar::{
    ids::StudentId,
    lifecycle::{StudentProductStatus, TrackingAction},
    students::StudentProduct,
    tracking::plan_tracking,
};
use mockall::automock;
use tracing::{Span, debug, info};

use crate::{
    context::OrgContext,
    domain::discounts::{
        errors::TrackerError,
        models::{OrderEvent, TrackingOutcome},
        ports::{TrackerStore, TrackerTx},
        reconciler::DiscountTagReconcilerService,
    },
};

#[automock]
#[async_trait]
pub trait DiscountTrackerService: Send + Sync {
    /// Track or revise the student products of an order event, then
    /// reconcile the sibling discount tags of the student and their siblings.
    async fn handle_order(
        &self,
        ctx: &OrgContext,
        event: &OrderEvent,
    ) -> Result<TrackingOutcome, TrackerError>;
}

pub struct DiscountTracker {
    store: Arc<dyn TrackerStore>,
    reconciler: Arc<dyn DiscountTagReconcilerService>,
}

impl DiscountTracker {
    #[must_use]
    pub fn new(
        store: Arc<dyn TrackerStore>,
        reconciler: Arc<dyn DiscountTagReconcilerService>,
    ) -> Self {
        Self { store, reconciler }
    }

    async fn track(
        tx: &mut dyn TrackerTx,
        product: &StudentProduct,
    ) -> Result<usize, TrackerError> {
        let groups = tx
            .product_groups(&product.product_id)
            .await
            .map_err(TrackerError::storage("load product groups"))?;

        let active = tx
            .active_trackers(&product.id)
            .await
            .map_err(TrackerError::storage("load active trackers"))?;

        let planned = plan_tracking(product, &groups, &active);

        for tracker in &planned {
            let id = tx
                .insert_tracker(tracker)
                .await
                .map_err(TrackerError::storage("insert discount tracker"))?;

            debug!(
                tracker_id = %id,
                student_product_id = %tracker.student_product_id,
                discount_type = %tracker.discount_type,
                "tracking student product"
            );
        }

        Ok(planned.len())
    }

    async fn revise(
        tx: &mut dyn TrackerTx,
        product: &StudentProduct,
    ) -> Result<u64, TrackerError> {
        let prior = if product.prior_version() == &product.id {
            product.clone()
        } else {
            tx.student_product(product.prior_version())
                .await
                .map_err(TrackerError::storage("load prior student product"))?
        };

        let revised = tx
            .update_tracking_duration(&prior)
            .await
            .map_err(TrackerError::storage("update tracking duration"))?;

        if revised == 0 {
            debug!(student_product_id = %prior.id, "no tracker to revise");
        }

        Ok(revised)
    }

    /// Shrink the trackers of a voided order's student product to its
    /// current dates, or delete them once the product is cancelled.
    async fn void(
        tx: &mut dyn TrackerTx,
        product: &StudentProduct,
        outcome: &mut TrackingOutcome,
    ) -> Result<(), TrackerError> {
        if product.status == StudentProductStatus::Cancelled {
            outcome.expired += tx
                .expire_trackers(&product.id)
                .await
                .map_err(TrackerError::storage("expire discount trackers"))?;

            return Ok(());
        }

        let revised = tx
            .update_tracking_duration(product)
            .await
            .map_err(TrackerError::storage("update tracking duration"))?;

        if revised == 0 {
            debug!(student_product_id = %product.id, "no tracker to shrink");
        }

        outcome.revised += revised;

        Ok(())
    }
}

impl std::fmt::Debug for DiscountTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscountTracker").finish_non_exhaustive()
    }
}

#[async_trait]
impl DiscountTrackerService for DiscountTracker {
    #[tracing::instrument(
        name = "discounts.tracker.handle_order",
        skip(self, ctx, event),
        fields(
            organization = %ctx.organization,
            order_id = %event.order_id,
            student_id = %event.student_id,
            order_type = %event.order_type,
            order_status = %event.order_status,
            tracked = tracing::field::Empty,
            revised = tracing::field::Empty,
            expired = tracing::field::Empty
        ),
        err
    )]
    async fn handle_order(
        &self,
        ctx: &OrgContext,
        event: &OrderEvent,
    ) -> Result<TrackingOutcome, TrackerError> {
        let action = event.order_type.tracking_action(event.order_status);

        if action == TrackingAction::Ignore {
            return Ok(TrackingOutcome::default());
        }

        let mut tx = self
            .store
            .begin(ctx)
            .await
            .map_err(TrackerError::storage("begin transaction"))?;

        let products = if action == TrackingAction::Void {
            tx.student_products_by_order(&event.order_id)
                .await
                .map_err(TrackerError::storage("load voided student products"))?
        } else {
            let mut products = Vec::with_capacity(event.student_product_ids.len());

            for id in &event.student_product_ids {
                products.push(
                    tx.student_product(id)
                        .await
                        .map_err(TrackerError::storage("load student product"))?,
                );
            }

            products
        };

        let mut outcome = TrackingOutcome::default();

        for product in &products {
            if action == TrackingAction::Void {
                Self::void(tx.as_mut(), product, &mut outcome).await?;
            }

            if action.revises() {
                outcome.revised += Self::revise(tx.as_mut(), product).await?;
            }

            if action.tracks() {
                outcome.tracked += Self::track(tx.as_mut(), product).await?;
            }
        }

        let siblings = if outcome.changed() {
            tx.siblings(&event.student_id)
                .await
                .map_err(TrackerError::storage("load siblings"))?
        } else {
            Vec::new()
        };

        tx.commit()
            .await
            .map_err(TrackerError::storage("commit tracking"))?;

        let span = Span::current();
        span.record("tracked", outcome.tracked);
        span.record("revised", outcome.revised);
        span.record("expired", outcome.expired);

        if outcome.changed() {
            let mut students: Vec<StudentId> = vec![event.student_id.clone()];
            students.extend(siblings);

            let reconciled = self
                .reconciler
                .reconcile_sibling_tags(ctx, &students)
                .await;

            info!(
                students = students.len(),
                failed = reconciled.failed,
                "reconciled sibling discount tags"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use bursar::{
        ids::{DiscountTrackerId, OrderId, StudentProductId},
        lifecycle::{DiscountType, OrderStatus, OrderType},
        tracking::ProductGroup,
    };
    use jiff::{Timestamp, civil::date};
    use testresult::TestResult;

    use super::*;
    use crate::{
        batch::BatchOutcome,
        domain::discounts::{
            ports::{MockTrackerStore, MockTrackerTx},
            reconciler::MockDiscountTagReconcilerService,
            repositories::PgTrackersRepository,
        },
        test::{TestContext, fixtures::SEED_SIBLING_PRODUCT},
    };

    fn ctx() -> OrgContext {
        OrgContext::new("org-1".into(), "service-user".into())
    }

    fn event(order_type: OrderType, order_status: OrderStatus) -> OrderEvent {
        OrderEvent {
            student_id: "student-a".into(),
            location_id: "location-1".into(),
            order_id: "order-1".into(),
            order_type,
            order_status,
            student_product_ids: vec!["sp-1".into()],
        }
    }

    fn product(id: &str) -> StudentProduct {
        StudentProduct {
            id: id.into(),
            student_id: "student-a".into(),
            location_id: "location-1".into(),
            product_id: "product-1".into(),
            status: StudentProductStatus::Ordered,
            label: bursar::lifecycle::StudentProductLabel::Created,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            updated_from: None,
            updated_to: None,
            root_student_product: None,
            created_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn sibling_group() -> ProductGroup {
        ProductGroup {
            id: "group-sibling".into(),
            discount_type: DiscountType::Sibling,
        }
    }

    fn store_with(tx: MockTrackerTx) -> MockTrackerStore {
        let mut store = MockTrackerStore::new();

        store
            .expect_begin()
            .once()
            .return_once(move |_| Ok(Box::new(tx)));

        store
    }

    #[tokio::test]
    async fn new_order_tracks_and_reconciles_siblings() -> TestResult {
        let mut tx = MockTrackerTx::new();

        tx.expect_student_product()
            .once()
            .withf(|id| id.as_str() == "sp-1")
            .returning(|id| Ok(product(id.as_str())));
        tx.expect_product_groups()
            .once()
            .returning(|_| Ok(vec![sibling_group()]));
        tx.expect_active_trackers().once().returning(|_| Ok(vec![]));
        tx.expect_insert_tracker()
            .once()
            .withf(|tracker| {
                tracker.discount_type == DiscountType::Sibling && tracker.supersedes.is_none()
            })
            .returning(|_| Ok(DiscountTrackerId::new("tracker-1")));
        tx.expect_siblings()
            .once()
            .returning(|_| Ok(vec!["student-b".into()]));
        tx.expect_commit().once().returning(|| Ok(()));
        tx.expect_update_tracking_duration().never();

        let mut reconciler = MockDiscountTagReconcilerService::new();

        reconciler
            .expect_reconcile_sibling_tags()
            .once()
            .withf(|_, students| {
                students
                    .iter()
                    .map(StudentId::as_str)
                    .eq(["student-a", "student-b"])
            })
            .returning(|_, _| BatchOutcome::new());

        let tracker = DiscountTracker::new(Arc::new(store_with(tx)), Arc::new(reconciler));

        let outcome = tracker
            .handle_order(&ctx(), &event(OrderType::New, OrderStatus::Submitted))
            .await?;

        assert_eq!(outcome.tracked, 1);
        assert_eq!(outcome.revised, 0);

        Ok(())
    }

    #[tokio::test]
    async fn update_revises_the_prior_student_product() -> TestResult {
        let mut tx = MockTrackerTx::new();

        tx.expect_student_product()
            .withf(|id| id.as_str() == "sp-1")
            .once()
            .returning(|id| {
                let mut updated = product(id.as_str());
                updated.updated_from = Some(StudentProductId::new("sp-0"));
                Ok(updated)
            });
        tx.expect_student_product()
            .withf(|id| id.as_str() == "sp-0")
            .once()
            .returning(|id| {
                let mut prior = product(id.as_str());
                prior.end_date = date(2024, 3, 31);
                Ok(prior)
            });
        tx.expect_update_tracking_duration()
            .once()
            .withf(|prior| prior.id.as_str() == "sp-0" && prior.end_date == date(2024, 3, 31))
            .returning(|_| Ok(1));
        tx.expect_product_groups()
            .once()
            .returning(|_| Ok(vec![sibling_group()]));
        tx.expect_active_trackers().once().returning(|_| Ok(vec![]));
        tx.expect_insert_tracker()
            .once()
            .returning(|_| Ok(DiscountTrackerId::new("tracker-2")));
        tx.expect_siblings().once().returning(|_| Ok(vec![]));
        tx.expect_commit().once().returning(|| Ok(()));

        let mut reconciler = MockDiscountTagReconcilerService::new();

        reconciler
            .expect_reconcile_sibling_tags()
            .once()
            .returning(|_, _| BatchOutcome::new());

        let tracker = DiscountTracker::new(Arc::new(store_with(tx)), Arc::new(reconciler));

        let outcome = tracker
            .handle_order(&ctx(), &event(OrderType::Update, OrderStatus::Submitted))
            .await?;

        assert_eq!((outcome.tracked, outcome.revised), (1, 1));

        Ok(())
    }

    #[tokio::test]
    async fn void_with_nothing_to_shrink_is_not_an_error() -> TestResult {
        let mut tx = MockTrackerTx::new();

        tx.expect_student_products_by_order()
            .once()
            .withf(|order| *order == OrderId::new("order-1"))
            .returning(|_| Ok(vec![product("sp-1")]));
        tx.expect_update_tracking_duration()
            .once()
            .returning(|_| Ok(0));
        tx.expect_commit().once().returning(|| Ok(()));
        tx.expect_student_product().never();
        tx.expect_insert_tracker().never();
        tx.expect_siblings().never();

        let mut reconciler = MockDiscountTagReconcilerService::new();
        reconciler.expect_reconcile_sibling_tags().never();

        let tracker = DiscountTracker::new(Arc::new(store_with(tx)), Arc::new(reconciler));

        let outcome = tracker
            .handle_order(&ctx(), &event(OrderType::New, OrderStatus::Voided))
            .await?;

        assert!(!outcome.changed());

        Ok(())
    }

    #[tokio::test]
    async fn voided_update_shrinks_its_own_student_product() -> TestResult {
        let mut tx = MockTrackerTx::new();

        tx.expect_student_products_by_order()
            .once()
            .returning(|_| {
                let mut updated = product("sp-1");
                updated.updated_from = Some(StudentProductId::new("sp-0"));
                updated.end_date = date(2024, 6, 30);
                Ok(vec![updated])
            });
        tx.expect_student_product().never();
        tx.expect_update_tracking_duration()
            .once()
            .withf(|voided| voided.id.as_str() == "sp-1" && voided.end_date == date(2024, 6, 30))
            .returning(|_| Ok(1));
        tx.expect_expire_trackers().never();
        tx.expect_insert_tracker().never();
        tx.expect_siblings().once().returning(|_| Ok(vec![]));
        tx.expect_commit().once().returning(|| Ok(()));

        let mut reconciler = MockDiscountTagReconcilerService::new();

        reconciler
            .expect_reconcile_sibling_tags()
            .once()
            .returning(|_, _| BatchOutcome::new());

        let tracker = DiscountTracker::new(Arc::new(store_with(tx)), Arc::new(reconciler));

        let outcome = tracker
            .handle_order(&ctx(), &event(OrderType::Update, OrderStatus::Voided))
            .await?;

        assert_eq!((outcome.tracked, outcome.revised, outcome.expired), (0, 1, 0));

        Ok(())
    }

    #[tokio::test]
    async fn voiding_a_cancelled_student_product_expires_its_trackers() -> TestResult {
        let mut tx = MockTrackerTx::new();

        tx.expect_student_products_by_order()
            .once()
            .returning(|_| {
                let mut cancelled = product("sp-1");
                cancelled.status = StudentProductStatus::Cancelled;
                Ok(vec![cancelled])
            });
        tx.expect_expire_trackers()
            .once()
            .withf(|id| id.as_str() == "sp-1")
            .returning(|_| Ok(2));
        tx.expect_update_tracking_duration().never();
        tx.expect_siblings()
            .once()
            .returning(|_| Ok(vec!["student-b".into()]));
        tx.expect_commit().once().returning(|| Ok(()));

        let mut reconciler = MockDiscountTagReconcilerService::new();

        reconciler
            .expect_reconcile_sibling_tags()
            .once()
            .withf(|_, students| students.len() == 2)
            .returning(|_, _| BatchOutcome::new());

        let tracker = DiscountTracker::new(Arc::new(store_with(tx)), Arc::new(reconciler));

        let outcome = tracker
            .handle_order(&ctx(), &event(OrderType::New, OrderStatus::Voided))
            .await?;

        assert_eq!(outcome.expired, 2);
        assert_eq!(outcome.revised, 0);

        Ok(())
    }

    #[tokio::test]
    async fn pending_orders_are_ignored() -> TestResult {
        let mut store = MockTrackerStore::new();
        store.expect_begin().never();

        let mut reconciler = MockDiscountTagReconcilerService::new();
        reconciler.expect_reconcile_sibling_tags().never();

        let tracker = DiscountTracker::new(Arc::new(store), Arc::new(reconciler));

        let outcome = tracker
            .handle_order(&ctx(), &event(OrderType::New, OrderStatus::Pending))
            .await?;

        assert_eq!(outcome, TrackingOutcome::default());

        Ok(())
    }

    fn seeded_event(order_status: OrderStatus) -> OrderEvent {
        OrderEvent {
            student_id: "student-1".into(),
            ..event(OrderType::New, order_status)
        }
    }

    fn reconciling() -> MockDiscountTagReconcilerService {
        let mut reconciler = MockDiscountTagReconcilerService::new();

        reconciler
            .expect_reconcile_sibling_tags()
            .returning(|_, _| BatchOutcome::new());

        reconciler
    }

    async fn active_sibling_trackers(ctx: &TestContext) -> Result<usize, sqlx::Error> {
        let mut tx = ctx.begin().await;

        let active = PgTrackersRepository
            .list_active_trackers(&mut tx, &StudentProductId::new("sp-1"))
            .await?;

        Ok(active
            .iter()
            .filter(|tracker| tracker.discount_type == DiscountType::Sibling)
            .count())
    }

    #[tokio::test]
    async fn replayed_orders_keep_one_active_tracker_per_discount_type() -> TestResult {
        let ctx = TestContext::new().await;
        ctx.seed(&ctx.org, SEED_SIBLING_PRODUCT).await;

        let tracker = DiscountTracker::new(Arc::new(ctx.store.clone()), Arc::new(reconciling()));
        let submitted = seeded_event(OrderStatus::Submitted);

        let first = tracker.handle_order(&ctx.org, &submitted).await?;
        let replayed = tracker.handle_order(&ctx.org, &submitted).await?;

        assert_eq!((first.tracked, replayed.tracked), (1, 1));
        assert_eq!(active_sibling_trackers(&ctx).await?, 1);

        let mut tx = ctx.begin().await;
        let rows: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM student_discount_trackers WHERE student_product_id = 'sp-1'",
        )
        .fetch_one(&mut *tx)
        .await?;

        assert_eq!(rows, 2, "the replay superseded the first row");

        Ok(())
    }

    #[tokio::test]
    async fn voiding_after_cancellation_leaves_no_active_tracker() -> TestResult {
        let ctx = TestContext::new().await;
        ctx.seed(&ctx.org, SEED_SIBLING_PRODUCT).await;

        let tracker = DiscountTracker::new(Arc::new(ctx.store.clone()), Arc::new(reconciling()));

        tracker
            .handle_order(&ctx.org, &seeded_event(OrderStatus::Submitted))
            .await?;

        ctx.seed(
            &ctx.org,
            "UPDATE student_products SET product_status = 'CANCELLED' \
             WHERE student_product_id = 'sp-1'",
        )
        .await;

        let voided = tracker
            .handle_order(&ctx.org, &seeded_event(OrderStatus::Voided))
            .await?;

        assert_eq!(voided.expired, 1);
        assert_eq!(active_sibling_trackers(&ctx).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn storage_failures_roll_back_without_reconciling() {
        let mut tx = MockTrackerTx::new();

        tx.expect_student_product()
            .once()
            .returning(|_| Err(sqlx::Error::PoolTimedOut));
        tx.expect_commit().never();

        let mut reconciler = MockDiscountTagReconcilerService::new();
        reconciler.expect_reconcile_sibling_tags().never();

        let tracker = DiscountTracker::new(Arc::new(store_with(tx)), Arc::new(reconciler));

        let result = tracker
            .handle_order(&ctx(), &event(OrderType::Enrollment, OrderStatus::Submitted))
            .await;

        assert!(
            matches!(
                result,
                Err(TrackerError::Sql {
                    operation: "load student product",
                    ..
                })
            ),
            "expected a storage error, got {result:?}"
        );
    }
}
