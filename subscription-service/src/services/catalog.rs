//! Catalog collaborator.
//!
//! The catalog maps plan specifiers to concrete plans and answers the policy
//! questions the lifecycle needs. A [`Catalog`] is a point-in-time snapshot and
//! is queried synchronously; the [`CatalogProvider`] fetches one per operation.

use crate::error::CatalogError;
use crate::models::{
    BillingActionPolicy, BillingAlignment, CallContext, PhaseType, Plan, PlanAlignment,
    PlanPhaseSpecifier, PriceOverride,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub trait Catalog: Send + Sync {
    /// Resolve a caller specifier (plus overrides) to the plan in force at
    /// `effective_date`.
    fn resolve_plan(
        &self,
        spec: &PlanPhaseSpecifier,
        overrides: &[PriceOverride],
        effective_date: DateTime<Utc>,
    ) -> Result<Plan, CatalogError>;

    fn find_plan(&self, plan_name: &str, effective_date: DateTime<Utc>)
        -> Result<Plan, CatalogError>;

    /// Default policy for changing from `from` (in `phase`) to `to`.
    fn plan_change_policy(
        &self,
        from: &Plan,
        phase: Option<PhaseType>,
        to: &Plan,
        effective_date: DateTime<Utc>,
    ) -> Result<BillingActionPolicy, CatalogError>;

    fn plan_cancel_policy(
        &self,
        plan: &Plan,
        phase: Option<PhaseType>,
        effective_date: DateTime<Utc>,
    ) -> Result<BillingActionPolicy, CatalogError>;

    fn billing_alignment(&self, plan: &Plan, phase: Option<PhaseType>) -> BillingAlignment;

    fn plan_alignment(&self, plan: &Plan) -> PlanAlignment;

    /// Add-on already part of the base product.
    fn is_addon_included(&self, base_product: &str, addon: &Plan) -> bool;

    /// Add-on may be purchased on top of the base product.
    fn is_addon_available(&self, base_product: &str, addon: &Plan) -> bool;
}

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn full_catalog(&self, ctx: &CallContext) -> Result<Arc<dyn Catalog>, CatalogError>;
}
