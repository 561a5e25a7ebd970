use crate::error::CatalogError;
use crate::models::{
    BillingActionPolicy, BillingAlignment, CallContext, PhaseType, Plan, PlanAlignment,
    PlanPhaseSpecifier, PriceOverride,
};
use crate::services::catalog::{Catalog, CatalogProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const DEFAULT_PRICE_LIST: &str = "DEFAULT";

/// Fixed catalog built up front.
#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    plans: HashMap<String, Plan>,
    included_addons: HashMap<String, HashSet<String>>,
    available_addons: HashMap<String, HashSet<String>>,
    change_policy: BillingActionPolicy,
    change_policy_by_plan: HashMap<String, BillingActionPolicy>,
    cancel_policy: BillingActionPolicy,
    billing_alignment: BillingAlignment,
    plan_alignment: PlanAlignment,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self {
            plans: HashMap::new(),
            included_addons: HashMap::new(),
            available_addons: HashMap::new(),
            change_policy: BillingActionPolicy::Immediate,
            change_policy_by_plan: HashMap::new(),
            cancel_policy: BillingActionPolicy::EndOfTerm,
            billing_alignment: BillingAlignment::Account,
            plan_alignment: PlanAlignment::StartOfBundle,
        }
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plans.insert(plan.name.to_lowercase(), plan);
        self
    }

    pub fn with_included_addon(mut self, base_product: &str, addon_product: &str) -> Self {
        self.included_addons
            .entry(base_product.to_string())
            .or_default()
            .insert(addon_product.to_string());
        self
    }

    pub fn with_available_addon(mut self, base_product: &str, addon_product: &str) -> Self {
        self.available_addons
            .entry(base_product.to_string())
            .or_default()
            .insert(addon_product.to_string());
        self
    }

    pub fn with_change_policy(mut self, policy: BillingActionPolicy) -> Self {
        self.change_policy = policy;
        self
    }

    /// Change policy used when changing away from `plan_name`.
    pub fn with_change_policy_for(mut self, plan_name: &str, policy: BillingActionPolicy) -> Self {
        self.change_policy_by_plan
            .insert(plan_name.to_lowercase(), policy);
        self
    }

    pub fn with_cancel_policy(mut self, policy: BillingActionPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    pub fn with_billing_alignment(mut self, alignment: BillingAlignment) -> Self {
        self.billing_alignment = alignment;
        self
    }

    pub fn with_plan_alignment(mut self, alignment: PlanAlignment) -> Self {
        self.plan_alignment = alignment;
        self
    }

    fn match_by_product(&self, spec: &PlanPhaseSpecifier) -> Option<&Plan> {
        let price_list = spec.price_list_name.as_deref().unwrap_or(DEFAULT_PRICE_LIST);
        self.plans.values().find(|plan| {
            spec.product_name
                .as_deref()
                .map_or(true, |p| plan.product.name.eq_ignore_ascii_case(p))
                && spec.billing_period.map_or(true, |bp| plan.billing_period == bp)
                && plan.price_list_name.eq_ignore_ascii_case(price_list)
        })
    }
}

impl Catalog for InMemoryCatalog {
    fn resolve_plan(
        &self,
        spec: &PlanPhaseSpecifier,
        overrides: &[PriceOverride],
        effective_date: DateTime<Utc>,
    ) -> Result<Plan, CatalogError> {
        if spec.is_empty() {
            return Err(CatalogError::EmptySpecifier);
        }
        let plan = match spec.plan_name.as_deref() {
            Some(name) => self.find_plan(name, effective_date)?,
            None => self
                .match_by_product(spec)
                .cloned()
                .ok_or_else(|| {
                    CatalogError::PlanNotFound(spec.product_name.clone().unwrap_or_default())
                })?,
        };
        if plan.phases.is_empty() {
            return Err(CatalogError::NoInitialPhase(plan.name));
        }
        if plan.phase_index(spec.phase_type).is_none() {
            return Err(CatalogError::PlanNotFound(format!(
                "{} (no {} phase)",
                plan.name,
                spec.phase_type.map(|p| p.as_str()).unwrap_or_default()
            )));
        }
        if let Some(stray) = overrides
            .iter()
            .find(|o| plan.phase_index(Some(o.phase_type)).is_none())
        {
            return Err(CatalogError::InvalidPriceOverride {
                plan: plan.name,
                phase: stray.phase_type.as_str().to_string(),
            });
        }
        Ok(plan)
    }

    fn find_plan(
        &self,
        plan_name: &str,
        _effective_date: DateTime<Utc>,
    ) -> Result<Plan, CatalogError> {
        self.plans
            .get(&plan_name.to_lowercase())
            .cloned()
            .ok_or_else(|| CatalogError::PlanNotFound(plan_name.to_string()))
    }

    fn plan_change_policy(
        &self,
        from: &Plan,
        _phase: Option<PhaseType>,
        _to: &Plan,
        _effective_date: DateTime<Utc>,
    ) -> Result<BillingActionPolicy, CatalogError> {
        Ok(self
            .change_policy_by_plan
            .get(&from.name.to_lowercase())
            .copied()
            .unwrap_or(self.change_policy))
    }

    fn plan_cancel_policy(
        &self,
        _plan: &Plan,
        _phase: Option<PhaseType>,
        _effective_date: DateTime<Utc>,
    ) -> Result<BillingActionPolicy, CatalogError> {
        Ok(self.cancel_policy)
    }

    fn billing_alignment(&self, _plan: &Plan, _phase: Option<PhaseType>) -> BillingAlignment {
        self.billing_alignment
    }

    fn plan_alignment(&self, _plan: &Plan) -> PlanAlignment {
        self.plan_alignment
    }

    fn is_addon_included(&self, base_product: &str, addon: &Plan) -> bool {
        self.included_addons
            .get(base_product)
            .is_some_and(|set| set.contains(&addon.product.name))
    }

    fn is_addon_available(&self, base_product: &str, addon: &Plan) -> bool {
        self.available_addons
            .get(base_product)
            .is_some_and(|set| set.contains(&addon.product.name))
    }
}

/// Provider that always hands out the same catalog snapshot.
pub struct StaticCatalogProvider {
    catalog: Arc<InMemoryCatalog>,
}

impl StaticCatalogProvider {
    pub fn new(catalog: InMemoryCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalogProvider {
    async fn full_catalog(&self, _ctx: &CallContext) -> Result<Arc<dyn Catalog>, CatalogError> {
        let catalog: Arc<dyn Catalog> = self.catalog.clone();
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillingPeriod, BundleLimit, PhaseDuration, PlanPhase, Product, ProductCategory};

    fn plan(name: &str, product: &str) -> Plan {
        Plan {
            name: name.to_string(),
            product: Product {
                name: product.to_string(),
                category: ProductCategory::Base,
            },
            price_list_name: DEFAULT_PRICE_LIST.to_string(),
            billing_period: BillingPeriod::Monthly,
            phases: vec![PlanPhase {
                phase_type: PhaseType::Evergreen,
                duration: PhaseDuration::Unlimited,
            }],
            plans_allowed_in_bundle: BundleLimit::Unlimited,
        }
    }

    #[test]
    fn test_resolves_by_name_or_product() {
        let catalog = InMemoryCatalog::new().with_plan(plan("Pro-Monthly", "Pro"));
        let now = Utc::now();

        let by_name = catalog
            .resolve_plan(&PlanPhaseSpecifier::for_plan("pro-monthly"), &[], now)
            .unwrap();
        assert_eq!(by_name.name, "Pro-Monthly");

        let by_product = PlanPhaseSpecifier {
            plan_name: None,
            product_name: Some("pro".to_string()),
            billing_period: Some(BillingPeriod::Monthly),
            price_list_name: None,
            phase_type: None,
        };
        assert!(catalog.resolve_plan(&by_product, &[], now).is_ok());

        let missing_phase = PlanPhaseSpecifier::for_plan("pro-monthly").with_phase(PhaseType::Trial);
        assert!(matches!(
            catalog.resolve_plan(&missing_phase, &[], now),
            Err(CatalogError::PlanNotFound(_))
        ));
    }

    #[test]
    fn test_overrides_must_target_plan_phases() {
        let catalog = InMemoryCatalog::new().with_plan(plan("Pro-Monthly", "Pro"));
        let spec = PlanPhaseSpecifier::for_plan("pro-monthly");
        let override_for = |phase_type| PriceOverride {
            phase_type,
            currency: "USD".to_string(),
            fixed_price: None,
            recurring_price: Some("9.99".to_string()),
        };

        assert!(catalog
            .resolve_plan(&spec, &[override_for(PhaseType::Evergreen)], Utc::now())
            .is_ok());
        assert_eq!(
            catalog.resolve_plan(&spec, &[override_for(PhaseType::Trial)], Utc::now()),
            Err(CatalogError::InvalidPriceOverride {
                plan: "Pro-Monthly".to_string(),
                phase: "trial".to_string(),
            })
        );
    }
}
