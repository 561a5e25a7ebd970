use chrono::{DateTime, Utc};
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Failure reported by the catalog collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Plan {0} has no phases")]
    NoInitialPhase(String),

    #[error("Plan specifier does not identify a plan")]
    EmptySpecifier,

    #[error("Price override for phase {phase} does not match plan {plan}")]
    InvalidPriceOverride { plan: String, phase: String },

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Business-rule violations of the subscription core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Invalid specifier batch: {0}")]
    InvalidSpecifierBatch(String),

    #[error("Add-on limit exceeded for plan {0}")]
    AddOnLimitExceeded(String),

    #[error("Bundle {0} already has a base subscription")]
    BaseAlreadyExists(String),

    #[error("No base subscription for bundle {0}")]
    NoBaseSubscription(String),

    #[error("Requested date {requested} is before base subscription start {base_start}")]
    InvalidRequestedDate {
        requested: DateTime<Utc>,
        base_start: DateTime<Utc>,
    },

    #[error("No such base subscription in bundle {0}")]
    NoSuchBaseSubscription(Uuid),

    #[error("Invalid subscription id {0}")]
    InvalidSubscriptionId(Uuid),

    #[error("Invalid bundle id {0}")]
    InvalidBundleId(Uuid),

    #[error("No bundle for subscription {0}")]
    NoBundleForSubscription(Uuid),

    #[error("External key length {length} exceeds {max}")]
    ExternalKeyTooLong { length: usize, max: usize },

    #[error("Active bundle for key {0} belongs to another account")]
    ActiveBundleKeyConflict(String),

    #[error("Change dry run is only supported on base plans")]
    ChangeDryRunNotOnBasePlan,

    #[error("Add-on {addon} is not available for base product {base}")]
    AddOnNotAvailable { addon: String, base: String },

    #[error("Add-on {addon} is already included in base product {base}")]
    AddOnAlreadyIncluded { addon: String, base: String },

    #[error("Base subscription {0} is not active")]
    BaseNotActive(Uuid),

    #[error("Plan change from {from} is not allowed")]
    IllegalPlanChange { from: String },

    #[error("Start of term cannot be computed without a billing alignment")]
    BillingAlignmentUnavailable,

    #[error("Invalid bill cycle day {0}")]
    InvalidBillCycleDay(u32),

    #[error("Invalid dry run arguments: {0}")]
    InvalidDryRunArguments(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SubscriptionError {
    /// Stable label used for error metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            SubscriptionError::InvalidSpecifierBatch(_) => "invalid_specifier_batch",
            SubscriptionError::AddOnLimitExceeded(_) => "addon_limit_exceeded",
            SubscriptionError::BaseAlreadyExists(_) => "base_already_exists",
            SubscriptionError::NoBaseSubscription(_) => "no_base_subscription",
            SubscriptionError::InvalidRequestedDate { .. } => "invalid_requested_date",
            SubscriptionError::NoSuchBaseSubscription(_) => "no_such_base_subscription",
            SubscriptionError::InvalidSubscriptionId(_) => "invalid_subscription_id",
            SubscriptionError::InvalidBundleId(_) => "invalid_bundle_id",
            SubscriptionError::NoBundleForSubscription(_) => "no_bundle_for_subscription",
            SubscriptionError::ExternalKeyTooLong { .. } => "external_key_too_long",
            SubscriptionError::ActiveBundleKeyConflict(_) => "active_bundle_key_conflict",
            SubscriptionError::ChangeDryRunNotOnBasePlan => "change_dry_run_not_on_base_plan",
            SubscriptionError::AddOnNotAvailable { .. } => "addon_not_available",
            SubscriptionError::AddOnAlreadyIncluded { .. } => "addon_already_included",
            SubscriptionError::BaseNotActive(_) => "base_not_active",
            SubscriptionError::IllegalPlanChange { .. } => "illegal_plan_change",
            SubscriptionError::BillingAlignmentUnavailable => "billing_alignment_unavailable",
            SubscriptionError::InvalidBillCycleDay(_) => "invalid_bill_cycle_day",
            SubscriptionError::InvalidDryRunArguments(_) => "invalid_dry_run_arguments",
            SubscriptionError::Catalog(_) => "catalog",
            SubscriptionError::Store(_) => "store",
        }
    }
}

impl From<SubscriptionError> for AppError {
    fn from(err: SubscriptionError) -> Self {
        let message = anyhow::anyhow!(err.to_string());
        match err {
            SubscriptionError::InvalidSubscriptionId(_)
            | SubscriptionError::InvalidBundleId(_)
            | SubscriptionError::NoBundleForSubscription(_)
            | SubscriptionError::NoSuchBaseSubscription(_)
            | SubscriptionError::Store(StoreError::NotFound(_))
            | SubscriptionError::Catalog(CatalogError::PlanNotFound(_)) => AppError::NotFound(message),
            SubscriptionError::BaseAlreadyExists(_)
            | SubscriptionError::ActiveBundleKeyConflict(_)
            | SubscriptionError::AddOnLimitExceeded(_)
            | SubscriptionError::Store(StoreError::Conflict(_)) => AppError::Conflict(message),
            SubscriptionError::Store(StoreError::Unavailable(_))
            | SubscriptionError::Catalog(CatalogError::Unavailable(_)) => {
                AppError::ServiceUnavailable
            }
            SubscriptionError::Catalog(CatalogError::InvalidPriceOverride { .. }) => {
                AppError::BadRequest(message)
            }
            SubscriptionError::Catalog(_) => AppError::InternalError(message),
            _ => AppError::BadRequest(message),
        }
    }
}
