//! Standard function library
//!
//! The toy tax and transfer model: taxes, benefits and the aggregation into
//! disposable income, plus the baseline parameters they read.

mod aggregation;
mod benefits;
mod taxes;

pub use aggregation::disposable_income;
pub use benefits::benefits;
pub use taxes::{income_taxes, wealth_taxes};

use dagcore::ParameterBundle;
use dagruntime::FunctionRegistry;

/// Register every model function with a registry
pub fn register_all(registry: &mut FunctionRegistry) {
    registry.register(taxes::income_taxes_spec());
    registry.register(taxes::wealth_taxes_spec());
    registry.register(benefits::benefits_spec());
    registry.register(aggregation::disposable_income_spec());
}

/// A fresh registry holding the model functions
pub fn registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    register_all(&mut registry);
    registry
}

/// Baseline parameters; user parameters override or extend these
pub fn baseline_params() -> ParameterBundle {
    ParameterBundle::new()
        .with("income_tax", 0.2)
        .with("wealth_tax", 0.9)
        .with("benefit_per_child", 2000.0)
        .with("benefit_cutoff", 30000.0)
}
