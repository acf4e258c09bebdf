use dagcore::{FunctionContext, FunctionError, FunctionSpec, Value};

/// Child benefits: `benefit_per_child` per child, paid only where income
/// does not exceed `benefit_cutoff`.
pub fn benefits(ctx: &FunctionContext) -> Result<Value, FunctionError> {
    let params = ctx.params()?;
    let per_child = params.require_f64("benefit_per_child")?;
    let cutoff = params.require_f64("benefit_cutoff")?;

    let raw_benefits = ctx
        .require_input("n_children")?
        .map(|children| children * per_child)?;

    raw_benefits.zip_with(ctx.require_input("income")?, |benefit, income| {
        if income <= cutoff {
            benefit
        } else {
            0.0
        }
    })
}

pub(crate) fn benefits_spec() -> FunctionSpec {
    FunctionSpec::new("benefits", ["income", "n_children"], benefits).with_params()
}
