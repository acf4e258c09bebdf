use dagcore::{FunctionContext, FunctionError, FunctionSpec, Value};

pub fn disposable_income(ctx: &FunctionContext) -> Result<Value, FunctionError> {
    let income = ctx.require_input("income")?;
    let wealth = ctx.require_input("wealth")?;

    income
        .zip_with(wealth, |a, b| a + b)?
        .zip_with(ctx.require_input("income_taxes")?, |a, b| a - b)?
        .zip_with(ctx.require_input("wealth_taxes")?, |a, b| a - b)?
        .zip_with(ctx.require_input("benefits")?, |a, b| a + b)
}

pub(crate) fn disposable_income_spec() -> FunctionSpec {
    FunctionSpec::new(
        "disposable_income",
        ["income", "wealth", "income_taxes", "wealth_taxes", "benefits"],
        disposable_income,
    )
}
