use dagcore::{FunctionContext, FunctionError, FunctionSpec, Value};

/// Income tax owed: a flat `income_tax` rate applied to `income`.
pub fn income_taxes(ctx: &FunctionContext) -> Result<Value, FunctionError> {
    let rate = ctx.params()?.require_f64("income_tax")?;
    ctx.require_input("income")?.map(|income| rate * income)
}

/// Wealth tax owed: a flat `wealth_tax` rate applied to `wealth`.
pub fn wealth_taxes(ctx: &FunctionContext) -> Result<Value, FunctionError> {
    let rate = ctx.params()?.require_f64("wealth_tax")?;
    ctx.require_input("wealth")?.map(|wealth| rate * wealth)
}

pub(crate) fn income_taxes_spec() -> FunctionSpec {
    FunctionSpec::new("income_taxes", ["income"], income_taxes).with_params()
}

pub(crate) fn wealth_taxes_spec() -> FunctionSpec {
    FunctionSpec::new("wealth_taxes", ["wealth"], wealth_taxes).with_params()
}
