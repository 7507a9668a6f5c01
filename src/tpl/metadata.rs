use crate::Result;
use crate::param::ParamMap;
use crate::tpl::action::{Action, detect_action};
use crate::tpl::engine;
use crate::udbc::driver::Driver;
use crate::udbc::value::Value;

/// The outcome of binding a template against a parameter map: the rendered,
/// driver-ready SQL, its positional parameter values in placeholder order,
/// and the statement's detected action.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub prepare_sql: String,
    pub params: Vec<Value>,
    pub action: Action,
}

/// Renders `template_content` against `params` and classifies the result.
/// Action detection runs on the un-rendered source, so a `${}` literal
/// substitution can never disturb which action a template is classified as.
pub fn parse_with_param_map(
    template_name: &str,
    template_content: &str,
    params: &ParamMap,
    driver: &dyn Driver,
) -> Result<Metadata> {
    let action = detect_action(template_content)?;
    let (prepare_sql, bound) = engine::render_template(template_name, template_content, params, driver)?;
    Ok(Metadata {
        prepare_sql,
        params: bound.into_iter().map(|(_, v)| v).collect(),
        action,
    })
}
