use crate::Result;
use crate::param::ParamMap;
use crate::tpl::render::RenderBuffer;
use crate::tpl::render_context::Context;
use crate::tpl::{cache, render};
use crate::udbc::driver::Driver;
use crate::udbc::value::Value;

/// Renders a SQL template by substituting parameters and returning the
/// generated SQL along with the bound parameter values, in left-to-right
/// `#{}` occurrence order.
pub fn render_template(
    template_name: &str,
    template_content: &str,
    params: &ParamMap,
    driver: &dyn Driver,
) -> Result<(String, Vec<(String, Value)>)> {
    let ast = cache::get_ast(template_name, template_content);

    let root = Value::Map(params.clone());

    let mut buf = RenderBuffer {
        sql: String::with_capacity(template_content.len()),
        params: Vec::with_capacity(params.len()),
        driver,
        param_count: 0,
    };

    let mut ctx = Context::new(&root);
    render::render(&ast, &mut ctx, &mut buf);

    Ok((buf.sql, buf.params))
}
