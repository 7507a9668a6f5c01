use crate::tpl::ast::AstNode;
use dashmap::DashMap;
use std::sync::{Arc, LazyLock};

/// A parsed template plus the source it was parsed from, so a cache hit can
/// be invalidated if the caller re-registers the same name with different
/// content (e.g. during mapper reload in tests).
pub struct CachedTemplate {
    pub source: Arc<str>,
    pub ast: Vec<AstNode>,
}

pub static TEMPLATE_CACHE: LazyLock<DashMap<String, Arc<CachedTemplate>>> =
    LazyLock::new(DashMap::new);

/// Returns the cached AST for `name` if its source still matches `content`,
/// otherwise (re-)parses and caches it.
pub fn get_ast(name: &str, content: &str) -> Vec<AstNode> {
    if let Some(cached) = TEMPLATE_CACHE.get(name)
        && &*cached.source == content
    {
        return cached.ast.clone();
    }

    let ast = crate::tpl::parser::parse_template(content);
    let entry = Arc::new(CachedTemplate {
        source: Arc::from(content),
        ast: ast.clone(),
    });
    TEMPLATE_CACHE.insert(name.to_string(), entry);
    ast
}

/// Registers a named, already-rendered sub-template for `<include refid="...">`
/// to resolve against (distinct from anonymous ad-hoc templates rendered by
/// `render_template`, which cache under their own name too).
pub fn register_include(refid: &str, content: &str) {
    get_ast(refid, content);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reparses_when_source_changes() {
        let first = get_ast("t1", "hello");
        assert_eq!(first.len(), 1);
        let second = get_ast("t1", "hello #{x}");
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn reuses_cache_for_unchanged_source() {
        get_ast("t2", "a #{b}");
        let cached = TEMPLATE_CACHE.get("t2").unwrap().ast.clone();
        let again = get_ast("t2", "a #{b}");
        assert_eq!(cached.len(), again.len());
    }
}
