//! Selection declarations: `from <namespace> import name, ...`.

use indexmap::IndexSet;
use log::debug;
use tm_ast::{Module, Stmt};

/// Strip every top-level `from <namespace> import ...` statement from
/// `module` and return the transformer names they select, in order of first
/// appearance. Names listed in `reserved` are dropped from the selection but
/// their declarations are still removed. Imports from any other module are
/// left in place.
pub fn discover(module: &mut Module, namespace: &str, reserved: &[String]) -> IndexSet<String> {
    let mut selected = IndexSet::new();
    module.body.retain(|stmt| {
        let Stmt::ImportFrom(import) = stmt else {
            return true;
        };
        if import.module != namespace {
            return true;
        }
        for alias in &import.names {
            if reserved.iter().any(|r| *r == alias.name) {
                debug!("ignoring reserved name `{}` in {namespace}", alias.name);
                continue;
            }
            if selected.insert(alias.name.clone()) {
                debug!("selected transformer `{}`", alias.name);
            }
        }
        false
    });
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_parser::parse_module;

    fn reserved() -> Vec<String> {
        vec!["_loader".into(), "setup".into()]
    }

    fn run(source: &str) -> (Module, Vec<String>) {
        let mut module = parse_module(source, "discover.tm").unwrap().module;
        let names = discover(&mut module, "__transformers__", &reserved());
        (module, names.into_iter().collect())
    }

    #[test]
    fn strips_declarations_and_keeps_order() {
        let (module, names) = run("\
from __transformers__ import b_pass, a_pass
x = 1
from __transformers__ import c_pass, b_pass
");
        assert_eq!(names, vec!["b_pass", "a_pass", "c_pass"]);
        assert_eq!(module.body.len(), 1);
        assert_eq!(module.body[0].kind(), "Assign");
    }

    #[test]
    fn reserved_names_are_never_selected() {
        let (module, names) = run("from __transformers__ import setup, _loader, ellipsis_partial\n");
        assert_eq!(names, vec!["ellipsis_partial"]);
        assert!(module.body.is_empty());
    }

    #[test]
    fn other_namespaces_are_untouched() {
        let (module, names) = run("\
from helpers import ellipsis_partial
from __transformers__.sub import thing
import __transformers__
");
        assert!(names.is_empty());
        assert_eq!(module.body.len(), 3);
    }

    #[test]
    fn nested_declarations_are_not_discovered() {
        let (module, names) = run("\
def f():
    from __transformers__ import ellipsis_partial
    return 1
");
        assert!(names.is_empty());
        let Stmt::FunctionDef(def) = &module.body[0] else {
            panic!("expected def");
        };
        assert_eq!(def.body[0].kind(), "ImportFrom");
    }
}
