//! Static identifier classification
//!
//! Walks a parsed expression and splits the identifiers it mentions into
//! variables (inputs the caller has to supply) and functions.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::ast::Expression;

/// Names that are literals rather than identifiers
const LITERAL_NAMES: [&str; 3] = ["True", "False", "None"];

/// Result of classifying the identifiers of an expression
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Analysis {
    /// Bare references not known as functions, sorted
    pub variables: Vec<String>,
    /// Called names, method names and known function references, sorted
    pub functions: Vec<String>,
}

/// Classify identifiers of `expr`
///
/// A bare name is a variable unless `known_functions` contains it. A name in
/// call position is always a function, even when it also appears as a bare
/// reference elsewhere. Method names of method calls count as functions.
#[must_use]
pub fn analyze(expr: &Expression, known_functions: &HashSet<String>) -> Analysis {
    let mut collector = Collector::default();
    collector.visit(expr);

    let mut functions = collector.called;
    let mut variables = BTreeSet::new();
    for name in collector.referenced {
        if LITERAL_NAMES.contains(&name) {
            continue;
        }
        if known_functions.contains(name) {
            functions.insert(name);
        } else if !functions.contains(name) {
            variables.insert(name);
        }
    }

    Analysis {
        variables: variables.into_iter().map(str::to_string).collect(),
        functions: functions.into_iter().map(str::to_string).collect(),
    }
}

#[derive(Default)]
struct Collector<'a> {
    referenced: BTreeSet<&'a str>,
    called: BTreeSet<&'a str>,
}

impl<'a> Collector<'a> {
    fn visit(&mut self, expr: &'a Expression) {
        match expr {
            Expression::Name(name) => {
                self.referenced.insert(name);
            }
            Expression::Call {
                func,
                args,
                keywords,
            } => {
                match func.as_ref() {
                    Expression::Name(name) => {
                        self.called.insert(name);
                    }
                    Expression::Attribute { value, attr } => {
                        self.called.insert(attr);
                        self.visit(value);
                    }
                    other => self.visit(other),
                }
                for arg in args {
                    self.visit(arg);
                }
                for keyword in keywords {
                    self.visit(&keyword.value);
                }
            }
            other => other.for_each_child(&mut |child| self.visit(child)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn classify(source: &str, known: &[&str]) -> Analysis {
        let expr = Parser::new()
            .parse(source)
            .unwrap_or_else(|err| panic!("failed to parse {source:?}: {err}"));
        let known = known.iter().map(|name| (*name).to_string()).collect();
        analyze(&expr, &known)
    }

    #[test]
    fn test_variables_and_functions() {
        let analysis = classify("len(items) + count * 2", &[]);
        assert_eq!(analysis.variables, vec!["count", "items"]);
        assert_eq!(analysis.functions, vec!["len"]);
    }

    #[test]
    fn test_known_functions_are_not_variables() {
        let analysis = classify("map(upper, names)", &["upper"]);
        assert_eq!(analysis.variables, vec!["names"]);
        assert_eq!(analysis.functions, vec!["map", "upper"]);
    }

    #[test]
    fn test_call_position_wins() {
        let analysis = classify("f(f)", &[]);
        assert!(analysis.variables.is_empty());
        assert_eq!(analysis.functions, vec!["f"]);
    }

    #[test]
    fn test_method_calls_and_attributes() {
        let analysis = classify("user.name.upper() if user.active else ''", &[]);
        assert_eq!(analysis.variables, vec!["user"]);
        assert_eq!(analysis.functions, vec!["upper"]);
    }

    #[test]
    fn test_comprehensions_and_templates() {
        let analysis = classify("[f'{x}{sep}' for x in items if x > limit]", &[]);
        assert_eq!(analysis.variables, vec!["items", "limit", "sep", "x"]);
        assert!(analysis.functions.is_empty());
    }

    #[test]
    fn test_literals_are_excluded() {
        let analysis = classify("True and None or False", &[]);
        assert_eq!(analysis, Analysis::default());
    }
}
