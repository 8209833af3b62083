//! Tree-walking interpreter for parsed expressions
//!
//! Name resolution order, innermost first: comprehension scopes, registered
//! functions, the caller's context, then ambient constants. Every value the
//! interpreter builds is checked against the policy's size limits, and the
//! wall-clock deadline is checked at each call and comprehension iteration.

use std::collections::HashMap;
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};

use crate::ast::{
    BoolOp, ComprehensionKind, Expression, Generator, Index, Keyword, Literal, Target,
    TemplatePart,
};
use crate::error::EvaluationError;
use crate::functions::FunctionTable;
use crate::methods;
use crate::operators::{self, Limits};
use crate::sandbox::SandboxPolicy;
use crate::value::{Callable, Value, ValueKind};

type Scope = HashMap<String, Value>;

/// Single-use evaluation state for one expression
pub struct Interpreter<'a> {
    context: &'a HashMap<String, Value>,
    constants: Option<&'a HashMap<String, Value>>,
    functions: &'a FunctionTable,
    policy: &'a SandboxPolicy,
    limits: Limits,
    scopes: Vec<Scope>,
    depth: usize,
    start_time: Instant,
}

impl<'a> Interpreter<'a> {
    /// Interpreter over `context` with the given function table and policy
    #[must_use]
    pub fn new(
        context: &'a HashMap<String, Value>,
        functions: &'a FunctionTable,
        policy: &'a SandboxPolicy,
    ) -> Self {
        Self {
            context,
            constants: None,
            functions,
            policy,
            limits: Limits::from_policy(policy),
            scopes: Vec::new(),
            depth: 0,
            start_time: Instant::now(),
        }
    }

    /// Names consulted after the context
    #[must_use]
    pub fn with_constants(mut self, constants: &'a HashMap<String, Value>) -> Self {
        self.constants = Some(constants);
        self
    }

    /// Evaluate `expr`; the deadline starts now
    ///
    /// # Errors
    ///
    /// Returns the first runtime failure, including limit violations
    pub fn evaluate(&mut self, expr: &Expression) -> Result<Value, EvaluationError> {
        self.start_time = Instant::now();
        self.scopes.clear();
        self.depth = 0;
        self.eval(expr)
    }

    fn check_deadline(&self) -> Result<(), EvaluationError> {
        let limit = self.policy.max_execution_time;
        if !limit.is_zero() && self.start_time.elapsed() > limit {
            return Err(EvaluationError::Timeout { limit });
        }
        Ok(())
    }

    /// Run `body` one generator clause deeper
    fn nested<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, EvaluationError>,
    ) -> Result<T, EvaluationError> {
        if self.depth >= self.policy.max_recursion_depth {
            return Err(EvaluationError::RecursionLimit {
                limit: self.policy.max_recursion_depth,
            });
        }
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    /// Run `body` in a fresh comprehension scope
    fn scoped<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, EvaluationError>,
    ) -> Result<T, EvaluationError> {
        self.scopes.push(Scope::new());
        let result = body(self);
        self.scopes.pop();
        result
    }

    fn local(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn global(&self, name: &str) -> Option<&Value> {
        self.context
            .get(name)
            .or_else(|| self.constants.and_then(|constants| constants.get(name)))
    }

    fn lookup(&self, name: &str) -> Result<Value, EvaluationError> {
        if let Some(value) = self.local(name) {
            return Ok(value.clone());
        }
        if let Some(callable) = self.functions.get(name) {
            return Ok(Value::Function(callable.clone()));
        }
        self.global(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn eval(&mut self, expr: &Expression) -> Result<Value, EvaluationError> {
        match expr {
            Expression::Literal(literal) => Ok(literal_value(literal)),
            Expression::Name(name) => self.lookup(name),
            Expression::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                operators::binary(*op, &left, &right, &self.limits)
            }
            Expression::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                operators::unary(*op, &operand)
            }
            Expression::Compare { left, comparisons } => {
                let mut left = self.eval(left)?;
                for (op, right) in comparisons {
                    let right = self.eval(right)?;
                    if !operators::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expression::Bool { op, values } => {
                let short_circuit_on = matches!(op, BoolOp::Or);
                for value in values {
                    if self.eval(value)?.is_truthy() == short_circuit_on {
                        return Ok(Value::Bool(short_circuit_on));
                    }
                }
                Ok(Value::Bool(!short_circuit_on))
            }
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Expression::Call {
                func,
                args,
                keywords,
            } => self.eval_call(func, args, keywords),
            Expression::Attribute { value, attr } => {
                let receiver = self.eval(value)?;
                self.attribute(&receiver, attr)
            }
            Expression::Subscript { value, index } => {
                let receiver = self.eval(value)?;
                match index.as_ref() {
                    Index::Single(index) => {
                        let index = self.eval(index)?;
                        operators::subscript(&receiver, &index)
                    }
                    Index::Slice { lower, upper, step } => {
                        let lower = self.eval_optional(lower.as_ref())?;
                        let upper = self.eval_optional(upper.as_ref())?;
                        let step = self.eval_optional(step.as_ref())?;
                        operators::slice(&receiver, lower.as_ref(), upper.as_ref(), step.as_ref())
                    }
                }
            }
            Expression::List(items) => Ok(Value::List(self.eval_items(items)?)),
            Expression::Tuple(items) => Ok(Value::Tuple(self.eval_items(items)?)),
            Expression::Set(items) => {
                let mut set = IndexSet::new();
                for item in self.eval_items(items)? {
                    item.ensure_hashable()?;
                    set.insert(item);
                }
                Ok(Value::Set(set))
            }
            Expression::Dict(entries) => {
                self.limits.check_collection(entries.len())?;
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval(key)?;
                    key.ensure_hashable()?;
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                Ok(Value::Dict(map))
            }
            Expression::Template(parts) => self.eval_template(parts),
            Expression::Comprehension {
                kind,
                element,
                generators,
            } => self.eval_comprehension(*kind, element, generators),
            Expression::DictComprehension {
                key,
                value,
                generators,
            } => {
                let limits = self.limits;
                let mut map = IndexMap::new();
                self.scoped(|this| {
                    this.generate(generators, &mut |this| {
                        let key = this.eval(key)?;
                        key.ensure_hashable()?;
                        let value = this.eval(value)?;
                        map.insert(key, value);
                        limits.check_collection(map.len())
                    })
                })?;
                Ok(Value::Dict(map))
            }
            Expression::Assign { .. } => Err(EvaluationError::Unsupported {
                construct: "assignment expression".to_string(),
            }),
            Expression::Lambda { .. } => Err(EvaluationError::Unsupported {
                construct: "lambda".to_string(),
            }),
        }
    }

    fn eval_optional(
        &mut self,
        expr: Option<&Expression>,
    ) -> Result<Option<Value>, EvaluationError> {
        expr.map(|expr| self.eval(expr)).transpose()
    }

    fn eval_items(&mut self, items: &[Expression]) -> Result<Vec<Value>, EvaluationError> {
        self.limits.check_collection(items.len())?;
        items.iter().map(|item| self.eval(item)).collect()
    }

    fn eval_call(
        &mut self,
        func: &Expression,
        args: &[Expression],
        keywords: &[Keyword],
    ) -> Result<Value, EvaluationError> {
        match func {
            Expression::Name(name) => {
                let callee = self.callee(name)?;
                let args = self.eval_items(args)?;
                let keywords = self.eval_keywords(keywords)?;
                self.invoke(&callee, args, keywords)
            }
            Expression::Attribute { value, attr } => {
                let receiver = self.eval(value)?;
                let args = self.eval_items(args)?;
                let keywords = self.eval_keywords(keywords)?;
                if let Value::Dict(map) = &receiver
                    && !methods::method_names(ValueKind::Dict).contains(&attr.as_str())
                {
                    let member = map.get(&Value::Str(attr.clone())).cloned().unwrap_or_default();
                    return self.call_value(&member, args, keywords);
                }
                if !keywords.is_empty() {
                    return Err(EvaluationError::Unsupported {
                        construct: format!("keyword arguments to method '{attr}'"),
                    });
                }
                self.check_deadline()?;
                methods::call_method(&receiver, attr, &args, self.policy)
            }
            other => {
                let callee = self.eval(other)?;
                let args = self.eval_items(args)?;
                let keywords = self.eval_keywords(keywords)?;
                self.call_value(&callee, args, keywords)
            }
        }
    }

    fn eval_keywords(
        &mut self,
        keywords: &[Keyword],
    ) -> Result<Vec<(String, Value)>, EvaluationError> {
        keywords
            .iter()
            .map(|keyword| Ok((keyword.name.clone(), self.eval(&keyword.value)?)))
            .collect()
    }

    /// Resolve a called name; plain data is never callable by name
    fn callee(&self, name: &str) -> Result<Callable, EvaluationError> {
        let undefined = || EvaluationError::UndefinedFunction {
            name: name.to_string(),
        };
        if let Some(local) = self.local(name) {
            return match local {
                Value::Function(callable) => Ok(callable.clone()),
                other => Err(EvaluationError::NotCallable {
                    type_name: other.type_name().to_string(),
                }),
            };
        }
        if let Some(callable) = self.functions.get(name) {
            return Ok(callable.clone());
        }
        match self.global(name) {
            Some(Value::Function(callable)) => Ok(callable.clone()),
            _ => Err(undefined()),
        }
    }

    fn call_value(
        &self,
        callee: &Value,
        args: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> Result<Value, EvaluationError> {
        match callee {
            Value::Function(callable) => self.invoke(callable, args, keywords),
            other => Err(EvaluationError::NotCallable {
                type_name: other.type_name().to_string(),
            }),
        }
    }

    fn invoke(
        &self,
        callable: &Callable,
        args: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> Result<Value, EvaluationError> {
        self.check_deadline()?;
        let result = callable
            .bind(args, keywords)
            .and_then(|args| callable.call(&args))
            .map_err(|source| EvaluationError::Function {
                name: callable.name().to_string(),
                source,
            })?;
        self.limits.check_value(&result)?;
        Ok(result)
    }

    fn attribute(&self, receiver: &Value, attr: &str) -> Result<Value, EvaluationError> {
        if let Value::Dict(map) = receiver {
            if let Some(value) = map.get(&Value::Str(attr.to_string())) {
                return Ok(value.clone());
            }
            if !methods::method_names(ValueKind::Dict).contains(&attr) {
                return Ok(Value::None);
            }
        }
        methods::bound_method(receiver, attr, self.policy)
    }

    fn eval_template(&mut self, parts: &[TemplatePart]) -> Result<Value, EvaluationError> {
        let mut rendered = String::new();
        for part in parts {
            match part {
                TemplatePart::Literal(text) => rendered.push_str(text),
                TemplatePart::Field {
                    expr,
                    conversion,
                    format_spec,
                } => {
                    let value = self.eval(expr)?;
                    let value = match conversion {
                        Some('r') => Value::Str(value.repr()),
                        Some('a') => Value::Str(ascii_escape(&value.repr())),
                        Some(_) => Value::Str(value.to_string()),
                        None => value,
                    };
                    let spec = format_spec.as_deref().unwrap_or_default();
                    rendered.push_str(&methods::format_with_spec(&value, spec, &self.limits)?);
                }
            }
            self.limits.check_string(rendered.chars().count())?;
        }
        Ok(Value::Str(rendered))
    }

    fn eval_comprehension(
        &mut self,
        kind: ComprehensionKind,
        element: &Expression,
        generators: &[Generator],
    ) -> Result<Value, EvaluationError> {
        let limits = self.limits;
        let mut items = Vec::new();
        self.scoped(|this| {
            this.generate(generators, &mut |this| {
                items.push(this.eval(element)?);
                limits.check_collection(items.len())
            })
        })?;
        match kind {
            ComprehensionKind::List | ComprehensionKind::Generator => Ok(Value::List(items)),
            ComprehensionKind::Set => {
                let mut set = IndexSet::with_capacity(items.len());
                for item in items {
                    item.ensure_hashable()?;
                    set.insert(item);
                }
                Ok(Value::Set(set))
            }
        }
    }

    /// Drive the generator clauses, calling `emit` for every admitted binding
    fn generate(
        &mut self,
        generators: &[Generator],
        emit: &mut dyn FnMut(&mut Self) -> Result<(), EvaluationError>,
    ) -> Result<(), EvaluationError> {
        let Some((generator, rest)) = generators.split_first() else {
            return emit(self);
        };
        let iterable = self.eval(&generator.iter)?;
        self.nested(|this| {
            'items: for item in iterable.iterate()? {
                this.check_deadline()?;
                this.bind(&generator.target, item)?;
                for condition in &generator.conditions {
                    if !this.eval(condition)?.is_truthy() {
                        continue 'items;
                    }
                }
                this.generate(rest, emit)?;
            }
            Ok(())
        })
    }

    fn bind(&mut self, target: &Target, value: Value) -> Result<(), EvaluationError> {
        match target {
            Target::Name(name) => {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone(), value);
                }
                Ok(())
            }
            Target::Tuple(targets) => {
                let items = value.iterate().map_err(|_| {
                    EvaluationError::invalid(format!(
                        "cannot unpack non-iterable {} object",
                        value.type_name()
                    ))
                })?;
                if items.len() != targets.len() {
                    return Err(EvaluationError::invalid(if items.len() < targets.len() {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    } else {
                        format!("too many values to unpack (expected {})", targets.len())
                    }));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.bind(target, item)?;
                }
                Ok(())
            }
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

/// Python `ascii()` escaping of an already quoted repr
fn ascii_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match u32::from(c) {
            0..=0x7f => escaped.push(c),
            code @ 0x80..=0xff => escaped.push_str(&format!("\\x{code:02x}")),
            code @ 0x100..=0xffff => escaped.push_str(&format!("\\u{code:04x}")),
            code => escaped.push_str(&format!("\\U{code:08x}")),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn eval_with(
        source: &str,
        context: &HashMap<String, Value>,
        policy: &SandboxPolicy,
    ) -> Result<Value, EvaluationError> {
        let expr = Parser::new()
            .parse(source)
            .map_err(|err| EvaluationError::invalid(err.to_string()))?;
        let functions = FunctionRegistry::with_builtins().callables();
        Interpreter::new(context, &functions, policy).evaluate(&expr)
    }

    fn eval(source: &str) -> Result<Value, EvaluationError> {
        eval_with(source, &HashMap::new(), &SandboxPolicy::default())
    }

    fn user_context() -> HashMap<String, Value> {
        HashMap::from([
            (
                "user".to_string(),
                Value::dict([("name", Value::from("Alice")), ("age", Value::Int(30))]),
            ),
            ("items".to_string(), Value::from(vec![3, 1, 2])),
            ("empty".to_string(), Value::List(vec![])),
        ])
    }

    #[test]
    fn test_arithmetic_and_precedence() -> Result<(), EvaluationError> {
        assert_eq!(eval("2 + 3 * 4")?, Value::Int(14));
        assert_eq!(eval("2 ** 10")?, Value::Int(1024));
        assert_eq!(eval("10 // 3")?, Value::Int(3));
        assert_eq!(eval("10 % 3")?, Value::Int(1));
        assert_eq!(eval("-7 // 2")?, Value::Int(-4));
        assert_eq!(eval("7 / 2")?, Value::Float(3.5));
        assert!(matches!(eval("1 / 0"), Err(EvaluationError::DivisionByZero)));
        Ok(())
    }

    #[test]
    fn test_comparisons_and_boolean_operators() -> Result<(), EvaluationError> {
        assert_eq!(eval("1 < 2 < 3")?, Value::Bool(true));
        assert_eq!(eval("3 > 2 > 2")?, Value::Bool(false));
        assert_eq!(eval("1 and 'x'")?, Value::Bool(true));
        assert_eq!(eval("0 or ''")?, Value::Bool(false));
        // short circuit skips the undefined name
        assert_eq!(eval("False and missing")?, Value::Bool(false));
        assert_eq!(eval("'yes' if 2 > 1 else 'no'")?, Value::from("yes"));
        assert_eq!(eval("None is None")?, Value::Bool(true));
        assert_eq!(eval("2 in [1, 2]")?, Value::Bool(true));
        Ok(())
    }

    #[test]
    fn test_context_access() -> Result<(), EvaluationError> {
        let context = user_context();
        let policy = SandboxPolicy::default();
        assert_eq!(eval_with("user.name", &context, &policy)?, Value::from("Alice"));
        assert_eq!(eval_with("user['age'] + 1", &context, &policy)?, Value::Int(31));
        assert_eq!(eval_with("user.missing", &context, &policy)?, Value::None);
        assert_eq!(eval_with("items[-1]", &context, &policy)?, Value::Int(2));
        assert_eq!(
            eval_with("items[::-1]", &context, &policy)?,
            Value::from(vec![2, 1, 3])
        );
        assert!(matches!(
            eval_with("empty[0]", &context, &policy),
            Err(EvaluationError::Index { .. })
        ));
        assert!(matches!(
            eval_with("nobody", &context, &policy),
            Err(EvaluationError::UndefinedVariable { name }) if name == "nobody"
        ));
        Ok(())
    }

    #[test]
    fn test_function_calls() -> Result<(), EvaluationError> {
        let context = user_context();
        let policy = SandboxPolicy::default();
        assert_eq!(eval_with("len(items)", &context, &policy)?, Value::Int(3));
        assert_eq!(
            eval_with("sorted(items)", &context, &policy)?,
            Value::from(vec![1, 2, 3])
        );
        assert_eq!(eval("upper('abc')")?, Value::from("ABC"));
        assert_eq!(eval("list(map(str, [1, 2]))")?, Value::from(vec!["1", "2"]));
        assert!(matches!(
            eval("nope(1)"),
            Err(EvaluationError::UndefinedFunction { name }) if name == "nope"
        ));
        assert!(matches!(
            eval_with("user(1)", &context, &policy),
            Err(EvaluationError::UndefinedFunction { .. })
        ));
        assert!(matches!(eval("len(1, 2)"), Err(EvaluationError::Function { .. })));
        Ok(())
    }

    #[test]
    fn test_methods() -> Result<(), EvaluationError> {
        assert_eq!(eval("'a,b'.split(',')")?, Value::from(vec!["a", "b"]));
        assert_eq!(eval("{'a': 1}.get('b', 0)")?, Value::Int(0));
        assert_eq!(eval("' x '.strip().upper()")?, Value::from("X"));
        assert!(matches!(
            eval("'x'.encode()"),
            Err(EvaluationError::Attribute { .. })
        ));

        let mut policy = SandboxPolicy::default();
        policy.allowed_type_attrs.remove(&ValueKind::Str);
        assert!(matches!(
            eval_with("'x'.upper()", &HashMap::new(), &policy),
            Err(EvaluationError::ForbiddenAttribute { .. })
        ));
        policy.enforce_type_attrs = false;
        assert_eq!(
            eval_with("'x'.upper()", &HashMap::new(), &policy)?,
            Value::from("X")
        );
        Ok(())
    }

    #[test]
    fn test_comprehensions() -> Result<(), EvaluationError> {
        assert_eq!(
            eval("sum([x**2 for x in range(5) if x % 2 == 0])")?,
            Value::Int(20)
        );
        assert_eq!(
            eval("[(a, b) for a in [1, 2] for b in 'xy' if a > 1]")?,
            Value::List(vec![
                Value::Tuple(vec![Value::Int(2), Value::from("x")]),
                Value::Tuple(vec![Value::Int(2), Value::from("y")]),
            ])
        );
        assert_eq!(
            eval("{k: v * 2 for k, v in {'a': 1}.items()}")?,
            Value::dict([("a", Value::Int(2))])
        );
        assert_eq!(eval("{x % 2 for x in range(4)}")?.len(), Some(2));
        assert_eq!(eval("sum(x for x in [1, 2, 3])")?, Value::Int(6));
        assert!(matches!(
            eval("[a for a, b in [(1, 2, 3)]]"),
            Err(EvaluationError::InvalidOperation { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_comprehension_scope_does_not_leak() -> Result<(), EvaluationError> {
        let context = HashMap::from([("x".to_string(), Value::Int(100))]);
        let policy = SandboxPolicy::default();
        assert_eq!(
            eval_with("[x for x in [1, 2]] + [x]", &context, &policy)?,
            Value::from(vec![1, 2, 100])
        );
        assert!(matches!(
            eval("[y for y in [1]] and y"),
            Err(EvaluationError::UndefinedVariable { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_templates() -> Result<(), EvaluationError> {
        let context = user_context();
        let policy = SandboxPolicy::default();
        assert_eq!(
            eval_with("f'{user.name} is {user.age}'", &context, &policy)?,
            Value::from("Alice is 30")
        );
        assert_eq!(eval("f'{3.14159:.2f}|{42:>5}'")?, Value::from("3.14|   42"));
        assert_eq!(eval("f'{\"é\"!a}'")?, Value::from("'\\xe9'"));
        Ok(())
    }

    #[test]
    fn test_limits() {
        let mut policy = SandboxPolicy::default();
        policy.max_recursion_depth = 2;
        assert!(matches!(
            eval_with("[[[1 for a in [1]] for b in [1]] for c in [1]]", &HashMap::new(), &policy),
            Err(EvaluationError::RecursionLimit { limit: 2 })
        ));

        let mut policy = SandboxPolicy::default();
        policy.max_string_length = 8;
        assert!(matches!(
            eval_with("'abcd' * 3", &HashMap::new(), &policy),
            Err(EvaluationError::StringTooLong { .. })
        ));

        let mut policy = SandboxPolicy::default();
        policy.max_collection_size = 10;
        assert!(matches!(
            eval_with("[x for x in range(100)]", &HashMap::new(), &policy),
            Err(EvaluationError::CollectionTooLarge { .. })
        ));

        let mut policy = SandboxPolicy::default();
        policy.max_execution_time = Duration::from_nanos(1);
        assert!(matches!(
            eval_with(
                "[x for x in range(1000) for y in range(1000)]",
                &HashMap::new(),
                &policy
            ),
            Err(EvaluationError::Timeout { .. })
        ));
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(eval("(y := 1)"), Err(EvaluationError::Unsupported { .. })));
        assert!(matches!(eval("lambda: 1"), Err(EvaluationError::Unsupported { .. })));
    }

    #[test]
    fn test_constants_are_a_fallback() -> Result<(), EvaluationError> {
        let constants = HashMap::from([("pi".to_string(), Value::Float(3.0))]);
        let shadowing = HashMap::from([("pi".to_string(), Value::Int(4))]);
        let functions = FunctionTable::new();
        let policy = SandboxPolicy::default();
        let expr = Parser::new()
            .parse("pi")
            .map_err(|err| EvaluationError::invalid(err.to_string()))?;

        let empty = HashMap::new();
        let mut interpreter = Interpreter::new(&empty, &functions, &policy).with_constants(&constants);
        assert_eq!(interpreter.evaluate(&expr)?, Value::Float(3.0));

        let mut interpreter =
            Interpreter::new(&shadowing, &functions, &policy).with_constants(&constants);
        assert_eq!(interpreter.evaluate(&expr)?, Value::Int(4));
        Ok(())
    }
}
