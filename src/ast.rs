//! Abstract syntax tree for the expression language

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::format_float;

/// Arithmetic and bitwise binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition operator (+)
    Add,
    /// Subtraction operator (-)
    Subtract,
    /// Multiplication operator (*)
    Multiply,
    /// True division operator (/)
    Divide,
    /// Floor division operator (//)
    FloorDivide,
    /// Modulo operator (%)
    Modulo,
    /// Exponent operator (**)
    Power,
    /// Bitwise and / set intersection (&)
    BitAnd,
    /// Bitwise or / set union (|)
    BitOr,
    /// Bitwise xor / symmetric difference (^)
    BitXor,
    /// Left shift (<<)
    LeftShift,
    /// Right shift (>>)
    RightShift,
}

impl BinaryOp {
    /// Source symbol
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::FloorDivide => "//",
            Self::Modulo => "%",
            Self::Power => "**",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Negation operator (-)
    Negate,
    /// Unary plus (+)
    Plus,
    /// Logical not
    Not,
    /// Bitwise inversion (~)
    Invert,
}

impl UnaryOp {
    /// Source symbol
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Plus => "+",
            Self::Not => "not ",
            Self::Invert => "~",
        }
    }
}

/// Comparison operators, chainable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// <
    Less,
    /// <=
    LessOrEqual,
    /// >
    Greater,
    /// >=
    GreaterOrEqual,
    /// is
    Is,
    /// is not
    IsNot,
    /// in
    In,
    /// not in
    NotIn,
}

impl CompareOp {
    /// Source symbol
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// Short-circuiting boolean operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    /// and
    And,
    /// or
    Or,
}

/// Literal constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// None
    None,
    /// True / False
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
}

/// Subscript forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Index {
    /// `value[index]`
    Single(Expression),
    /// `value[lower:upper:step]`, every part optional
    Slice {
        /// Start bound
        lower: Option<Expression>,
        /// End bound
        upper: Option<Expression>,
        /// Step
        step: Option<Expression>,
    },
}

/// Binding target of a comprehension clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    /// Single name
    Name(String),
    /// Tuple unpacking, possibly nested
    Tuple(Vec<Target>),
}

impl Target {
    /// Every name bound by the target
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Name(name) => vec![name.as_str()],
            Self::Tuple(targets) => targets.iter().flat_map(Target::names).collect(),
        }
    }
}

/// One `for target in iter if cond...` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    /// Loop target
    pub target: Target,
    /// Iterated expression
    pub iter: Expression,
    /// Guards, all of which must hold
    pub conditions: Vec<Expression>,
}

/// `name=value` argument of a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    /// Parameter name
    pub name: String,
    /// Argument expression
    pub value: Expression,
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Kind of element-producing comprehension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComprehensionKind {
    /// `[x for ...]`
    List,
    /// `{x for ...}`
    Set,
    /// `(x for ...)`, materialized as a list
    Generator,
}

/// Piece of an f-string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplatePart {
    /// Literal text
    Literal(String),
    /// Interpolated field `{expr!conversion:format_spec}`
    Field {
        /// Interpolated expression
        expr: Expression,
        /// `r`, `s` or `a`
        conversion: Option<char>,
        /// Format specification after `:`
        format_spec: Option<String>,
    },
}

/// Represents an expression in the language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Constant value
    Literal(Literal),
    /// Identifier reference
    Name(String),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expression>,
    },
    /// Possibly chained comparison `a < b <= c`
    Compare {
        /// First operand
        left: Box<Expression>,
        /// Following operator/operand pairs
        comparisons: Vec<(CompareOp, Expression)>,
    },
    /// `a and b and c` / `a or b`
    Bool {
        /// Operator
        op: BoolOp,
        /// Operands, at least two
        values: Vec<Expression>,
    },
    /// `then if condition else otherwise`
    Conditional {
        /// Test
        condition: Box<Expression>,
        /// Value when the test is truthy
        then_branch: Box<Expression>,
        /// Value when the test is falsy
        else_branch: Box<Expression>,
    },
    /// Function or method call
    Call {
        /// Callee
        func: Box<Expression>,
        /// Positional arguments
        args: Vec<Expression>,
        /// Keyword arguments in source order
        keywords: Vec<Keyword>,
    },
    /// `value.attr`
    Attribute {
        /// Receiver
        value: Box<Expression>,
        /// Attribute name
        attr: String,
    },
    /// `value[...]`
    Subscript {
        /// Receiver
        value: Box<Expression>,
        /// Index or slice
        index: Box<Index>,
    },
    /// List literal
    List(Vec<Expression>),
    /// Tuple literal
    Tuple(Vec<Expression>),
    /// Set literal
    Set(Vec<Expression>),
    /// Dict literal
    Dict(Vec<(Expression, Expression)>),
    /// f-string
    Template(Vec<TemplatePart>),
    /// List, set or generator comprehension
    Comprehension {
        /// Result kind
        kind: ComprehensionKind,
        /// Produced element
        element: Box<Expression>,
        /// Clauses, outermost first
        generators: Vec<Generator>,
    },
    /// Dict comprehension
    DictComprehension {
        /// Produced key
        key: Box<Expression>,
        /// Produced value
        value: Box<Expression>,
        /// Clauses, outermost first
        generators: Vec<Generator>,
    },
    /// `name := value`; parsed so the checker can reject it
    Assign {
        /// Bound name
        target: String,
        /// Assigned value
        value: Box<Expression>,
    },
    /// `lambda params: body`; parsed so the checker can reject it
    Lambda {
        /// Parameter names
        params: Vec<String>,
        /// Body
        body: Box<Expression>,
    },
}

impl Expression {
    /// Create a name reference
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Create a string literal
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::Str(value.into()))
    }

    /// Create an integer literal
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::Literal(Literal::Int(value))
    }

    /// Create a float literal
    #[must_use]
    pub fn float(value: f64) -> Self {
        Self::Literal(Literal::Float(value))
    }

    /// Create a boolean literal
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::Literal(Literal::Bool(value))
    }

    /// Create a binary operation
    #[must_use]
    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Visit the direct children of this node in evaluation order
    pub fn for_each_child<'a>(&'a self, visit: &mut impl FnMut(&'a Expression)) {
        match self {
            Self::Literal(_) | Self::Name(_) => {}
            Self::Binary { left, right, .. } => {
                visit(left);
                visit(right);
            }
            Self::Unary { operand, .. } => visit(operand),
            Self::Compare { left, comparisons } => {
                visit(left);
                for (_, expr) in comparisons {
                    visit(expr);
                }
            }
            Self::Bool { values, .. } | Self::List(values) | Self::Tuple(values) | Self::Set(values) => {
                values.iter().for_each(visit);
            }
            Self::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                visit(condition);
                visit(then_branch);
                visit(else_branch);
            }
            Self::Call {
                func,
                args,
                keywords,
            } => {
                visit(func);
                args.iter().for_each(&mut *visit);
                keywords.iter().for_each(|keyword| visit(&keyword.value));
            }
            Self::Attribute { value, .. } => visit(value),
            Self::Subscript { value, index } => {
                visit(value);
                match index.as_ref() {
                    Index::Single(expr) => visit(expr),
                    Index::Slice { lower, upper, step } => {
                        for part in [lower, upper, step].into_iter().flatten() {
                            visit(part);
                        }
                    }
                }
            }
            Self::Dict(entries) => {
                for (key, value) in entries {
                    visit(key);
                    visit(value);
                }
            }
            Self::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Field { expr, .. } = part {
                        visit(expr);
                    }
                }
            }
            Self::Comprehension {
                element,
                generators,
                ..
            } => {
                visit_generators(generators, visit);
                visit(element);
            }
            Self::DictComprehension {
                key,
                value,
                generators,
            } => {
                visit_generators(generators, visit);
                visit(key);
                visit(value);
            }
            Self::Assign { value, .. } => visit(value),
            Self::Lambda { body, .. } => visit(body),
        }
    }

    /// Get the depth of the expression tree
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        self.for_each_child(&mut |child| deepest = deepest.max(child.depth()));
        deepest + 1
    }

    /// Count the total number of nodes in the expression
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 1;
        self.for_each_child(&mut |child| count += child.node_count());
        count
    }
}

fn visit_generators<'a>(generators: &'a [Generator], visit: &mut impl FnMut(&'a Expression)) {
    for generator in generators {
        visit(&generator.iter);
        generator.conditions.iter().for_each(&mut *visit);
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{}", format_float(*v)),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Tuple(targets) => {
                write!(f, "(")?;
                write_joined(f, targets)?;
                write!(f, ")")
            }
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_generators(f: &mut fmt::Formatter<'_>, generators: &[Generator]) -> fmt::Result {
    for generator in generators {
        write!(f, " for {} in {}", generator.target, generator.iter)?;
        for condition in &generator.conditions {
            write!(f, " if {condition}")?;
        }
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Name(name) => write!(f, "{name}"),
            Self::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Self::Unary { op, operand } => write!(f, "({}{operand})", op.symbol()),
            Self::Compare { left, comparisons } => {
                write!(f, "({left}")?;
                for (op, expr) in comparisons {
                    write!(f, " {} {expr}", op.symbol())?;
                }
                write!(f, ")")
            }
            Self::Bool { op, values } => {
                let keyword = match op {
                    BoolOp::And => " and ",
                    BoolOp::Or => " or ",
                };
                write!(f, "(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{keyword}")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, ")")
            }
            Self::Conditional {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "({then_branch} if {condition} else {else_branch})"),
            Self::Call {
                func,
                args,
                keywords,
            } => {
                write!(f, "{func}(")?;
                write_joined(f, args)?;
                if !args.is_empty() && !keywords.is_empty() {
                    write!(f, ", ")?;
                }
                write_joined(f, keywords)?;
                write!(f, ")")
            }
            Self::Attribute { value, attr } => write!(f, "{value}.{attr}"),
            Self::Subscript { value, index } => match index.as_ref() {
                Index::Single(expr) => write!(f, "{value}[{expr}]"),
                Index::Slice { lower, upper, step } => {
                    write!(f, "{value}[")?;
                    if let Some(lower) = lower {
                        write!(f, "{lower}")?;
                    }
                    write!(f, ":")?;
                    if let Some(upper) = upper {
                        write!(f, "{upper}")?;
                    }
                    if let Some(step) = step {
                        write!(f, ":{step}")?;
                    }
                    write!(f, "]")
                }
            },
            Self::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Self::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Self::Set(items) => {
                write!(f, "{{")?;
                write_joined(f, items)?;
                write!(f, "}}")
            }
            Self::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::Template(parts) => {
                write!(f, "f\"")?;
                for part in parts {
                    match part {
                        TemplatePart::Literal(text) => {
                            write!(f, "{}", text.replace('{', "{{").replace('}', "}}"))?;
                        }
                        TemplatePart::Field {
                            expr,
                            conversion,
                            format_spec,
                        } => {
                            write!(f, "{{{expr}")?;
                            if let Some(conversion) = conversion {
                                write!(f, "!{conversion}")?;
                            }
                            if let Some(spec) = format_spec {
                                write!(f, ":{spec}")?;
                            }
                            write!(f, "}}")?;
                        }
                    }
                }
                write!(f, "\"")
            }
            Self::Comprehension {
                kind,
                element,
                generators,
            } => {
                let (open, close) = match kind {
                    ComprehensionKind::List => ("[", "]"),
                    ComprehensionKind::Set => ("{", "}"),
                    ComprehensionKind::Generator => ("(", ")"),
                };
                write!(f, "{open}{element}")?;
                write_generators(f, generators)?;
                write!(f, "{close}")
            }
            Self::DictComprehension {
                key,
                value,
                generators,
            } => {
                write!(f, "{{{key}: {value}")?;
                write_generators(f, generators)?;
                write!(f, "}}")
            }
            Self::Assign { target, value } => write!(f, "({target} := {value})"),
            Self::Lambda { params, body } => write!(f, "(lambda {}: {body})", params.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_builders() {
        assert_eq!(Expression::name("age"), Expression::Name("age".to_string()));
        assert_eq!(
            Expression::string("hello"),
            Expression::Literal(Literal::Str("hello".to_string()))
        );
        assert_eq!(Expression::int(42), Expression::Literal(Literal::Int(42)));
    }

    #[test]
    fn test_expression_depth() {
        let simple = Expression::int(42);
        assert_eq!(simple.depth(), 1);
        assert_eq!(simple.node_count(), 1);

        let add = Expression::binary(BinaryOp::Add, Expression::int(1), Expression::int(2));
        assert_eq!(add.depth(), 2);
        assert_eq!(add.node_count(), 3);

        let nested = Expression::binary(BinaryOp::Multiply, add, Expression::name("x"));
        assert_eq!(nested.depth(), 3);
        assert_eq!(nested.node_count(), 5);
    }

    #[test]
    fn test_expression_display() {
        let expr = Expression::Compare {
            left: Box::new(Expression::name("x")),
            comparisons: vec![(CompareOp::Less, Expression::int(10))],
        };
        assert_eq!(expr.to_string(), "(x < 10)");

        let call = Expression::Call {
            func: Box::new(Expression::name("len")),
            args: vec![Expression::List(vec![Expression::int(1)])],
            keywords: Vec::new(),
        };
        assert_eq!(call.to_string(), "len([1])");

        let call = Expression::Call {
            func: Box::new(Expression::name("round")),
            args: vec![Expression::name("x")],
            keywords: vec![Keyword {
                name: "ndigits".to_string(),
                value: Expression::int(2),
            }],
        };
        assert_eq!(call.to_string(), "round(x, ndigits=2)");
        assert_eq!(Expression::Tuple(vec![Expression::int(1)]).to_string(), "(1,)");
    }

    #[test]
    fn test_target_names() {
        let target = Target::Tuple(vec![
            Target::Name("k".to_string()),
            Target::Tuple(vec![Target::Name("a".to_string()), Target::Name("b".to_string())]),
        ]);
        assert_eq!(target.names(), vec!["k", "a", "b"]);
        assert_eq!(target.to_string(), "(k, (a, b))");
    }
}
