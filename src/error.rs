//! Error types for the expression engine
//!
//! Parse-time errors, runtime evaluation errors and the engine-level
//! [`ExpressionError`] that callers of [`crate::ExpressionEngine`] see.
//! Every engine error carries the expression text it was raised for.

use std::time::Duration;

use thiserror::Error;

use crate::functions::FunctionError;
use crate::sandbox::Violation;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// The expression could not be parsed
    #[error("Parse error in '{expression}': {source}")]
    Parse {
        /// Expression text
        expression: String,
        /// Underlying parse failure
        #[source]
        source: ParseError,
    },

    /// The sandbox rejected the expression before evaluation
    #[error("Security violation in '{expression}': {}", join_violations(violations))]
    SecurityViolation {
        /// Expression text
        expression: String,
        /// Every violation found by the checker
        violations: Vec<Violation>,
    },

    /// A name could not be resolved
    #[error("Undefined variable '{name}' in '{expression}'")]
    UndefinedVariable {
        /// The missing name
        name: String,
        /// Expression text
        expression: String,
    },

    /// A called function is not registered
    #[error("Undefined function '{name}' in '{expression}'")]
    UndefinedFunction {
        /// The missing function name
        name: String,
        /// Expression text
        expression: String,
    },

    /// An operator was applied to unsupported operand types
    #[error("Invalid operation in '{expression}': {source}")]
    InvalidOperation {
        /// Expression text
        expression: String,
        /// The operator failure
        #[source]
        source: EvaluationError,
    },

    /// The execution deadline passed
    #[error("Evaluation of '{expression}' exceeded {}", format_limit(*limit))]
    Timeout {
        /// Expression text
        expression: String,
        /// Configured limit
        limit: Duration,
    },

    /// Comprehension nesting exceeded the configured depth
    #[error("Evaluation of '{expression}' exceeded recursion depth {limit}")]
    RecursionLimit {
        /// Expression text
        expression: String,
        /// Configured depth limit
        limit: usize,
    },

    /// Any other runtime failure, including errors raised by registered functions
    #[error("Error evaluating '{expression}': {source}")]
    Evaluation {
        /// Expression text
        expression: String,
        /// Original cause
        #[source]
        source: EvaluationError,
    },

    /// A function could not be registered
    #[error("Cannot register function '{name}': {reason}")]
    Registration {
        /// Function name
        name: String,
        /// Why registration was refused
        reason: String,
    },
}

impl ExpressionError {
    /// Translate an interpreter failure into the engine taxonomy
    #[must_use]
    pub fn from_evaluation(expression: &str, error: EvaluationError) -> Self {
        let expression = expression.to_string();
        match error {
            EvaluationError::UndefinedVariable { name } => {
                Self::UndefinedVariable { name, expression }
            }
            EvaluationError::UndefinedFunction { name } => {
                Self::UndefinedFunction { name, expression }
            }
            EvaluationError::Timeout { limit } => Self::Timeout { expression, limit },
            EvaluationError::RecursionLimit { limit } => Self::RecursionLimit { expression, limit },
            source @ EvaluationError::InvalidOperation { .. } => {
                Self::InvalidOperation { expression, source }
            }
            source => Self::Evaluation { expression, source },
        }
    }

    /// The expression text the error was raised for, if any
    #[must_use]
    pub fn expression(&self) -> Option<&str> {
        match self {
            Self::Parse { expression, .. }
            | Self::SecurityViolation { expression, .. }
            | Self::UndefinedVariable { expression, .. }
            | Self::UndefinedFunction { expression, .. }
            | Self::InvalidOperation { expression, .. }
            | Self::Timeout { expression, .. }
            | Self::RecursionLimit { expression, .. }
            | Self::Evaluation { expression, .. } => Some(expression),
            Self::Registration { .. } => None,
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_limit(limit: Duration) -> String {
    format!("{:.3}s", limit.as_secs_f64())
}

/// Errors that can occur during parsing
///
/// Positions are byte offsets into the source text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Empty or whitespace-only input
    #[error("Empty expression")]
    Empty,

    /// Unexpected end of input
    #[error("Unexpected end of input at position {position}")]
    UnexpectedEof {
        /// Position in the input where parsing failed
        position: usize,
    },

    /// Unexpected token
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// The unexpected token that was encountered
        token: String,
        /// Position in the input where the token was found
        position: usize,
    },

    /// Invalid number format
    #[error("Invalid number '{value}' at position {position}")]
    InvalidNumber {
        /// The invalid numeric string that couldn't be parsed
        value: String,
        /// Position in the input where the number was found
        position: usize,
    },

    /// Invalid string literal
    #[error("Invalid string literal at position {position}: {reason}")]
    InvalidString {
        /// Position in the input where the invalid string was found
        position: usize,
        /// Reason why the string is invalid
        reason: String,
    },

    /// Missing closing delimiter
    #[error("Missing closing '{delimiter}' at position {position}")]
    MissingDelimiter {
        /// The delimiter character that was expected but not found
        delimiter: char,
        /// Position in the input where the delimiter was expected
        position: usize,
    },

    /// A statement keyword appeared where an expression was expected
    #[error("'{keyword}' is not allowed in an expression (position {position})")]
    ReservedKeyword {
        /// The keyword
        keyword: String,
        /// Position of the keyword
        position: usize,
    },

    /// Malformed call argument list
    #[error("Invalid call arguments at position {position}: {reason}")]
    InvalidArguments {
        /// Position of the offending argument
        position: usize,
        /// What is wrong with the arguments
        reason: String,
    },

    /// Expression too deep
    #[error("Expression nesting depth {depth} exceeds maximum of {max} at position {position}")]
    TooDeep {
        /// Current nesting depth
        depth: usize,
        /// Maximum allowed nesting depth
        max: usize,
        /// Where the limit was hit
        position: usize,
    },

    /// Expression too long
    #[error("Expression length {length} exceeds maximum of {max}")]
    TooLong {
        /// Current expression length
        length: usize,
        /// Maximum allowed expression length
        max: usize,
    },

    /// Trailing input after expression
    #[error("Unexpected input after expression at position {position}: '{input}'")]
    TrailingInput {
        /// The unexpected input that remained after parsing
        input: String,
        /// Where the trailing input starts
        position: usize,
    },
}

impl ParseError {
    /// Byte offset of the failure
    #[must_use]
    pub fn offset(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::UnexpectedEof { position }
            | Self::UnexpectedToken { position, .. }
            | Self::InvalidNumber { position, .. }
            | Self::InvalidString { position, .. }
            | Self::MissingDelimiter { position, .. }
            | Self::ReservedKeyword { position, .. }
            | Self::InvalidArguments { position, .. }
            | Self::TooDeep { position, .. }
            | Self::TrailingInput { position, .. } => *position,
            Self::TooLong { max, .. } => *max,
        }
    }

    /// Shift the reported position, used for f-string fragments parsed on their own
    #[must_use]
    pub(crate) fn shifted(self, base: usize) -> Self {
        match self {
            Self::UnexpectedEof { position } => Self::UnexpectedEof {
                position: position + base,
            },
            Self::UnexpectedToken { token, position } => Self::UnexpectedToken {
                token,
                position: position + base,
            },
            Self::InvalidNumber { value, position } => Self::InvalidNumber {
                value,
                position: position + base,
            },
            Self::InvalidString { position, reason } => Self::InvalidString {
                position: position + base,
                reason,
            },
            Self::MissingDelimiter {
                delimiter,
                position,
            } => Self::MissingDelimiter {
                delimiter,
                position: position + base,
            },
            Self::ReservedKeyword { keyword, position } => Self::ReservedKeyword {
                keyword,
                position: position + base,
            },
            Self::InvalidArguments { position, reason } => Self::InvalidArguments {
                position: position + base,
                reason,
            },
            Self::TooDeep {
                depth,
                max,
                position,
            } => Self::TooDeep {
                depth,
                max,
                position: position + base,
            },
            Self::TrailingInput { input, position } => Self::TrailingInput {
                input,
                position: position + base,
            },
            other @ (Self::Empty | Self::TooLong { .. }) => other,
        }
    }
}

/// Errors that can occur during evaluation
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    /// Name not found in functions, context or constants
    #[error("Undefined variable '{name}'")]
    UndefinedVariable {
        /// Name of the variable that was not found
        name: String,
    },

    /// Called name is not a registered function
    #[error("Undefined function '{name}'")]
    UndefinedFunction {
        /// Name of the missing function
        name: String,
    },

    /// Operator applied to unsupported operand types
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Description of the type error
        message: String,
    },

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Sequence index out of range or invalid
    #[error("Index error: {message}")]
    Index {
        /// What went wrong
        message: String,
    },

    /// Missing dictionary key
    #[error("Key error: {key}")]
    Key {
        /// Rendered key
        key: String,
    },

    /// Receiver has no such attribute or method
    #[error("'{type_name}' object has no attribute '{attr}'")]
    Attribute {
        /// Receiver type
        type_name: String,
        /// Requested attribute
        attr: String,
    },

    /// Method exists but is not in the policy's allowlist for the receiver type
    #[error("Access to '{type_name}.{attr}' is not allowed")]
    ForbiddenAttribute {
        /// Receiver type
        type_name: String,
        /// Requested attribute
        attr: String,
    },

    /// A non-function value was called
    #[error("'{type_name}' object is not callable")]
    NotCallable {
        /// Type of the called value
        type_name: String,
    },

    /// Function evaluation error
    #[error("Function '{name}' failed: {source}")]
    Function {
        /// Name of the function that failed
        name: String,
        /// Error returned by the function
        #[source]
        source: FunctionError,
    },

    /// Construct that parses but cannot be evaluated
    #[error("Unsupported construct: {construct}")]
    Unsupported {
        /// Construct description
        construct: String,
    },

    /// Overflow in integer arithmetic
    #[error("Numeric overflow in operation")]
    NumericOverflow,

    /// String result exceeds the configured maximum
    #[error("String length {length} exceeds maximum of {max}")]
    StringTooLong {
        /// Length of the string that would have been produced
        length: usize,
        /// Configured maximum
        max: usize,
    },

    /// Collection result exceeds the configured maximum
    #[error("Collection size {size} exceeds maximum of {max}")]
    CollectionTooLarge {
        /// Size of the collection that would have been produced
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Evaluation timeout
    #[error("Expression evaluation timed out after {:.3} seconds", limit.as_secs_f64())]
    Timeout {
        /// Configured limit
        limit: Duration,
    },

    /// Comprehension nesting too deep
    #[error("Expression evaluation exceeded maximum depth ({limit})")]
    RecursionLimit {
        /// Configured depth limit
        limit: usize,
    },
}

impl EvaluationError {
    /// Create a type error for binary operations
    #[must_use]
    pub fn binary_type_error(op: &str, left: &str, right: &str) -> Self {
        Self::InvalidOperation {
            message: format!("unsupported operand type(s) for {op}: '{left}' and '{right}'"),
        }
    }

    /// Create a type error for unary operations
    #[must_use]
    pub fn unary_type_error(op: &str, value: &str) -> Self {
        Self::InvalidOperation {
            message: format!("bad operand type for unary {op}: '{value}'"),
        }
    }

    /// Create a type error with a free-form message
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParseError::UnexpectedToken {
            token: "+".to_string(),
            position: 5,
        };
        assert_eq!(err.to_string(), "Unexpected token '+' at position 5");
        assert_eq!(err.offset(), 5);

        let err = EvaluationError::UndefinedVariable {
            name: "foo".to_string(),
        };
        assert_eq!(err.to_string(), "Undefined variable 'foo'");
    }

    #[test]
    fn test_type_error_helpers() {
        let err = EvaluationError::binary_type_error("+", "int", "str");
        assert_eq!(
            err.to_string(),
            "Invalid operation: unsupported operand type(s) for +: 'int' and 'str'"
        );

        let err = EvaluationError::unary_type_error("-", "str");
        assert_eq!(
            err.to_string(),
            "Invalid operation: bad operand type for unary -: 'str'"
        );
    }

    #[test]
    fn test_shifted_offsets() {
        let err = ParseError::UnexpectedEof { position: 3 }.shifted(10);
        assert_eq!(err.offset(), 13);
        assert_eq!(ParseError::Empty.shifted(10).offset(), 0);
    }

    #[test]
    fn test_translation_keeps_expression() {
        let err = ExpressionError::from_evaluation(
            "x + 1",
            EvaluationError::UndefinedVariable {
                name: "x".to_string(),
            },
        );
        assert!(matches!(err, ExpressionError::UndefinedVariable { ref name, .. } if name == "x"));
        assert_eq!(err.expression(), Some("x + 1"));

        let err = ExpressionError::from_evaluation("1 / 0", EvaluationError::DivisionByZero);
        assert!(matches!(err, ExpressionError::Evaluation { .. }));

        let err = ExpressionError::from_evaluation(
            "1 + 'a'",
            EvaluationError::binary_type_error("+", "int", "str"),
        );
        assert!(matches!(err, ExpressionError::InvalidOperation { .. }));
    }
}
