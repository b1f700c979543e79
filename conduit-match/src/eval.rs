use conduit_message::Message;

use crate::ast::{CompareOp, Expr, Field, Literal};

/// Evaluates a compiled match expression against a message.
///
/// Evaluation never fails: a field reference that doesn't apply (there is
/// no such case in the fixed header field set, but the rule generalizes to
/// any future field) simply compares against that type's zero value, and
/// `&&`/`||` short-circuit the same way Rust's own operators do.
pub fn evaluate(expr: &Expr, message: &Message) -> bool {
    match expr {
        Expr::True => true,
        Expr::False => false,
        Expr::And(lhs, rhs) => evaluate(lhs, message) && evaluate(rhs, message),
        Expr::Or(lhs, rhs) => evaluate(lhs, message) || evaluate(rhs, message),
        Expr::Compare { field, op, literal } => evaluate_comparison(*field, *op, literal, message),
    }
}

fn evaluate_comparison(field: Field, op: CompareOp, literal: &Literal, message: &Message) -> bool {
    match (field, literal) {
        (Field::String(header), Literal::String(expected)) => {
            let actual = message.string_header(header);
            compare_str(&actual, op, expected)
        }
        (Field::Numeric(header), Literal::Number(expected)) => {
            let actual = message.numeric_header(header);
            compare_num(actual, op, *expected)
        }
        // The compiler never produces a field/literal type mismatch, but
        // evaluation is defined to never fail, so treat it as non-match
        // rather than panicking if a tree were hand-constructed otherwise.
        _ => false,
    }
}

fn compare_str(actual: &str, op: CompareOp, expected: &str) -> bool {
    match op {
        CompareOp::Eq => actual == expected,
        CompareOp::Ne => actual != expected,
        CompareOp::Lt => actual < expected,
        CompareOp::Le => actual <= expected,
        CompareOp::Gt => actual > expected,
        CompareOp::Ge => actual >= expected,
    }
}

fn compare_num(actual: f64, op: CompareOp, expected: f64) -> bool {
    match op {
        CompareOp::Eq => actual == expected,
        CompareOp::Ne => actual != expected,
        CompareOp::Lt => actual < expected,
        CompareOp::Le => actual <= expected,
        CompareOp::Gt => actual > expected,
        CompareOp::Ge => actual >= expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::compile;

    fn sample_message() -> Message {
        let mut msg = Message::new("app.request", "GET /health");
        msg.severity = 3;
        msg.hostname = "web-01".into();
        msg
    }

    #[test]
    fn evaluates_a_matching_comparison() {
        let expr = compile(r#"Type == "app.request""#).unwrap();
        assert!(evaluate(&expr, &sample_message()));
    }

    #[test]
    fn evaluates_a_non_matching_comparison() {
        let expr = compile(r#"Type == "other""#).unwrap();
        assert!(!evaluate(&expr, &sample_message()));
    }

    #[test]
    fn and_short_circuits_like_rust_operators() {
        let expr = compile(r#"Severity == 3 && Hostname == "web-01""#).unwrap();
        assert!(evaluate(&expr, &sample_message()));

        let expr = compile(r#"Severity == 99 && Hostname == "web-01""#).unwrap();
        assert!(!evaluate(&expr, &sample_message()));
    }

    #[test]
    fn or_matches_if_either_side_matches() {
        let expr = compile(r#"Severity == 99 || Hostname == "web-01""#).unwrap();
        assert!(evaluate(&expr, &sample_message()));
    }

    #[test]
    fn worked_example_from_the_spec() {
        // Type == "app.request" && (Severity <= 3 || Hostname == "web-01")
        let expr =
            compile(r#"Type == "app.request" && (Severity <= 3 || Hostname == "web-01")"#)
                .unwrap();
        assert!(evaluate(&expr, &sample_message()));
    }
}
