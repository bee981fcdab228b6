use tally::expr::{parse_expression, BinaryOp, ExprError, ExprNode};
use tally::model::TimeModifier;

#[test]
fn test_bare_id_normalizes_to_current() {
    let ast = parse_expression("KD1008+KD1009").unwrap();
    let refs = ast.refs();
    assert_eq!(refs.len(), 2);
    assert!(refs.iter().all(|r| r.modifier == TimeModifier::Current));
}

#[test]
fn test_qualified_and_bare_forms_mix() {
    let ast = parse_expression("${KD1008.lastYear}-KD1009*${KD1010}").unwrap();
    let refs = ast.refs();
    assert_eq!(refs[0].id, "KD1008");
    assert_eq!(refs[0].modifier, TimeModifier::LastYear);
    assert_eq!(refs[1].id, "KD1009");
    assert_eq!(refs[1].modifier, TimeModifier::Current);
    assert_eq!(refs[2].id, "KD1010");
    assert_eq!(refs[2].modifier, TimeModifier::Current);
}

#[test]
fn test_arithmetic_structure_survives() {
    // sum-of-products precedence and explicit parens both matter for the
    // compiler's verbatim pass-through.
    let ast = parse_expression("KD1008*0.7/(KD1008+100)").unwrap();
    match ast {
        ExprNode::Binary {
            op: BinaryOp::Div,
            left,
            right,
        } => {
            assert!(matches!(*left, ExprNode::Binary { op: BinaryOp::Mul, .. }));
            assert!(matches!(*right, ExprNode::Paren(_)));
        }
        other => panic!("unexpected ast shape: {other:?}"),
    }
}

#[test]
fn test_number_lexemes_survive_verbatim() {
    let ast = parse_expression("KD1008*0.70+1.500").unwrap();
    fn numbers(node: &ExprNode, out: &mut Vec<String>) {
        match node {
            ExprNode::Number(n) => out.push(n.clone()),
            ExprNode::Neg(inner) | ExprNode::Paren(inner) => numbers(inner, out),
            ExprNode::Binary { left, right, .. } => {
                numbers(left, out);
                numbers(right, out);
            }
            ExprNode::Ref(_) => {}
        }
    }
    let mut found = Vec::new();
    numbers(&ast, &mut found);
    assert_eq!(found, vec!["0.70", "1.500"]);
}

#[test]
fn test_malformed_expressions_are_fatal() {
    assert!(matches!(parse_expression(""), Err(ExprError::Empty)));
    assert!(matches!(
        parse_expression("KD1008+"),
        Err(ExprError::UnexpectedEnd)
    ));
    assert!(matches!(
        parse_expression("(KD1008"),
        Err(ExprError::UnexpectedEnd)
    ));
    assert!(matches!(
        parse_expression("${KD1008.weekly}"),
        Err(ExprError::UnknownModifier { .. })
    ));
    assert!(matches!(
        parse_expression("${}"),
        Err(ExprError::InvalidReference { .. })
    ));
    assert!(matches!(
        parse_expression("revenue"),
        Err(ExprError::UnknownIdentifier { .. })
    ));
}

#[test]
fn test_ids_inside_braces_need_not_match_bare_shape() {
    // Explicit ${} references accept any identifier; only bare shorthand is
    // restricted to the two-letters-four-digits shape.
    let ast = parse_expression("${custom_metric_1}").unwrap();
    assert_eq!(ast.refs()[0].id, "custom_metric_1");
}
