use serde_json::json;
use tacopt::{
    ir::{Instr, Literal},
    passes::{
        const_prop::{analyze, ConstProp},
        LocalPassMut,
    },
};

mod common;

#[test]
fn test_fold_straight_line() {
    let mut func = common::parse_fn(json!({
        "name": "main",
        "instrs": [
            { "op": "const", "dest": "a", "type": "int", "value": 4 },
            { "op": "const", "dest": "b", "type": "int", "value": 2 },
            { "op": "add", "dest": "c", "args": ["a", "b"] },
            { "op": "print", "args": ["a"] }
        ]
    }));

    let ((), changed) = ConstProp.run(&mut func).unwrap();
    assert!(changed);

    // c folds to the constant 6
    let c = func
        .instrs
        .iter()
        .find(|instr| instr.dest() == Some("c"))
        .unwrap();
    match c {
        Instr::Const { value, .. } => assert_eq!(*value, Literal::Int(6)),
        other => panic!("expected folded const, got {other:?}"),
    }
}

#[test]
fn test_division_by_zero_recovers() {
    let mut func = common::parse_fn(json!({
        "name": "main",
        "instrs": [
            { "op": "const", "dest": "x", "type": "int", "value": 0 },
            { "op": "const", "dest": "y", "type": "int", "value": 5 },
            { "op": "div", "dest": "z", "args": ["y", "x"] },
            { "op": "print", "args": ["z"] }
        ]
    }));

    // the pass must not abort; z stays a division, marked not-constant
    let ((), changed) = ConstProp.run(&mut func).unwrap();
    assert!(!changed);
    assert!(common::op_names(&func).contains(&"div"));
}

#[test]
fn test_division_floors_toward_negative_infinity() {
    let mut func = common::parse_fn(json!({
        "name": "main",
        "instrs": [
            { "op": "const", "dest": "x", "type": "int", "value": -7 },
            { "op": "const", "dest": "y", "type": "int", "value": 2 },
            { "op": "div", "dest": "z", "args": ["x", "y"] },
            { "op": "print", "args": ["z"] }
        ]
    }));

    ConstProp.run(&mut func).unwrap();

    let z = func
        .instrs
        .iter()
        .find(|instr| instr.dest() == Some("z"))
        .unwrap();
    match z {
        Instr::Const { value, .. } => assert_eq!(*value, Literal::Int(-4)),
        other => panic!("expected folded const, got {other:?}"),
    }
}

fn diamond(then_value: i64, else_value: i64) -> serde_json::Value {
    json!({
        "name": "main",
        "instrs": [
            { "op": "const", "dest": "cond", "type": "bool", "value": true },
            { "op": "br", "args": ["cond"], "labels": ["then", "else"] },
            { "label": "then" },
            { "op": "const", "dest": "a", "type": "int", "value": then_value },
            { "op": "jmp", "labels": ["join"] },
            { "label": "else" },
            { "op": "const", "dest": "a", "type": "int", "value": else_value },
            { "op": "jmp", "labels": ["join"] },
            { "label": "join" },
            { "op": "print", "args": ["a"] },
            { "op": "ret" }
        ]
    })
}

#[test]
fn test_meet_keeps_agreeing_entries() {
    let func = common::parse_fn(diamond(7, 7));
    let (_, result) = analyze(&func).unwrap();
    assert_eq!(result.in_facts["join"].get("a"), Some(&Literal::Int(7)));
}

#[test]
fn test_meet_drops_conflicting_entries() {
    let func = common::parse_fn(diamond(7, 8));
    let (_, result) = analyze(&func).unwrap();
    assert_eq!(result.in_facts["join"].get("a"), None);
    // but the agreeing branch condition survives the meet
    assert_eq!(
        result.in_facts["join"].get("cond"),
        Some(&Literal::Bool(true))
    );
}

#[test]
fn test_loop_header_meet_is_pessimistic() {
    let func = common::parse_fn(json!({
        "name": "main",
        "instrs": [
            { "op": "const", "dest": "k", "type": "int", "value": 3 },
            { "op": "const", "dest": "c", "type": "bool", "value": true },
            { "op": "jmp", "labels": ["loop"] },
            { "label": "loop" },
            { "op": "add", "dest": "s", "args": ["k", "k"] },
            { "op": "br", "args": ["c"], "labels": ["loop", "done"] },
            { "label": "done" },
            { "op": "print", "args": ["s"] },
            { "op": "ret" }
        ]
    }));

    let (_, result) = analyze(&func).unwrap();
    // the meet intersects with the back edge's seed fact, which is empty,
    // so nothing is constant entering the header: the conflating meet is
    // preserved as-is rather than corrected to a per-variable lattice
    assert_eq!(result.in_facts["loop"].get("k"), None);
    assert_eq!(result.out_facts["loop"].get("s"), None);
}
