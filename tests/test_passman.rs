use serde_json::json;
use tacopt::passes::{
    const_prop::{ConstProp, CONST_PROP},
    dce::{Dce, DCE},
    PassManager, Pipeline, TransformPass,
};

mod common;

fn passman() -> PassManager {
    let mut passman = PassManager::new();
    ConstProp::register(&mut passman);
    Dce::register(&mut passman);
    passman
}

#[test]
fn test_transform_names_are_registered() {
    let names = passman().gather_transform_names();
    assert_eq!(names, vec![CONST_PROP, DCE]);
}

#[test]
fn test_unknown_transform_is_an_error() {
    let mut program = common::parse_program(json!({ "functions": [] }));
    let err = passman()
        .run_transform("no-such-pass", &mut program, 10)
        .unwrap_err();
    assert!(err.to_string().contains("unknown pass"), "{err}");
}

#[test]
fn test_run_transform_iterates_to_fixpoint() {
    let mut program = common::parse_program(json!({
        "functions": [{
            "name": "main",
            "instrs": [
                { "op": "const", "dest": "a", "type": "int", "value": 4 },
                { "op": "const", "dest": "b", "type": "int", "value": 2 },
                { "op": "add", "dest": "c", "args": ["a", "b"] },
                { "op": "print", "args": ["c"] }
            ]
        }]
    }));

    // one rewriting round plus one round observing no change
    let iters = passman()
        .run_transform(CONST_PROP, &mut program, 10)
        .unwrap();
    assert_eq!(iters, 2);
    assert!(common::op_names(&program.functions[0]).contains(&"const"));
    assert!(!common::op_names(&program.functions[0]).contains(&"add"));
}

#[test]
fn test_pipeline_reaches_quiescence() {
    let mut program = common::parse_program(json!({
        "functions": [{
            "name": "main",
            "instrs": [
                { "op": "const", "dest": "a", "type": "int", "value": 4 },
                { "op": "const", "dest": "b", "type": "int", "value": 2 },
                { "op": "add", "dest": "c", "args": ["a", "b"] },
                { "op": "print", "args": ["a"] }
            ]
        }]
    }));

    let mut pipeline = Pipeline::default();
    pipeline.add_pass(CONST_PROP);
    pipeline.add_pass(DCE);

    passman()
        .run_pipeline(&mut program, &pipeline, 10, 10)
        .unwrap();

    // the fold of c is itself dead: only the printed constant survives
    let func = &program.functions[0];
    assert_eq!(common::dests(func), vec!["a"]);
    assert_eq!(common::op_names(func), vec!["label", "const", "print", "ret"]);
}
