mod common;

use eight_macros::{assert_ok, assert_some};
use eight_mir::instr::{MirIntPredicate, MirOpcode};
use eight_mir::{deserialize, serialize, verify, MirInterpreter, MirTargetLayout};

#[test]
fn test_min_module_survives_the_binary_encoding() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let bytes = assert_ok!(serialize(&module));
    let decoded = assert_ok!(deserialize(&bytes));
    assert_eq!(decoded, module);

    assert_eq!(decoded.function_count(), 1);
    let (id, function) = assert_some!(decoded.function_by_name("min"));
    let block_names = function
        .blocks
        .iter()
        .map(|b| assert_some!(decoded.block(*b)).name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(block_names, ["entry", "if.then", "if.else", "return"]);

    let entry = assert_some!(decoded.find_block(id, "entry"));
    let allocas = assert_some!(decoded.block(entry))
        .instructions
        .iter()
        .filter(|i| {
            matches!(
                decoded.instruction(**i).map(|i| i.opcode),
                Some(MirOpcode::Alloca { .. })
            )
        })
        .count();
    assert_eq!(allocas, 3);

    let instructions = decoded
        .function_instructions(id)
        .map(|(_, instr)| instr)
        .collect::<Vec<_>>();
    let compares = instructions
        .iter()
        .filter(|i| i.opcode == MirOpcode::ICmp(MirIntPredicate::Lt))
        .count();
    assert_eq!(compares, 1);
    let branches = instructions
        .iter()
        .filter_map(|i| i.as_br())
        .collect::<Vec<_>>();
    assert_eq!(branches.len(), 3);
    assert_eq!(branches.iter().filter(|b| b.condition.is_some()).count(), 1);

    let returns = instructions
        .iter()
        .filter(|i| i.opcode == MirOpcode::Ret)
        .collect::<Vec<_>>();
    assert_eq!(returns.len(), 1);
    let exit = assert_some!(decoded.find_block(id, "return"));
    assert_eq!(returns[0].parent, exit);

    assert!(verify(&decoded).is_valid());
}

#[test]
fn test_decoded_min_module_still_computes_the_minimum() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let decoded = assert_ok!(deserialize(&assert_ok!(serialize(&module))));
    let interpreter = MirInterpreter::new(&decoded);
    assert_eq!(assert_ok!(interpreter.call("min", &[3, 7])), Some(3));
    assert_eq!(assert_ok!(interpreter.call("min", &[9, 2])), Some(2));
    assert_eq!(assert_ok!(interpreter.call("min", &[5, 5])), Some(5));
}

#[test]
fn test_min_module_honors_the_target_layout() {
    let layout = assert_ok!("E-p:32:32-S64".parse::<MirTargetLayout>());
    let module = build_verified_min_module!(layout);
    let decoded = assert_ok!(deserialize(&assert_ok!(serialize(&module))));
    assert_eq!(decoded.layout(), &layout);
    assert_eq!(decoded.target_triple(), Some("x86_64-pc-linux-gnu"));
}

#[test]
fn test_ron_dump_leaves_out_derived_state() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let dump = assert_ok!(ron::ser::to_string(&module));
    assert!(dump.contains("name:\"min.c\""));
    assert!(dump.contains("\"if.then\""));
    assert!(!dump.contains("generation"));
    assert!(!dump.contains("function_names"));
}
