mod common;

use eight_macros::{assert_err, assert_matches, assert_ok, assert_some};
use eight_mir::builder::MirBuilder;
use eight_mir::module::MirFunctionOptions;
use eight_mir::{deserialize, serialize, verify, MirError, MirModule, MirTargetLayout};

/// Position of the opcode of the `%retval` alloca in an encoded `min` module.
fn retval_alloca_offset(bytes: &[u8]) -> usize {
    let name = assert_some!(bytes.windows(6).position(|w| w == b"retval"));
    // opcode, align, type, name presence flag and name length precede the name
    name - 14
}

#[test]
fn test_serialization_is_deterministic() {
    let first = build_verified_min_module!(MirTargetLayout::default());
    let second = build_verified_min_module!(MirTargetLayout::default());
    let bytes = assert_ok!(serialize(&first));
    assert_eq!(bytes, assert_ok!(serialize(&second)));
    assert_eq!(bytes, assert_ok!(serialize(&first)));
}

#[test]
fn test_big_endian_modules_round_trip() {
    let layout = assert_ok!("E-p:64:64-S128".parse::<MirTargetLayout>());
    let module = build_verified_min_module!(layout);
    let bytes = assert_ok!(serialize(&module));
    assert_eq!(&bytes[..4], b"8MIR");
    assert_eq!(bytes[4], 1);
    assert_eq!(&bytes[5..9], &[0, 0, 0, 1]);
    assert_eq!(assert_ok!(deserialize(&bytes)), module);
}

#[test]
fn test_decoded_modules_must_be_verified_again() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let bytes = assert_ok!(serialize(&module));
    let decoded = assert_ok!(deserialize(&bytes));
    assert!(!decoded.is_verified());
    let err = assert_err!(serialize(&decoded));
    assert_matches!(err, MirError::UnverifiedModule(_) => ());

    assert!(verify(&decoded).is_valid());
    assert_eq!(assert_ok!(serialize(&decoded)), bytes);
}

#[test]
fn test_every_truncation_is_rejected() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let bytes = assert_ok!(serialize(&module));
    for len in 0..bytes.len() {
        let err = assert_err!(deserialize(&bytes[..len]));
        assert_matches!(err, MirError::MalformedModule(e) => {
            assert!(e.offset <= len, "offset {} past the input of {} bytes", e.offset, len);
        });
    }
}

#[test]
fn test_bad_magic_is_rejected() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let mut bytes = assert_ok!(serialize(&module));
    bytes[0] = b'9';
    let err = assert_err!(deserialize(&bytes));
    assert_matches!(err, MirError::MalformedModule(e) => assert_eq!(e.offset, 0));
}

#[test]
fn test_unsupported_version_is_rejected() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let mut bytes = assert_ok!(serialize(&module));
    bytes[5] = 2;
    let err = assert_err!(deserialize(&bytes));
    assert_matches!(err, MirError::MalformedModule(e) => {
        assert!(e.reason.contains("version"), "unexpected reason: {}", e.reason);
    });
}

#[test]
fn test_trailing_bytes_are_rejected() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let mut bytes = assert_ok!(serialize(&module));
    let end = bytes.len();
    bytes.push(0);
    let err = assert_err!(deserialize(&bytes));
    assert_matches!(err, MirError::MalformedModule(e) => assert_eq!(e.offset, end));
}

#[test]
fn test_unknown_opcode_is_rejected() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let mut bytes = assert_ok!(serialize(&module));
    let opcode = retval_alloca_offset(&bytes);
    assert_eq!(bytes[opcode], 1);
    bytes[opcode] = 0x7f;
    let err = assert_err!(deserialize(&bytes));
    assert_matches!(err, MirError::MalformedModule(_) => ());
}

#[test]
fn test_dangling_type_reference_is_rejected() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let mut bytes = assert_ok!(serialize(&module));
    let ty = retval_alloca_offset(&bytes) + 5;
    bytes[ty..ty + 4].copy_from_slice(&[0xff; 4]);
    let err = assert_err!(deserialize(&bytes));
    assert_matches!(err, MirError::MalformedModule(_) => ());
}

#[test]
fn test_modules_without_functions_round_trip() {
    let module = MirModule::new("empty", MirTargetLayout::default());
    assert!(verify(&module).is_valid());
    let decoded = assert_ok!(deserialize(&assert_ok!(serialize(&module))));
    assert_eq!(decoded, module);
    assert_eq!(decoded.function_count(), 0);
}

#[test]
fn test_constants_survive_the_encoding() {
    let mut module = MirModule::new("constants", MirTargetLayout::default());
    let i8_ty = assert_ok!(module.get_integer_ty(8));
    let ty = assert_ok!(module.get_function_ty(i8_ty, vec![], false));
    let mut builder = MirBuilder::new(&mut module);
    let f = assert_ok!(builder.create_function(
        "minus_one",
        ty,
        &[],
        MirFunctionOptions::default()
    ));
    let entry = assert_ok!(builder.create_block(f, "entry"));
    let value = assert_ok!(builder.const_int(i8_ty, -1));
    assert_ok!(builder.append_ret(entry, Some(value)));
    assert!(verify(&module).is_valid());

    let decoded = assert_ok!(deserialize(&assert_ok!(serialize(&module))));
    assert_eq!(decoded, module);
    let interpreter = eight_mir::MirInterpreter::new(&decoded);
    assert_eq!(assert_ok!(interpreter.call("minus_one", &[])), Some(-1));
}

#[test]
fn test_widest_integers_round_trip() {
    let mut module = MirModule::new("wide", MirTargetLayout::default());
    let err = assert_err!(module.get_integer_ty(128));
    assert_matches!(err, MirError::TypeMismatch(_) => ());
    let i64_ty = assert_ok!(module.get_integer_ty(64));
    let ty = assert_ok!(module.get_function_ty(i64_ty, vec![], false));
    let mut builder = MirBuilder::new(&mut module);
    let f = assert_ok!(builder.create_function("lowest", ty, &[], MirFunctionOptions::default()));
    let entry = assert_ok!(builder.create_block(f, "entry"));
    let value = assert_ok!(builder.const_int(i64_ty, i64::MIN));
    assert_ok!(builder.append_ret(entry, Some(value)));
    assert!(verify(&module).is_valid());

    let decoded = assert_ok!(deserialize(&assert_ok!(serialize(&module))));
    assert_eq!(decoded, module);
    let interpreter = eight_mir::MirInterpreter::new(&decoded);
    assert_eq!(assert_ok!(interpreter.call("lowest", &[])), Some(i64::MIN));
}

#[test]
fn test_bodies_built_out_of_order_round_trip() {
    let mut module = MirModule::new("order", MirTargetLayout::default());
    let i32_ty = assert_ok!(module.get_integer_ty(32));
    let ty = assert_ok!(module.get_function_ty(i32_ty, vec![i32_ty], false));
    let mut builder = MirBuilder::new(&mut module);
    let f = assert_ok!(builder.create_function("id", ty, &["x"], MirFunctionOptions::default()));
    let entry = assert_ok!(builder.create_block(f, "entry"));
    let exit = assert_ok!(builder.create_block(f, "exit"));
    let slot = assert_ok!(builder.append_alloca(entry, i32_ty, None, "slot"));
    // The exit block is filled before the entry block is terminated.
    let value = assert_ok!(builder.append_load(exit, i32_ty, slot, None, "value"));
    assert_ok!(builder.append_ret(exit, Some(value)));
    let x = assert_ok!(builder.argument(f, 0));
    assert_ok!(builder.append_store(entry, x, slot, None));
    assert_ok!(builder.append_br(entry, exit));
    assert!(verify(&module).is_valid());

    let decoded = assert_ok!(deserialize(&assert_ok!(serialize(&module))));
    assert_eq!(decoded, module);
    let interpreter = eight_mir::MirInterpreter::new(&decoded);
    assert_eq!(assert_ok!(interpreter.call("id", &[42])), Some(42));
}
