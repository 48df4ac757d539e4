mod common;

use eight_macros::assert_ok;
use eight_mir::{deserialize, serialize, MirTargetLayout};

#[test]
fn test_min_module_textual_form() {
    let module = build_verified_min_module!(MirTargetLayout::default());
    let text = format_mir_module!(&module);
    insta::assert_snapshot!(text, @r###"
; module = "min.c"
target layout = "e-p:64:64-S128"
target triple = "x86_64-pc-linux-gnu"
!flags = !{error "wchar_size" 4}
!eight.ident = !{"eightc version 0.1.0"}

fn @min(%a: i32, %b: i32) -> i32 external ccc dso_local #[noinline, nounwind, optnone] {
entry:
  %retval = mem.alloca i32, align 4
  %a.addr = mem.alloca i32, align 4
  %b.addr = mem.alloca i32, align 4
  mem.store %a, %a.addr, align 4
  mem.store %b, %b.addr, align 4
  %0 = mem.load i32, %a.addr, align 4
  %1 = mem.load i32, %b.addr, align 4
  %cmp = cmp.lt.i32 %0, %1
  branch.cond %cmp, if.then, if.else
if.then:
  %2 = mem.load i32, %a.addr, align 4
  mem.store %2, %retval, align 4
  branch return
if.else:
  %3 = mem.load i32, %b.addr, align 4
  mem.store %3, %retval, align 4
  branch return
return:
  %4 = mem.load i32, %retval, align 4
  ret %4
}
"###);
}

#[test]
fn test_textual_form_is_stable_across_the_binary_encoding() {
    let layout = assert_ok!("E-p:32:32-S64".parse::<MirTargetLayout>());
    let module = build_verified_min_module!(layout);
    let decoded = assert_ok!(deserialize(&assert_ok!(serialize(&module))));
    let text = format_mir_module!(&decoded);
    assert_eq!(text, format_mir_module!(&module));
    assert!(text.contains("target layout = \"E-p:32:32-S64\""));
}
