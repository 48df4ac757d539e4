//! The `min` module built by `eightc build`.
//!
//! The module holds a single function selecting the smaller of two integers, in the shape an
//! unoptimized C compiler produces for it: every argument is spilled to a stack slot, and the
//! result travels through a slot of its own.
//!
//! ```text
//! int min(int a, int b) {
//!     if (a < b) return a;
//!     return b;
//! }
//! ```

use crate::builder::MirBuilder;
use crate::error::MirResult;
use crate::fun::{MirCallingConvention, MirFunctionAttribute, MirLinkage};
use crate::instr::MirIntPredicate;
use crate::layout::MirTargetLayout;
use crate::module::{MirFunctionOptions, MirMetadata, MirModule, MirModuleFlagBehavior};

pub const MIN_MODULE_NAME: &str = "min.c";
pub const DEFAULT_TARGET_TRIPLE: &str = "x86_64-pc-linux-gnu";
pub const IDENT_METADATA_KIND: &str = "eight.ident";
pub const IDENT: &str = concat!("eightc version ", env!("CARGO_PKG_VERSION"));

/// Build the `min` module for the given target.
pub fn build_min_module(layout: MirTargetLayout, target_triple: &str) -> MirResult<MirModule> {
    let mut module = MirModule::new(MIN_MODULE_NAME, layout);
    module.set_target_triple(target_triple);
    module.add_flag(MirModuleFlagBehavior::Error, "wchar_size", 4);
    module.add_metadata(IDENT_METADATA_KIND, MirMetadata::String(IDENT.to_owned()));

    let i32_ty = module.get_integer_ty(32)?;
    let signature = module.get_function_ty(i32_ty, vec![i32_ty, i32_ty], false)?;
    let options = MirFunctionOptions {
        linkage: MirLinkage::External,
        calling_convention: MirCallingConvention::C,
        dso_local: true,
        attributes: [
            MirFunctionAttribute::NoInline,
            MirFunctionAttribute::NoUnwind,
            MirFunctionAttribute::OptimizeNone,
        ]
        .into_iter()
        .collect(),
    };

    let mut builder = MirBuilder::new(&mut module);
    let min = builder.create_function("min", signature, &["a", "b"], options)?;
    let entry = builder.create_block(min, "entry")?;
    let if_then = builder.create_block(min, "if.then")?;
    let if_else = builder.create_block(min, "if.else")?;
    let exit = builder.create_block(min, "return")?;
    let a = builder.argument(min, 0)?;
    let b = builder.argument(min, 1)?;

    let retval = builder.append_alloca(entry, i32_ty, None, "retval")?;
    let a_addr = builder.append_alloca(entry, i32_ty, None, "a.addr")?;
    let b_addr = builder.append_alloca(entry, i32_ty, None, "b.addr")?;
    builder.append_store(entry, a, a_addr, None)?;
    builder.append_store(entry, b, b_addr, None)?;
    let lhs = builder.append_load(entry, i32_ty, a_addr, None, "")?;
    let rhs = builder.append_load(entry, i32_ty, b_addr, None, "")?;
    let cmp = builder.append_icmp(entry, MirIntPredicate::Lt, lhs, rhs, "cmp")?;
    builder.append_cond_br(entry, cmp, if_then, if_else)?;

    let chosen = builder.append_load(if_then, i32_ty, a_addr, None, "")?;
    builder.append_store(if_then, chosen, retval, None)?;
    builder.append_br(if_then, exit)?;

    let chosen = builder.append_load(if_else, i32_ty, b_addr, None, "")?;
    builder.append_store(if_else, chosen, retval, None)?;
    builder.append_br(if_else, exit)?;

    let result = builder.append_load(exit, i32_ty, retval, None, "")?;
    builder.append_ret(exit, Some(result))?;

    log::debug!(
        "built module {} with {} instructions",
        module.name(),
        module.instruction_count()
    );
    Ok(module)
}
