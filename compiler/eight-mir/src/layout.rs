//! Target layout descriptors.
//!
//! The layout describes the parts of the target that the MIR cares about: the byte order used when
//! a module is written to disk, the width and alignment of pointers, and the natural alignment of
//! the stack. It is written as a short descriptor string, loosely following the data layout
//! strings of LLVM:
//!
//! ```text
//! layout    ::= component ('-' component)*
//! component ::= 'e'                       little endian
//!             | 'E'                       big endian
//!             | 'p:' size ':' abi         pointer width and ABI alignment, in bits
//!             | 'S' bits                  natural stack alignment, in bits
//! ```
//!
//! Components that are left out keep their default from `e-p:64:64-S128`.

use crate::arena::MirArena;
use crate::error::{InvalidTargetLayoutError, MirResult};
use crate::ty::{MirTy, MirTyId};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, u32};
use nom::combinator::{all_consuming, map, value};
use nom::multi::separated_list1;
use nom::sequence::{preceded, separated_pair};
use nom::IResult;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirEndianness {
    Little,
    Big,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirTargetLayout {
    pub endianness: MirEndianness,
    pub pointer_width_bits: u32,
    pub pointer_align_bits: u32,
    pub stack_align_bits: u32,
}

impl Default for MirTargetLayout {
    fn default() -> Self {
        Self {
            endianness: MirEndianness::Little,
            pointer_width_bits: 64,
            pointer_align_bits: 64,
            stack_align_bits: 128,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LayoutComponent {
    Endianness(MirEndianness),
    Pointer { size: u32, abi: u32 },
    StackAlign(u32),
}

fn parse_component(input: &str) -> IResult<&str, LayoutComponent> {
    alt((
        value(
            LayoutComponent::Endianness(MirEndianness::Little),
            char('e'),
        ),
        value(LayoutComponent::Endianness(MirEndianness::Big), char('E')),
        map(
            preceded(tag("p:"), separated_pair(u32, char(':'), u32)),
            |(size, abi)| LayoutComponent::Pointer { size, abi },
        ),
        map(preceded(char('S'), u32), LayoutComponent::StackAlign),
    ))(input)
}

fn parse_layout(input: &str) -> IResult<&str, Vec<LayoutComponent>> {
    all_consuming(separated_list1(char('-'), parse_component))(input)
}

fn is_valid_alignment(bits: u32) -> bool {
    bits != 0 && bits % 8 == 0 && bits.is_power_of_two()
}

impl MirTargetLayout {
    /// Parse and validate a layout descriptor.
    pub fn parse(descriptor: &str) -> MirResult<Self> {
        let invalid = |reason: &str| InvalidTargetLayoutError {
            descriptor: descriptor.to_owned(),
            reason: reason.to_owned(),
        };
        let (_, components) =
            parse_layout(descriptor).map_err(|_| invalid("unrecognized layout component"))?;
        let mut layout = Self::default();
        for component in components {
            match component {
                LayoutComponent::Endianness(endianness) => layout.endianness = endianness,
                LayoutComponent::Pointer { size, abi } => {
                    layout.pointer_width_bits = size;
                    layout.pointer_align_bits = abi;
                }
                LayoutComponent::StackAlign(bits) => layout.stack_align_bits = bits,
            }
        }
        if !matches!(layout.pointer_width_bits, 16 | 32 | 64) {
            return Err(invalid("pointer width must be 16, 32 or 64 bits").into());
        }
        if !is_valid_alignment(layout.pointer_align_bits) {
            return Err(invalid("pointer alignment must be a power of two number of bytes").into());
        }
        if !is_valid_alignment(layout.stack_align_bits) {
            return Err(invalid("stack alignment must be a power of two number of bytes").into());
        }
        Ok(layout)
    }

    pub fn pointer_size_bytes(&self) -> u32 {
        self.pointer_width_bits / 8
    }

    /// The ABI alignment in bytes of a value of the given type.
    ///
    /// Integers are aligned to their size rounded up to a power of two, pointers to the pointer
    /// alignment of the layout. Types that cannot be placed in memory have no alignment.
    pub fn abi_alignment(&self, arena: &MirArena, ty: MirTyId) -> Option<u32> {
        match arena.get_type(ty)? {
            MirTy::Integer(i) => Some(i.width.div_ceil(8).max(1).next_power_of_two()),
            MirTy::Pointer(_) => Some(self.pointer_align_bits / 8),
            MirTy::Void | MirTy::Function(_) => None,
        }
    }
}

impl FromStr for MirTargetLayout {
    type Err = crate::error::MirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for MirTargetLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let endianness = match self.endianness {
            MirEndianness::Little => "e",
            MirEndianness::Big => "E",
        };
        write!(
            f,
            "{}-p:{}:{}-S{}",
            endianness, self.pointer_width_bits, self.pointer_align_bits, self.stack_align_bits
        )
    }
}
