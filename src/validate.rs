//! Structural validators run over descriptors and flattened leaf views.
//!
//! Every check returns all of its findings; callers fold them into one
//! [`DescriptorError`] with [`DescriptorError::collect`].

use crate::descriptor::{DescriptorNode, Schema};
use crate::error::DescriptorError;
use crate::field::{FieldRecord, FieldTag};
use crate::seq::Seq;

/// A named structural rule that a description broke.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Constraint {
    #[error("endpoint address 0x{address:02X} is declared more than once")]
    DuplicateEndpoint { address: u8 },
    #[error("interface {number} alternate setting {alternate} is declared more than once")]
    DuplicateInterface { number: u8, alternate: u8 },
    #[error("minimum {min} must be less than maximum {max}")]
    RangeOrder { min: i64, max: i64 },
    #[error("{field} value 0x{value:X} sets bits outside 0x{mask:X}")]
    ReservedBits { field: &'static str, value: u32, mask: u32 },
    #[error("bMaxPacketSize0 must be 8, 16, 32 or 64, got {value}")]
    MaxPacketSize0 { value: u32 },
    #[error("endpoint number {number} is outside 0..=15")]
    EndpointNumber { number: u32 },
    #[error("endpoint 0 is reserved for the default control pipe")]
    ReservedEndpointZero,
    #[error("configuration bmAttributes must have bit 7 set")]
    ConfigAttributesBit7,
    #[error("bConfigurationValue 0 is reserved for the unconfigured state")]
    ZeroConfigurationValue,
    #[error("{field} must be 0x{expected:02X}, got 0x{found:02X}")]
    FixedValue { field: &'static str, expected: u32, found: u32 },
    #[error("interface association encloses no interface")]
    EmptyAssociation,
    #[error("interface association spans non-consecutive interfaces {numbers:?}")]
    NonContiguousAssociation { numbers: Vec<u8> },
    #[error("string index {index} is declared more than once")]
    DuplicateString { index: u8 },
    #[error("string index 0x{index:02X} is reserved")]
    ReservedStringIndex { index: u8 },
    #[error("bConfigurationValue {value} is declared more than once")]
    DuplicateConfiguration { value: u8 },
    #[error("bNumConfigurations is {declared} but {actual} configuration(s) are declared")]
    ConfigurationCount { declared: u32, actual: usize },
    #[error("report descriptor {name:?} is not declared")]
    UnknownReport { name: String },
    #[error("report descriptor {name:?} is declared more than once")]
    DuplicateReport { name: String },
    #[error("collection kind 0x{code:02X} is reserved")]
    ReservedCollectionKind { code: i64 },
    #[error("Delimiter must be 0 (close) or 1 (open), got {value}")]
    DelimiterValue { value: i64 },
    #[error("{item} items are only emitted in pairs by a collection")]
    UnpairedCollection { item: &'static str },
    #[error("compatible ID {id:?} must be at most 8 ASCII bytes")]
    InvalidCompatibleId { id: String },
}

/// Which cross-descriptor checks a configuration must pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintSet {
    pub unique_endpoints: bool,
    pub unique_interfaces: bool,
    pub contiguous_associations: bool,
}

impl ConstraintSet {
    pub fn strict() -> Self {
        ConstraintSet {
            unique_endpoints: true,
            unique_interfaces: true,
            contiguous_associations: true,
        }
    }

    /// Only the per-descriptor rules; no cross-descriptor uniqueness.
    pub fn lenient() -> Self {
        ConstraintSet {
            unique_endpoints: false,
            unique_interfaces: false,
            contiguous_associations: false,
        }
    }
}

impl Default for ConstraintSet {
    fn default() -> Self {
        ConstraintSet::strict()
    }
}

/// Compare field records against the slot tags of a layout. Both surplus and
/// missing records are reported.
pub fn check_slots(label: &str, expected: &[FieldTag], fields: &Seq<FieldRecord>) -> Vec<DescriptorError> {
    let mut errors = Vec::new();
    let slots = expected.len().max(fields.size());
    for slot in 0..slots {
        let want = expected.get(slot).copied();
        let got = fields.get(slot).map(|f| f.tag());
        if want != got {
            errors.push(DescriptorError::StructuralTypeMismatch {
                node: label.to_string(),
                slot,
                expected: want,
                found: got,
            });
        }
    }
    errors
}

pub fn check_range(label: &str, min: i64, max: i64) -> Result<(), DescriptorError> {
    if min < max {
        Ok(())
    } else {
        Err(DescriptorError::constraint(label, Constraint::RangeOrder { min, max }))
    }
}

pub fn check_mask(label: &str, field: &'static str, value: u32, mask: u32) -> Result<(), DescriptorError> {
    if value & !mask == 0 {
        Ok(())
    } else {
        Err(DescriptorError::constraint(label, Constraint::ReservedBits { field, value, mask }))
    }
}

/// Cross-descriptor rules over one configuration's flattened view.
///
/// Endpoints are attributed to the interface descriptor preceding them.
/// Alternate settings of the same interface may reuse endpoint addresses.
pub fn check_configuration(view: &Seq<DescriptorNode>, set: &ConstraintSet) -> Vec<DescriptorError> {
    let mut errors = Vec::new();
    let mut owner: Option<(u8, u8)> = None;
    let mut endpoints: Vec<(u8, Option<(u8, u8)>)> = Vec::new();
    let mut interfaces: Vec<(u8, u8)> = Vec::new();

    for node in view {
        match node.schema() {
            Schema::Interface => {
                let key = (
                    node.value(FieldTag::InterfaceNumber).unwrap_or(0) as u8,
                    node.value(FieldTag::AlternateSetting).unwrap_or(0) as u8,
                );
                owner = Some(key);
                interfaces.push(key);
            }
            Schema::Endpoint => {
                let address = node.value(FieldTag::EndpointAddress).unwrap_or(0) as u8;
                if address & 0x0F == 0 {
                    errors.push(DescriptorError::constraint(node.label(), Constraint::ReservedEndpointZero));
                }
                endpoints.push((address, owner));
            }
            _ => {}
        }
    }

    if set.unique_endpoints {
        let seq: Seq<(u8, Option<(u8, u8)>)> = endpoints.into();
        let mut reported = Vec::new();
        for (_, j) in seq.duplicates_by(|a, b| a.0 == b.0 && !alternates_of_same_interface(a.1, b.1)) {
            if let Some(&(address, _)) = seq.get(j) {
                if !reported.contains(&address) {
                    reported.push(address);
                    errors.push(DescriptorError::constraint(
                        format!("ENDPOINT 0x{:02X}", address),
                        Constraint::DuplicateEndpoint { address },
                    ));
                }
            }
        }
    }

    if set.unique_interfaces {
        let seq: Seq<(u8, u8)> = interfaces.into();
        let mut reported = Vec::new();
        for (_, j) in seq.duplicates_by(|a, b| a == b) {
            if let Some(&(number, alternate)) = seq.get(j) {
                if !reported.contains(&(number, alternate)) {
                    reported.push((number, alternate));
                    errors.push(DescriptorError::constraint(
                        format!("INTERFACE {}", number),
                        Constraint::DuplicateInterface { number, alternate },
                    ));
                }
            }
        }
    }

    errors
}

fn alternates_of_same_interface(a: Option<(u8, u8)>, b: Option<(u8, u8)>) -> bool {
    match (a, b) {
        (Some((na, aa)), Some((nb, ab))) => na == nb && aa != ab,
        _ => false,
    }
}

/// Interface numbers enclosed by an association, in declaration order, one per
/// interface (alternate settings collapse onto their interface).
pub fn association_members(view: &Seq<DescriptorNode>) -> Vec<u8> {
    let mut numbers = Vec::new();
    for node in view.filter(|n| n.schema() == Schema::Interface).iter() {
        let number = node.value(FieldTag::InterfaceNumber).unwrap_or(0) as u8;
        if !numbers.contains(&number) {
            numbers.push(number);
        }
    }
    numbers
}

pub fn check_association(label: &str, members: &[u8], set: &ConstraintSet) -> Vec<DescriptorError> {
    if members.is_empty() {
        return vec![DescriptorError::constraint(label, Constraint::EmptyAssociation)];
    }
    if set.contiguous_associations && members.windows(2).any(|w| w[1] != w[0].wrapping_add(1)) {
        return vec![DescriptorError::constraint(
            label,
            Constraint::NonContiguousAssociation { numbers: members.to_vec() },
        )];
    }
    Vec::new()
}
