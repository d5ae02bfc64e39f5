//! Profiles whose header fields are computed from their contents.
//!
//! Each profile is built in three passes: assemble the declared children,
//! derive header fields from the flattened leaf view and validate it, then emit
//! the header in front of the children.

use crate::composite::{CompositeNode, Node};
use crate::descriptor::{DescriptorNode, Schema};
use crate::error::DescriptorError;
use crate::field::{ConfigAttributes, FieldRecord, FieldTag};
use crate::validate::{self, ConstraintSet};
use log::debug;

/// Header fields computed from a profile's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedField {
    /// `wTotalLength`: own header plus every descendant.
    TotalLength,
    /// `bNumInterfaces`: interfaces in the body (alternate settings count once).
    InterfaceCount,
    /// `bNumEndpoints`: endpoint descriptors in the body.
    EndpointCount,
    /// `bFirstInterface`: number of the earliest interface in the body.
    FirstInterface,
    /// `bInterfaceCount`: interfaces enclosed by an association.
    AssociationSpan,
}

impl DerivedField {
    pub fn tag(self) -> FieldTag {
        match self {
            DerivedField::TotalLength => FieldTag::TotalLength,
            DerivedField::InterfaceCount => FieldTag::NumInterfaces,
            DerivedField::EndpointCount => FieldTag::NumEndpoints,
            DerivedField::FirstInterface => FieldTag::FirstInterface,
            DerivedField::AssociationSpan => FieldTag::InterfaceCount,
        }
    }

    pub fn compute(self, schema: Schema, body: &CompositeNode) -> u32 {
        match self {
            DerivedField::TotalLength => (schema.encoded_len() + body.len()) as u32,
            DerivedField::InterfaceCount | DerivedField::AssociationSpan => {
                validate::association_members(&body.flatten()).len() as u32
            }
            DerivedField::EndpointCount => body.endpoints_count() as u32,
            DerivedField::FirstInterface => validate::association_members(&body.flatten())
                .first()
                .copied()
                .unwrap_or(0) as u32,
        }
    }
}

fn with_header(header: DescriptorNode, body: &CompositeNode) -> CompositeNode {
    CompositeNode::new(body.children().push_front(Node::Descriptor(header)))
}

/// Interface descriptor plus everything that belongs to it (class-specific
/// descriptors, endpoints).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub number: u8,
    pub alternate: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub string: u8,
    children: Vec<Node>,
}

impl Interface {
    pub fn new(number: u8) -> Self {
        Interface {
            number,
            alternate: 0,
            class: 0,
            subclass: 0,
            protocol: 0,
            string: 0,
            children: Vec::new(),
        }
    }

    pub fn alternate(mut self, alternate: u8) -> Self {
        self.alternate = alternate;
        self
    }

    pub fn class(mut self, class: u8, subclass: u8, protocol: u8) -> Self {
        self.class = class;
        self.subclass = subclass;
        self.protocol = protocol;
        self
    }

    pub fn string(mut self, index: u8) -> Self {
        self.string = index;
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn build(&self) -> Result<CompositeNode, DescriptorError> {
        let body = CompositeNode::new(self.children.clone());
        let endpoints = DerivedField::EndpointCount.compute(Schema::Interface, &body);
        debug!(
            "interface {}.{}: bNumEndpoints={}",
            self.number, self.alternate, endpoints
        );
        let header = DescriptorNode::from_values(
            Schema::Interface,
            &[
                self.number as u32,
                self.alternate as u32,
                endpoints,
                self.class as u32,
                self.subclass as u32,
                self.protocol as u32,
                self.string as u32,
            ],
        )?;
        Ok(with_header(header, &body))
    }
}

/// Interface Association: groups consecutive interfaces into one function.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceAssociation {
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub string: u8,
    children: Vec<Node>,
}

impl InterfaceAssociation {
    pub fn new(class: u8, subclass: u8, protocol: u8) -> Self {
        InterfaceAssociation { class, subclass, protocol, ..Default::default() }
    }

    pub fn string(mut self, index: u8) -> Self {
        self.string = index;
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn build(&self, constraints: &ConstraintSet) -> Result<CompositeNode, DescriptorError> {
        let body = CompositeNode::new(self.children.clone());
        let members = validate::association_members(&body.flatten());
        let label = match members.first() {
            Some(first) => format!("{} {}", Schema::InterfaceAssociation.title(), first),
            None => Schema::InterfaceAssociation.title().to_string(),
        };
        DescriptorError::collect(validate::check_association(&label, &members, constraints))?;

        let first = DerivedField::FirstInterface.compute(Schema::InterfaceAssociation, &body);
        let span = DerivedField::AssociationSpan.compute(Schema::InterfaceAssociation, &body);
        debug!("{}: bFirstInterface={} bInterfaceCount={}", label, first, span);
        let header = DescriptorNode::from_values(
            Schema::InterfaceAssociation,
            &[
                first,
                span,
                self.class as u32,
                self.subclass as u32,
                self.protocol as u32,
                self.string as u32,
            ],
        )?;
        Ok(with_header(header, &body))
    }
}

/// Configuration descriptor with its full interface hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub value: u8,
    pub string: u8,
    pub attributes: ConfigAttributes,
    /// In 2 mA units.
    pub max_power: u32,
    children: Vec<Node>,
}

impl Configuration {
    /// Bus-powered, 100 mA.
    pub fn new(value: u8) -> Self {
        Configuration {
            value,
            string: 0,
            attributes: ConfigAttributes::default(),
            max_power: 50,
            children: Vec::new(),
        }
    }

    pub fn string(mut self, index: u8) -> Self {
        self.string = index;
        self
    }

    pub fn attributes(mut self, attributes: ConfigAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn max_power(mut self, units: u8) -> Self {
        self.max_power = units as u32;
        self
    }

    pub fn max_power_ma(mut self, milliamps: u16) -> Self {
        self.max_power = milliamps as u32 / 2;
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn build(&self, constraints: &ConstraintSet) -> Result<CompositeNode, DescriptorError> {
        let label = format!("{} {}", Schema::Configuration.title(), self.value);
        let body = CompositeNode::new(self.children.clone());
        let view = body.flatten();
        let mut errors = validate::check_configuration(&view, constraints);

        let total = DerivedField::TotalLength.compute(Schema::Configuration, &body);
        let interfaces = DerivedField::InterfaceCount.compute(Schema::Configuration, &body);
        debug!("{}: wTotalLength={} bNumInterfaces={}", label, total, interfaces);
        if total > u16::MAX as u32 {
            errors.push(DescriptorError::overflow(
                &label,
                format!("wTotalLength {} exceeds 65535", total),
            ));
        }

        let header = [
            (FieldTag::TotalLength, total),
            (FieldTag::NumInterfaces, interfaces),
            (FieldTag::ConfigurationValue, self.value as u32),
            (FieldTag::IConfiguration, self.string as u32),
            (FieldTag::ConfigAttributes, self.attributes.raw() as u32),
            (FieldTag::MaxPower, self.max_power),
        ];
        let mut records = Vec::with_capacity(header.len());
        for (tag, value) in header {
            if tag == FieldTag::TotalLength && total > u16::MAX as u32 {
                continue;
            }
            match FieldRecord::new(tag, value) {
                Ok(r) => records.push(r),
                Err(DescriptorError::EncodingOverflow { detail, .. }) => {
                    errors.push(DescriptorError::overflow(&label, format!("{}: {}", tag, detail)))
                }
                Err(e) => errors.push(e),
            }
        }
        let mut node = None;
        if records.len() == header.len() {
            match DescriptorNode::new(Schema::Configuration, records) {
                Ok(n) => node = Some(n),
                Err(e) => errors.push(e),
            }
        }
        DescriptorError::collect(errors)?;
        let node = node.ok_or_else(|| DescriptorError::overflow(&label, "incomplete configuration header"))?;
        Ok(with_header(node, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Direction;
    use crate::standard::Endpoint;
    use crate::validate::Constraint;

    fn ep(number: u8, dir: Direction) -> DescriptorNode {
        Endpoint::bulk(number, dir, 64).expect("ep").build().expect("build")
    }

    #[test]
    fn interface_counts_its_endpoints() {
        let iface = Interface::new(0)
            .class(0x0A, 0, 0)
            .child(ep(1, Direction::Out))
            .child(ep(1, Direction::In))
            .build()
            .expect("interface");
        let header = iface.flatten().head().cloned().expect("header");
        assert_eq!(header.value(FieldTag::NumEndpoints), Some(2));
        assert_eq!(iface.len(), 9 + 7 + 7);
    }

    #[test]
    fn total_length_tracks_children() {
        let strict = ConstraintSet::strict();
        let one = Interface::new(0).child(ep(1, Direction::In)).build().expect("if0");
        let two = Interface::new(1).child(ep(2, Direction::In)).build().expect("if1");

        let cfg = Configuration::new(1).child(one.clone());
        let small = cfg.build(&strict).expect("cfg");
        assert_eq!(small.encode()[2..4], [25, 0]);

        let big = cfg.clone().child(two).build(&strict).expect("cfg");
        assert_eq!(big.len(), 9 + 16 + 16);
        assert_eq!(big.encode()[2..5], [41, 0, 2]);
    }

    #[test]
    fn header_rules_reported_alongside_tree_rules() {
        let err = Configuration::new(0)
            .child(Interface::new(0).child(ep(1, Direction::In)).build().expect("if0"))
            .child(Interface::new(1).child(ep(1, Direction::In)).build().expect("if1"))
            .build(&ConstraintSet::strict())
            .unwrap_err();
        let constraints: Vec<&Constraint> = err
            .leaves()
            .into_iter()
            .filter_map(|e| match e {
                DescriptorError::ConstraintViolation { constraint, .. } => Some(constraint),
                _ => None,
            })
            .collect();
        assert_eq!(constraints.len(), 2);
        assert!(constraints.contains(&&Constraint::DuplicateEndpoint { address: 0x81 }));
        assert!(constraints.contains(&&Constraint::ZeroConfigurationValue));
    }

    #[test]
    fn duplicate_endpoint_fails_until_changed() {
        let strict = ConstraintSet::strict();
        let bad = Configuration::new(1)
            .child(Interface::new(0).child(ep(1, Direction::In)).build().expect("if0"))
            .child(Interface::new(1).child(ep(1, Direction::In)).build().expect("if1"));
        let err = bad.build(&strict).unwrap_err();
        assert!(err.is_constraint_violation());
        assert!(bad.build(&ConstraintSet::lenient()).is_ok());

        let good = Configuration::new(1)
            .child(Interface::new(0).child(ep(1, Direction::In)).build().expect("if0"))
            .child(Interface::new(1).child(ep(1, Direction::Out)).build().expect("if1"));
        assert!(good.build(&strict).is_ok());
    }

    #[test]
    fn alternate_settings_share_endpoints() {
        let cfg = Configuration::new(1)
            .child(Interface::new(0).build().expect("alt0"))
            .child(Interface::new(0).alternate(1).child(ep(1, Direction::In)).build().expect("alt1"))
            .child(Interface::new(0).alternate(2).child(ep(1, Direction::In)).build().expect("alt2"));
        let built = cfg.build(&ConstraintSet::strict()).expect("cfg");
        assert_eq!(built.encode()[4], 1);
    }

    #[test]
    fn association_derives_first_and_span() {
        let iad = InterfaceAssociation::new(0x02, 0x02, 0x01)
            .child(Interface::new(2).build().expect("if2"))
            .child(Interface::new(3).build().expect("if3"))
            .build(&ConstraintSet::strict())
            .expect("iad");
        assert_eq!(iad.encode()[..8], [8, 0x0B, 2, 2, 0x02, 0x02, 0x01, 0]);
    }

    #[test]
    fn empty_association_is_rejected() {
        let err = InterfaceAssociation::new(0x02, 0x02, 0x01)
            .build(&ConstraintSet::strict())
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn endpoint_zero_is_reserved() {
        let cfg = Configuration::new(1).child(Interface::new(0).child(ep(0, Direction::In)).build().expect("if"));
        assert!(cfg.build(&ConstraintSet::lenient()).is_err());
    }

    #[test]
    fn max_power_in_milliamps() {
        let cfg = Configuration::new(1).max_power_ma(500).build(&ConstraintSet::strict()).expect("cfg");
        assert_eq!(cfg.encode(), vec![9, 2, 9, 0, 0, 1, 0, 0x80, 250]);
        assert!(Configuration::new(1).max_power_ma(600).build(&ConstraintSet::strict()).is_err());
    }
}
