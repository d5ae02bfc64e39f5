//! Single descriptors: `[bLength][bDescriptorType][fields…]`.

use crate::error::DescriptorError;
use crate::field::{FieldRecord, FieldTag};
use crate::seq::Seq;
use crate::validate::{self, Constraint};
use log::trace;

/// `bDescriptorType` codes.
pub mod kind {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIGURATION: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
    pub const DEVICE_QUALIFIER: u8 = 0x06;
    pub const INTERFACE_ASSOCIATION: u8 = 0x0B;
    pub const HID: u8 = 0x21;
    pub const HID_REPORT: u8 = 0x22;
    pub const CS_INTERFACE: u8 = 0x24;
}

/// CDC functional descriptor subtypes (`bDescriptorSubType`).
pub mod cdc_subtype {
    pub const HEADER: u8 = 0x00;
    pub const CALL_MANAGEMENT: u8 = 0x01;
    pub const ACM: u8 = 0x02;
    pub const UNION: u8 = 0x06;
}

/// Fixed descriptor layouts: a kind code plus the exact slot tag order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    Device,
    DeviceQualifier,
    Configuration,
    Interface,
    Endpoint,
    InterfaceAssociation,
    CdcHeader,
    CdcAcm,
    CdcUnion,
    CdcCallManagement,
    Hid,
}

impl Schema {
    pub fn kind(self) -> u8 {
        match self {
            Schema::Device => kind::DEVICE,
            Schema::DeviceQualifier => kind::DEVICE_QUALIFIER,
            Schema::Configuration => kind::CONFIGURATION,
            Schema::Interface => kind::INTERFACE,
            Schema::Endpoint => kind::ENDPOINT,
            Schema::InterfaceAssociation => kind::INTERFACE_ASSOCIATION,
            Schema::CdcHeader | Schema::CdcAcm | Schema::CdcUnion | Schema::CdcCallManagement => {
                kind::CS_INTERFACE
            }
            Schema::Hid => kind::HID,
        }
    }

    pub fn slots(self) -> &'static [FieldTag] {
        use FieldTag::*;
        match self {
            Schema::Device => &[
                BcdUsb,
                DeviceClass,
                DeviceSubClass,
                DeviceProtocol,
                MaxPacketSize0,
                IdVendor,
                IdProduct,
                BcdDevice,
                IManufacturer,
                IProduct,
                ISerialNumber,
                NumConfigurations,
            ],
            Schema::DeviceQualifier => &[
                BcdUsb,
                DeviceClass,
                DeviceSubClass,
                DeviceProtocol,
                MaxPacketSize0,
                NumConfigurations,
                Reserved,
            ],
            Schema::Configuration => &[
                TotalLength,
                NumInterfaces,
                ConfigurationValue,
                IConfiguration,
                ConfigAttributes,
                MaxPower,
            ],
            Schema::Interface => &[
                InterfaceNumber,
                AlternateSetting,
                NumEndpoints,
                InterfaceClass,
                InterfaceSubClass,
                InterfaceProtocol,
                IInterface,
            ],
            Schema::Endpoint => &[EndpointAddress, EndpointAttributes, MaxPacketSize, Interval],
            Schema::InterfaceAssociation => &[
                FirstInterface,
                InterfaceCount,
                FunctionClass,
                FunctionSubClass,
                FunctionProtocol,
                IFunction,
            ],
            Schema::CdcHeader => &[DescriptorSubType, BcdCdc],
            Schema::CdcAcm => &[DescriptorSubType, Capabilities],
            Schema::CdcUnion => &[DescriptorSubType, ControlInterface, SubordinateInterface0],
            Schema::CdcCallManagement => &[DescriptorSubType, Capabilities, DataInterface],
            Schema::Hid => &[
                BcdHid,
                CountryCode,
                NumDescriptors,
                ClassDescriptorType,
                ClassDescriptorLength,
            ],
        }
    }

    /// Fields computed by a profile rather than supplied by the author.
    pub fn derived(self) -> &'static [FieldTag] {
        match self {
            Schema::Configuration => &[FieldTag::TotalLength, FieldTag::NumInterfaces],
            Schema::Interface => &[FieldTag::NumEndpoints],
            Schema::InterfaceAssociation => &[FieldTag::FirstInterface, FieldTag::InterfaceCount],
            _ => &[],
        }
    }

    /// Slots whose value is fixed by the layout itself.
    pub fn fixed(self) -> &'static [(FieldTag, u32)] {
        match self {
            Schema::DeviceQualifier => &[(FieldTag::Reserved, 0)],
            Schema::CdcHeader => &[(FieldTag::DescriptorSubType, cdc_subtype::HEADER as u32)],
            Schema::CdcAcm => &[(FieldTag::DescriptorSubType, cdc_subtype::ACM as u32)],
            Schema::CdcUnion => &[(FieldTag::DescriptorSubType, cdc_subtype::UNION as u32)],
            Schema::CdcCallManagement => {
                &[(FieldTag::DescriptorSubType, cdc_subtype::CALL_MANAGEMENT as u32)]
            }
            Schema::Hid => &[
                (FieldTag::NumDescriptors, 1),
                (FieldTag::ClassDescriptorType, kind::HID_REPORT as u32),
            ],
            _ => &[],
        }
    }

    /// Encoded size: header plus every slot width.
    pub fn encoded_len(self) -> usize {
        2 + self.slots().iter().map(|t| t.width()).sum::<usize>()
    }

    pub fn title(self) -> &'static str {
        match self {
            Schema::Device => "DEVICE",
            Schema::DeviceQualifier => "DEVICE_QUALIFIER",
            Schema::Configuration => "CONFIGURATION",
            Schema::Interface => "INTERFACE",
            Schema::Endpoint => "ENDPOINT",
            Schema::InterfaceAssociation => "INTERFACE_ASSOCIATION",
            Schema::CdcHeader => "CDC_HEADER",
            Schema::CdcAcm => "CDC_ACM",
            Schema::CdcUnion => "CDC_UNION",
            Schema::CdcCallManagement => "CDC_CALL_MANAGEMENT",
            Schema::Hid => "HID",
        }
    }
}

/// One encoded descriptor. Immutable once built; the length byte is always
/// computed from the field widths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorNode {
    schema: Schema,
    fields: Seq<FieldRecord>,
}

impl DescriptorNode {
    /// Check `fields` against the schema's slots and value rules. Every
    /// violation is reported, not just the first.
    pub fn new(schema: Schema, fields: impl Into<Seq<FieldRecord>>) -> Result<Self, DescriptorError> {
        let node = DescriptorNode { schema, fields: fields.into() };
        let label = node.label();
        let mut errors = validate::check_slots(&label, schema.slots(), &node.fields);

        let len = 2 + node.fields.fold(0usize, |acc, f| acc + f.width());
        if len > u8::MAX as usize {
            errors.push(DescriptorError::overflow(
                &label,
                format!("descriptor length {} exceeds 255", len),
            ));
        }

        for &(tag, expected) in schema.fixed() {
            if let Some(found) = node.value(tag) {
                if found != expected {
                    errors.push(DescriptorError::constraint(
                        &label,
                        Constraint::FixedValue { field: tag.name(), expected, found },
                    ));
                }
            }
        }

        match schema {
            Schema::Device | Schema::DeviceQualifier => {
                if let Some(value) = node.value(FieldTag::MaxPacketSize0) {
                    if ![8, 16, 32, 64].contains(&value) {
                        errors.push(DescriptorError::constraint(&label, Constraint::MaxPacketSize0 { value }));
                    }
                }
            }
            Schema::Configuration => {
                if node.value(FieldTag::ConfigurationValue) == Some(0) {
                    errors.push(DescriptorError::constraint(&label, Constraint::ZeroConfigurationValue));
                }
            }
            _ => {}
        }

        DescriptorError::collect(errors)?;
        Ok(node)
    }

    /// Build from raw values given in slot order. Values that do not fit their
    /// slot are all reported.
    pub fn from_values(schema: Schema, values: &[u32]) -> Result<Self, DescriptorError> {
        let mut records = Vec::with_capacity(values.len());
        let mut errors = Vec::new();
        for (tag, &value) in schema.slots().iter().zip(values) {
            match FieldRecord::new(*tag, value) {
                Ok(r) => records.push(r),
                Err(e) => errors.push(e),
            }
        }
        if values.len() > schema.slots().len() {
            errors.push(DescriptorError::SurplusValues {
                node: schema.title().to_string(),
                expected: schema.slots().len(),
                found: values.len(),
            });
        } else if values.len() < schema.slots().len() {
            errors.push(DescriptorError::StructuralTypeMismatch {
                node: schema.title().to_string(),
                slot: values.len(),
                expected: schema.slots().get(values.len()).copied(),
                found: None,
            });
        }
        DescriptorError::collect(errors)?;
        DescriptorNode::new(schema, records)
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn kind(&self) -> u8 {
        self.schema.kind()
    }

    pub fn fields(&self) -> &Seq<FieldRecord> {
        &self.fields
    }

    /// Value of the first field carrying `tag`.
    pub fn value(&self, tag: FieldTag) -> Option<u32> {
        self.fields.iter().find(|f| f.tag() == tag).map(|f| f.value())
    }

    /// `bLength`: header plus payload widths.
    pub fn len(&self) -> usize {
        2 + self.fields.fold(0, |acc, f| acc + f.width())
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Name used in diagnostics, e.g. `ENDPOINT 0x81` or `INTERFACE 2`.
    pub fn label(&self) -> String {
        let title = self.schema.title();
        match self.schema {
            Schema::Configuration => match self.value(FieldTag::ConfigurationValue) {
                Some(v) => format!("{} {}", title, v),
                None => title.to_string(),
            },
            Schema::Interface => match (self.value(FieldTag::InterfaceNumber), self.value(FieldTag::AlternateSetting)) {
                (Some(n), Some(0)) | (Some(n), None) => format!("{} {}", title, n),
                (Some(n), Some(alt)) => format!("{} {}.{}", title, n, alt),
                _ => title.to_string(),
            },
            Schema::Endpoint => match self.value(FieldTag::EndpointAddress) {
                Some(a) => format!("{} 0x{:02X}", title, a),
                None => title.to_string(),
            },
            Schema::InterfaceAssociation => match self.value(FieldTag::FirstInterface) {
                Some(f) => format!("{} {}", title, f),
                None => title.to_string(),
            },
            _ => title.to_string(),
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        trace!("encode {} ({} bytes)", self.label(), self.len());
        out.push(self.len() as u8);
        out.push(self.kind());
        self.fields.foreach(|f| f.write_to(out));
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.write_to(&mut out);
        out
    }
}
