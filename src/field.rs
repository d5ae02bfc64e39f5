//! Typed descriptor fields.
//!
//! A [`FieldRecord`] is one tagged value of a descriptor (e.g. `idVendor`). The tag
//! fixes the width on the wire and, for bitmap fields, which bits may be set.

use crate::error::DescriptorError;
use crate::validate::Constraint;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Semantic role of a descriptor field (USB 2.0 chapter 9, CDC 1.2 §5.2.3,
/// HID 1.11 §6.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTag {
    // Device / Device Qualifier
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
    Reserved,
    // Configuration
    TotalLength,
    NumInterfaces,
    ConfigurationValue,
    IConfiguration,
    ConfigAttributes,
    MaxPower,
    // Interface
    InterfaceNumber,
    AlternateSetting,
    NumEndpoints,
    InterfaceClass,
    InterfaceSubClass,
    InterfaceProtocol,
    IInterface,
    // Endpoint
    EndpointAddress,
    EndpointAttributes,
    MaxPacketSize,
    Interval,
    // Interface Association
    FirstInterface,
    InterfaceCount,
    FunctionClass,
    FunctionSubClass,
    FunctionProtocol,
    IFunction,
    // CDC functional
    DescriptorSubType,
    BcdCdc,
    Capabilities,
    ControlInterface,
    SubordinateInterface0,
    DataInterface,
    // HID class
    BcdHid,
    CountryCode,
    NumDescriptors,
    ClassDescriptorType,
    ClassDescriptorLength,
}

const ALL_TAGS: &[FieldTag] = &[
    FieldTag::BcdUsb,
    FieldTag::DeviceClass,
    FieldTag::DeviceSubClass,
    FieldTag::DeviceProtocol,
    FieldTag::MaxPacketSize0,
    FieldTag::IdVendor,
    FieldTag::IdProduct,
    FieldTag::BcdDevice,
    FieldTag::IManufacturer,
    FieldTag::IProduct,
    FieldTag::ISerialNumber,
    FieldTag::NumConfigurations,
    FieldTag::Reserved,
    FieldTag::TotalLength,
    FieldTag::NumInterfaces,
    FieldTag::ConfigurationValue,
    FieldTag::IConfiguration,
    FieldTag::ConfigAttributes,
    FieldTag::MaxPower,
    FieldTag::InterfaceNumber,
    FieldTag::AlternateSetting,
    FieldTag::NumEndpoints,
    FieldTag::InterfaceClass,
    FieldTag::InterfaceSubClass,
    FieldTag::InterfaceProtocol,
    FieldTag::IInterface,
    FieldTag::EndpointAddress,
    FieldTag::EndpointAttributes,
    FieldTag::MaxPacketSize,
    FieldTag::Interval,
    FieldTag::FirstInterface,
    FieldTag::InterfaceCount,
    FieldTag::FunctionClass,
    FieldTag::FunctionSubClass,
    FieldTag::FunctionProtocol,
    FieldTag::IFunction,
    FieldTag::DescriptorSubType,
    FieldTag::BcdCdc,
    FieldTag::Capabilities,
    FieldTag::ControlInterface,
    FieldTag::SubordinateInterface0,
    FieldTag::DataInterface,
    FieldTag::BcdHid,
    FieldTag::CountryCode,
    FieldTag::NumDescriptors,
    FieldTag::ClassDescriptorType,
    FieldTag::ClassDescriptorLength,
];

impl FieldTag {
    /// Field name as printed in the USB / class specifications.
    pub fn name(self) -> &'static str {
        match self {
            FieldTag::BcdUsb => "bcdUSB",
            FieldTag::DeviceClass => "bDeviceClass",
            FieldTag::DeviceSubClass => "bDeviceSubClass",
            FieldTag::DeviceProtocol => "bDeviceProtocol",
            FieldTag::MaxPacketSize0 => "bMaxPacketSize0",
            FieldTag::IdVendor => "idVendor",
            FieldTag::IdProduct => "idProduct",
            FieldTag::BcdDevice => "bcdDevice",
            FieldTag::IManufacturer => "iManufacturer",
            FieldTag::IProduct => "iProduct",
            FieldTag::ISerialNumber => "iSerialNumber",
            FieldTag::NumConfigurations => "bNumConfigurations",
            FieldTag::Reserved => "bReserved",
            FieldTag::TotalLength => "wTotalLength",
            FieldTag::NumInterfaces => "bNumInterfaces",
            FieldTag::ConfigurationValue => "bConfigurationValue",
            FieldTag::IConfiguration => "iConfiguration",
            FieldTag::ConfigAttributes | FieldTag::EndpointAttributes => "bmAttributes",
            FieldTag::MaxPower => "bMaxPower",
            FieldTag::InterfaceNumber => "bInterfaceNumber",
            FieldTag::AlternateSetting => "bAlternateSetting",
            FieldTag::NumEndpoints => "bNumEndpoints",
            FieldTag::InterfaceClass => "bInterfaceClass",
            FieldTag::InterfaceSubClass => "bInterfaceSubClass",
            FieldTag::InterfaceProtocol => "bInterfaceProtocol",
            FieldTag::IInterface => "iInterface",
            FieldTag::EndpointAddress => "bEndpointAddress",
            FieldTag::MaxPacketSize => "wMaxPacketSize",
            FieldTag::Interval => "bInterval",
            FieldTag::FirstInterface => "bFirstInterface",
            FieldTag::InterfaceCount => "bInterfaceCount",
            FieldTag::FunctionClass => "bFunctionClass",
            FieldTag::FunctionSubClass => "bFunctionSubClass",
            FieldTag::FunctionProtocol => "bFunctionProtocol",
            FieldTag::IFunction => "iFunction",
            FieldTag::DescriptorSubType => "bDescriptorSubType",
            FieldTag::BcdCdc => "bcdCDC",
            FieldTag::Capabilities => "bmCapabilities",
            FieldTag::ControlInterface => "bControlInterface",
            FieldTag::SubordinateInterface0 => "bSubordinateInterface0",
            FieldTag::DataInterface => "bDataInterface",
            FieldTag::BcdHid => "bcdHID",
            FieldTag::CountryCode => "bCountryCode",
            FieldTag::NumDescriptors => "bNumDescriptors",
            FieldTag::ClassDescriptorType => "bDescriptorType",
            FieldTag::ClassDescriptorLength => "wDescriptorLength",
        }
    }

    /// Look a tag up by its USB field name, preferring the candidates in
    /// `preferred` (the slots of the descriptor being built). `bmAttributes`
    /// is ambiguous on its own and resolves to whichever variant the
    /// descriptor expects.
    pub fn from_name(name: &str, preferred: &[FieldTag]) -> Option<FieldTag> {
        preferred
            .iter()
            .chain(ALL_TAGS.iter())
            .copied()
            .find(|t| t.name() == name)
    }

    /// Width in bytes of the little-endian payload.
    pub fn width(self) -> usize {
        match self {
            FieldTag::BcdUsb
            | FieldTag::IdVendor
            | FieldTag::IdProduct
            | FieldTag::BcdDevice
            | FieldTag::TotalLength
            | FieldTag::MaxPacketSize
            | FieldTag::BcdCdc
            | FieldTag::BcdHid
            | FieldTag::ClassDescriptorLength => 2,
            _ => 1,
        }
    }

    /// Bits that may legally be set, for bitmap fields.
    pub fn mask(self) -> Option<u32> {
        match self {
            FieldTag::ConfigAttributes => Some(0xE0),
            FieldTag::EndpointAttributes => Some(0x3F),
            FieldTag::EndpointAddress => Some(0x8F),
            _ => None,
        }
    }

    pub fn max_value(self) -> u32 {
        match self.width() {
            1 => u8::MAX as u32,
            2 => u16::MAX as u32,
            _ => u32::MAX,
        }
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One encoded descriptor field: a tag and the value stored under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRecord {
    tag: FieldTag,
    value: u32,
}

impl FieldRecord {
    /// Build a record, rejecting values wider than the tag's slot or with bits
    /// outside its mask.
    pub fn new(tag: FieldTag, value: u32) -> Result<Self, DescriptorError> {
        if value > tag.max_value() {
            return Err(DescriptorError::overflow(
                tag.name(),
                format!("value {} does not fit in {} byte(s)", value, tag.width()),
            ));
        }
        if let Some(mask) = tag.mask() {
            if value & !mask != 0 {
                return Err(DescriptorError::constraint(
                    tag.name(),
                    Constraint::ReservedBits { field: tag.name(), value, mask },
                ));
            }
        }
        if tag == FieldTag::ConfigAttributes && value & 0x80 == 0 {
            return Err(DescriptorError::constraint(tag.name(), Constraint::ConfigAttributesBit7));
        }
        Ok(FieldRecord { tag, value })
    }

    pub fn u8(tag: FieldTag, value: u8) -> Result<Self, DescriptorError> {
        Self::new(tag, value as u32)
    }

    pub fn u16(tag: FieldTag, value: u16) -> Result<Self, DescriptorError> {
        Self::new(tag, value as u32)
    }

    pub fn tag(&self) -> FieldTag {
        self.tag
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn width(&self) -> usize {
        self.tag.width()
    }

    /// Little-endian payload, exactly `width()` bytes.
    pub fn payload(&self) -> Vec<u8> {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, self.value);
        buf[..self.width()].to_vec()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.payload());
    }
}

/// Endpoint direction bit of `bEndpointAddress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Out = 0x00,
    In = 0x80,
}

/// `bEndpointAddress`: direction bit plus a 4-bit endpoint number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    number: u8,
    direction: Direction,
}

impl EndpointAddress {
    pub fn new(number: u8, direction: Direction) -> Result<Self, DescriptorError> {
        if number > 15 {
            return Err(DescriptorError::constraint(
                FieldTag::EndpointAddress.name(),
                Constraint::EndpointNumber { number: number as u32 },
            ));
        }
        Ok(EndpointAddress { number, direction })
    }

    pub fn from_raw(raw: u8) -> Self {
        let direction = if raw & 0x80 != 0 { Direction::In } else { Direction::Out };
        EndpointAddress { number: raw & 0x0F, direction }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn raw(&self) -> u8 {
        self.direction as u8 | self.number
    }

    pub fn record(&self) -> FieldRecord {
        FieldRecord { tag: FieldTag::EndpointAddress, value: self.raw() as u32 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferType {
    Control = 0b00,
    Isochronous = 0b01,
    Bulk = 0b10,
    Interrupt = 0b11,
}

/// Bits 3..2 of endpoint `bmAttributes` (isochronous only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncType {
    #[default]
    NoSynchronization = 0x00,
    Asynchronous = 0x04,
    Adaptive = 0x08,
    Synchronous = 0x0C,
}

/// Bits 5..4 of endpoint `bmAttributes` (isochronous only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UsageType {
    #[default]
    Data = 0x00,
    Feedback = 0x10,
    ImplicitFeedbackData = 0x20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointAttributes {
    pub transfer: TransferType,
    pub sync: SyncType,
    pub usage: UsageType,
}

impl EndpointAttributes {
    pub fn new(transfer: TransferType) -> Self {
        EndpointAttributes { transfer, sync: SyncType::default(), usage: UsageType::default() }
    }

    pub fn raw(&self) -> u8 {
        self.transfer as u8 | self.sync as u8 | self.usage as u8
    }

    pub fn record(&self) -> FieldRecord {
        FieldRecord { tag: FieldTag::EndpointAttributes, value: self.raw() as u32 }
    }
}

/// Configuration `bmAttributes`. Bit 7 is always set on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConfigAttributes {
    pub self_powered: bool,
    pub remote_wakeup: bool,
}

impl ConfigAttributes {
    pub fn raw(&self) -> u8 {
        let mut v = 0x80;
        if self.self_powered {
            v |= 0x40;
        }
        if self.remote_wakeup {
            v |= 0x20;
        }
        v
    }

    pub fn record(&self) -> FieldRecord {
        FieldRecord { tag: FieldTag::ConfigAttributes, value: self.raw() as u32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_little_endian_fixed_width() {
        let r = FieldRecord::new(FieldTag::IdVendor, 0x0483).expect("record");
        assert_eq!(r.payload(), vec![0x83, 0x04]);
        let small = FieldRecord::new(FieldTag::BcdUsb, 1).expect("record");
        assert_eq!(small.payload(), vec![0x01, 0x00]);
        let byte = FieldRecord::new(FieldTag::DeviceClass, 0xEF).expect("record");
        assert_eq!(byte.payload(), vec![0xEF]);
    }

    #[test]
    fn value_wider_than_slot_overflows() {
        let err = FieldRecord::new(FieldTag::DeviceClass, 0x100).unwrap_err();
        assert!(err.is_overflow());
        assert!(FieldRecord::new(FieldTag::IdProduct, 0x1_0000).unwrap_err().is_overflow());
    }

    #[test]
    fn reserved_bits_are_rejected() {
        let err = FieldRecord::new(FieldTag::EndpointAttributes, 0x40).unwrap_err();
        assert!(err.is_constraint_violation());
        let err = FieldRecord::new(FieldTag::ConfigAttributes, 0x40).unwrap_err();
        assert!(err.is_constraint_violation());
        assert!(FieldRecord::new(FieldTag::ConfigAttributes, 0xC0).is_ok());
    }

    #[test]
    fn endpoint_address_packs_direction() {
        let a = EndpointAddress::new(1, Direction::In).expect("address");
        assert_eq!(a.raw(), 0x81);
        assert_eq!(EndpointAddress::from_raw(0x81), a);
        assert!(EndpointAddress::new(16, Direction::Out).is_err());
    }

    #[test]
    fn attribute_helpers() {
        let cfg = ConfigAttributes { self_powered: true, remote_wakeup: false };
        assert_eq!(cfg.raw(), 0xC0);
        assert_eq!(ConfigAttributes::default().raw(), 0x80);
        let iso = EndpointAttributes {
            transfer: TransferType::Isochronous,
            sync: SyncType::Adaptive,
            usage: UsageType::Feedback,
        };
        assert_eq!(iso.raw(), 0x19);
        assert_eq!(EndpointAttributes::new(TransferType::Bulk).raw(), 0x02);
    }

    #[test]
    fn names_resolve_against_preferred_slots() {
        assert_eq!(
            FieldTag::from_name("bmAttributes", &[FieldTag::EndpointAddress, FieldTag::EndpointAttributes]),
            Some(FieldTag::EndpointAttributes)
        );
        assert_eq!(FieldTag::from_name("bmAttributes", &[]), Some(FieldTag::ConfigAttributes));
        assert_eq!(FieldTag::from_name("idVendor", &[]), Some(FieldTag::IdVendor));
        assert_eq!(FieldTag::from_name("nope", &[]), None);
    }
}
