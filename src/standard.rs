//! Fixed-layout USB 2.0 chapter 9 descriptors.

use crate::descriptor::{DescriptorNode, Schema};
use crate::error::DescriptorError;
use crate::field::{Direction, EndpointAddress, EndpointAttributes, FieldRecord, FieldTag, TransferType};

/// Device descriptor (18 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub bcd_usb: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub bcd_device: u16,
    pub manufacturer: u8,
    pub product: u8,
    pub serial_number: u8,
    pub num_configurations: u8,
}

impl Device {
    /// USB 2.0 device with class code 0 (defined per interface), 64-byte EP0 and
    /// one configuration.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Device {
            bcd_usb: 0x0200,
            class: 0,
            subclass: 0,
            protocol: 0,
            max_packet_size0: 64,
            vendor_id,
            product_id,
            bcd_device: 0x0100,
            manufacturer: 0,
            product: 0,
            serial_number: 0,
            num_configurations: 1,
        }
    }

    pub fn class(mut self, class: u8, subclass: u8, protocol: u8) -> Self {
        self.class = class;
        self.subclass = subclass;
        self.protocol = protocol;
        self
    }

    /// Class 0xEF/0x02/0x01: functions are grouped with interface associations.
    pub fn composite(self) -> Self {
        self.class(0xEF, 0x02, 0x01)
    }

    pub fn strings(mut self, manufacturer: u8, product: u8, serial_number: u8) -> Self {
        self.manufacturer = manufacturer;
        self.product = product;
        self.serial_number = serial_number;
        self
    }

    pub fn bcd_device(mut self, bcd: u16) -> Self {
        self.bcd_device = bcd;
        self
    }

    pub fn max_packet_size0(mut self, size: u8) -> Self {
        self.max_packet_size0 = size;
        self
    }

    pub fn num_configurations(mut self, n: u8) -> Self {
        self.num_configurations = n;
        self
    }

    pub fn build(&self) -> Result<DescriptorNode, DescriptorError> {
        DescriptorNode::from_values(
            Schema::Device,
            &[
                self.bcd_usb as u32,
                self.class as u32,
                self.subclass as u32,
                self.protocol as u32,
                self.max_packet_size0 as u32,
                self.vendor_id as u32,
                self.product_id as u32,
                self.bcd_device as u32,
                self.manufacturer as u32,
                self.product as u32,
                self.serial_number as u32,
                self.num_configurations as u32,
            ],
        )
    }

    /// Qualifier describing the same device at the other speed.
    pub fn qualifier(&self) -> DeviceQualifier {
        DeviceQualifier {
            bcd_usb: self.bcd_usb,
            class: self.class,
            subclass: self.subclass,
            protocol: self.protocol,
            max_packet_size0: self.max_packet_size0,
            num_configurations: self.num_configurations,
        }
    }
}

/// Device Qualifier descriptor (10 bytes, ends in a reserved zero byte).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceQualifier {
    pub bcd_usb: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub max_packet_size0: u8,
    pub num_configurations: u8,
}

impl DeviceQualifier {
    pub fn build(&self) -> Result<DescriptorNode, DescriptorError> {
        DescriptorNode::from_values(
            Schema::DeviceQualifier,
            &[
                self.bcd_usb as u32,
                self.class as u32,
                self.subclass as u32,
                self.protocol as u32,
                self.max_packet_size0 as u32,
                self.num_configurations as u32,
                0,
            ],
        )
    }
}

/// Endpoint descriptor (7 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub address: EndpointAddress,
    pub attributes: EndpointAttributes,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl Endpoint {
    pub fn new(address: EndpointAddress, attributes: EndpointAttributes, max_packet_size: u16) -> Self {
        Endpoint { address, attributes, max_packet_size, interval: 0 }
    }

    pub fn bulk(number: u8, direction: Direction, max_packet_size: u16) -> Result<Self, DescriptorError> {
        let address = EndpointAddress::new(number, direction)?;
        Ok(Endpoint::new(address, EndpointAttributes::new(TransferType::Bulk), max_packet_size))
    }

    pub fn interrupt(
        number: u8,
        direction: Direction,
        max_packet_size: u16,
        interval: u8,
    ) -> Result<Self, DescriptorError> {
        let address = EndpointAddress::new(number, direction)?;
        Ok(Endpoint::new(address, EndpointAttributes::new(TransferType::Interrupt), max_packet_size)
            .interval(interval))
    }

    pub fn interval(mut self, interval: u8) -> Self {
        self.interval = interval;
        self
    }

    pub fn build(&self) -> Result<DescriptorNode, DescriptorError> {
        DescriptorNode::new(
            Schema::Endpoint,
            vec![
                self.address.record(),
                self.attributes.record(),
                FieldRecord::u16(FieldTag::MaxPacketSize, self.max_packet_size)?,
                FieldRecord::u8(FieldTag::Interval, self.interval)?,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_bytes() {
        let dev = Device::new(0x0483, 0x5740)
            .composite()
            .bcd_device(0x0200)
            .strings(1, 2, 3)
            .build()
            .expect("device");
        assert_eq!(
            dev.encode(),
            vec![
                0x12, 0x01, 0x00, 0x02, 0xEF, 0x02, 0x01, 0x40, 0x83, 0x04, 0x40, 0x57, 0x00, 0x02,
                0x01, 0x02, 0x03, 0x01
            ]
        );
    }

    #[test]
    fn qualifier_mirrors_device() {
        let q = Device::new(1, 2).composite().qualifier().build().expect("qualifier");
        assert_eq!(q.encode(), vec![0x0A, 0x06, 0x00, 0x02, 0xEF, 0x02, 0x01, 0x40, 0x01, 0x00]);
    }

    #[test]
    fn endpoint_bytes() {
        let ep = Endpoint::interrupt(2, Direction::In, 8, 16).expect("ep").build().expect("build");
        assert_eq!(ep.encode(), vec![7, 5, 0x82, 0x03, 8, 0, 16]);
        let bulk = Endpoint::bulk(1, Direction::Out, 512).expect("ep").build().expect("build");
        assert_eq!(bulk.encode(), vec![7, 5, 0x01, 0x02, 0x00, 0x02, 0]);
    }

    #[test]
    fn bad_packet_size_zero() {
        assert!(Device::new(1, 2).max_packet_size0(12).build().is_err());
    }
}
