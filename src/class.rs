//! Class-specific interface descriptors: CDC functional descriptors and the HID
//! class descriptor.

use crate::descriptor::{cdc_subtype, kind, DescriptorNode, Schema};
use crate::error::DescriptorError;
use crate::hid::ReportDescriptor;

/// CDC Header functional descriptor. Must lead the CDC functional descriptors
/// of a communication interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdcHeader {
    pub bcd_cdc: u16,
}

impl Default for CdcHeader {
    fn default() -> Self {
        CdcHeader { bcd_cdc: 0x0110 }
    }
}

impl CdcHeader {
    pub fn build(&self) -> Result<DescriptorNode, DescriptorError> {
        DescriptorNode::from_values(Schema::CdcHeader, &[cdc_subtype::HEADER as u32, self.bcd_cdc as u32])
    }
}

/// Abstract Control Management functional descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CdcAcm {
    pub capabilities: u8,
}

impl CdcAcm {
    pub fn build(&self) -> Result<DescriptorNode, DescriptorError> {
        DescriptorNode::from_values(Schema::CdcAcm, &[cdc_subtype::ACM as u32, self.capabilities as u32])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdcUnion {
    pub control_interface: u8,
    pub subordinate_interface: u8,
}

impl CdcUnion {
    pub fn build(&self) -> Result<DescriptorNode, DescriptorError> {
        DescriptorNode::from_values(
            Schema::CdcUnion,
            &[
                cdc_subtype::UNION as u32,
                self.control_interface as u32,
                self.subordinate_interface as u32,
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdcCallManagement {
    pub capabilities: u8,
    pub data_interface: u8,
}

impl CdcCallManagement {
    pub fn build(&self) -> Result<DescriptorNode, DescriptorError> {
        DescriptorNode::from_values(
            Schema::CdcCallManagement,
            &[
                cdc_subtype::CALL_MANAGEMENT as u32,
                self.capabilities as u32,
                self.data_interface as u32,
            ],
        )
    }
}

/// HID class descriptor announcing one report descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidClass {
    pub bcd_hid: u16,
    pub country_code: u8,
    pub report_length: u16,
}

impl HidClass {
    pub fn new(report_length: u16) -> Self {
        HidClass { bcd_hid: 0x0111, country_code: 0, report_length }
    }

    /// Class descriptor whose `wDescriptorLength` is the encoded size of `report`.
    pub fn for_report(report: &ReportDescriptor) -> Result<Self, DescriptorError> {
        let len = report.len();
        if len > u16::MAX as usize {
            return Err(DescriptorError::overflow(
                "HID",
                format!("report descriptor length {} exceeds 65535", len),
            ));
        }
        Ok(HidClass::new(len as u16))
    }

    pub fn build(&self) -> Result<DescriptorNode, DescriptorError> {
        DescriptorNode::from_values(
            Schema::Hid,
            &[
                self.bcd_hid as u32,
                self.country_code as u32,
                1,
                kind::HID_REPORT as u32,
                self.report_length as u32,
            ],
        )
    }
}

/// Header, Call Management, ACM and Union in the order a CDC ACM
/// communication interface carries them.
pub fn cdc_acm_functional(
    control_interface: u8,
    data_interface: u8,
) -> Result<Vec<DescriptorNode>, DescriptorError> {
    Ok(vec![
        CdcHeader::default().build()?,
        CdcCallManagement { capabilities: 0, data_interface }.build()?,
        CdcAcm { capabilities: 0x02 }.build()?,
        CdcUnion { control_interface, subordinate_interface: data_interface }.build()?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdc_layouts() {
        assert_eq!(CdcHeader::default().build().expect("hdr").encode(), vec![5, 0x24, 0x00, 0x10, 0x01]);
        assert_eq!(CdcAcm { capabilities: 2 }.build().expect("acm").encode(), vec![4, 0x24, 0x02, 0x02]);
        assert_eq!(
            CdcUnion { control_interface: 0, subordinate_interface: 1 }.build().expect("union").encode(),
            vec![5, 0x24, 0x06, 0, 1]
        );
        assert_eq!(
            CdcCallManagement { capabilities: 0, data_interface: 1 }.build().expect("cm").encode(),
            vec![5, 0x24, 0x01, 0, 1]
        );
    }

    #[test]
    fn hid_class_layout() {
        let hid = HidClass::new(0x3F).build().expect("hid");
        assert_eq!(hid.encode(), vec![9, 0x21, 0x11, 0x01, 0, 1, 0x22, 0x3F, 0]);
    }

    #[test]
    fn acm_functional_order() {
        let subtypes: Vec<u8> = cdc_acm_functional(0, 1)
            .expect("cdc")
            .iter()
            .map(|d| d.encode()[2])
            .collect();
        assert_eq!(subtypes, vec![0x00, 0x01, 0x02, 0x06]);
    }
}
