//! Microsoft OS 1.0 Extended Compat ID feature descriptor.
//!
//! ```text
//! header:   dwLength(4) bcdVersion(2)=0x0100 wIndex(2)=0x0004 bCount(1) reserved(7)
//! function: bFirstInterfaceNumber(1) reserved(1)=0x01
//!           compatibleID(8) subCompatibleID(8) reserved(6)
//! ```

use crate::error::DescriptorError;
use crate::validate::Constraint;
use byteorder::{ByteOrder, LittleEndian};

const HEADER_LEN: usize = 16;
const FUNCTION_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibleIdFunction {
    pub first_interface: u8,
    compatible_id: [u8; 8],
    sub_compatible_id: [u8; 8],
}

fn ascii_id(id: &str) -> Result<[u8; 8], DescriptorError> {
    if !id.is_ascii() || id.len() > 8 {
        return Err(DescriptorError::constraint(
            "WINUSB",
            Constraint::InvalidCompatibleId { id: id.to_string() },
        ));
    }
    let mut out = [0u8; 8];
    out[..id.len()].copy_from_slice(id.as_bytes());
    Ok(out)
}

impl CompatibleIdFunction {
    pub fn new(first_interface: u8, compatible_id: &str, sub_compatible_id: &str) -> Result<Self, DescriptorError> {
        Ok(CompatibleIdFunction {
            first_interface,
            compatible_id: ascii_id(compatible_id)?,
            sub_compatible_id: ascii_id(sub_compatible_id)?,
        })
    }

    pub fn winusb(first_interface: u8) -> Self {
        CompatibleIdFunction {
            first_interface,
            compatible_id: *b"WINUSB\0\0",
            sub_compatible_id: [0; 8],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompatibleIdDescriptor {
    functions: Vec<CompatibleIdFunction>,
}

impl CompatibleIdDescriptor {
    /// One WINUSB function on `interface` (40 bytes).
    pub fn winusb(interface: u8) -> Self {
        CompatibleIdDescriptor { functions: vec![CompatibleIdFunction::winusb(interface)] }
    }

    pub fn with(mut self, function: CompatibleIdFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn functions(&self) -> &[CompatibleIdFunction] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        HEADER_LEN + FUNCTION_LEN * self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, DescriptorError> {
        if self.functions.len() > u8::MAX as usize {
            return Err(DescriptorError::overflow(
                "WINUSB",
                format!("{} functions exceed bCount", self.functions.len()),
            ));
        }
        let mut out = vec![0u8; self.len()];
        LittleEndian::write_u32(&mut out[0..4], self.len() as u32);
        LittleEndian::write_u16(&mut out[4..6], 0x0100);
        LittleEndian::write_u16(&mut out[6..8], 0x0004);
        out[8] = self.functions.len() as u8;
        for (i, f) in self.functions.iter().enumerate() {
            let at = HEADER_LEN + i * FUNCTION_LEN;
            out[at] = f.first_interface;
            out[at + 1] = 0x01;
            out[at + 2..at + 10].copy_from_slice(&f.compatible_id);
            out[at + 10..at + 18].copy_from_slice(&f.sub_compatible_id);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_function_is_forty_bytes() {
        let bytes = CompatibleIdDescriptor::winusb(0).encode().expect("winusb");
        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[..10], &[40, 0, 0, 0, 0x00, 0x01, 0x04, 0x00, 1, 0]);
        assert_eq!(&bytes[16..26], &[0, 1, b'W', b'I', b'N', b'U', b'S', b'B', 0, 0]);
        assert!(bytes[26..].iter().all(|b| *b == 0));
    }

    #[test]
    fn ids_must_be_short_ascii() {
        assert!(CompatibleIdFunction::new(0, "WINUSB", "").is_ok());
        assert!(CompatibleIdFunction::new(0, "TOO_LONG_ID", "").is_err());
        assert!(CompatibleIdFunction::new(0, "WÏNUSB", "").is_err());
    }

    #[test]
    fn multiple_functions() {
        let d = CompatibleIdDescriptor::winusb(0)
            .with(CompatibleIdFunction::new(2, "RNDIS", "5162001").expect("rndis"));
        let bytes = d.encode().expect("encode");
        assert_eq!(bytes.len(), 64);
        assert_eq!(bytes[0], 64);
        assert_eq!(bytes[8], 2);
        assert_eq!(bytes[40], 2);
    }
}
