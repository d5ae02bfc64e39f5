//! String descriptors: `[bLength][0x03][UTF-16LE code units…]`.

use crate::descriptor::kind;
use crate::error::DescriptorError;
use crate::validate::Constraint;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;
use std::sync::Arc;

/// English (United States).
pub const LANGID_EN_US: u16 = 0x0409;

/// Index of the Microsoft OS string descriptor.
pub const MS_OS_STRING_INDEX: u8 = 0xEE;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringDescriptor {
    bytes: Arc<[u8]>,
}

impl StringDescriptor {
    fn from_units(label: &str, units: &[u16]) -> Result<Self, DescriptorError> {
        let len = 2 + 2 * units.len();
        if len > u8::MAX as usize {
            return Err(DescriptorError::overflow(
                label,
                format!("string descriptor length {} exceeds 255", len),
            ));
        }
        let mut bytes = vec![0u8; len];
        bytes[0] = len as u8;
        bytes[1] = kind::STRING;
        LittleEndian::write_u16_into(units, &mut bytes[2..]);
        Ok(StringDescriptor { bytes: bytes.into() })
    }

    /// UTF-16LE text descriptor.
    pub fn new(text: &str) -> Result<Self, DescriptorError> {
        let units: Vec<u16> = text.encode_utf16().collect();
        Self::from_units(&format!("STRING {:?}", text), &units)
    }

    /// Index 0: the supported language IDs.
    pub fn languages(langids: &[u16]) -> Result<Self, DescriptorError> {
        Self::from_units("STRING 0", langids)
    }

    /// Microsoft OS string (index 0xEE): `MSFT100` plus the vendor code used
    /// for the OS feature requests.
    pub fn ms_os(vendor_code: u8) -> Self {
        let mut units: Vec<u16> = "MSFT100".encode_utf16().collect();
        units.push(vendor_code as u16);
        let mut bytes = vec![0u8; 18];
        bytes[0] = 18;
        bytes[1] = kind::STRING;
        LittleEndian::write_u16_into(&units, &mut bytes[2..]);
        StringDescriptor { bytes: bytes.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Language list plus indexed strings. Index 0 is always the language
/// descriptor; 0xEE is reserved for the Microsoft OS string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    languages: Vec<u16>,
    entries: Vec<(u8, String)>,
    ms_os_vendor_code: Option<u8>,
}

impl Default for StringTable {
    fn default() -> Self {
        StringTable::new(&[LANGID_EN_US])
    }
}

impl StringTable {
    pub fn new(languages: &[u16]) -> Self {
        StringTable { languages: languages.to_vec(), entries: Vec::new(), ms_os_vendor_code: None }
    }

    pub fn with(mut self, index: u8, text: impl Into<String>) -> Self {
        self.entries.push((index, text.into()));
        self
    }

    pub fn with_ms_os(mut self, vendor_code: u8) -> Self {
        self.ms_os_vendor_code = Some(vendor_code);
        self
    }

    /// Append `text` at the next free index and return that index.
    pub fn add(&mut self, text: impl Into<String>) -> u8 {
        let next = self.entries.iter().map(|(i, _)| *i).max().unwrap_or(0).saturating_add(1);
        self.entries.push((next, text.into()));
        next
    }

    pub fn build(&self) -> Result<BTreeMap<u8, StringDescriptor>, DescriptorError> {
        let mut errors = Vec::new();
        let mut out = BTreeMap::new();
        match StringDescriptor::languages(&self.languages) {
            Ok(d) => {
                out.insert(0, d);
            }
            Err(e) => errors.push(e),
        }
        for (index, text) in &self.entries {
            let label = format!("STRING {}", index);
            if *index == 0 || (*index == MS_OS_STRING_INDEX && self.ms_os_vendor_code.is_some()) {
                errors.push(DescriptorError::constraint(&label, Constraint::ReservedStringIndex { index: *index }));
                continue;
            }
            if out.contains_key(index) {
                errors.push(DescriptorError::constraint(&label, Constraint::DuplicateString { index: *index }));
                continue;
            }
            match StringDescriptor::new(text) {
                Ok(d) => {
                    out.insert(*index, d);
                }
                Err(e) => errors.push(e),
            }
        }
        if let Some(code) = self.ms_os_vendor_code {
            out.insert(MS_OS_STRING_INDEX, StringDescriptor::ms_os(code));
        }
        DescriptorError::collect(errors)?;
        Ok(out)
    }
}
