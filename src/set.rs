//! A device's complete set of descriptor buffers, ready to be served verbatim.

use crate::composite::CompositeNode;
use crate::descriptor::DescriptorNode;
use crate::error::DescriptorError;
use crate::field::FieldTag;
use crate::hid::ReportDescriptor;
use crate::string::StringDescriptor;
use crate::validate::Constraint;
use crate::winusb::CompatibleIdDescriptor;
use log::warn;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSet {
    device: DescriptorNode,
    qualifier: Option<DescriptorNode>,
    configurations: Vec<CompositeNode>,
    strings: BTreeMap<u8, StringDescriptor>,
    reports: Vec<(String, ReportDescriptor)>,
    winusb: Option<Vec<u8>>,
}

impl DescriptorSet {
    pub fn new(device: DescriptorNode) -> Self {
        DescriptorSet {
            device,
            qualifier: None,
            configurations: Vec::new(),
            strings: BTreeMap::new(),
            reports: Vec::new(),
            winusb: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: DescriptorNode) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    pub fn with_configuration(mut self, configuration: CompositeNode) -> Self {
        self.configurations.push(configuration);
        self
    }

    pub fn with_strings(mut self, strings: BTreeMap<u8, StringDescriptor>) -> Self {
        self.strings = strings;
        self
    }

    pub fn with_report(mut self, name: impl Into<String>, report: ReportDescriptor) -> Self {
        self.reports.push((name.into(), report));
        self
    }

    pub fn with_winusb(mut self, winusb: &CompatibleIdDescriptor) -> Result<Self, DescriptorError> {
        self.winusb = Some(winusb.encode()?);
        Ok(self)
    }

    /// Cross-checks between the device header and the rest of the set.
    /// With `strict`, a `bNumConfigurations` mismatch is an error instead of a
    /// warning.
    pub fn check(&self, strict: bool) -> Result<(), DescriptorError> {
        let mut errors = Vec::new();
        let declared = self.device.value(FieldTag::NumConfigurations).unwrap_or(0);
        let actual = self.configurations.len();
        if declared as usize != actual {
            let constraint = Constraint::ConfigurationCount { declared, actual };
            if strict {
                errors.push(DescriptorError::constraint(self.device.label(), constraint));
            } else {
                warn!("{}: {}", self.device.label(), constraint);
            }
        }

        let mut seen = Vec::new();
        for cfg in &self.configurations {
            let value = cfg
                .flatten()
                .head()
                .and_then(|h| h.value(FieldTag::ConfigurationValue))
                .unwrap_or(0) as u8;
            if seen.contains(&value) {
                errors.push(DescriptorError::constraint(
                    format!("CONFIGURATION {}", value),
                    Constraint::DuplicateConfiguration { value },
                ));
            }
            seen.push(value);
        }
        DescriptorError::collect(errors)
    }

    pub fn device_bytes(&self) -> Vec<u8> {
        self.device.encode()
    }

    pub fn qualifier_bytes(&self) -> Option<Vec<u8>> {
        self.qualifier.as_ref().map(|q| q.encode())
    }

    pub fn configuration_count(&self) -> usize {
        self.configurations.len()
    }

    /// Full configuration bundle (header plus every descendant) by position.
    pub fn configuration_bytes(&self, index: usize) -> Option<Vec<u8>> {
        self.configurations.get(index).map(|c| c.encode())
    }

    pub fn configuration(&self, index: usize) -> Option<&CompositeNode> {
        self.configurations.get(index)
    }

    pub fn string_bytes(&self, index: u8) -> Option<&[u8]> {
        self.strings.get(&index).map(|s| s.as_bytes())
    }

    pub fn string_indices(&self) -> Vec<u8> {
        self.strings.keys().copied().collect()
    }

    pub fn report(&self, name: &str) -> Option<&ReportDescriptor> {
        self.reports.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn report_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.report(name).map(|r| r.encode())
    }

    pub fn report_names(&self) -> Vec<&str> {
        self.reports.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn winusb_bytes(&self) -> Option<&[u8]> {
        self.winusb.as_deref()
    }

    /// Every buffer with a display label, in serving order: device, qualifier,
    /// configurations, strings, reports, WinUSB.
    pub fn buffers(&self) -> Vec<(String, Vec<u8>)> {
        let mut out = vec![("DEVICE".to_string(), self.device_bytes())];
        if let Some(q) = self.qualifier_bytes() {
            out.push(("DEVICE_QUALIFIER".to_string(), q));
        }
        for cfg in &self.configurations {
            let value = cfg
                .flatten()
                .head()
                .and_then(|h| h.value(FieldTag::ConfigurationValue))
                .unwrap_or(0);
            out.push((format!("CONFIGURATION {}", value), cfg.encode()));
        }
        for (index, s) in &self.strings {
            out.push((format!("STRING {}", index), s.as_bytes().to_vec()));
        }
        for (name, r) in &self.reports {
            out.push((format!("REPORT {}", name), r.encode()));
        }
        if let Some(w) = &self.winusb {
            out.push(("WINUSB".to_string(), w.clone()));
        }
        out
    }
}
