//! HID 1.11 report descriptors.
//!
//! Short item layout (HID 1.11 §6.2.2.2):
//!
//! ```text
//! byte 0: bTag(7..4) bType(3..2) bSize(1..0)
//! bytes 1..: 0, 1, 2 or 4 little-endian data bytes (bSize 0, 1, 2, 3)
//! ```
//!
//! Unsigned items use the smallest width that holds the value; signed items the
//! smallest two's-complement width.

use crate::error::DescriptorError;
use crate::seq::Seq;
use crate::validate::{self, Constraint};
use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    // Main
    Input,
    Output,
    Feature,
    Collection,
    EndCollection,
    // Global
    UsagePage,
    LogicalMinimum,
    LogicalMaximum,
    PhysicalMinimum,
    PhysicalMaximum,
    UnitExponent,
    Unit,
    ReportSize,
    ReportId,
    ReportCount,
    Push,
    Pop,
    // Local
    Usage,
    UsageMinimum,
    UsageMaximum,
    DesignatorIndex,
    DesignatorMinimum,
    DesignatorMaximum,
    StringIndex,
    StringMinimum,
    StringMaximum,
    Delimiter,
}

const ALL_KINDS: &[ItemKind] = &[
    ItemKind::Input,
    ItemKind::Output,
    ItemKind::Feature,
    ItemKind::Collection,
    ItemKind::EndCollection,
    ItemKind::UsagePage,
    ItemKind::LogicalMinimum,
    ItemKind::LogicalMaximum,
    ItemKind::PhysicalMinimum,
    ItemKind::PhysicalMaximum,
    ItemKind::UnitExponent,
    ItemKind::Unit,
    ItemKind::ReportSize,
    ItemKind::ReportId,
    ItemKind::ReportCount,
    ItemKind::Push,
    ItemKind::Pop,
    ItemKind::Usage,
    ItemKind::UsageMinimum,
    ItemKind::UsageMaximum,
    ItemKind::DesignatorIndex,
    ItemKind::DesignatorMinimum,
    ItemKind::DesignatorMaximum,
    ItemKind::StringIndex,
    ItemKind::StringMinimum,
    ItemKind::StringMaximum,
    ItemKind::Delimiter,
];

impl ItemKind {
    /// Tag and type bits; the size bits are left zero.
    pub fn prefix(self) -> u8 {
        match self {
            ItemKind::Input => 0x80,
            ItemKind::Output => 0x90,
            ItemKind::Feature => 0xB0,
            ItemKind::Collection => 0xA0,
            ItemKind::EndCollection => 0xC0,
            ItemKind::UsagePage => 0x04,
            ItemKind::LogicalMinimum => 0x14,
            ItemKind::LogicalMaximum => 0x24,
            ItemKind::PhysicalMinimum => 0x34,
            ItemKind::PhysicalMaximum => 0x44,
            ItemKind::UnitExponent => 0x54,
            ItemKind::Unit => 0x64,
            ItemKind::ReportSize => 0x74,
            ItemKind::ReportId => 0x84,
            ItemKind::ReportCount => 0x94,
            ItemKind::Push => 0xA4,
            ItemKind::Pop => 0xB4,
            ItemKind::Usage => 0x08,
            ItemKind::UsageMinimum => 0x18,
            ItemKind::UsageMaximum => 0x28,
            ItemKind::DesignatorIndex => 0x38,
            ItemKind::DesignatorMinimum => 0x48,
            ItemKind::DesignatorMaximum => 0x58,
            ItemKind::StringIndex => 0x68,
            ItemKind::StringMinimum => 0x78,
            ItemKind::StringMaximum => 0x88,
            ItemKind::Delimiter => 0xA8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ItemKind::LogicalMinimum
                | ItemKind::LogicalMaximum
                | ItemKind::PhysicalMinimum
                | ItemKind::PhysicalMaximum
                | ItemKind::UnitExponent
        )
    }

    pub fn carries_data(self) -> bool {
        !matches!(self, ItemKind::EndCollection | ItemKind::Push | ItemKind::Pop)
    }

    /// Bits a main item's flags may set. Bit 7 of Input is reserved.
    pub fn mask(self) -> Option<u32> {
        match self {
            ItemKind::Input => Some(0x17F),
            ItemKind::Output | ItemKind::Feature => Some(0x1FF),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Input => "Input",
            ItemKind::Output => "Output",
            ItemKind::Feature => "Feature",
            ItemKind::Collection => "Collection",
            ItemKind::EndCollection => "EndCollection",
            ItemKind::UsagePage => "UsagePage",
            ItemKind::LogicalMinimum => "LogicalMinimum",
            ItemKind::LogicalMaximum => "LogicalMaximum",
            ItemKind::PhysicalMinimum => "PhysicalMinimum",
            ItemKind::PhysicalMaximum => "PhysicalMaximum",
            ItemKind::UnitExponent => "UnitExponent",
            ItemKind::Unit => "Unit",
            ItemKind::ReportSize => "ReportSize",
            ItemKind::ReportId => "ReportID",
            ItemKind::ReportCount => "ReportCount",
            ItemKind::Push => "Push",
            ItemKind::Pop => "Pop",
            ItemKind::Usage => "Usage",
            ItemKind::UsageMinimum => "UsageMinimum",
            ItemKind::UsageMaximum => "UsageMaximum",
            ItemKind::DesignatorIndex => "DesignatorIndex",
            ItemKind::DesignatorMinimum => "DesignatorMinimum",
            ItemKind::DesignatorMaximum => "DesignatorMaximum",
            ItemKind::StringIndex => "StringIndex",
            ItemKind::StringMinimum => "StringMinimum",
            ItemKind::StringMaximum => "StringMaximum",
            ItemKind::Delimiter => "Delimiter",
        }
    }

    /// Accepts the full names plus the `Min`/`Max` abbreviations
    /// (`LogicalMin`, `UsageMax`, …).
    pub fn from_name(name: &str) -> Option<ItemKind> {
        let full = if let Some(stem) = name.strip_suffix("Min") {
            format!("{}Minimum", stem)
        } else if let Some(stem) = name.strip_suffix("Max") {
            format!("{}Maximum", stem)
        } else {
            name.to_string()
        };
        ALL_KINDS.iter().copied().find(|k| k.name() == full)
    }
}

/// One short item. The value is kept wide; the encoded width is chosen at
/// encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportItem {
    kind: ItemKind,
    value: i64,
}

impl ReportItem {
    pub fn new(kind: ItemKind, value: i64) -> Result<Self, DescriptorError> {
        let label = kind.name();
        if !kind.carries_data() {
            if value != 0 {
                return Err(DescriptorError::constraint(
                    label,
                    Constraint::FixedValue { field: label, expected: 0, found: value as u32 },
                ));
            }
        } else if kind.is_signed() {
            if value < i32::MIN as i64 || value > i32::MAX as i64 {
                return Err(DescriptorError::overflow(label, format!("{} does not fit in 32 signed bits", value)));
            }
        } else if value < 0 || value > u32::MAX as i64 {
            return Err(DescriptorError::overflow(label, format!("{} does not fit in 32 unsigned bits", value)));
        }
        if let Some(mask) = kind.mask() {
            validate::check_mask(label, label, value as u32, mask)?;
        }
        match kind {
            ItemKind::Collection if u8::try_from(value).ok().and_then(CollectionKind::from_code).is_none() => {
                return Err(DescriptorError::constraint(label, Constraint::ReservedCollectionKind { code: value }));
            }
            ItemKind::Delimiter if value > 1 => {
                return Err(DescriptorError::constraint(label, Constraint::DelimiterValue { value }));
            }
            _ => {}
        }
        Ok(ReportItem { kind, value })
    }

    /// Item without data (Push, Pop, End Collection).
    pub fn bare(kind: ItemKind) -> Result<Self, DescriptorError> {
        ReportItem::new(kind, 0)
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Number of data bytes: 0, 1, 2 or 4.
    pub fn data_width(&self) -> usize {
        let v = self.value;
        if !self.kind.carries_data() {
            0
        } else if self.kind.is_signed() {
            if (-0x80..=0x7F).contains(&v) {
                1
            } else if (-0x8000..=0x7FFF).contains(&v) {
                2
            } else {
                4
            }
        } else if v <= 0xFF {
            1
        } else if v <= 0xFFFF {
            2
        } else {
            4
        }
    }

    pub fn len(&self) -> usize {
        1 + self.data_width()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        let width = self.data_width();
        let size_class = match width {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 3,
        };
        out.push(self.kind.prefix() | size_class);
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, self.value as u32);
        out.extend_from_slice(&buf[..width]);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.write_to(&mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Physical,
    Application,
    Logical,
    Report,
    NamedArray,
    UsageSwitch,
    UsageModifier,
    Vendor(u8),
}

impl CollectionKind {
    pub fn code(self) -> u8 {
        match self {
            CollectionKind::Physical => 0x00,
            CollectionKind::Application => 0x01,
            CollectionKind::Logical => 0x02,
            CollectionKind::Report => 0x03,
            CollectionKind::NamedArray => 0x04,
            CollectionKind::UsageSwitch => 0x05,
            CollectionKind::UsageModifier => 0x06,
            CollectionKind::Vendor(code) => code,
        }
    }

    /// `None` for the reserved range 0x07..=0x7F.
    pub fn from_code(code: u8) -> Option<CollectionKind> {
        Some(match code {
            0x00 => CollectionKind::Physical,
            0x01 => CollectionKind::Application,
            0x02 => CollectionKind::Logical,
            0x03 => CollectionKind::Report,
            0x04 => CollectionKind::NamedArray,
            0x05 => CollectionKind::UsageSwitch,
            0x06 => CollectionKind::UsageModifier,
            0x80..=0xFF => CollectionKind::Vendor(code),
            _ => return None,
        })
    }

    pub fn from_name(name: &str) -> Option<CollectionKind> {
        Some(match name {
            "physical" => CollectionKind::Physical,
            "application" => CollectionKind::Application,
            "logical" => CollectionKind::Logical,
            "report" => CollectionKind::Report,
            "named_array" => CollectionKind::NamedArray,
            "usage_switch" => CollectionKind::UsageSwitch,
            "usage_modifier" => CollectionKind::UsageModifier,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReportElement {
    Item(ReportItem),
    Collection(Collection),
}

impl ReportElement {
    pub fn len(&self) -> usize {
        match self {
            ReportElement::Item(i) => i.len(),
            ReportElement::Collection(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            ReportElement::Item(i) => i.write_to(out),
            ReportElement::Collection(c) => c.write_to(out),
        }
    }

    fn items(&self) -> Seq<ReportItem> {
        match self {
            ReportElement::Item(i) => Seq::from(vec![*i]),
            ReportElement::Collection(c) => c.items(),
        }
    }
}

/// Elements bracketed by a Collection item and an End Collection item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collection {
    kind: CollectionKind,
    elements: Seq<ReportElement>,
}

impl Collection {
    pub fn new(kind: CollectionKind, elements: impl Into<Seq<ReportElement>>) -> Self {
        Collection { kind, elements: elements.into() }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn elements(&self) -> &Seq<ReportElement> {
        &self.elements
    }

    fn open(&self) -> ReportItem {
        ReportItem { kind: ItemKind::Collection, value: self.kind.code() as i64 }
    }

    fn close() -> ReportItem {
        ReportItem { kind: ItemKind::EndCollection, value: 0 }
    }

    pub fn len(&self) -> usize {
        self.open().len() + self.elements.fold(0, |acc, e| acc + e.len()) + Self::close().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Open item, contents and end marker as a flat item stream.
    pub fn items(&self) -> Seq<ReportItem> {
        self.elements
            .fold(Seq::from(vec![self.open()]), |acc, e| acc.concat(&e.items()))
            .push_back(Self::close())
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.open().write_to(out);
        self.elements.foreach(|e| e.write_to(out));
        Self::close().write_to(out);
    }
}

/// A complete, validated report descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ReportDescriptor {
    elements: Seq<ReportElement>,
}

impl ReportDescriptor {
    pub fn builder() -> ReportBuilder {
        ReportBuilder::default()
    }

    pub fn elements(&self) -> &Seq<ReportElement> {
        &self.elements
    }

    /// Every item in encoding order, collection brackets included.
    pub fn items(&self) -> Seq<ReportItem> {
        self.elements.fold(Seq::new(), |acc, e| acc.concat(&e.items()))
    }

    pub fn len(&self) -> usize {
        self.elements.fold(0, |acc, e| acc + e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.elements.foreach(|e| e.write_to(&mut out));
        out
    }
}

/// Accumulates report elements. Invalid items are recorded and reported
/// together by [`ReportBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    elements: Vec<ReportElement>,
    errors: Vec<DescriptorError>,
}

fn unpaired(kind: ItemKind) -> Option<DescriptorError> {
    matches!(kind, ItemKind::Collection | ItemKind::EndCollection)
        .then(|| DescriptorError::constraint(kind.name(), Constraint::UnpairedCollection { item: kind.name() }))
}

/// `Vendor` codes below 0x80 fall in the reserved range.
fn reserved_kind(kind: CollectionKind) -> Option<DescriptorError> {
    (CollectionKind::from_code(kind.code()) != Some(kind)).then(|| {
        DescriptorError::constraint(
            ItemKind::Collection.name(),
            Constraint::ReservedCollectionKind { code: kind.code() as i64 },
        )
    })
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection and End Collection are rejected here; use
    /// [`ReportBuilder::collection`] so they stay paired.
    pub fn item(mut self, kind: ItemKind, value: i64) -> Self {
        if let Some(e) = unpaired(kind) {
            self.errors.push(e);
            return self;
        }
        match ReportItem::new(kind, value) {
            Ok(item) => self.elements.push(ReportElement::Item(item)),
            Err(e) => self.errors.push(e),
        }
        self
    }

    fn range(self, min_kind: ItemKind, max_kind: ItemKind, min: i64, max: i64) -> Self {
        let label = format!("{}/{}", min_kind.name(), max_kind.name());
        let mut next = self.item(min_kind, min).item(max_kind, max);
        if let Err(e) = validate::check_range(&label, min, max) {
            next.errors.push(e);
        }
        next
    }

    pub fn usage_page(self, page: u32) -> Self {
        self.item(ItemKind::UsagePage, page as i64)
    }

    pub fn usage(self, usage: u32) -> Self {
        self.item(ItemKind::Usage, usage as i64)
    }

    pub fn logical_range(self, min: i64, max: i64) -> Self {
        self.range(ItemKind::LogicalMinimum, ItemKind::LogicalMaximum, min, max)
    }

    pub fn physical_range(self, min: i64, max: i64) -> Self {
        self.range(ItemKind::PhysicalMinimum, ItemKind::PhysicalMaximum, min, max)
    }

    pub fn usage_range(self, min: i64, max: i64) -> Self {
        self.range(ItemKind::UsageMinimum, ItemKind::UsageMaximum, min, max)
    }

    pub fn designator_range(self, min: i64, max: i64) -> Self {
        self.range(ItemKind::DesignatorMinimum, ItemKind::DesignatorMaximum, min, max)
    }

    pub fn string_range(self, min: i64, max: i64) -> Self {
        self.range(ItemKind::StringMinimum, ItemKind::StringMaximum, min, max)
    }

    /// Report Size then Report Count.
    pub fn report_format(self, size: u32, count: u32) -> Self {
        self.item(ItemKind::ReportSize, size as i64)
            .item(ItemKind::ReportCount, count as i64)
    }

    pub fn report_id(self, id: u8) -> Self {
        self.item(ItemKind::ReportId, id as i64)
    }

    pub fn input(self, flags: u32) -> Self {
        self.item(ItemKind::Input, flags as i64)
    }

    pub fn output(self, flags: u32) -> Self {
        self.item(ItemKind::Output, flags as i64)
    }

    pub fn feature(self, flags: u32) -> Self {
        self.item(ItemKind::Feature, flags as i64)
    }

    pub fn push(self) -> Self {
        self.item(ItemKind::Push, 0)
    }

    pub fn pop(self) -> Self {
        self.item(ItemKind::Pop, 0)
    }

    /// Nested collection whose contents are produced by `body`.
    pub fn collection(mut self, kind: CollectionKind, body: impl FnOnce(ReportBuilder) -> ReportBuilder) -> Self {
        let inner = body(ReportBuilder::new());
        self.errors.extend(reserved_kind(kind));
        self.errors.extend(inner.errors);
        self.elements
            .push(ReportElement::Collection(Collection::new(kind, inner.elements)));
        self
    }

    pub fn element(mut self, element: ReportElement) -> Self {
        let error = match &element {
            ReportElement::Item(item) => unpaired(item.kind()),
            ReportElement::Collection(c) => reserved_kind(c.kind()),
        };
        match error {
            Some(e) => self.errors.push(e),
            None => self.elements.push(element),
        }
        self
    }

    pub fn build(self) -> Result<ReportDescriptor, DescriptorError> {
        DescriptorError::collect(self.errors)?;
        Ok(ReportDescriptor { elements: self.elements.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(kind: ItemKind, v: i64) -> Vec<u8> {
        ReportItem::new(kind, v).expect("item").encode()
    }

    #[test]
    fn minimal_widths() {
        assert_eq!(enc(ItemKind::Usage, 1), vec![0x09, 0x01]);
        assert_eq!(enc(ItemKind::Usage, 0), vec![0x09, 0x00]);
        assert_eq!(enc(ItemKind::LogicalMinimum, -1), vec![0x15, 0xFF]);
        assert_eq!(enc(ItemKind::LogicalMaximum, 255), vec![0x26, 0xFF, 0x00]);
        assert_eq!(enc(ItemKind::LogicalMaximum, 127), vec![0x25, 0x7F]);
        assert_eq!(enc(ItemKind::LogicalMinimum, -32768), vec![0x16, 0x00, 0x80]);
        assert_eq!(enc(ItemKind::LogicalMaximum, 32768), vec![0x27, 0x00, 0x80, 0x00, 0x00]);
        assert_eq!(enc(ItemKind::UsagePage, 0xFF00), vec![0x06, 0x00, 0xFF]);
        assert_eq!(enc(ItemKind::Unit, 0x10001), vec![0x67, 0x01, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn bare_items_have_no_data() {
        assert_eq!(enc(ItemKind::Push, 0), vec![0xA4]);
        assert_eq!(enc(ItemKind::Pop, 0), vec![0xB4]);
        assert!(ReportItem::new(ItemKind::Pop, 1).is_err());
    }

    #[test]
    fn main_item_masks() {
        assert!(ReportItem::new(ItemKind::Input, 0x80).is_err());
        assert!(ReportItem::new(ItemKind::Output, 0x80).is_ok());
        assert_eq!(enc(ItemKind::Input, 0x102), vec![0x82, 0x02, 0x01]);
        assert!(ReportItem::new(ItemKind::Feature, 0x200).is_err());
    }

    #[test]
    fn out_of_range_values() {
        assert!(ReportItem::new(ItemKind::Usage, -1).unwrap_err().is_overflow());
        assert!(ReportItem::new(ItemKind::LogicalMinimum, i64::from(i32::MIN) - 1).is_err());
    }

    #[test]
    fn collections_nest_lifo() {
        let report = ReportDescriptor::builder()
            .collection(CollectionKind::Application, |b| {
                b.usage(1).collection(CollectionKind::Physical, |b| b.usage(2))
            })
            .build()
            .expect("report");
        assert_eq!(
            report.encode(),
            vec![0xA1, 0x01, 0x09, 0x01, 0xA1, 0x00, 0x09, 0x02, 0xC0, 0xC0]
        );
        assert_eq!(report.len(), 10);
        assert_eq!(report.items().size(), 6);
    }

    #[test]
    fn errors_are_collected_across_the_tree() {
        let err = ReportDescriptor::builder()
            .logical_range(10, 1)
            .collection(CollectionKind::Application, |b| b.input(0x80).usage_range(3, 3))
            .build()
            .unwrap_err();
        assert_eq!(err.leaves().len(), 3);
    }

    #[test]
    fn names() {
        assert_eq!(ItemKind::from_name("LogicalMin"), Some(ItemKind::LogicalMinimum));
        assert_eq!(ItemKind::from_name("UsageMaximum"), Some(ItemKind::UsageMaximum));
        assert_eq!(ItemKind::from_name("ReportID"), Some(ItemKind::ReportId));
        assert_eq!(ItemKind::from_name("Bogus"), None);
        assert_eq!(CollectionKind::from_code(0x10), None);
        assert_eq!(CollectionKind::from_code(0xFF), Some(CollectionKind::Vendor(0xFF)));
    }
}
