//! HID report descriptor encoding: item widths, collections, and full report layouts.

use usbdsl::dump::describe_report;
use usbdsl::hid::{Collection, CollectionKind, ItemKind, ReportElement, ReportItem};
use usbdsl::{compile_str, Constraint, DescriptorError, Options, ReportDescriptor};

fn item(kind: ItemKind, value: i64) -> Vec<u8> {
    ReportItem::new(kind, value).expect("item").encode()
}

/// Boot keyboard report from HID 1.11 appendix B.1.
const BOOT_KEYBOARD: [u8; 63] = [
    0x05, 0x01, 0x09, 0x06, 0xA1, 0x01, 0x05, 0x07, 0x19, 0xE0, 0x29, 0xE7, 0x15, 0x00, 0x25, 0x01,
    0x75, 0x01, 0x95, 0x08, 0x81, 0x02, 0x95, 0x01, 0x75, 0x08, 0x81, 0x01, 0x95, 0x05, 0x75, 0x01,
    0x05, 0x08, 0x19, 0x01, 0x29, 0x05, 0x91, 0x02, 0x95, 0x01, 0x75, 0x03, 0x91, 0x01, 0x95, 0x06,
    0x75, 0x08, 0x15, 0x00, 0x25, 0x65, 0x05, 0x07, 0x19, 0x00, 0x29, 0x65, 0x81, 0x00, 0xC0,
];

fn boot_keyboard() -> ReportDescriptor {
    ReportDescriptor::builder()
        .usage_page(0x01)
        .usage(0x06)
        .collection(CollectionKind::Application, |b| {
            b.usage_page(0x07)
                .usage_range(0xE0, 0xE7)
                .logical_range(0, 1)
                .item(ItemKind::ReportSize, 1)
                .item(ItemKind::ReportCount, 8)
                .input(0x02)
                .item(ItemKind::ReportCount, 1)
                .item(ItemKind::ReportSize, 8)
                .input(0x01)
                .item(ItemKind::ReportCount, 5)
                .item(ItemKind::ReportSize, 1)
                .usage_page(0x08)
                .usage_range(1, 5)
                .output(0x02)
                .item(ItemKind::ReportCount, 1)
                .item(ItemKind::ReportSize, 3)
                .output(0x01)
                .item(ItemKind::ReportCount, 6)
                .item(ItemKind::ReportSize, 8)
                .logical_range(0, 0x65)
                .usage_page(0x07)
                .usage_range(0, 0x65)
                .input(0x00)
        })
        .build()
        .expect("keyboard")
}

// ==================== Items ====================

#[test]
fn short_items_use_minimal_width() {
    assert_eq!(item(ItemKind::Usage, 1), vec![0x09, 0x01]);
    assert_eq!(item(ItemKind::LogicalMinimum, -1), vec![0x15, 0xFF]);
    assert_eq!(item(ItemKind::LogicalMaximum, 255), vec![0x26, 0xFF, 0x00]);
    assert_eq!(item(ItemKind::LogicalMinimum, -127), vec![0x15, 0x81]);
    assert_eq!(item(ItemKind::PhysicalMaximum, 32767), vec![0x46, 0xFF, 0x7F]);
    assert_eq!(item(ItemKind::UnitExponent, -2), vec![0x55, 0xFE]);
    assert_eq!(item(ItemKind::UsageMaximum, 0x1_0000), vec![0x2B, 0x00, 0x00, 0x01, 0x00]);
    assert_eq!(item(ItemKind::ReportId, 3), vec![0x85, 0x03]);
}

#[test]
fn item_value_checks() {
    assert!(matches!(
        ReportItem::new(ItemKind::Input, 0x80),
        Err(DescriptorError::ConstraintViolation { .. })
    ));
    assert!(ReportItem::new(ItemKind::ReportCount, -1).unwrap_err().is_overflow());
    assert!(ReportItem::new(ItemKind::Push, 5).is_err());
}

#[test]
fn collection_codes_and_delimiters() {
    assert_eq!(item(ItemKind::Collection, 0x01), vec![0xA1, 0x01]);
    assert_eq!(item(ItemKind::Collection, 0x80), vec![0xA1, 0x80]);
    for code in [0x07, 0x10, 0x7F, 0x100] {
        let err = ReportItem::new(ItemKind::Collection, code).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::ConstraintViolation { constraint: Constraint::ReservedCollectionKind { .. }, .. }
        ));
    }
    assert_eq!(item(ItemKind::Delimiter, 1), vec![0xA9, 0x01]);
    assert_eq!(item(ItemKind::Delimiter, 0), vec![0xA9, 0x00]);
    let err = ReportItem::new(ItemKind::Delimiter, 7).unwrap_err();
    assert!(err.to_string().contains("Delimiter must be 0 (close) or 1 (open), got 7"));
}

#[test]
fn collection_items_only_come_in_pairs() {
    let err = ReportDescriptor::builder()
        .item(ItemKind::Collection, 1)
        .usage(1)
        .item(ItemKind::EndCollection, 0)
        .build()
        .unwrap_err();
    let leaves = err.leaves();
    assert_eq!(leaves.len(), 2);
    assert!(leaves.iter().all(|e| matches!(
        e,
        DescriptorError::ConstraintViolation { constraint: Constraint::UnpairedCollection { .. }, .. }
    )));

    let close = ReportItem::bare(ItemKind::EndCollection).expect("close");
    let err = ReportDescriptor::builder().element(ReportElement::Item(close)).build().unwrap_err();
    assert!(err.is_constraint_violation());

    let err = ReportDescriptor::builder()
        .collection(CollectionKind::Vendor(0x10), |b| b.usage(1))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("collection kind 0x10 is reserved"));
    let err = ReportDescriptor::builder()
        .element(ReportElement::Collection(Collection::new(CollectionKind::Vendor(0x7F), Vec::<ReportElement>::new())))
        .build()
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

// ==================== Reports ====================

#[test]
fn boot_keyboard_layout() {
    let kbd = boot_keyboard();
    assert_eq!(kbd.len(), 63);
    assert_eq!(kbd.encode(), BOOT_KEYBOARD.to_vec());
}

#[test]
fn nested_collections_close_in_reverse_order() {
    let mouse = ReportDescriptor::builder()
        .usage_page(0x01)
        .usage(0x02)
        .collection(CollectionKind::Application, |b| {
            b.usage(0x01).collection(CollectionKind::Physical, |b| {
                b.usage_page(0x09)
                    .usage_range(1, 3)
                    .logical_range(0, 1)
                    .item(ItemKind::ReportCount, 3)
                    .item(ItemKind::ReportSize, 1)
                    .input(0x02)
                    .usage_page(0x01)
                    .usage(0x30)
                    .usage(0x31)
                    .logical_range(-127, 127)
                    .report_format(8, 2)
                    .input(0x06)
            })
        })
        .build()
        .expect("mouse");
    let bytes = mouse.encode();
    assert_eq!(&bytes[bytes.len() - 2..], &[0xC0, 0xC0]);
    assert_eq!(&bytes[4..8], &[0xA1, 0x01, 0x09, 0x01]);
    assert_eq!(&bytes[8..10], &[0xA1, 0x00]);

    let kinds: Vec<ItemKind> = mouse.items().iter().map(|i| i.kind()).collect();
    let opens = kinds.iter().filter(|k| **k == ItemKind::Collection).count();
    let closes = kinds.iter().filter(|k| **k == ItemKind::EndCollection).count();
    assert_eq!((opens, closes), (2, 2));
}

#[test]
fn push_pop_are_single_bytes() {
    let r = ReportDescriptor::builder()
        .usage_page(0xFF00)
        .push()
        .report_id(2)
        .pop()
        .build()
        .expect("report");
    assert_eq!(r.encode(), vec![0x06, 0x00, 0xFF, 0xA4, 0x85, 0x02, 0xB4]);
}

#[test]
fn inverted_ranges_rejected() {
    let err = ReportDescriptor::builder().logical_range(1, 1).build().unwrap_err();
    assert!(matches!(err, DescriptorError::ConstraintViolation { .. }));
}

#[test]
fn vendor_collection_code() {
    let r = ReportDescriptor::builder()
        .collection(CollectionKind::Vendor(0x80), |b| b.usage(1))
        .build()
        .expect("report");
    assert_eq!(r.encode(), vec![0xA1, 0x80, 0x09, 0x01, 0xC0]);
}

// ==================== Reports from .usbd ====================

const DEVICE: &str = r#"
device {
  bcdUSB 0x0200; bDeviceClass 0; bDeviceSubClass 0; bDeviceProtocol 0;
  bMaxPacketSize0 8; idVendor 0x1209; idProduct 0x0002; bcdDevice 0x0100;
  iManufacturer 0; iProduct 0; iSerialNumber 0; bNumConfigurations 0;
}
"#;

#[test]
fn keyboard_from_description() {
    let src = format!(
        "{}{}",
        DEVICE,
        r#"
report keyboard {
  UsagePage 0x01; Usage 0x06;
  collection application {
    UsagePage 0x07; UsageMinMax 0xE0 0xE7; LogicalMinMax 0 1;
    ReportSize 1; ReportCount 8; Input 0x02;
    ReportCount 1; ReportSize 8; Input 0x01;
    ReportCount 5; ReportSize 1; UsagePage 0x08; UsageMinMax 1 5; Output 0x02;
    ReportCount 1; ReportSize 3; Output 0x01;
    ReportCount 6; ReportSize 8; LogicalMinMax 0 0x65; UsagePage 0x07; UsageMinMax 0 0x65; Input 0x00;
  }
}
"#
    );
    let set = compile_str(&src, &Options::default()).expect("compile");
    assert_eq!(set.report_bytes("keyboard"), Some(BOOT_KEYBOARD.to_vec()));
    assert_eq!(set.report("keyboard"), Some(&boot_keyboard()));
}

#[test]
fn report_errors_are_located() {
    let src = format!("{}report bad {{ Input 0x80; UsageMinMax 5 1; Bogus 1; }}", DEVICE);
    let err = compile_str(&src, &Options::default()).unwrap_err();
    let leaves = err.leaves();
    assert_eq!(leaves.len(), 3);
    assert!(leaves.iter().any(|e| e.to_string().contains("unknown report item `Bogus`")));
}

#[test]
fn report_listing() {
    let text = describe_report(&boot_keyboard());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 32);
    assert!(lines[0].ends_with("UsagePage(1)"));
    assert!(lines[2].starts_with("A1 01"));
    assert!(lines.last().map(|l| l.starts_with("C0")).unwrap_or(false));
}
