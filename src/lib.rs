//! # usbdsl: USB descriptor composition and validation
//!
//! Compiles a declarative description of a USB device into byte-exact USB 2.0
//! and HID 1.11 descriptor buffers. Derived fields (`wTotalLength`,
//! `bNumInterfaces`, `bNumEndpoints`, `bFirstInterface`, `bInterfaceCount`) are
//! computed from the descriptor tree, and structural rules are checked before a
//! single byte is produced.
//!
//! ## Layers
//!
//! - [`seq`]: immutable ordered sequences
//! - [`field`]: typed field records (`FieldTag` + value)
//! - [`descriptor`]: one `[bLength][bDescriptorType][fields…]` descriptor
//! - [`composite`]: descriptor trees and their flattened leaf view
//! - [`profile`]: configuration, interface and interface-association builders
//! - [`validate`]: slot, uniqueness, ordering and mask checks
//! - [`hid`]: HID report descriptor items and collections
//! - [`standard`], [`class`], [`string`], [`winusb`]: concrete descriptors
//! - [`parser`], [`compile`]: the `.usbd` description language
//!
//! ## Example `.usbd`
//!
//! ```text
//! device {
//!   bcdUSB 0x0200; bDeviceClass 0xEF; bDeviceSubClass 2; bDeviceProtocol 1;
//!   bMaxPacketSize0 64; idVendor 0x0483; idProduct 0x5740; bcdDevice 0x0200;
//!   iManufacturer 1; iProduct 2; iSerialNumber 3; bNumConfigurations 1;
//! }
//!
//! configuration {
//!   bConfigurationValue 1; iConfiguration 0; bmAttributes self_powered; bMaxPower 50;
//!   interface {
//!     bInterfaceNumber 0; bAlternateSetting 0;
//!     bInterfaceClass 0xFF; bInterfaceSubClass 0; bInterfaceProtocol 0; iInterface 0;
//!     endpoint { bEndpointAddress 1 in; bmAttributes bulk; wMaxPacketSize 64; bInterval 0; }
//!   }
//! }
//! ```
//!
//! See `tests/integration.rs` and `tests/dsl.rs` for complete device profiles.

pub mod ast;
pub mod class;
pub mod compile;
pub mod composite;
pub mod descriptor;
pub mod dump;
pub mod error;
pub mod field;
pub mod hid;
pub mod parser;
pub mod profile;
pub mod seq;
pub mod set;
pub mod standard;
pub mod string;
pub mod validate;
pub mod winusb;

pub use compile::{compile, compile_str, Options};
pub use composite::{CompositeNode, Node};
pub use descriptor::{DescriptorNode, Schema};
pub use error::DescriptorError;
pub use field::{FieldRecord, FieldTag};
pub use hid::{ReportBuilder, ReportDescriptor};
pub use parser::parse;
pub use profile::{Configuration, Interface, InterfaceAssociation};
pub use seq::Seq;
pub use set::DescriptorSet;
pub use validate::{Constraint, ConstraintSet};
