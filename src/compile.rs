//! Lower a parsed `.usbd` document onto the descriptor builders.
//!
//! Compilation never stops at the first problem: every block is compiled and
//! all diagnostics are returned together.

use crate::ast::{Document, Literal, Statement};
use crate::composite::{CompositeNode, Node};
use crate::descriptor::{DescriptorNode, Schema};
use crate::error::DescriptorError;
use crate::field::{
    ConfigAttributes, Direction, EndpointAddress, EndpointAttributes, FieldRecord, FieldTag, SyncType,
    TransferType, UsageType,
};
use crate::hid::{CollectionKind, ItemKind, ReportBuilder, ReportDescriptor};
use crate::parser;
use crate::profile::{Configuration, Interface, InterfaceAssociation};
use crate::seq::Seq;
use crate::set::DescriptorSet;
use crate::string::{StringTable, LANGID_EN_US};
use crate::validate::{self, Constraint, ConstraintSet};
use crate::winusb::{CompatibleIdDescriptor, CompatibleIdFunction};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub constraints: ConstraintSet,
    /// Reject a `bNumConfigurations` that disagrees with the declared
    /// configurations instead of logging a warning.
    pub strict_configuration_count: bool,
}

impl Options {
    pub fn lenient() -> Self {
        Options { constraints: ConstraintSet::lenient(), strict_configuration_count: false }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options { constraints: ConstraintSet::strict(), strict_configuration_count: false }
    }
}

/// Parse and compile in one step.
pub fn compile_str(source: &str, options: &Options) -> Result<DescriptorSet, DescriptorError> {
    let doc = parser::parse(source).map_err(DescriptorError::Syntax)?;
    compile(&doc, options)
}

pub fn compile(doc: &Document, options: &Options) -> Result<DescriptorSet, DescriptorError> {
    let mut c = Compiler { options, reports: Vec::new(), errors: Vec::new() };
    c.document(doc)
}

struct Compiler<'a> {
    options: &'a Options,
    reports: Vec<(String, ReportDescriptor)>,
    errors: Vec<DescriptorError>,
}

fn syntax(line: usize, msg: impl std::fmt::Display) -> DescriptorError {
    DescriptorError::Syntax(format!("line {}: {}", line, msg))
}

/// Prefix the node label of every error with its source line.
fn located(err: DescriptorError, line: usize) -> DescriptorError {
    match err {
        DescriptorError::StructuralTypeMismatch { node, slot, expected, found } => {
            DescriptorError::StructuralTypeMismatch { node: format!("line {}: {}", line, node), slot, expected, found }
        }
        DescriptorError::SurplusValues { node, expected, found } => {
            DescriptorError::SurplusValues { node: format!("line {}: {}", line, node), expected, found }
        }
        DescriptorError::ConstraintViolation { node, constraint } => {
            DescriptorError::ConstraintViolation { node: format!("line {}: {}", line, node), constraint }
        }
        DescriptorError::EncodingOverflow { node, detail } => {
            DescriptorError::EncodingOverflow { node: format!("line {}: {}", line, node), detail }
        }
        DescriptorError::Multiple(inner) => {
            DescriptorError::Multiple(inner.into_iter().map(|e| located(e, line)).collect())
        }
        other => other,
    }
}

/// Slots the author writes: everything except derived and fixed fields.
fn author_slots(schema: Schema) -> Vec<FieldTag> {
    schema
        .slots()
        .iter()
        .copied()
        .filter(|t| !schema.derived().contains(t) && !schema.fixed().iter().any(|(f, _)| f == t))
        .collect()
}

fn value_of(records: &[FieldRecord], tag: FieldTag) -> u32 {
    records.iter().find(|r| r.tag() == tag).map(|r| r.value()).unwrap_or(0)
}

impl<'a> Compiler<'a> {
    fn document(&mut self, doc: &Document) -> Result<DescriptorSet, DescriptorError> {
        // Reports first: HID class descriptors refer to them by name.
        for stmt in doc.statements.iter().filter(|s| s.keyword == "report") {
            self.report(stmt);
        }

        let mut device = None;
        let mut device_stmt: Option<&Statement> = None;
        let mut qualifier = None;
        let mut configurations = Vec::new();
        let mut strings: Option<StringTable> = None;
        let mut winusb = None;

        let mut seen: Vec<&str> = Vec::new();

        for stmt in &doc.statements {
            let keyword = stmt.keyword.as_str();
            if matches!(keyword, "device" | "qualifier" | "strings" | "winusb") {
                if seen.contains(&keyword) {
                    self.errors.push(syntax(stmt.line, format!("more than one {} block", keyword)));
                    continue;
                }
                seen.push(keyword);
            }
            match keyword {
                "report" => {}
                "device" => {
                    device_stmt = Some(stmt);
                    device = self.leaf(Schema::Device, stmt);
                }
                "qualifier" => qualifier = Some(stmt),
                "configuration" => {
                    if let Some(cfg) = self.configuration(stmt) {
                        configurations.push(cfg);
                    }
                }
                "strings" => strings = self.strings(stmt),
                "winusb" => winusb = self.winusb(stmt),
                other => self.errors.push(syntax(stmt.line, format!("unknown top-level block `{}`", other))),
            }
        }

        let qualifier = match (qualifier, &device) {
            (Some(stmt), _) if stmt.is_block() => self.leaf(Schema::DeviceQualifier, stmt),
            (Some(stmt), Some(dev)) => self.derived_qualifier(dev, stmt.line),
            _ => None,
        };

        let mut table = strings.unwrap_or_default();
        if let Some((_, Some(code))) = &winusb {
            table = table.with_ms_os(*code);
        }
        let strings = match table.build() {
            Ok(s) => Some(s),
            Err(e) => {
                self.errors.push(e);
                None
            }
        };

        if device_stmt.is_none() {
            self.errors.push(DescriptorError::Syntax("no device block".to_string()));
        }
        DescriptorError::collect(std::mem::take(&mut self.errors))?;
        let device = device.ok_or_else(|| DescriptorError::Syntax("no device block".to_string()))?;

        let mut set = DescriptorSet::new(device);
        if let Some(q) = qualifier {
            set = set.with_qualifier(q);
        }
        for cfg in configurations {
            set = set.with_configuration(cfg);
        }
        if let Some(s) = strings {
            set = set.with_strings(s);
        }
        for (name, report) in std::mem::take(&mut self.reports) {
            set = set.with_report(name, report);
        }
        if let Some((w, _)) = winusb {
            set = set.with_winusb(&w)?;
        }
        set.check(self.options.strict_configuration_count)?;
        debug!("compiled {} buffers", set.buffers().len());
        Ok(set)
    }

    fn derived_qualifier(&mut self, device: &DescriptorNode, line: usize) -> Option<DescriptorNode> {
        let values: Vec<u32> = Schema::DeviceQualifier
            .slots()
            .iter()
            .map(|t| if *t == FieldTag::Reserved { 0 } else { device.value(*t).unwrap_or(0) })
            .collect();
        match DescriptorNode::from_values(Schema::DeviceQualifier, &values) {
            Ok(q) => Some(q),
            Err(e) => {
                self.errors.push(located(e, line));
                None
            }
        }
    }

    /// Split a block into field statements and nested blocks, evaluate the
    /// fields and check them against `expected`.
    fn fields<'s>(
        &mut self,
        label: &str,
        stmt: &'s Statement,
        expected: &[FieldTag],
        nested: &[&str],
    ) -> (Vec<FieldRecord>, Vec<&'s Statement>) {
        let mut records = Vec::new();
        let mut children = Vec::new();
        let mut ok = true;
        for s in stmt.children() {
            if nested.contains(&s.keyword.as_str()) {
                children.push(s);
                continue;
            }
            if s.is_block() {
                self.errors.push(syntax(s.line, format!("`{}` cannot appear in {}", s.keyword, label)));
                ok = false;
                continue;
            }
            let Some(tag) = FieldTag::from_name(&s.keyword, expected) else {
                self.errors.push(syntax(s.line, format!("unknown field `{}` in {}", s.keyword, label)));
                ok = false;
                continue;
            };
            match self.field_value(tag, s).and_then(|v| FieldRecord::new(tag, v)) {
                Ok(r) => records.push(r),
                Err(e) => {
                    self.errors.push(located(e, s.line));
                    ok = false;
                }
            }
        }
        if ok {
            let seq: Seq<FieldRecord> = records.clone().into();
            for e in validate::check_slots(label, expected, &seq) {
                self.errors.push(located(e, stmt.line));
            }
        }
        (records, children)
    }

    fn int_arg(&self, stmt: &Statement, index: usize) -> Result<i64, DescriptorError> {
        stmt.args
            .get(index)
            .and_then(Literal::as_int)
            .ok_or_else(|| syntax(stmt.line, format!("`{}` expects a number", stmt.keyword)))
    }

    fn u32_arg(&self, stmt: &Statement, index: usize) -> Result<u32, DescriptorError> {
        let v = self.int_arg(stmt, index)?;
        u32::try_from(v).map_err(|_| DescriptorError::overflow(stmt.keyword.clone(), format!("{} is out of range", v)))
    }

    fn field_value(&self, tag: FieldTag, stmt: &Statement) -> Result<u32, DescriptorError> {
        let idents: Vec<&str> = stmt.args.iter().filter_map(Literal::as_ident).collect();
        match tag {
            FieldTag::ConfigAttributes if !idents.is_empty() => {
                let mut attrs = ConfigAttributes::default();
                for id in idents {
                    match id {
                        "self_powered" => attrs.self_powered = true,
                        "remote_wakeup" => attrs.remote_wakeup = true,
                        "bus_powered" => {}
                        other => return Err(syntax(stmt.line, format!("unknown attribute `{}`", other))),
                    }
                }
                Ok(attrs.raw() as u32)
            }
            FieldTag::EndpointAddress if !idents.is_empty() => {
                let number = self.u32_arg(stmt, 0)?;
                let direction = match idents[0] {
                    "in" => Direction::In,
                    "out" => Direction::Out,
                    other => return Err(syntax(stmt.line, format!("unknown direction `{}`", other))),
                };
                let number = u8::try_from(number).map_err(|_| {
                    DescriptorError::constraint(FieldTag::EndpointAddress.name(), Constraint::EndpointNumber { number })
                })?;
                Ok(EndpointAddress::new(number, direction)?.raw() as u32)
            }
            FieldTag::EndpointAttributes if !idents.is_empty() => {
                let mut attrs = EndpointAttributes::new(TransferType::Control);
                for id in idents {
                    match id {
                        "control" => attrs.transfer = TransferType::Control,
                        "isochronous" => attrs.transfer = TransferType::Isochronous,
                        "bulk" => attrs.transfer = TransferType::Bulk,
                        "interrupt" => attrs.transfer = TransferType::Interrupt,
                        "async" => attrs.sync = SyncType::Asynchronous,
                        "adaptive" => attrs.sync = SyncType::Adaptive,
                        "sync" => attrs.sync = SyncType::Synchronous,
                        "feedback" => attrs.usage = UsageType::Feedback,
                        "implicit_feedback" => attrs.usage = UsageType::ImplicitFeedbackData,
                        other => return Err(syntax(stmt.line, format!("unknown endpoint attribute `{}`", other))),
                    }
                }
                Ok(attrs.raw() as u32)
            }
            FieldTag::ClassDescriptorLength if !idents.is_empty() => {
                let name = idents[0];
                match self.reports.iter().find(|(n, _)| n == name) {
                    Some((_, r)) => Ok(r.len() as u32),
                    None => Err(DescriptorError::constraint(
                        tag.name(),
                        Constraint::UnknownReport { name: name.to_string() },
                    )),
                }
            }
            FieldTag::MaxPower if idents.first() == Some(&"mA") => Ok(self.u32_arg(stmt, 0)? / 2),
            _ => {
                if !idents.is_empty() || stmt.args.len() != 1 {
                    return Err(syntax(stmt.line, format!("`{}` expects one number", stmt.keyword)));
                }
                self.u32_arg(stmt, 0)
            }
        }
    }

    /// A descriptor whose every author slot is written in the block; fixed
    /// slots are filled in.
    fn leaf(&mut self, schema: Schema, stmt: &Statement) -> Option<DescriptorNode> {
        let expected = author_slots(schema);
        let before = self.errors.len();
        let (records, _) = self.fields(schema.title(), stmt, &expected, &[]);
        if self.errors.len() != before {
            return None;
        }
        let mut authored = records.into_iter();
        let mut full = Vec::with_capacity(schema.slots().len());
        for tag in schema.slots() {
            match schema.fixed().iter().find(|(f, _)| f == tag) {
                Some((_, v)) => match FieldRecord::new(*tag, *v) {
                    Ok(r) => full.push(r),
                    Err(e) => self.errors.push(e),
                },
                None => full.extend(authored.next()),
            }
        }
        match DescriptorNode::new(schema, full) {
            Ok(node) => Some(node),
            Err(e) => {
                self.errors.push(located(e, stmt.line));
                None
            }
        }
    }

    fn configuration(&mut self, stmt: &Statement) -> Option<CompositeNode> {
        let expected = author_slots(Schema::Configuration);
        let before = self.errors.len();
        let (records, children) = self.fields("CONFIGURATION", stmt, &expected, &["interface", "association"]);

        let raw = value_of(&records, FieldTag::ConfigAttributes);
        let mut cfg = Configuration::new(value_of(&records, FieldTag::ConfigurationValue) as u8)
            .string(value_of(&records, FieldTag::IConfiguration) as u8)
            .attributes(ConfigAttributes { self_powered: raw & 0x40 != 0, remote_wakeup: raw & 0x20 != 0 })
            .max_power(value_of(&records, FieldTag::MaxPower) as u8);

        for child in children {
            let node = match child.keyword.as_str() {
                "interface" => self.interface(child).map(Node::from),
                _ => self.association(child).map(Node::from),
            };
            if let Some(n) = node {
                cfg = cfg.child(n);
            }
        }
        if self.errors.len() != before {
            return None;
        }
        match cfg.build(&self.options.constraints) {
            Ok(c) => Some(c),
            Err(e) => {
                self.errors.push(located(e, stmt.line));
                None
            }
        }
    }

    fn association(&mut self, stmt: &Statement) -> Option<CompositeNode> {
        let expected = author_slots(Schema::InterfaceAssociation);
        let before = self.errors.len();
        let (records, children) = self.fields("INTERFACE_ASSOCIATION", stmt, &expected, &["interface"]);
        let mut iad = InterfaceAssociation::new(
            value_of(&records, FieldTag::FunctionClass) as u8,
            value_of(&records, FieldTag::FunctionSubClass) as u8,
            value_of(&records, FieldTag::FunctionProtocol) as u8,
        )
        .string(value_of(&records, FieldTag::IFunction) as u8);
        for child in children {
            if let Some(n) = self.interface(child) {
                iad = iad.child(n);
            }
        }
        if self.errors.len() != before {
            return None;
        }
        match iad.build(&self.options.constraints) {
            Ok(c) => Some(c),
            Err(e) => {
                self.errors.push(located(e, stmt.line));
                None
            }
        }
    }

    fn interface(&mut self, stmt: &Statement) -> Option<CompositeNode> {
        let expected = author_slots(Schema::Interface);
        let before = self.errors.len();
        let (records, children) = self.fields(
            "INTERFACE",
            stmt,
            &expected,
            &["endpoint", "cdc_header", "cdc_acm", "cdc_union", "cdc_call_management", "hid"],
        );
        let mut iface = Interface::new(value_of(&records, FieldTag::InterfaceNumber) as u8)
            .alternate(value_of(&records, FieldTag::AlternateSetting) as u8)
            .class(
                value_of(&records, FieldTag::InterfaceClass) as u8,
                value_of(&records, FieldTag::InterfaceSubClass) as u8,
                value_of(&records, FieldTag::InterfaceProtocol) as u8,
            )
            .string(value_of(&records, FieldTag::IInterface) as u8);
        for child in children {
            let schema = match child.keyword.as_str() {
                "endpoint" => Schema::Endpoint,
                "cdc_header" => Schema::CdcHeader,
                "cdc_acm" => Schema::CdcAcm,
                "cdc_union" => Schema::CdcUnion,
                "cdc_call_management" => Schema::CdcCallManagement,
                _ => Schema::Hid,
            };
            if let Some(node) = self.leaf(schema, child) {
                iface = iface.child(node);
            }
        }
        if self.errors.len() != before {
            return None;
        }
        match iface.build() {
            Ok(c) => Some(c),
            Err(e) => {
                self.errors.push(located(e, stmt.line));
                None
            }
        }
    }

    fn strings(&mut self, stmt: &Statement) -> Option<StringTable> {
        let mut languages = Vec::new();
        for arg in &stmt.args {
            match arg.as_int().and_then(|v| u16::try_from(v).ok()) {
                Some(id) => languages.push(id),
                None => self.errors.push(syntax(stmt.line, format!("invalid language ID {}", arg))),
            }
        }
        if languages.is_empty() {
            languages.push(LANGID_EN_US);
        }
        let mut table = StringTable::new(&languages);
        for s in stmt.children() {
            let index = s.args.first().and_then(Literal::as_int).and_then(|v| u8::try_from(v).ok());
            let text = s.args.get(1).and_then(Literal::as_str);
            match (s.keyword.as_str(), index, text) {
                ("string", Some(index), Some(text)) => table = table.with(index, text),
                _ => self.errors.push(syntax(s.line, "expected `string <index> \"text\";`")),
            }
        }
        Some(table)
    }

    /// The WinUSB descriptor and the vendor code for the MS OS string, if any.
    fn winusb(&mut self, stmt: &Statement) -> Option<(CompatibleIdDescriptor, Option<u8>)> {
        let mut descriptor = CompatibleIdDescriptor::default();
        let mut vendor_code = None;
        let before = self.errors.len();
        for s in stmt.children() {
            match s.keyword.as_str() {
                "vendor_code" => match s.args.first().and_then(Literal::as_int).and_then(|v| u8::try_from(v).ok()) {
                    Some(v) => vendor_code = Some(v),
                    None => self.errors.push(syntax(s.line, "`vendor_code` expects a byte")),
                },
                "function" => {
                    let first = s.args.first().and_then(Literal::as_int).and_then(|v| u8::try_from(v).ok());
                    let id = s.args.get(1).and_then(Literal::as_str).unwrap_or("WINUSB");
                    let sub = s.args.get(2).and_then(Literal::as_str).unwrap_or("");
                    match first {
                        Some(first) => match CompatibleIdFunction::new(first, id, sub) {
                            Ok(f) => descriptor = descriptor.with(f),
                            Err(e) => self.errors.push(located(e, s.line)),
                        },
                        None => self.errors.push(syntax(s.line, "`function` expects an interface number")),
                    }
                }
                other => self.errors.push(syntax(s.line, format!("unknown winusb statement `{}`", other))),
            }
        }
        if descriptor.is_empty() {
            self.errors.push(syntax(stmt.line, "winusb block declares no function"));
        }
        if self.errors.len() != before {
            return None;
        }
        Some((descriptor, vendor_code))
    }

    fn report(&mut self, stmt: &Statement) {
        let Some(name) = stmt.args.first().and_then(Literal::as_ident) else {
            self.errors.push(syntax(stmt.line, "`report` expects a name"));
            return;
        };
        if self.reports.iter().any(|(n, _)| n == name) {
            self.errors.push(located(
                DescriptorError::constraint(
                    format!("REPORT {}", name),
                    Constraint::DuplicateReport { name: name.to_string() },
                ),
                stmt.line,
            ));
            return;
        }
        let builder = self.report_body(ReportBuilder::new(), stmt.children());
        match builder.build() {
            Ok(r) => {
                debug!("report {}: {} bytes", name, r.len());
                self.reports.push((name.to_string(), r));
            }
            Err(e) => self.errors.push(located(e, stmt.line)),
        }
    }

    fn report_body(&mut self, mut b: ReportBuilder, stmts: &[Statement]) -> ReportBuilder {
        for s in stmts {
            match self.report_step(s) {
                Ok(ReportStep::Item(kind, value)) => b = b.item(kind, value),
                Ok(ReportStep::Range(range, min, max)) => b = range(b, min, max),
                Ok(ReportStep::Format(size, count)) => b = b.report_format(size, count),
                Ok(ReportStep::Collection(kind, body)) => {
                    let inner = self.report_body(ReportBuilder::new(), body);
                    b = b.collection(kind, |_| inner);
                }
                Err(e) => self.errors.push(e),
            }
        }
        b
    }

    fn report_step<'s>(&self, s: &'s Statement) -> Result<ReportStep<'s>, DescriptorError> {
        let range = |f: RangeFn| -> Result<ReportStep<'s>, DescriptorError> {
            Ok(ReportStep::Range(f, self.int_arg(s, 0)?, self.int_arg(s, 1)?))
        };
        match s.keyword.as_str() {
            "collection" => {
                let kind = match s.args.first() {
                    Some(Literal::Ident(id)) => CollectionKind::from_name(id),
                    Some(lit) => lit
                        .as_int()
                        .and_then(|v| u8::try_from(v).ok())
                        .and_then(CollectionKind::from_code),
                    None => None,
                };
                match kind {
                    Some(kind) if s.is_block() => Ok(ReportStep::Collection(kind, s.children())),
                    _ => Err(syntax(s.line, "expected `collection <kind> { … }`")),
                }
            }
            "LogicalMinMax" => range(ReportBuilder::logical_range),
            "PhysicalMinMax" => range(ReportBuilder::physical_range),
            "UsageMinMax" => range(ReportBuilder::usage_range),
            "DesignatorMinMax" => range(ReportBuilder::designator_range),
            "StringMinMax" => range(ReportBuilder::string_range),
            "ReportFormat" => Ok(ReportStep::Format(self.u32_arg(s, 0)?, self.u32_arg(s, 1)?)),
            keyword => match ItemKind::from_name(keyword) {
                None | Some(ItemKind::Collection) | Some(ItemKind::EndCollection) => {
                    Err(syntax(s.line, format!("unknown report item `{}`", keyword)))
                }
                Some(kind) if !kind.carries_data() && s.args.is_empty() => Ok(ReportStep::Item(kind, 0)),
                Some(kind) => Ok(ReportStep::Item(kind, self.int_arg(s, 0)?)),
            },
        }
    }
}

type RangeFn = fn(ReportBuilder, i64, i64) -> ReportBuilder;

enum ReportStep<'s> {
    Item(ItemKind, i64),
    Range(RangeFn, i64, i64),
    Format(u32, u32),
    Collection(CollectionKind, &'s [Statement]),
}
