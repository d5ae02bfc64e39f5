//! Error taxonomy shared by every layer of the compiler.
//!
//! All failures are definition-time: they are raised while a description is being
//! assembled and validated, before any buffer is handed out.

use crate::field::FieldTag;
use crate::validate::Constraint;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DescriptorError {
    /// A field record sits in a slot that expects a different tag (or the slot
    /// count does not match the descriptor layout).
    #[error("{node}: slot {slot} expects {}, found {}", slot_name(.expected), slot_name(.found))]
    StructuralTypeMismatch {
        node: String,
        slot: usize,
        expected: Option<FieldTag>,
        found: Option<FieldTag>,
    },
    /// More values were supplied than the layout has slots.
    #[error("{node}: {found} values given for {expected} slots")]
    SurplusValues { node: String, expected: usize, found: usize },
    #[error("{node}: {constraint}")]
    ConstraintViolation { node: String, constraint: Constraint },
    /// A length or value does not fit the width reserved for it on the wire.
    #[error("{node}: {detail}")]
    EncodingOverflow { node: String, detail: String },
    #[error("syntax: {0}")]
    Syntax(String),
    #[error("{} errors:\n{}", .0.len(), join_lines(.0))]
    Multiple(Vec<DescriptorError>),
}

fn slot_name(tag: &Option<FieldTag>) -> &'static str {
    match tag {
        Some(t) => t.name(),
        None => "nothing",
    }
}

fn join_lines(errors: &[DescriptorError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

impl DescriptorError {
    pub fn constraint(node: impl Into<String>, constraint: Constraint) -> Self {
        DescriptorError::ConstraintViolation { node: node.into(), constraint }
    }

    pub fn overflow(node: impl Into<String>, detail: impl Into<String>) -> Self {
        DescriptorError::EncodingOverflow { node: node.into(), detail: detail.into() }
    }

    /// Turn a batch of findings into a result: `Ok` when empty, the single error
    /// when there is one, `Multiple` otherwise. Nested batches are flattened.
    pub fn collect(errors: Vec<DescriptorError>) -> Result<(), DescriptorError> {
        let mut flat = Vec::with_capacity(errors.len());
        for e in errors {
            match e {
                DescriptorError::Multiple(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Ok(()),
            1 => Err(flat.remove(0)),
            _ => Err(DescriptorError::Multiple(flat)),
        }
    }

    /// The individual errors, whether or not they were batched.
    pub fn leaves(&self) -> Vec<&DescriptorError> {
        match self {
            DescriptorError::Multiple(inner) => inner.iter().collect(),
            other => vec![other],
        }
    }

    pub fn into_leaves(self) -> Vec<DescriptorError> {
        match self {
            DescriptorError::Multiple(inner) => inner,
            other => vec![other],
        }
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(
            self,
            DescriptorError::StructuralTypeMismatch { .. } | DescriptorError::SurplusValues { .. }
        )
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DescriptorError::ConstraintViolation { .. })
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, DescriptorError::EncodingOverflow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_flattens_batches() {
        assert_eq!(DescriptorError::collect(vec![]), Ok(()));
        let one = DescriptorError::overflow("DEVICE", "too long");
        assert_eq!(DescriptorError::collect(vec![one.clone()]), Err(one.clone()));
        let nested = DescriptorError::Multiple(vec![one.clone(), DescriptorError::Syntax("x".into())]);
        let err = DescriptorError::collect(vec![nested, one.clone()]).unwrap_err();
        assert_eq!(err.leaves().len(), 3);
    }

    #[test]
    fn mismatch_message_names_slot() {
        let e = DescriptorError::StructuralTypeMismatch {
            node: "DEVICE".into(),
            slot: 0,
            expected: Some(FieldTag::BcdUsb),
            found: None,
        };
        assert_eq!(e.to_string(), "DEVICE: slot 0 expects bcdUSB, found nothing");
    }

    #[test]
    fn surplus_message_counts_values() {
        let e = DescriptorError::SurplusValues { node: "ENDPOINT".into(), expected: 4, found: 5 };
        assert_eq!(e.to_string(), "ENDPOINT: 5 values given for 4 slots");
        assert!(e.is_type_mismatch());
    }
}
