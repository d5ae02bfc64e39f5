//! Descriptor trees.
//!
//! A [`CompositeNode`] has no header of its own: its encoding is the plain
//! concatenation of its children, in declaration order.

use crate::descriptor::{DescriptorNode, Schema};
use crate::seq::Seq;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Descriptor(DescriptorNode),
    Composite(CompositeNode),
}

impl Node {
    pub fn len(&self) -> usize {
        match self {
            Node::Descriptor(d) => d.len(),
            Node::Composite(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth-first leaf view of this node.
    pub fn flatten(&self) -> Seq<DescriptorNode> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out.into()
    }

    fn flatten_into(&self, out: &mut Vec<DescriptorNode>) {
        match self {
            Node::Descriptor(d) => out.push(d.clone()),
            Node::Composite(c) => c.children.foreach(|child| child.flatten_into(out)),
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Node::Descriptor(d) => d.write_to(out),
            Node::Composite(c) => c.write_to(out),
        }
    }
}

impl From<DescriptorNode> for Node {
    fn from(d: DescriptorNode) -> Self {
        Node::Descriptor(d)
    }
}

impl From<CompositeNode> for Node {
    fn from(c: CompositeNode) -> Self {
        Node::Composite(c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompositeNode {
    children: Seq<Node>,
}

impl CompositeNode {
    pub fn new(children: impl Into<Seq<Node>>) -> Self {
        CompositeNode { children: children.into() }
    }

    pub fn children(&self) -> &Seq<Node> {
        &self.children
    }

    /// A new composite with `child` appended.
    pub fn with(&self, child: impl Into<Node>) -> Self {
        CompositeNode { children: self.children.push_back(child.into()) }
    }

    /// Every descendant descriptor, depth-first, in declaration order.
    pub fn flatten(&self) -> Seq<DescriptorNode> {
        self.children
            .fold(Vec::new(), |mut acc, child| {
                child.flatten_into(&mut acc);
                acc
            })
            .into()
    }

    pub fn len(&self) -> usize {
        self.children.fold(0, |acc, child| acc + child.len())
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn count_schema(&self, schema: Schema) -> usize {
        self.flatten().count(|d| d.schema() == schema)
    }

    pub fn interfaces_count(&self) -> usize {
        self.count_schema(Schema::Interface)
    }

    pub fn endpoints_count(&self) -> usize {
        self.count_schema(Schema::Endpoint)
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.children.foreach(|child| child.write_to(out));
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.write_to(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(address: u32) -> DescriptorNode {
        DescriptorNode::from_values(Schema::Endpoint, &[address, 0x02, 64, 0]).expect("endpoint")
    }

    fn interface(number: u32) -> DescriptorNode {
        DescriptorNode::from_values(Schema::Interface, &[number, 0, 0, 0xFF, 0, 0, 0]).expect("interface")
    }

    #[test]
    fn encoding_is_plain_concatenation() {
        let a = endpoint(0x01);
        let b = endpoint(0x81);
        let c = CompositeNode::new(vec![Node::from(a.clone()), Node::from(b.clone())]);
        let mut expect = a.encode();
        expect.extend(b.encode());
        assert_eq!(c.encode(), expect);
        assert_eq!(c.len(), 14);

        let swapped = CompositeNode::new(vec![Node::from(b), Node::from(a)]);
        assert_ne!(swapped.encode(), c.encode());
    }

    #[test]
    fn counts_hold_at_any_depth() {
        let inner = CompositeNode::default().with(interface(0)).with(endpoint(0x81));
        let middle = CompositeNode::default().with(inner.clone()).with(endpoint(0x02));
        let outer = CompositeNode::default()
            .with(middle)
            .with(CompositeNode::default().with(interface(1)).with(endpoint(0x83)));
        assert_eq!(outer.interfaces_count(), 2);
        assert_eq!(outer.endpoints_count(), 3);
        assert_eq!(outer.flatten().size(), 5);
        assert_eq!(inner.endpoints_count(), 1);
    }

    #[test]
    fn flatten_preserves_order() {
        let tree = CompositeNode::default()
            .with(CompositeNode::default().with(endpoint(0x01)).with(endpoint(0x02)))
            .with(endpoint(0x03));
        let addrs: Vec<u32> = tree
            .flatten()
            .iter()
            .filter_map(|d| d.value(crate::field::FieldTag::EndpointAddress))
            .collect();
        assert_eq!(addrs, vec![1, 2, 3]);
    }
}
