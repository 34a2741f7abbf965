//! fragment/write.rs
//! Serializing a loaded tree back onto a `DmlWriter`.

use std::io::Write;

use crate::framing::{DmlWriter, FramingError};
use crate::fragment::tree::FragmentTree;
use crate::fragment::types::{FragmentError, LoadState, NodeData, NodeId};
use crate::types::DmlError;

enum Step {
    Enter(NodeId),
    Close,
}

impl FragmentTree {
    /// Write the top-level nodes of the tree (the synthetic root itself is
    /// not written). The whole tree must be in memory.
    pub fn write_tree<W: Write>(&self, writer: &mut DmlWriter<W>) -> Result<(), DmlError> {
        let root = self.root();
        if self.container(root)?.load_state != LoadState::FullyLoaded {
            return Err(FragmentError::NotFullyLoaded(root).into());
        }
        for &child in self.children(root)? {
            self.write_node(writer, child)?;
        }
        Ok(())
    }

    /// Write one node and its subtree. Plain containers are walked with an
    /// explicit stack; only EC nodes open a nested writer.
    pub fn write_node<W: Write>(&self, writer: &mut DmlWriter<W>, node: NodeId) -> Result<(), DmlError> {
        let mut steps = vec![Step::Enter(node)];
        while let Some(step) = steps.pop() {
            let node = match step {
                Step::Enter(node) => node,
                Step::Close => {
                    writer.write_end_container()?;
                    continue;
                }
            };
            match &self.node(node)?.data {
                NodeData::Container(c) => {
                    if c.load_state != LoadState::FullyLoaded {
                        return Err(FragmentError::NotFullyLoaded(node).into());
                    }
                    if let Some(kind) = c.encoded {
                        writer.write_encoded(kind, |inner| {
                            for &child in &c.children {
                                self.write_node(inner, child)?;
                            }
                            Ok(())
                        })?;
                        continue;
                    }
                    writer.write_start_container(&c.name)?;
                    for attr in &c.attributes {
                        writer.write_attribute(&attr.name, &attr.value)?;
                    }
                    steps.push(Step::Close);
                    steps.extend(c.children.iter().rev().map(|&child| Step::Enter(child)));
                }
                NodeData::Primitive(p) => writer.write_primitive(&p.name, &p.value)?,
                NodeData::Comment(text) => writer.write_comment(text)?,
                NodeData::Padding(len) => {
                    let len = usize::try_from(*len)
                        .map_err(|_| FramingError::PayloadTooLarge { len: *len, max: usize::MAX as u64 })?;
                    writer.write_padding(len)?;
                }
            }
        }
        Ok(())
    }
}
