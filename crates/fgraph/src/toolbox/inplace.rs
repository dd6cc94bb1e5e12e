use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::graph::FunctionGraph;

use super::Feature;

/// Rejects graphs where a designated output is computed by overwriting
/// another value in place.
///
/// Outputs `first_output_idx..last_output_idx` are checked; `None` means up
/// to the last output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoOutputFromInplace {
    pub first_output_idx: usize,
    pub last_output_idx: Option<usize>,
}

impl NoOutputFromInplace {
    pub fn new(first_output_idx: usize, last_output_idx: Option<usize>) -> Self {
        Self {
            first_output_idx,
            last_output_idx,
        }
    }
}

impl Feature for NoOutputFromInplace {
    fn name(&self) -> &'static str {
        "NoOutputFromInplace"
    }

    fn validate(&self, graph: &FunctionGraph) -> GraphResult<()> {
        let outputs = graph.outputs();
        let end = self
            .last_output_idx
            .unwrap_or(outputs.len())
            .min(outputs.len());
        let start = self.first_output_idx.min(end);

        for output in &outputs[start..end] {
            let Some((node, index)) = graph.value(*output).and_then(|var| var.owner) else {
                continue;
            };
            let Some(apply) = graph.node(node) else {
                continue;
            };
            if apply.op.is_inplace(index) {
                return Err(GraphError::Inconsistency(format!(
                    "output {output} must not be computed in place, but `{}` overwrites its input",
                    apply.op
                )));
            }
        }
        Ok(())
    }
}
