//! Execution scheduler - determines the order tasks run in

use crate::core::{PipelineSchema, ValidationError};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Sequential plan over a pipeline's tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionScheduler {
    order: Vec<u32>,
}

impl ExecutionScheduler {
    /// Order tasks so every task follows its inputs.
    ///
    /// Among tasks that are ready at the same time the lowest `task_id` goes
    /// first, so a pipeline without inputs runs in ID order.
    pub fn plan(schema: &PipelineSchema) -> Result<Self, ValidationError> {
        let mut pending_inputs: HashMap<u32, usize> = HashMap::new();
        let mut dependents: HashMap<u32, Vec<u32>> = HashMap::new();

        for task in &schema.tasks {
            pending_inputs.insert(task.task_id, task.inputs.len());
            for input in &task.inputs {
                dependents.entry(*input).or_default().push(task.task_id);
            }
        }

        let mut ready: BinaryHeap<Reverse<u32>> = pending_inputs
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| Reverse(*id))
            .collect();

        let mut order = Vec::with_capacity(schema.tasks.len());
        while let Some(Reverse(task_id)) = ready.pop() {
            order.push(task_id);
            for dependent in dependents.get(&task_id).into_iter().flatten() {
                if let Some(count) = pending_inputs.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(*dependent));
                    }
                }
            }
        }

        if order.len() < schema.tasks.len() {
            // Whatever never became ready sits on a cycle or behind one
            let stuck = schema
                .tasks
                .iter()
                .map(|t| t.task_id)
                .filter(|id| !order.contains(id))
                .min()
                .unwrap_or_default();
            return Err(ValidationError::InputCycle(stuck));
        }

        Ok(Self { order })
    }

    /// Task IDs in execution order
    pub fn order(&self) -> &[u32] {
        &self.order
    }
}
