//! Built-in node executors, grouped by concern. [`register_all`] is the
//! single entry point the engine (or a host binary) calls to populate a
//! fresh [`crate::Registry`].

mod advanced;
mod array_ops;
mod basic_io;
mod control_flow;
mod misc;
mod operation;
mod resilience;
mod state;
mod util;

use std::sync::Arc;

use crate::registry::Registry;
use crate::NodeError;

pub fn register_all(registry: &mut Registry) -> Result<(), NodeError> {
    registry.register(Arc::new(basic_io::NumberNode))?;
    registry.register(Arc::new(basic_io::TextInputNode))?;
    registry.register(Arc::new(basic_io::HttpNode::default()))?;

    registry.register(Arc::new(operation::OperationNode))?;

    registry.register(Arc::new(control_flow::ConditionNode))?;
    registry.register(Arc::new(control_flow::ForEachNode))?;
    registry.register(Arc::new(control_flow::WhileLoopNode))?;
    registry.register(Arc::new(control_flow::FilterNode))?;
    registry.register(Arc::new(control_flow::MapNode))?;
    registry.register(Arc::new(control_flow::ReduceNode))?;

    registry.register(Arc::new(array_ops::SliceNode))?;
    registry.register(Arc::new(array_ops::SortNode))?;
    registry.register(Arc::new(array_ops::FindNode))?;
    registry.register(Arc::new(array_ops::FlatMapNode))?;
    registry.register(Arc::new(array_ops::GroupByNode))?;
    registry.register(Arc::new(array_ops::UniqueNode))?;
    registry.register(Arc::new(array_ops::ChunkNode))?;
    registry.register(Arc::new(array_ops::ReverseNode))?;
    registry.register(Arc::new(array_ops::PartitionNode))?;
    registry.register(Arc::new(array_ops::ZipNode))?;
    registry.register(Arc::new(array_ops::SampleNode))?;
    registry.register(Arc::new(array_ops::RangeNode))?;
    registry.register(Arc::new(array_ops::CompactNode))?;
    registry.register(Arc::new(array_ops::TransposeNode))?;

    registry.register(Arc::new(state::VariableNode))?;
    registry.register(Arc::new(state::ExtractNode))?;
    registry.register(Arc::new(state::TransformNode))?;
    registry.register(Arc::new(state::AccumulatorNode))?;
    registry.register(Arc::new(state::CounterNode))?;
    registry.register(Arc::new(state::ParseNode))?;
    registry.register(Arc::new(state::FormatNode))?;

    registry.register(Arc::new(advanced::SwitchNode))?;
    registry.register(Arc::new(advanced::ParallelNode))?;
    registry.register(Arc::new(advanced::JoinNode))?;
    registry.register(Arc::new(advanced::SplitNode))?;
    registry.register(Arc::new(advanced::DelayNode))?;
    registry.register(Arc::new(advanced::CacheNode))?;

    registry.register(Arc::new(resilience::RetryNode))?;
    registry.register(Arc::new(resilience::TryCatchNode))?;
    registry.register(Arc::new(resilience::TimeoutNode))?;

    registry.register(Arc::new(misc::RateLimitNode))?;
    registry.register(Arc::new(misc::SchemaValidatorNode))?;
    registry.register(Arc::new(misc::ContextVariableNode))?;
    registry.register(Arc::new(misc::ContextConstantNode))?;

    Ok(())
}
