// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Render tasks: draw submissions batched by GPU state.
//!
//! A [`RenderTask`] is a four-level tree: pipeline, texture-unit configuration, vertex array
//! and instance. Each instance carries the sub-instances (per-element parameter block
//! indices) drawn with it. Adding a step reuses an existing node whenever the exact same key
//! already exists at that level, so elements sharing GPU state end up batched under one
//! state change. Nodes keep insertion order, which makes builds deterministic.

mod builder;
mod filter;
mod persistent;

pub use self::builder::*;
pub use self::filter::*;
pub use self::persistent::*;

use ahash::AHashMap;
use std::fmt;
use std::hash::Hash;

/// Identifies a compiled pipeline (shader program plus fixed-function state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub u32);

/// Identifies a texture-unit configuration (the set of textures bound for a draw).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureConfigId(pub u32);

impl TextureConfigId {
    /// The configuration binding no textures.
    pub const EMPTY: Self = Self(0);
}

/// Identifies a vertex array object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VaoId(pub u32);

/// Identifies a shared instance: one draw range of a vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

/// The vertex and index range a shared instance draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DrawRange {
    /// First vertex.
    pub first_point: u32,
    /// Number of vertices.
    pub point_count: u32,
    /// First index.
    pub first_index: u32,
    /// Number of indices. Zero for non-indexed draws.
    pub index_count: u32,
}

/// A shared instance together with its draw range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedInstance {
    /// Identity used for batching.
    pub id: InstanceId,
    /// What gets drawn.
    pub range: DrawRange,
}

/// One element drawn with an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubInstance {
    /// Index of the element in the instance parameter block.
    pub param_block_index: u32,
    /// Per-element flags forwarded to the shader.
    pub special_flags: u32,
}

/// A fully resolved draw step, the unit render tasks are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderStep {
    /// Pipeline to bind.
    pub pipeline: PipelineId,
    /// Textures to bind.
    pub texture_config: TextureConfigId,
    /// Vertex array to bind.
    pub vao: VaoId,
    /// Instance to draw.
    pub instance: SharedInstance,
    /// Element drawn with the instance.
    pub sub_instance: SubInstance,
}

/// Where an instance's sub-instance indices live after [`RenderTask::prepare_for_render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceBlockSlot {
    /// Index of the parameter block.
    pub block: u32,
    /// First entry inside the block.
    pub first_index: u32,
}

/// Ordered children with exact-match lookup.
#[derive(Debug, Clone)]
struct Group<K, N> {
    nodes: Vec<N>,
    lookup: AHashMap<K, usize>,
}

impl<K, N> Default for Group<K, N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            lookup: AHashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash, N> Group<K, N> {
    fn get_or_insert_with(&mut self, key: K, create: impl FnOnce() -> N) -> &mut N {
        let index = *self.lookup.entry(key).or_insert_with(|| {
            self.nodes.push(create());
            self.nodes.len() - 1
        });
        &mut self.nodes[index]
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.lookup.clear();
    }
}

impl<K, N: PartialEq> PartialEq for Group<K, N> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

/// Instance node: one draw range plus the elements drawn with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTaskInstance {
    instance: SharedInstance,
    sub_instances: Vec<SubInstance>,
    block: Option<InstanceBlockSlot>,
}

impl RenderTaskInstance {
    /// The shared instance drawn.
    pub fn instance(&self) -> &SharedInstance {
        &self.instance
    }

    /// Elements drawn with this instance, in insertion order.
    pub fn sub_instances(&self) -> &[SubInstance] {
        &self.sub_instances
    }

    /// Parameter block placement, once prepared.
    pub fn block(&self) -> Option<InstanceBlockSlot> {
        self.block
    }

    /// Number of draws this instance issues. Instances without sub-instances draw once.
    fn draw_count(&self) -> u64 {
        self.sub_instances.len().max(1) as u64
    }
}

/// Vertex array node.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTaskVao {
    vao: VaoId,
    instances: Group<InstanceId, RenderTaskInstance>,
}

impl RenderTaskVao {
    /// The vertex array bound.
    pub fn vao(&self) -> VaoId {
        self.vao
    }

    /// Instances drawn with this vertex array.
    pub fn instances(&self) -> &[RenderTaskInstance] {
        &self.instances.nodes
    }

    /// Adds `instance`, reusing the node for an identical instance.
    pub fn add_instance(&mut self, instance: SharedInstance) -> &mut RenderTaskInstance {
        self.instances
            .get_or_insert_with(instance.id, || RenderTaskInstance {
                instance,
                sub_instances: Vec::new(),
                block: None,
            })
    }
}

impl RenderTaskInstance {
    /// Appends an element drawn with this instance.
    pub fn add_sub_instance(&mut self, sub_instance: SubInstance) {
        self.sub_instances.push(sub_instance);
    }
}

/// Texture-unit configuration node.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTaskTexture {
    config: TextureConfigId,
    vaos: Group<VaoId, RenderTaskVao>,
}

impl RenderTaskTexture {
    /// The texture-unit configuration bound.
    pub fn config(&self) -> TextureConfigId {
        self.config
    }

    /// Vertex arrays drawn with this configuration.
    pub fn vaos(&self) -> &[RenderTaskVao] {
        &self.vaos.nodes
    }

    /// Adds `vao`, reusing the node for an identical vertex array.
    pub fn add_vao(&mut self, vao: VaoId) -> &mut RenderTaskVao {
        self.vaos.get_or_insert_with(vao, || RenderTaskVao {
            vao,
            instances: Group::default(),
        })
    }
}

/// Pipeline node.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTaskPipeline {
    pipeline: PipelineId,
    textures: Group<TextureConfigId, RenderTaskTexture>,
}

impl RenderTaskPipeline {
    /// The pipeline bound.
    pub fn pipeline(&self) -> PipelineId {
        self.pipeline
    }

    /// Texture configurations drawn with this pipeline.
    pub fn textures(&self) -> &[RenderTaskTexture] {
        &self.textures.nodes
    }

    /// Adds `config`, reusing the node for an identical configuration.
    pub fn add_texture(&mut self, config: TextureConfigId) -> &mut RenderTaskTexture {
        self.textures.get_or_insert_with(config, || RenderTaskTexture {
            config,
            vaos: Group::default(),
        })
    }
}

/// Parameter block layout computed by [`RenderTask::prepare_for_render`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceBlockLayout {
    /// Entries each block must hold, in ivec4 elements.
    pub block_elements: Vec<u32>,
    /// Sub-instance indices written over all blocks.
    pub index_count: u32,
}

impl InstanceBlockLayout {
    /// Number of parameter blocks needed.
    pub fn block_count(&self) -> usize {
        self.block_elements.len()
    }
}

/// An ordered, batched set of draws for one render pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderTask {
    pipelines: Group<PipelineId, RenderTaskPipeline>,
    use_instance_flags: bool,
}

impl RenderTask {
    /// Creates an empty task.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every step. Allocations are kept for the next build.
    pub fn clear(&mut self) {
        self.pipelines.clear();
        self.use_instance_flags = false;
    }

    /// `true` when the task has no pipelines.
    pub fn is_empty(&self) -> bool {
        self.pipelines.nodes.is_empty()
    }

    /// Pipelines in draw order.
    pub fn pipelines(&self) -> &[RenderTaskPipeline] {
        &self.pipelines.nodes
    }

    /// Adds `pipeline`, reusing the node for an identical pipeline.
    pub fn add_pipeline(&mut self, pipeline: PipelineId) -> &mut RenderTaskPipeline {
        self.pipelines.get_or_insert_with(pipeline, || RenderTaskPipeline {
            pipeline,
            textures: Group::default(),
        })
    }

    /// Adds one draw step, merging it into existing nodes at every level.
    pub fn add_step(&mut self, step: &RenderStep) {
        self.add_pipeline(step.pipeline)
            .add_texture(step.texture_config)
            .add_vao(step.vao)
            .add_instance(step.instance)
            .add_sub_instance(step.sub_instance);
    }

    /// Pack an instance flags word next to every index, halving block capacity.
    pub fn set_use_instance_flags(&mut self, use_flags: bool) {
        self.use_instance_flags = use_flags;
    }

    /// Whether instance flags are packed next to indices.
    pub fn use_instance_flags(&self) -> bool {
        self.use_instance_flags
    }

    fn instances(&self) -> impl Iterator<Item = &RenderTaskInstance> {
        self.vaos().flat_map(|v| v.instances.nodes.iter())
    }

    fn instances_mut(&mut self) -> impl Iterator<Item = &mut RenderTaskInstance> {
        self.pipelines.nodes.iter_mut().flat_map(|p| {
            p.textures.nodes.iter_mut().flat_map(|t| {
                t.vaos
                    .nodes
                    .iter_mut()
                    .flat_map(|v| v.instances.nodes.iter_mut())
            })
        })
    }

    fn vaos(&self) -> impl Iterator<Item = &RenderTaskVao> {
        self.pipelines
            .nodes
            .iter()
            .flat_map(|p| p.textures.nodes.iter())
            .flat_map(|t| t.vaos.nodes.iter())
    }

    /// Number of pipelines.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.nodes.len()
    }

    /// Texture configurations over all pipelines.
    pub fn total_texture_count(&self) -> usize {
        self.pipelines.nodes.iter().map(|p| p.textures.nodes.len()).sum()
    }

    /// Vertex arrays over all texture configurations.
    pub fn total_vao_count(&self) -> usize {
        self.vaos().count()
    }

    /// Instances over all vertex arrays.
    pub fn total_instance_count(&self) -> usize {
        self.instances().count()
    }

    /// Sub-instances over all instances.
    pub fn total_sub_instance_count(&self) -> usize {
        self.instances().map(|i| i.sub_instances.len()).sum()
    }

    /// Vertices submitted over all draws.
    pub fn total_point_count(&self) -> u64 {
        self.instances()
            .map(|i| u64::from(i.instance.range.point_count) * i.draw_count())
            .sum()
    }

    /// Indices submitted over all draws.
    pub fn total_index_count(&self) -> u64 {
        self.instances()
            .map(|i| u64::from(i.instance.range.index_count) * i.draw_count())
            .sum()
    }

    /// Assigns every instance a range of parameter block entries for its sub-instance
    /// indices.
    ///
    /// Instances are walked in draw order and packed into blocks of at most `max_entries`
    /// indices (half that with instance flags). An instance never straddles two blocks.
    /// Block sizes are reported in ivec4 elements, four indices per element.
    ///
    /// An instance with more sub-instances than fit in one block still gets a single block
    /// of its own, larger than `max_entries`; this is logged as a warning.
    pub fn prepare_for_render(&mut self, max_entries: u32) -> InstanceBlockLayout {
        let mut layout = InstanceBlockLayout::default();
        if self.is_empty() {
            return layout;
        }
        let components_per_index = if self.use_instance_flags { 2 } else { 1 };
        let capacity = (max_entries / components_per_index).max(1);
        let elements = |used: u32| components_per_index * (used.saturating_sub(1) / 4 + 1);

        let mut first_index = 0u32;
        let mut total = 0u32;
        for instance in self.instances_mut() {
            let count = instance.sub_instances.len() as u32;
            if count > capacity {
                log::warn!(
                    "RenderTask: instance {} has {count} sub-instances, over the block capacity {capacity}",
                    instance.instance.id.0
                );
            }
            if layout.block_elements.is_empty() || first_index + count > capacity {
                if let Some(last) = layout.block_elements.last_mut() {
                    *last = elements(first_index);
                }
                layout.block_elements.push(0);
                first_index = 0;
            }
            instance.block = Some(InstanceBlockSlot {
                block: layout.block_elements.len() as u32 - 1,
                first_index,
            });
            first_index += count;
            total += count;
        }
        if let Some(last) = layout.block_elements.last_mut() {
            *last = elements(first_index);
        }
        layout.index_count = total;
        layout
    }

    /// Logs the task structure at info level.
    pub fn debug_print(&self) {
        log::info!(
            "RenderTask: pipelines={} textures={} vaos={} instances={} subInstances={} points={}",
            self.pipeline_count(),
            self.total_texture_count(),
            self.total_vao_count(),
            self.total_instance_count(),
            self.total_sub_instance_count(),
            self.total_point_count()
        );
        for line in self.to_string().lines() {
            log::info!("{}", line);
        }
    }
}

/// One line per draw: `- <step>: p=<pipeline> t=<config> v=<vao> i=<instance> [...]`.
impl fmt::Display for RenderTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut step = 0;
        for pipeline in self.pipelines() {
            for texture in pipeline.textures() {
                for vao in texture.vaos() {
                    for instance in vao.instances() {
                        let r = instance.instance.range;
                        let head = format!(
                            "p={} t={} v={} i={} [pc={} fp={} ic={} fi={}]",
                            pipeline.pipeline.0,
                            texture.config.0,
                            vao.vao.0,
                            instance.instance.id.0,
                            r.point_count,
                            r.first_point,
                            r.index_count,
                            r.first_index
                        );
                        if instance.sub_instances.is_empty() {
                            writeln!(f, "- {}: {}", step, head)?;
                            step += 1;
                        }
                        for sub in &instance.sub_instances {
                            writeln!(
                                f,
                                "- {}: {} si[i={} f={:x}]",
                                step, head, sub.param_block_index, sub.special_flags
                            )?;
                            step += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(pipeline: u32, texture: u32, vao: u32, instance: u32, index: u32) -> RenderStep {
        RenderStep {
            pipeline: PipelineId(pipeline),
            texture_config: TextureConfigId(texture),
            vao: VaoId(vao),
            instance: SharedInstance {
                id: InstanceId(instance),
                range: DrawRange {
                    first_point: 0,
                    point_count: 3,
                    first_index: 0,
                    index_count: 6,
                },
            },
            sub_instance: SubInstance {
                param_block_index: index,
                special_flags: 0,
            },
        }
    }

    #[test]
    fn test_identical_state_is_batched() {
        let mut task = RenderTask::new();
        task.add_step(&step(1, 1, 1, 1, 0));
        task.add_step(&step(1, 1, 1, 1, 1));
        task.add_step(&step(1, 1, 2, 2, 2));
        task.add_step(&step(2, 1, 1, 1, 3));

        assert_eq!(task.pipeline_count(), 2);
        assert_eq!(task.total_texture_count(), 2);
        assert_eq!(task.total_vao_count(), 3);
        assert_eq!(task.total_instance_count(), 3);
        assert_eq!(task.total_sub_instance_count(), 4);
        assert_eq!(task.total_point_count(), 12);
        assert_eq!(task.total_index_count(), 24);

        let first = &task.pipelines()[0].textures()[0].vaos()[0].instances()[0];
        assert_eq!(
            first.sub_instances().iter().map(|s| s.param_block_index).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut task = RenderTask::new();
        task.add_step(&step(9, 1, 1, 1, 0));
        task.add_step(&step(3, 1, 1, 1, 0));
        task.add_step(&step(9, 2, 1, 1, 0));
        let order: Vec<u32> = task.pipelines().iter().map(|p| p.pipeline().0).collect();
        assert_eq!(order, vec![9, 3]);
    }

    #[test]
    fn test_clear_empties_and_allows_reuse() {
        let mut task = RenderTask::new();
        task.add_step(&step(1, 1, 1, 1, 0));
        task.set_use_instance_flags(true);
        task.clear();
        assert!(task.is_empty());
        assert!(!task.use_instance_flags());
        assert_eq!(task, RenderTask::new());
        task.add_step(&step(1, 1, 1, 1, 0));
        assert_eq!(task.total_sub_instance_count(), 1);
    }

    #[test]
    fn test_prepare_packs_instances_into_blocks() {
        let mut task = RenderTask::new();
        for i in 0..3 {
            task.add_step(&step(1, 1, 1, 10, i));
        }
        for i in 0..3 {
            task.add_step(&step(1, 1, 1, 11, 3 + i));
        }
        task.add_step(&step(1, 1, 1, 12, 6));

        let layout = task.prepare_for_render(4);
        assert_eq!(layout.block_count(), 2);
        assert_eq!(layout.index_count, 7);
        assert_eq!(layout.block_elements, vec![1, 1]);

        let instances = instances_of(&task);
        assert_eq!(instances[0].block(), Some(InstanceBlockSlot { block: 0, first_index: 0 }));
        assert_eq!(instances[1].block(), Some(InstanceBlockSlot { block: 1, first_index: 0 }));
        assert_eq!(instances[2].block(), Some(InstanceBlockSlot { block: 1, first_index: 3 }));

        let layout = task.prepare_for_render(512);
        assert_eq!(layout.block_count(), 1);
        assert_eq!(layout.block_elements, vec![2]);
        assert_eq!(instances_of(&task)[2].block(), Some(InstanceBlockSlot { block: 0, first_index: 6 }));
    }

    fn instances_of(task: &RenderTask) -> &[RenderTaskInstance] {
        task.pipelines()[0].textures()[0].vaos()[0].instances()
    }

    #[test]
    fn test_instance_flags_halve_capacity() {
        let mut task = RenderTask::new();
        task.set_use_instance_flags(true);
        for i in 0..5 {
            task.add_step(&step(1, 1, 1, i, i));
        }
        let layout = task.prepare_for_render(8);
        assert_eq!(layout.block_count(), 2);
        assert_eq!(layout.block_elements, vec![2, 2]);
    }

    #[test]
    fn test_oversized_instance_gets_its_own_block() {
        let mut task = RenderTask::new();
        for i in 0..6 {
            task.add_step(&step(1, 1, 1, 1, i));
        }
        task.add_step(&step(1, 1, 1, 2, 0));

        let layout = task.prepare_for_render(4);
        assert_eq!(layout.block_elements, vec![2, 1]);
        assert_eq!(layout.index_count, 7);

        let blocks: Vec<_> = task.instances_mut().map(|i| i.block()).collect();
        assert_eq!(
            blocks,
            vec![
                Some(InstanceBlockSlot { block: 0, first_index: 0 }),
                Some(InstanceBlockSlot { block: 1, first_index: 0 }),
            ]
        );
    }

    #[test]
    fn test_empty_task_prepares_nothing() {
        assert_eq!(RenderTask::new().prepare_for_render(512), InstanceBlockLayout::default());
    }

    #[test]
    fn test_display_lists_every_draw() {
        let mut task = RenderTask::new();
        task.add_step(&step(1, 2, 3, 4, 5));
        task.add_step(&step(1, 2, 3, 4, 6));
        let text = task.to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("- 0: p=1 t=2 v=3 i=4 [pc=3 fp=0 ic=6 fi=0] si[i=5 f=0]"));
    }
}
