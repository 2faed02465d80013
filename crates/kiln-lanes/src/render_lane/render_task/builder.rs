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

//! Builds render tasks from scene components.
//!
//! The builder visits components, filters every material slot through a
//! [`RenderTaskFilter`], resolves the pipeline and texture-unit configuration of the
//! survivors through a [`PipelineResolver`] and appends the resulting steps to a
//! [`RenderTask`]. An element that fails to resolve is skipped with a warning.

use super::{
    PipelineId, PipelineModifier, PipelineType, RenderStep, RenderTask, RenderTaskFilter,
    SharedInstance, SubInstance, TextureConfigId, VaoId,
};
use super::filter::MaterialState;
use thiserror::Error;

/// Identifies a skin texture, the material a pipeline is selected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkinTextureId(pub u32);

/// Which family of pipelines a material slot is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Component surfaces.
    Component,
    /// Component slots drawn as decals.
    Decal,
    /// Outlines.
    Outline,
}

/// Errors raised while resolving an element into render steps.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderTaskError {
    /// No pipeline exists for the material in the requested pass.
    #[error("no {kind:?} pipeline of type {pipeline_type:?} for skin texture {texture:?}")]
    MissingPipeline {
        /// The material.
        texture: SkinTextureId,
        /// The pipeline family.
        kind: PipelineKind,
        /// The pass.
        pipeline_type: PipelineType,
    },
    /// No texture-unit configuration exists for the material.
    #[error("no texture unit configuration for skin texture {0:?}")]
    MissingTextureConfig(SkinTextureId),
    /// The component has no data for the requested level of detail.
    #[error("component has no level of detail {0}")]
    MissingLod(usize),
    /// The component references a texture slot it does not have.
    #[error("component has no texture slot {0}")]
    MissingTexture(usize),
}

/// Resolves materials into GPU state. Implemented by the shader and skin systems.
pub trait PipelineResolver {
    /// The pipeline to draw `texture` with.
    fn resolve_pipeline(
        &self,
        texture: SkinTextureId,
        kind: PipelineKind,
        pipeline_type: PipelineType,
        modifier: PipelineModifier,
    ) -> Result<PipelineId, RenderTaskError>;

    /// The textures to bind for `texture`. Materials without textures may return
    /// [`TextureConfigId::EMPTY`].
    fn resolve_texture_config(
        &self,
        texture: SkinTextureId,
        pipeline_type: PipelineType,
        outline: bool,
    ) -> Result<TextureConfigId, RenderTaskError>;
}

/// One material slot of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTexture {
    /// The skin texture used for the slot.
    pub skin: SkinTextureId,
    /// Filter-relevant material state.
    pub material: MaterialState,
    /// The slot's element in the instance parameter block.
    pub param_block_index: u32,
}

/// The faces of one texture slot at one level of detail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRange {
    /// Faces in the range. Empty ranges draw nothing.
    pub face_count: u32,
    /// The shared instance drawing the range.
    pub instance: SharedInstance,
}

/// Geometry of one level of detail.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentLod {
    /// Vertex array, once uploaded.
    pub vao: Option<VaoId>,
    /// One face range per texture slot.
    pub faces: Vec<FaceRange>,
}

/// A decal attached to a component.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderDecal {
    /// Hidden decals are skipped.
    pub visible: bool,
    /// The skin texture, if assigned.
    pub skin: Option<SkinTextureId>,
    /// Filter-relevant material state.
    pub material: MaterialState,
    /// Vertex array of the projected decal mesh, once built.
    pub vao: Option<VaoId>,
    /// The decal's shared instance.
    pub instance: SharedInstance,
    /// The decal's element in the instance parameter block.
    pub param_block_index: u32,
}

/// A scene element as seen by the builder. Read-only during a build.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderComponent {
    /// Material slots.
    pub textures: Vec<ComponentTexture>,
    /// Levels of detail.
    pub lods: Vec<ComponentLod>,
    /// Level of detail to draw.
    pub lod_level: usize,
    /// Flags forwarded to every sub-instance.
    pub special_flags: u32,
    /// Cube faces the component is visible from, one bit per face.
    pub cube_face_mask: u8,
    /// Whether the component counts as solid for its decals.
    pub solid: bool,
    /// Attached decals.
    pub decals: Vec<RenderDecal>,
}

/// What a build did with the elements it visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Steps appended to the task.
    pub added: usize,
    /// Elements rejected by the filter.
    pub rejected: usize,
    /// Elements skipped because they could not be resolved.
    pub skipped: usize,
}

/// Appends filtered component steps to a render task.
pub struct RenderTaskBuilder<'a, R: PipelineResolver + ?Sized> {
    task: &'a mut RenderTask,
    filter: &'a RenderTaskFilter,
    resolver: &'a R,
    report: BuildReport,
}

impl<'a, R: PipelineResolver + ?Sized> RenderTaskBuilder<'a, R> {
    /// Creates a builder appending to `task`.
    pub fn new(task: &'a mut RenderTask, filter: &'a RenderTaskFilter, resolver: &'a R) -> Self {
        Self {
            task,
            filter,
            resolver,
            report: BuildReport::default(),
        }
    }

    /// Builds a fresh task from `components` and their decals.
    pub fn build(
        filter: &RenderTaskFilter,
        resolver: &R,
        components: &[RenderComponent],
    ) -> RenderTask {
        let mut task = RenderTask::new();
        let report = RenderTaskBuilder::new(&mut task, filter, resolver).build_into(components);
        log::debug!(
            "RenderTaskBuilder: added={} rejected={} skipped={}",
            report.added,
            report.rejected,
            report.skipped
        );
        task
    }

    /// Adds `components` and their decals, returning the report.
    pub fn build_into(mut self, components: &[RenderComponent]) -> BuildReport {
        self.add_components(components);
        for component in components {
            self.add_decals(component);
        }
        self.report
    }

    /// The report so far.
    pub fn report(&self) -> BuildReport {
        self.report
    }

    /// Adds every component in order.
    pub fn add_components(&mut self, components: &[RenderComponent]) {
        for component in components {
            self.add_component(component);
        }
    }

    /// Adds every texture slot of `component` at its current level of detail.
    pub fn add_component(&mut self, component: &RenderComponent) {
        if !self.filter.accepts_cube_faces(component.cube_face_mask) {
            self.report.rejected += 1;
            return;
        }
        for texture in 0..component.textures.len() {
            self.add_component_faces(component, texture, component.lod_level, component.special_flags);
        }
    }

    /// Adds the faces of one texture slot at `lod`.
    pub fn add_component_faces(
        &mut self,
        component: &RenderComponent,
        texture: usize,
        lod: usize,
        special_flags: u32,
    ) {
        match self.resolve_component_faces(component, texture, lod, special_flags) {
            Ok(Some(step)) => {
                self.task.add_step(&step);
                self.report.added += 1;
            }
            Ok(None) => {}
            Err(e) => self.skip(&e),
        }
    }

    fn resolve_component_faces(
        &mut self,
        component: &RenderComponent,
        texture: usize,
        lod: usize,
        special_flags: u32,
    ) -> Result<Option<RenderStep>, RenderTaskError> {
        let slot = component
            .textures
            .get(texture)
            .ok_or(RenderTaskError::MissingTexture(texture))?;
        let geometry = component.lods.get(lod).ok_or(RenderTaskError::MissingLod(lod))?;
        let faces = geometry
            .faces
            .get(texture)
            .ok_or(RenderTaskError::MissingTexture(texture))?;
        if faces.face_count == 0 {
            return Ok(None);
        }
        if self.filter.rejects(&slot.material) {
            self.report.rejected += 1;
            return Ok(None);
        }
        let Some(vao) = geometry.vao else {
            log::debug!("RenderTaskBuilder: component lod {} has no vertex array yet", lod);
            self.report.skipped += 1;
            return Ok(None);
        };

        let filter = self.filter;
        let mut modifier = filter.pipeline_modifier;
        let kind = if filter.outline {
            PipelineKind::Outline
        } else {
            if slot.material.double_sided || filter.force_double_sided {
                modifier |= PipelineModifier::DOUBLE_SIDED;
            }
            match slot.material.decal {
                true => PipelineKind::Decal,
                false => PipelineKind::Component,
            }
        };

        Ok(Some(self.resolve_step(
            slot.skin,
            kind,
            modifier,
            vao,
            faces.instance,
            SubInstance {
                param_block_index: slot.param_block_index,
                special_flags,
            },
        )?))
    }

    /// Adds every decal of `component`.
    pub fn add_decals(&mut self, component: &RenderComponent) {
        for decal in &component.decals {
            self.add_decal(decal, component.solid);
        }
    }

    /// Adds one decal. Decals follow the solidity of their parent component.
    pub fn add_decal(&mut self, decal: &RenderDecal, parent_solid: bool) {
        if !decal.visible || self.filter.solid != parent_solid {
            self.report.rejected += 1;
            return;
        }
        let (Some(skin), Some(vao)) = (decal.skin, decal.vao) else {
            self.report.skipped += 1;
            return;
        };
        if self.filter.rejects_ignoring_solidity(&decal.material)
            || (self.filter.no_rendered && decal.material.rendered)
        {
            self.report.rejected += 1;
            return;
        }

        let modifier = self.filter.pipeline_modifier | PipelineModifier::DOUBLE_SIDED;
        let sub_instance = SubInstance {
            param_block_index: decal.param_block_index,
            special_flags: 0,
        };
        match self.resolve_step(skin, PipelineKind::Decal, modifier, vao, decal.instance, sub_instance) {
            Ok(step) => {
                self.task.add_step(&step);
                self.report.added += 1;
            }
            Err(e) => self.skip(&e),
        }
    }

    fn resolve_step(
        &self,
        skin: SkinTextureId,
        kind: PipelineKind,
        modifier: PipelineModifier,
        vao: VaoId,
        instance: SharedInstance,
        mut sub_instance: SubInstance,
    ) -> Result<RenderStep, RenderTaskError> {
        let filter = self.filter;
        let pipeline = match filter.enforced_pipeline {
            Some(pipeline) => pipeline,
            None => self
                .resolver
                .resolve_pipeline(skin, kind, filter.pipeline_type, modifier)?,
        };
        let texture_config =
            self.resolver
                .resolve_texture_config(skin, filter.pipeline_type, filter.outline)?;
        if let Some(index) = filter.enforced_param_block {
            sub_instance.param_block_index = index;
        }
        Ok(RenderStep {
            pipeline,
            texture_config,
            vao,
            instance,
            sub_instance,
        })
    }

    fn skip(&mut self, error: &RenderTaskError) {
        log::warn!("RenderTaskBuilder: skipping element: {}", error);
        self.report.skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::super::{DrawRange, InstanceId, TriState};
    use super::*;

    /// Pipelines are numbered after the skin texture; skin 99 has none.
    struct TableResolver;

    impl PipelineResolver for TableResolver {
        fn resolve_pipeline(
            &self,
            texture: SkinTextureId,
            kind: PipelineKind,
            pipeline_type: PipelineType,
            modifier: PipelineModifier,
        ) -> Result<PipelineId, RenderTaskError> {
            if texture.0 == 99 {
                return Err(RenderTaskError::MissingPipeline {
                    texture,
                    kind,
                    pipeline_type,
                });
            }
            let kind_offset = match kind {
                PipelineKind::Component => 0,
                PipelineKind::Decal => 1000,
                PipelineKind::Outline => 2000,
            };
            Ok(PipelineId(texture.0 * 10 + kind_offset + modifier.bits()))
        }

        fn resolve_texture_config(
            &self,
            texture: SkinTextureId,
            _pipeline_type: PipelineType,
            _outline: bool,
        ) -> Result<TextureConfigId, RenderTaskError> {
            Ok(TextureConfigId(texture.0))
        }
    }

    fn instance(id: u32) -> SharedInstance {
        SharedInstance {
            id: InstanceId(id),
            range: DrawRange {
                first_point: 0,
                point_count: 12,
                first_index: 0,
                index_count: 36,
            },
        }
    }

    fn component(materials: &[(u32, MaterialState)], vao: u32) -> RenderComponent {
        RenderComponent {
            textures: materials
                .iter()
                .enumerate()
                .map(|(i, (skin, material))| ComponentTexture {
                    skin: SkinTextureId(*skin),
                    material: *material,
                    param_block_index: vao * 10 + i as u32,
                })
                .collect(),
            lods: vec![ComponentLod {
                vao: Some(VaoId(vao)),
                faces: (0..materials.len() as u32)
                    .map(|i| FaceRange {
                        face_count: 2,
                        instance: instance(vao * 10 + i),
                    })
                    .collect(),
            }],
            lod_level: 0,
            special_flags: 0,
            cube_face_mask: 0b11_1111,
            solid: true,
            decals: Vec::new(),
        }
    }

    #[test]
    fn test_solid_pass_keeps_only_solid_slots() {
        let components = vec![
            component(&[(1, MaterialState::solid()), (2, MaterialState::transparent())], 1),
            component(&[(1, MaterialState::solid())], 2),
        ];

        let mut task = RenderTask::new();
        let filter = RenderTaskFilter::solid_geometry();
        let report = RenderTaskBuilder::new(&mut task, &filter, &TableResolver).build_into(&components);
        assert_eq!(report, BuildReport { added: 2, rejected: 1, skipped: 0 });
        assert_eq!(task.pipeline_count(), 1);
        assert_eq!(task.pipelines()[0].pipeline(), PipelineId(10));
        assert_eq!(task.total_vao_count(), 2);

        let transparent = RenderTaskBuilder::build(&RenderTaskFilter::default(), &TableResolver, &components);
        assert_eq!(transparent.total_sub_instance_count(), 1);
        assert_eq!(transparent.pipelines()[0].pipeline(), PipelineId(20));
    }

    #[test]
    fn test_unresolvable_element_is_skipped() {
        let components = vec![
            component(&[(99, MaterialState::solid()), (3, MaterialState::solid())], 1),
        ];
        let mut task = RenderTask::new();
        let filter = RenderTaskFilter::solid_geometry();
        let mut builder = RenderTaskBuilder::new(&mut task, &filter, &TableResolver);
        builder.add_components(&components);
        builder.add_component_faces(&components[0], 0, 5, 0);
        assert_eq!(builder.report(), BuildReport { added: 1, rejected: 0, skipped: 2 });
        assert_eq!(task.total_sub_instance_count(), 1);
    }

    #[test]
    fn test_double_sided_selects_modifier() {
        let two_sided = MaterialState {
            double_sided: true,
            ..MaterialState::solid()
        };
        let components = vec![component(&[(1, two_sided), (1, MaterialState::solid())], 1)];
        let task = RenderTaskBuilder::build(&RenderTaskFilter::solid_geometry(), &TableResolver, &components);
        let pipelines: Vec<u32> = task.pipelines().iter().map(|p| p.pipeline().0).collect();
        assert_eq!(pipelines, vec![11, 10]);

        let forced = RenderTaskFilter {
            force_double_sided: true,
            ..RenderTaskFilter::solid_geometry()
        };
        assert_eq!(RenderTaskBuilder::build(&forced, &TableResolver, &components).pipeline_count(), 1);
    }

    #[test]
    fn test_enforced_pipeline_and_param_block() {
        let filter = RenderTaskFilter {
            enforced_pipeline: Some(PipelineId(500)),
            enforced_param_block: Some(7),
            ..RenderTaskFilter::solid_geometry()
        };
        let components = vec![
            component(&[(1, MaterialState::solid())], 1),
            component(&[(2, MaterialState::solid())], 2),
        ];
        let task = RenderTaskBuilder::build(&filter, &TableResolver, &components);
        assert_eq!(task.pipeline_count(), 1);
        assert_eq!(task.pipelines()[0].pipeline(), PipelineId(500));
        let vaos = task.pipelines()[0].textures()[0].vaos();
        assert_eq!(vaos[0].instances()[0].sub_instances()[0].param_block_index, 7);
    }

    #[test]
    fn test_cube_face_filter_rejects_component() {
        let mut hidden = component(&[(1, MaterialState::solid())], 1);
        hidden.cube_face_mask = 0b000_001;
        let filter = RenderTaskFilter {
            cube_face: Some(3),
            ..RenderTaskFilter::solid_geometry()
        };
        let mut task = RenderTask::new();
        let report = RenderTaskBuilder::new(&mut task, &filter, &TableResolver).build_into(&[hidden]);
        assert_eq!(report.rejected, 1);
        assert!(task.is_empty());
    }

    #[test]
    fn test_decals_follow_parent_solidity() {
        let decal = RenderDecal {
            visible: true,
            skin: Some(SkinTextureId(4)),
            material: MaterialState {
                decal: true,
                ..MaterialState::transparent()
            },
            vao: Some(VaoId(40)),
            instance: instance(400),
            param_block_index: 3,
        };
        let mut parent = component(&[], 1);
        parent.decals = vec![decal.clone(), RenderDecal { visible: false, ..decal }];

        let solid = RenderTaskBuilder::build(&RenderTaskFilter::solid_geometry(), &TableResolver, &[parent.clone()]);
        assert_eq!(solid.total_sub_instance_count(), 1);
        let expected = 4 * 10 + 1000 + PipelineModifier::DOUBLE_SIDED.bits();
        assert_eq!(solid.pipelines()[0].pipeline(), PipelineId(expected));

        let transparent = RenderTaskBuilder::build(&RenderTaskFilter::default(), &TableResolver, &[parent]);
        assert!(transparent.is_empty());
    }

    #[test]
    fn test_hole_filter_in_isolation() {
        let holed = MaterialState {
            has_holes: true,
            ..MaterialState::solid()
        };
        let components = vec![component(&[(1, holed), (2, MaterialState::solid())], 1)];
        let with = RenderTaskFilter {
            holes: TriState::With,
            ..RenderTaskFilter::solid_geometry()
        };
        let without = RenderTaskFilter {
            holes: TriState::Without,
            ..RenderTaskFilter::solid_geometry()
        };
        let task = RenderTaskBuilder::build(&with, &TableResolver, &components);
        assert_eq!(task.pipelines().iter().map(|p| p.pipeline().0).collect::<Vec<_>>(), vec![10]);
        let task = RenderTaskBuilder::build(&without, &TableResolver, &components);
        assert_eq!(task.pipelines().iter().map(|p| p.pipeline().0).collect::<Vec<_>>(), vec![20]);
    }
}
