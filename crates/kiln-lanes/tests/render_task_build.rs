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

use kiln_lanes::render_lane::render_task::{
    ComponentLod, ComponentTexture, DrawRange, FaceRange, InstanceId, MaterialState,
    PipelineId, PipelineKind, PipelineModifier, PipelineResolver, PipelineType,
    RenderComponent, RenderTask, RenderTaskBuilder, RenderTaskError, RenderTaskFilter,
    SharedInstance, SkinTextureId, TextureConfigId, TriState, VaoId,
};

/// Resolves every skin texture to its own pipeline and texture configuration.
struct IdentityResolver;

impl PipelineResolver for IdentityResolver {
    fn resolve_pipeline(
        &self,
        texture: SkinTextureId,
        _kind: PipelineKind,
        _pipeline_type: PipelineType,
        modifier: PipelineModifier,
    ) -> Result<PipelineId, RenderTaskError> {
        Ok(PipelineId(texture.0 * 2 + modifier.contains(PipelineModifier::DOUBLE_SIDED) as u32))
    }

    fn resolve_texture_config(
        &self,
        texture: SkinTextureId,
        _pipeline_type: PipelineType,
        _outline: bool,
    ) -> Result<TextureConfigId, RenderTaskError> {
        Ok(TextureConfigId(100 + texture.0 % 3))
    }
}

fn material(solid: bool, holes: bool, double_sided: bool, decal: bool) -> MaterialState {
    MaterialState {
        solid,
        has_holes: holes,
        double_sided,
        decal,
        ..MaterialState::solid()
    }
}

/// A deterministic scene mixing every filtered property.
fn scene() -> Vec<RenderComponent> {
    (0..24u32)
        .map(|i| {
            let slots = [
                (i % 5, material(i % 2 == 0, i % 3 == 0, i % 4 == 0, false)),
                ((i + 2) % 5, material(i % 3 != 0, false, i % 2 == 1, i % 7 == 0)),
            ];
            RenderComponent {
                textures: slots
                    .iter()
                    .enumerate()
                    .map(|(s, (skin, material))| ComponentTexture {
                        skin: SkinTextureId(*skin),
                        material: *material,
                        param_block_index: i * 2 + s as u32,
                    })
                    .collect(),
                lods: vec![ComponentLod {
                    vao: Some(VaoId(i % 4)),
                    faces: (0..2)
                        .map(|s| FaceRange {
                            face_count: 8,
                            instance: SharedInstance {
                                id: InstanceId(i % 6 + s * 10),
                                range: DrawRange {
                                    first_point: 0,
                                    point_count: 24,
                                    first_index: 0,
                                    index_count: 36,
                                },
                            },
                        })
                        .collect(),
                }],
                lod_level: 0,
                special_flags: i,
                cube_face_mask: 0b11_1111,
                solid: true,
                decals: Vec::new(),
            }
        })
        .collect()
}

/// Every (slot material) the task draws, recovered from the scene by parameter block index.
fn drawn_materials(task: &RenderTask, components: &[RenderComponent]) -> Vec<MaterialState> {
    let mut drawn = Vec::new();
    for pipeline in task.pipelines() {
        for texture in pipeline.textures() {
            for vao in texture.vaos() {
                for instance in vao.instances() {
                    for sub in instance.sub_instances() {
                        let component = &components[(sub.param_block_index / 2) as usize];
                        drawn.push(
                            component.textures[(sub.param_block_index % 2) as usize].material,
                        );
                    }
                }
            }
        }
    }
    drawn
}

#[test]
fn repeated_builds_are_identical() {
    let components = scene();
    let filter = RenderTaskFilter::solid_geometry();

    let first = RenderTaskBuilder::build(&filter, &IdentityResolver, &components);
    let second = RenderTaskBuilder::build(&filter, &IdentityResolver, &components);
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());

    let mut reused = RenderTask::new();
    RenderTaskBuilder::new(&mut reused, &filter, &IdentityResolver).build_into(&components);
    reused.clear();
    RenderTaskBuilder::new(&mut reused, &filter, &IdentityResolver).build_into(&components);
    assert_eq!(first, reused);
}

#[test]
fn solidity_partitions_the_scene() {
    let components = scene();
    let total_slots = components.len() * 2;

    let solid = RenderTaskBuilder::build(&RenderTaskFilter::solid_geometry(), &IdentityResolver, &components);
    let transparent = RenderTaskBuilder::build(&RenderTaskFilter::default(), &IdentityResolver, &components);

    let solid_drawn = drawn_materials(&solid, &components);
    let transparent_drawn = drawn_materials(&transparent, &components);
    assert!(solid_drawn.iter().all(|m| m.solid && !m.decal));
    assert!(transparent_drawn.iter().all(|m| !m.solid || m.decal));
    assert_eq!(solid_drawn.len() + transparent_drawn.len(), total_slots);
}

#[test]
fn each_tri_state_filter_holds_in_isolation() {
    let components = scene();
    type Getter = fn(&MaterialState) -> bool;
    let cases: [(fn(&mut RenderTaskFilter, TriState), Getter); 3] = [
        (|f, t| f.holes = t, |m| m.has_holes),
        (|f, t| f.double_sided = t, |m| m.double_sided),
        (|f, t| f.decal = t, |m| m.decal),
    ];

    for (set, get) in cases {
        for (state, expected) in [(TriState::With, true), (TriState::Without, false)] {
            let mut filter = RenderTaskFilter::default();
            set(&mut filter, state);
            let task = RenderTaskBuilder::build(&filter, &IdentityResolver, &components);
            let drawn = drawn_materials(&task, &components);
            assert!(!drawn.is_empty());
            assert!(drawn.iter().all(|m| get(m) == expected));
        }
    }
}
