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

//! Filter configuration for render task builds and the predicate it evaluates.
//!
//! Every material is summarised as a set of [`RenderTaskFilterBits`]. A filter turns its
//! configuration into a mask and an expected value; a material passes when its masked bits
//! equal the expected value. Filters that are not active contribute nothing to the mask.

use super::PipelineId;
use bitflags::bitflags;

bitflags! {
    /// Properties of a material relevant to render task filtering.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderTaskFilterBits: u32 {
        /// The material renders at all.
        const RENDER = 1 << 0;
        /// Opaque material.
        const SOLID = 1 << 1;
        /// Casts no shadows.
        const SHADOW_NONE = 1 << 2;
        /// Shows up in reflections.
        const REFLECTED = 1 << 3;
        /// Already rendered by a dynamic pass.
        const RENDERED = 1 << 4;
        /// Has an outline.
        const OUTLINE = 1 << 5;
        /// The outline is opaque.
        const OUTLINE_SOLID = 1 << 6;
        /// Has cut-out holes.
        const HOLES = 1 << 7;
        /// Rendered from both sides.
        const DOUBLE_SIDED = 1 << 8;
        /// Projected as a decal.
        const DECAL = 1 << 9;
        /// Visible through walls.
        const XRAY = 1 << 10;
    }
}

bitflags! {
    /// Modifiers selecting a pipeline variant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipelineModifier: u32 {
        /// Cull nothing.
        const DOUBLE_SIDED = 1 << 0;
        /// Render into both eyes in one pass.
        const STEREO = 1 << 1;
        /// Flip the depth test.
        const REVERSED_DEPTH = 1 << 2;
        /// Clip against a user plane.
        const CLIP_PLANE = 1 << 3;
    }
}

/// The pass a render task is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineType {
    /// Full geometry pass.
    #[default]
    Geometry,
    /// Depth-only pass.
    Depth,
    /// Occlusion counting.
    Counter,
    /// Shadow map rendering.
    Shadow,
    /// Shadow cube map rendering.
    ShadowCube,
    /// Environment map rendering.
    EnvMap,
    /// Mask pass.
    Mask,
}

/// A three-way filter: ignore the property, require it, or require its absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriState {
    /// The property does not affect filtering.
    #[default]
    Ignore,
    /// Only materials with the property pass.
    With,
    /// Only materials without the property pass.
    Without,
}

impl TriState {
    fn apply(self, bit: RenderTaskFilterBits, mask: &mut RenderTaskFilterBits, value: &mut RenderTaskFilterBits) {
        match self {
            TriState::Ignore => {}
            TriState::With => {
                mask.insert(bit);
                value.insert(bit);
            }
            TriState::Without => mask.insert(bit),
        }
    }
}

/// The filter-relevant state of one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialState {
    /// Renders at all.
    pub renderable: bool,
    /// Opaque.
    pub solid: bool,
    /// Casts no shadows.
    pub shadow_none: bool,
    /// Shows up in reflections.
    pub reflected: bool,
    /// Already rendered by a dynamic pass.
    pub rendered: bool,
    /// Has an outline.
    pub has_outline: bool,
    /// The outline is opaque.
    pub outline_solid: bool,
    /// Has cut-out holes.
    pub has_holes: bool,
    /// Rendered from both sides.
    pub double_sided: bool,
    /// Projected as a decal.
    pub decal: bool,
    /// Visible through walls.
    pub xray: bool,
}

impl MaterialState {
    /// An opaque, reflected, single-sided material.
    pub fn solid() -> Self {
        Self {
            renderable: true,
            solid: true,
            reflected: true,
            ..Default::default()
        }
    }

    /// A transparent, reflected, single-sided material.
    pub fn transparent() -> Self {
        Self {
            solid: false,
            ..Self::solid()
        }
    }

    /// The filter bits of this material. Decals never count as solid.
    pub fn filter_bits(&self) -> RenderTaskFilterBits {
        let flags = [
            (self.renderable, RenderTaskFilterBits::RENDER),
            (self.solid && !self.decal, RenderTaskFilterBits::SOLID),
            (self.shadow_none, RenderTaskFilterBits::SHADOW_NONE),
            (self.reflected, RenderTaskFilterBits::REFLECTED),
            (self.rendered, RenderTaskFilterBits::RENDERED),
            (self.has_outline, RenderTaskFilterBits::OUTLINE),
            (self.outline_solid, RenderTaskFilterBits::OUTLINE_SOLID),
            (self.has_holes, RenderTaskFilterBits::HOLES),
            (self.double_sided, RenderTaskFilterBits::DOUBLE_SIDED),
            (self.decal, RenderTaskFilterBits::DECAL),
            (self.xray, RenderTaskFilterBits::XRAY),
        ];
        flags
            .into_iter()
            .filter(|(set, _)| *set)
            .fold(RenderTaskFilterBits::empty(), |bits, (_, bit)| bits | bit)
    }
}

/// Configuration of one render task build.
///
/// Set the fields before building; the mask is derived on every query so the struct can be
/// mutated freely between passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTaskFilter {
    /// Which pipeline family to select from each material.
    pub pipeline_type: PipelineType,
    /// Modifiers added to every selected pipeline.
    pub pipeline_modifier: PipelineModifier,
    /// Build opaque (`true`) or transparent (`false`) geometry.
    pub solid: bool,
    /// Reject materials that cast no shadows.
    pub no_shadow_none: bool,
    /// Reject materials that do not show up in reflections.
    pub no_not_reflected: bool,
    /// Reject materials already rendered by a dynamic pass.
    pub no_rendered: bool,
    /// Build outlines instead of surfaces.
    pub outline: bool,
    /// Hole filter.
    pub holes: TriState,
    /// Double-sided filter.
    pub double_sided: TriState,
    /// Decal filter.
    pub decal: TriState,
    /// X-ray filter.
    pub xray: TriState,
    /// Render every accepted material double-sided.
    pub force_double_sided: bool,
    /// Only accept components visible from this cube face.
    pub cube_face: Option<u8>,
    /// Use this pipeline instead of the per-material one.
    pub enforced_pipeline: Option<PipelineId>,
    /// Use this parameter block index instead of the per-element one.
    pub enforced_param_block: Option<u32>,
}

impl Default for RenderTaskFilter {
    fn default() -> Self {
        Self {
            pipeline_type: PipelineType::Geometry,
            pipeline_modifier: PipelineModifier::empty(),
            solid: false,
            no_shadow_none: false,
            no_not_reflected: false,
            no_rendered: false,
            outline: false,
            holes: TriState::Ignore,
            double_sided: TriState::Ignore,
            decal: TriState::Ignore,
            xray: TriState::Ignore,
            force_double_sided: false,
            cube_face: None,
            enforced_pipeline: None,
            enforced_param_block: None,
        }
    }
}

impl RenderTaskFilter {
    /// A filter for an opaque geometry pass.
    pub fn solid_geometry() -> Self {
        Self {
            solid: true,
            ..Default::default()
        }
    }

    /// The bits this filter inspects, and the value they must have.
    pub fn mask_and_value(&self) -> (RenderTaskFilterBits, RenderTaskFilterBits) {
        let (mut mask, mut value) = self.mask_and_value_without_solidity();
        let solidity = if self.outline {
            mask |= RenderTaskFilterBits::OUTLINE | RenderTaskFilterBits::OUTLINE_SOLID;
            value |= RenderTaskFilterBits::OUTLINE;
            RenderTaskFilterBits::OUTLINE_SOLID
        } else {
            mask |= RenderTaskFilterBits::SOLID;
            RenderTaskFilterBits::SOLID
        };
        if self.solid {
            value |= solidity;
        }
        (mask, value)
    }

    fn mask_and_value_without_solidity(&self) -> (RenderTaskFilterBits, RenderTaskFilterBits) {
        let mut mask = RenderTaskFilterBits::RENDER;
        let mut value = RenderTaskFilterBits::RENDER;
        if self.no_not_reflected {
            mask |= RenderTaskFilterBits::REFLECTED;
            value |= RenderTaskFilterBits::REFLECTED;
        }
        if self.no_rendered {
            mask |= RenderTaskFilterBits::RENDERED;
        }
        if self.no_shadow_none {
            mask |= RenderTaskFilterBits::SHADOW_NONE;
        }
        self.holes.apply(RenderTaskFilterBits::HOLES, &mut mask, &mut value);
        self.double_sided
            .apply(RenderTaskFilterBits::DOUBLE_SIDED, &mut mask, &mut value);
        self.decal.apply(RenderTaskFilterBits::DECAL, &mut mask, &mut value);
        self.xray.apply(RenderTaskFilterBits::XRAY, &mut mask, &mut value);
        (mask, value)
    }

    /// `true` when `material` fails any active filter.
    pub fn rejects(&self, material: &MaterialState) -> bool {
        let (mask, value) = self.mask_and_value();
        material.filter_bits() & mask != value
    }

    /// Like [`rejects`](Self::rejects) but ignores solidity and outline state, for elements
    /// whose solidity is decided by their parent.
    pub fn rejects_ignoring_solidity(&self, material: &MaterialState) -> bool {
        let (mask, value) = self.mask_and_value_without_solidity();
        material.filter_bits() & mask != value
    }

    /// `true` when a component with the given cube face visibility mask passes the cube
    /// face filter.
    pub fn accepts_cube_faces(&self, visible_faces: u8) -> bool {
        match self.cube_face {
            Some(face) => face < 6 && visible_faces & (1 << face) != 0,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_filter_splits_solid_and_transparent() {
        let opaque = RenderTaskFilter::solid_geometry();
        let transparent = RenderTaskFilter::default();
        assert!(!opaque.rejects(&MaterialState::solid()));
        assert!(opaque.rejects(&MaterialState::transparent()));
        assert!(transparent.rejects(&MaterialState::solid()));
        assert!(!transparent.rejects(&MaterialState::transparent()));
    }

    #[test]
    fn test_unrenderable_material_is_always_rejected() {
        let material = MaterialState {
            renderable: false,
            ..MaterialState::solid()
        };
        assert!(RenderTaskFilter::solid_geometry().rejects(&material));
    }

    #[test]
    fn test_tri_states_are_independent() {
        let holed = MaterialState {
            has_holes: true,
            ..MaterialState::solid()
        };
        let plain = MaterialState::solid();
        let mut filter = RenderTaskFilter::solid_geometry();

        assert!(!filter.rejects(&holed) && !filter.rejects(&plain));
        filter.holes = TriState::With;
        assert!(!filter.rejects(&holed));
        assert!(filter.rejects(&plain));
        filter.holes = TriState::Without;
        assert!(filter.rejects(&holed));
        assert!(!filter.rejects(&plain));

        filter.holes = TriState::Ignore;
        filter.double_sided = TriState::With;
        assert!(filter.rejects(&holed));
        let two_sided = MaterialState {
            double_sided: true,
            ..holed
        };
        assert!(!filter.rejects(&two_sided));
    }

    #[test]
    fn test_exclusion_flags() {
        let mut filter = RenderTaskFilter::solid_geometry();
        let shadowless = MaterialState {
            shadow_none: true,
            ..MaterialState::solid()
        };
        let unreflected = MaterialState {
            reflected: false,
            ..MaterialState::solid()
        };
        let rendered = MaterialState {
            rendered: true,
            ..MaterialState::solid()
        };
        assert!(!filter.rejects(&shadowless));
        assert!(!filter.rejects(&unreflected));
        assert!(!filter.rejects(&rendered));

        filter.no_shadow_none = true;
        filter.no_not_reflected = true;
        filter.no_rendered = true;
        assert!(filter.rejects(&shadowless));
        assert!(filter.rejects(&unreflected));
        assert!(filter.rejects(&rendered));
        assert!(!filter.rejects(&MaterialState::solid()));
    }

    #[test]
    fn test_decals_are_never_solid() {
        let decal = MaterialState {
            decal: true,
            ..MaterialState::solid()
        };
        assert!(!decal.filter_bits().contains(RenderTaskFilterBits::SOLID));
        let mut filter = RenderTaskFilter::default();
        filter.decal = TriState::With;
        assert!(!filter.rejects(&decal));
        assert!(!filter.rejects_ignoring_solidity(&decal));
    }

    #[test]
    fn test_outline_filter() {
        let filter = RenderTaskFilter {
            outline: true,
            solid: true,
            ..Default::default()
        };
        let outlined = MaterialState {
            has_outline: true,
            outline_solid: true,
            solid: false,
            ..MaterialState::solid()
        };
        assert!(!filter.rejects(&outlined));
        assert!(filter.rejects(&MaterialState::solid()));
    }

    #[test]
    fn test_cube_face_filter() {
        let mut filter = RenderTaskFilter::default();
        assert!(filter.accepts_cube_faces(0));
        filter.cube_face = Some(2);
        assert!(filter.accepts_cube_faces(0b100));
        assert!(!filter.accepts_cube_faces(0b011));
    }
}
