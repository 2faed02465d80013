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

//! Capability negotiation between logical formats and what the active GPU supports.

use super::texture::{FormatUsage, TextureKind};
use super::texture_format::{LogicalFormat, NativeFormat, TextureFormat};
use crate::renderer::error::TextureError;
use crate::renderer::traits::TextureBackend;
use std::collections::HashMap;

type TableKey = (TextureKind, FormatUsage, LogicalFormat);

/// Logical formats that fall back to another logical format's mapping when they have
/// none of their own. Applied in order, so later entries see earlier results.
const FALLBACKS: [(LogicalFormat, LogicalFormat); 12] = {
    use LogicalFormat::*;
    [
        (R8S, R8),
        (Rg8S, Rg8),
        (Rgb8S, Rgb8),
        (Rgba8S, Rgba8),
        (R16F, R32F),
        (Rg16F, Rg32F),
        (Rgb16F, Rgb32F),
        (Rgba16F, Rgba32F),
        (Depth, DepthF),
        (DepthStencil, DepthFStencil),
        (Depth, DepthStencil),
        (Depth16, Depth),
    ]
};

/// Logical formats every GPU must provide for every kind and usage.
const REQUIRED: [LogicalFormat; 10] = {
    use LogicalFormat::*;
    [R8, R16F, Rg8, Rg16F, Rgb8, Rgb16F, Rgba8, Rgba16F, Depth, Depth16]
};

/// Ordered native candidates for a logical format. The first supported one wins.
fn candidates(logical: LogicalFormat) -> &'static [NativeFormat] {
    use LogicalFormat as L;
    use NativeFormat as N;
    match logical {
        L::R8 => &[N::R8Unorm],
        L::R16 => &[N::R16Unorm],
        L::R8C => &[N::Bc4RUnorm, N::R8Unorm],
        L::R16F => &[N::R16Float],
        L::R32F => &[N::R32Float],
        L::R8I => &[N::R8Sint],
        L::R16I => &[N::R16Sint],
        L::R8Ui => &[N::R8Uint],
        L::R16Ui => &[N::R16Uint],
        L::R8S => &[N::R8Snorm],
        L::R16S => &[N::R16Snorm],
        L::Rg8 => &[N::Rg8Unorm],
        L::Rg16 => &[N::Rg16Unorm],
        L::Rg8C => &[N::Bc5RgUnorm, N::Rg8Unorm],
        L::Rg16F => &[N::Rg16Float],
        L::Rg32F => &[N::Rg32Float],
        L::Rg8I => &[N::Rg8Sint],
        L::Rg16I => &[N::Rg16Sint],
        L::Rg8Ui => &[N::Rg8Uint],
        L::Rg16Ui => &[N::Rg16Uint],
        L::Rg8S => &[N::Rg8Snorm],
        L::Rg16S => &[N::Rg16Snorm],
        L::R3G3B2 | L::Rgb4 | L::Rgb5 | L::Rgb8 => &[N::Rgb8Unorm, N::Rgba8Unorm],
        L::Rgb16 => &[N::Rgba16Unorm],
        L::Rgb8C => &[
            N::Bc1RgbaUnorm,
            N::Etc2Rgb8Unorm,
            N::Rgb8Unorm,
            N::Rgba8Unorm,
        ],
        L::Rg11B10F => &[N::Rg11b10Float, N::Rgba16Float],
        L::Rgb16F => &[N::Rgb16Float, N::Rgba16Float],
        L::Rgb32F => &[N::Rgb32Float, N::Rgba32Float],
        L::Rgb8I => &[N::Rgba8Sint],
        L::Rgb16I => &[N::Rgba16Sint],
        L::Rgb8Ui => &[N::Rgba8Uint],
        L::Rgb16Ui => &[N::Rgba16Uint],
        L::Rgb8S => &[N::Rgb8Snorm, N::Rgba8Snorm],
        L::Rgb16S => &[N::Rgba16Snorm],
        L::Rgba2 | L::Rgba4 | L::Rgb5A1 | L::Rgba8 => &[N::Rgba8Unorm],
        L::Rgb10A2 => &[N::Rgb10a2Unorm, N::Rgba16Unorm],
        L::Rgba16 => &[N::Rgba16Unorm],
        L::Rgba8C => &[N::Bc2RgbaUnorm, N::Etc2Rgba8Unorm, N::Rgba8Unorm],
        L::Rgba16F => &[N::Rgba16Float],
        L::Rgba32F => &[N::Rgba32Float],
        L::Rgba8I => &[N::Rgba8Sint],
        L::Rgba16I => &[N::Rgba16Sint],
        L::Rgba8Ui => &[N::Rgba8Uint],
        L::Rgba16Ui => &[N::Rgba16Uint],
        L::Rgba8S => &[N::Rgba8Snorm],
        L::Rgba16S => &[N::Rgba16Snorm],
        L::Depth => &[N::Depth24Plus, N::Depth16Unorm],
        L::DepthF => &[N::Depth32Float],
        L::DepthStencil => &[N::Depth24PlusStencil8],
        L::DepthFStencil => &[N::Depth32FloatStencil8],
        L::Stencil => &[N::Stencil8],
        L::Depth16 => &[N::Depth16Unorm],
    }
}

/// The result of probing a backend: for every texture kind and usage, the native format
/// each logical format resolves to.
///
/// Built once on the render thread, then shared read-only through `Arc`.
#[derive(Debug, Clone, Default)]
pub struct FormatTable {
    entries: HashMap<TableKey, NativeFormat>,
}

impl FormatTable {
    /// Probes `backend` and builds the table.
    ///
    /// ## Errors
    /// * `TextureError::UnsupportedOperation` - If a required logical format has no native
    ///   mapping for some kind and usage, even after the fallback chain.
    pub fn detect(backend: &dyn TextureBackend) -> Result<Self, TextureError> {
        let mut table = Self::default();

        for kind in TextureKind::ALL {
            for usage in [FormatUsage::Mapping, FormatUsage::Fbo] {
                for logical in LogicalFormat::ALL {
                    let found = candidates(logical).iter().copied().find(|native| {
                        (usage == FormatUsage::Mapping || !native.is_compressed())
                            && backend.supports_format(kind, *native, usage)
                    });
                    if let Some(native) = found {
                        table.entries.insert((kind, usage, logical), native);
                    }
                }
                table.apply_fallbacks(kind, usage);
            }
        }

        table.verify_required(&backend.backend_name())?;
        log::info!(
            "FormatTable: detected {} format mappings on backend '{}'",
            table.entries.len(),
            backend.backend_name()
        );
        Ok(table)
    }

    /// Builds a table from explicit mappings. Fallbacks are not applied.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (TextureKind, FormatUsage, LogicalFormat, NativeFormat)>,
    ) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(kind, usage, logical, native)| ((kind, usage, logical), native))
                .collect(),
        }
    }

    fn apply_fallbacks(&mut self, kind: TextureKind, usage: FormatUsage) {
        for (missing, source) in FALLBACKS {
            if self.entries.contains_key(&(kind, usage, missing)) {
                continue;
            }
            if let Some(native) = self.entries.get(&(kind, usage, source)).copied() {
                log::debug!(
                    "FormatTable: {} {:?} {:?} falls back to {:?} ({:?})",
                    kind.label(),
                    usage,
                    missing,
                    source,
                    native
                );
                self.entries.insert((kind, usage, missing), native);
            }
        }
    }

    fn verify_required(&self, backend_name: &str) -> Result<(), TextureError> {
        let mut missing = Vec::new();
        for kind in TextureKind::ALL {
            for usage in [FormatUsage::Mapping, FormatUsage::Fbo] {
                let extra = (kind != TextureKind::Cube).then_some(LogicalFormat::DepthStencil);
                for logical in REQUIRED.into_iter().chain(extra) {
                    if !self.entries.contains_key(&(kind, usage, logical)) {
                        missing.push(format!("{} {:?} {:?}", kind.label(), usage, logical));
                    }
                }
            }
        }

        if missing.is_empty() {
            return Ok(());
        }

        let mut supported: Vec<String> = self
            .entries
            .iter()
            .map(|((kind, usage, logical), native)| {
                format!("{} {:?} {:?} -> {:?}", kind.label(), usage, logical, native)
            })
            .collect();
        supported.sort();
        log::error!(
            "FormatTable: backend '{}' lacks required formats [{}]. Supported: [{}]",
            backend_name,
            missing.join(", "),
            supported.join(", ")
        );
        Err(TextureError::unsupported(format!(
            "required texture formats not supported: {}",
            missing.join(", ")
        )))
    }

    /// Resolves a logical format for a texture kind and usage.
    ///
    /// ## Errors
    /// * `TextureError::UnsupportedOperation` - If no native mapping exists.
    pub fn resolve(
        &self,
        kind: TextureKind,
        logical: LogicalFormat,
        usage: FormatUsage,
    ) -> Result<TextureFormat, TextureError> {
        self.entries
            .get(&(kind, usage, logical))
            .map(|native| TextureFormat::resolved(*native, logical))
            .ok_or_else(|| {
                TextureError::unsupported(format!(
                    "no {:?} mapping for {:?} on {} textures",
                    usage,
                    logical,
                    kind.label()
                ))
            })
    }

    /// `true` if `logical` resolves for `kind` and `usage`.
    pub fn supports(&self, kind: TextureKind, logical: LogicalFormat, usage: FormatUsage) -> bool {
        self.entries.contains_key(&(kind, usage, logical))
    }

    /// Number of resolved mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
