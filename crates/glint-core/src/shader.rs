//! Shader stage compilation.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::context::GpuContext;
use crate::device::{Device, RawShader, ShaderStage};
use crate::error::{Error, Result};

/// A named include registered under a virtual path before the dependent
/// shader compiles, enabling textual inclusion.
pub struct ShaderInclude {
    path: String,
    source: String,
}

impl ShaderInclude {
    /// Create an include from literal text or a file path — a
    /// whitespace-free string with a recognized shader extension is read
    /// from disk. The full text is held in memory before registration.
    pub fn new(path: &str, source: &str) -> Result<Self> {
        Ok(Self {
            path: path.to_owned(),
            source: load_source(source)?.into_owned(),
        })
    }
}

/// One compiled pipeline stage. Immutable after successful compilation.
pub struct Shader {
    ctx: GpuContext,
    raw: RawShader,
    stage: ShaderStage,
}

impl Shader {
    /// Compile a stage from literal source text or a file path
    /// (distinguished by a recognized shader extension on a
    /// whitespace-free string).
    ///
    /// On compile failure the device diagnostic log is captured, the
    /// partially created stage object is destroyed and [`Error::Compile`]
    /// is returned — unrecoverable for this instance.
    pub fn new(ctx: &GpuContext, stage: ShaderStage, source: &str) -> Result<Self> {
        Self::with_includes(ctx, stage, source, &[])
    }

    /// Like [`Shader::new`], registering each include under its virtual
    /// path first.
    pub fn with_includes(
        ctx: &GpuContext,
        stage: ShaderStage,
        source: &str,
        includes: &[ShaderInclude],
    ) -> Result<Self> {
        for include in includes {
            ctx.device().register_include(&include.path, &include.source);
        }

        let source = load_source(source)?;
        let raw = ctx.device().create_shader(stage);
        ctx.device().shader_source(raw, &source);
        if !ctx.device().compile_shader(raw) {
            let log = ctx.device().shader_info_log(raw);
            ctx.device().delete_shader(raw);
            return Err(Error::Compile { stage, log });
        }
        debug!(?stage, id = raw.0, "shader compiled");

        Ok(Self {
            ctx: ctx.clone(),
            raw,
            stage,
        })
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn raw(&self) -> RawShader {
        self.raw
    }

    pub(crate) fn ctx(&self) -> &GpuContext {
        &self.ctx
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.ctx.device().delete_shader(self.raw);
    }
}

/// Extensions recognized as shader source files on disk.
const SOURCE_EXTENSIONS: [&str; 7] = ["vert", "frag", "geom", "tesc", "tese", "comp", "glsl"];

/// Resolve a source argument: a whitespace-free string carrying a
/// recognized shader extension names a file on disk, anything else is
/// literal source text.
fn load_source(source: &str) -> Result<Cow<'_, str>> {
    if looks_like_path(source) {
        let text = fs::read_to_string(source)
            .map_err(|_| Error::ResourceNotFound(source.to_owned()))?;
        Ok(Cow::Owned(text))
    } else {
        Ok(Cow::Borrowed(source))
    }
}

/// GLSL text is full of dots (float literals, swizzles), so an extension
/// alone cannot discriminate. A path must be free of whitespace and end in
/// one of the known shader extensions; everything else is literal source.
fn looks_like_path(source: &str) -> bool {
    if source.chars().any(char::is_whitespace) {
        return false;
    }
    Path::new(source)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}
