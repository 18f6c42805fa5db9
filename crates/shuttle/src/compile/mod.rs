//! Manifest compilation and the compiled-output cache.

mod compiler;
mod manifest;
mod service;

pub use compiler::{Compiler, JsonManifestCompiler, YamlManifestCompiler};
pub use manifest::{build_manifest, Manifest};
pub use service::CompileService;
