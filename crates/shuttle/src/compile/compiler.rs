use super::Manifest;
use crate::error::CompileError;

/// Renders a manifest into a distributable format.
pub trait Compiler: Send + Sync {
    fn format(&self) -> &'static str;

    fn compile(&self, manifest: &Manifest) -> Result<String, CompileError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonManifestCompiler;

impl Compiler for JsonManifestCompiler {
    fn format(&self) -> &'static str {
        "json"
    }

    fn compile(&self, manifest: &Manifest) -> Result<String, CompileError> {
        serde_json::to_string_pretty(&manifest.locales).map_err(|e| CompileError::Serialize(e.to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlManifestCompiler;

impl Compiler for YamlManifestCompiler {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn compile(&self, manifest: &Manifest) -> Result<String, CompileError> {
        serde_yaml::to_string(&manifest.locales).map_err(|e| CompileError::Serialize(e.to_string()))
    }
}
