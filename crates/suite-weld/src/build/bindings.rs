//! BindingBuilder: one generation run from declaration files to written output
//!
//! Discovers declaration files, extracts and filters suites, builds the
//! marshaling model and runs every generator. Nothing is written until
//! [`BindingBuilder::build`]; [`BindingBuilder::generate`] keeps the whole
//! result in memory.

use crate::codegen::{
    ClientGenerator, IndexGenerator, NativeGenerator, CLIENT_INDEX, CMAKE_FRAGMENT, ROUTER_HEADER,
    ROUTER_SOURCE,
};
use crate::config::TypeMapConfig;
use crate::error::WeldError;
use crate::extract::Extractor;
use crate::ir::SuiteDescriptor;
use crate::model::{MarshalSuite, ModelBuilder, SkippedFunction};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions of declaration files picked up from input directories
const DECLARATION_EXTENSIONS: &[&str] = &["h", "hpp"];

/// Which output directory a generated file belongs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    Native,
    Client,
}

/// One generated file, not yet written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub target: OutputTarget,
    pub name: String,
    pub contents: String,
}

impl GeneratedFile {
    fn native(name: impl Into<String>, contents: String) -> Self {
        Self {
            target: OutputTarget::Native,
            name: name.into(),
            contents,
        }
    }

    fn client(name: impl Into<String>, contents: String) -> Self {
        Self {
            target: OutputTarget::Client,
            name: name.into(),
            contents,
        }
    }
}

/// Outcome for one generated suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    pub name: String,
    /// Declaration file the suite was taken from
    pub origin: String,
    pub generated: Vec<String>,
    pub skipped: Vec<SkippedFunction>,
}

/// A declaration source left out of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSource {
    pub origin: String,
    pub reason: String,
}

/// Summary of a generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub suites: Vec<SuiteReport>,
    /// Number of declaration sources read
    pub sources_scanned: usize,
    /// Sources that could not be decoded or parsed; the run continued without them
    pub failed_sources: Vec<FailedSource>,
    /// Suites dropped in favour of a newer version
    pub superseded: Vec<String>,
    /// Suites found more than once; the first declaration was kept
    pub duplicates: Vec<String>,
}

impl BuildReport {
    /// Functions generated across all suites
    pub fn generated_count(&self) -> usize {
        self.suites.iter().map(|s| s.generated.len()).sum()
    }

    /// Functions skipped across all suites
    pub fn skipped_count(&self) -> usize {
        self.suites.iter().map(|s| s.skipped.len()).sum()
    }

    fn source_failed(&mut self, origin: String, reason: String) {
        warn!(origin = %origin, reason = %reason, "declaration source skipped");
        self.failed_sources.push(FailedSource { origin, reason });
    }
}

/// Generated files plus the run report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub files: Vec<GeneratedFile>,
    pub report: BuildReport,
}

impl BuildOutput {
    /// Generated file by name
    pub fn file(&self, name: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Builder for a binding generation run
///
/// # Example
/// ```ignore
/// use suite_weld::{BindingBuilder, TypeMapConfig};
///
/// let config = TypeMapConfig::load("types.json")?;
/// let output = BindingBuilder::new(config)
///     .input("sdk/Headers")
///     .native_out("bridge/generated")
///     .client_out("client/src/suites")
///     .build()?;
/// println!("{} functions generated", output.report.generated_count());
/// ```
pub struct BindingBuilder {
    config: TypeMapConfig,
    inputs: Vec<PathBuf>,
    sources: Vec<(String, String)>,
    only: Vec<String>,
    exclude: Vec<String>,
    latest_versions_only: bool,
    native_out: PathBuf,
    client_out: PathBuf,
}

impl BindingBuilder {
    /// Run over `config` with default output directories and no inputs
    pub fn new(config: TypeMapConfig) -> Self {
        Self {
            config,
            inputs: Vec::new(),
            sources: Vec::new(),
            only: Vec::new(),
            exclude: Vec::new(),
            latest_versions_only: true,
            native_out: PathBuf::from("generated/native"),
            client_out: PathBuf::from("generated/client"),
        }
    }

    /// Add a declaration file, or a directory searched recursively
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add declaration source held in memory; `origin` labels diagnostics
    pub fn source(mut self, origin: impl Into<String>, text: impl Into<String>) -> Self {
        self.sources.push((origin.into(), text.into()));
        self
    }

    /// Restrict generation to this suite (full or short name); repeatable
    pub fn only(mut self, suite: impl Into<String>) -> Self {
        self.only.push(suite.into());
        self
    }

    /// Leave this suite (full or short name) out; repeatable
    pub fn exclude(mut self, suite: impl Into<String>) -> Self {
        self.exclude.push(suite.into());
        self
    }

    /// Keep only the highest version of suites sharing a short name
    pub fn latest_versions_only(mut self, latest: bool) -> Self {
        self.latest_versions_only = latest;
        self
    }

    /// Directory receiving native wrappers, the router and the CMake fragment
    pub fn native_out(mut self, dir: impl AsRef<Path>) -> Self {
        self.native_out = dir.as_ref().to_path_buf();
        self
    }

    /// Directory receiving client modules and the client index
    pub fn client_out(mut self, dir: impl AsRef<Path>) -> Self {
        self.client_out = dir.as_ref().to_path_buf();
        self
    }

    /// Run the pipeline and keep every generated file in memory
    pub fn generate(&self) -> Result<BuildOutput, WeldError> {
        let mut report = BuildReport::default();
        let mut extractor = Extractor::new(&self.config.conventions)?;
        let mut found: IndexMap<String, (SuiteDescriptor, String)> = IndexMap::new();

        let mut sources = Vec::new();
        for path in self.declaration_files()? {
            let bytes = fs::read(&path).map_err(|source| WeldError::Read {
                path: path.clone(),
                source,
            })?;
            let origin = path.display().to_string();
            match String::from_utf8(bytes) {
                Ok(text) => sources.push((origin, text)),
                Err(e) => {
                    report.sources_scanned += 1;
                    report.source_failed(origin, format!("not valid UTF-8: {}", e.utf8_error()));
                }
            }
        }
        sources.extend(self.sources.iter().cloned());

        for (origin, text) in &sources {
            report.sources_scanned += 1;
            let suites = match extractor.extract(origin, text) {
                Ok(suites) => suites,
                Err(e) => {
                    report.source_failed(origin.clone(), e.to_string());
                    continue;
                }
            };
            for suite in suites {
                if let Some((_, first)) = found.get(&suite.name) {
                    warn!(
                        suite = %suite.name,
                        kept = %first,
                        ignored = %origin,
                        "suite declared more than once"
                    );
                    report.duplicates.push(suite.name.clone());
                    continue;
                }
                found.insert(suite.name.clone(), (suite, origin.clone()));
            }
        }

        let selected = self.select(found, &mut report);

        let model_builder = ModelBuilder::new(&self.config);
        let structs = self.config.struct_field_table();
        let conventions = &self.config.conventions;
        let mut models: Vec<MarshalSuite> = Vec::new();
        let mut files = Vec::new();

        for (suite, origin) in selected.values() {
            let model = model_builder.build(suite);

            let native = NativeGenerator::new(&model, conventions, &structs).generate();
            files.push(GeneratedFile::native(native.header_name, native.header));
            files.push(GeneratedFile::native(native.source_name, native.source));

            let client = ClientGenerator::new(&model, conventions, &structs);
            files.push(GeneratedFile::client(client.file_name(), client.generate()));

            report.suites.push(SuiteReport {
                name: model.name.clone(),
                origin: origin.clone(),
                generated: model.functions.iter().map(|f| f.native_name.clone()).collect(),
                skipped: model.skipped.clone(),
            });
            models.push(model);
        }

        let index = IndexGenerator::new(&models, conventions);
        files.push(GeneratedFile::client(CLIENT_INDEX, index.client_index()));
        files.push(GeneratedFile::native(ROUTER_HEADER, index.router_header()));
        files.push(GeneratedFile::native(ROUTER_SOURCE, index.router_source()));
        files.push(GeneratedFile::native(CMAKE_FRAGMENT, index.cmake_sources()));

        info!(
            sources = report.sources_scanned,
            suites = report.suites.len(),
            generated = report.generated_count(),
            skipped = report.skipped_count(),
            failed_sources = report.failed_sources.len(),
            "generation complete"
        );

        Ok(BuildOutput { files, report })
    }

    /// Run the pipeline and write every file under its output directory
    pub fn build(&self) -> Result<BuildOutput, WeldError> {
        let output = self.generate()?;

        for dir in [&self.native_out, &self.client_out] {
            fs::create_dir_all(dir).map_err(|source| WeldError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }

        for file in &output.files {
            let path = self.output_path(file);
            fs::write(&path, &file.contents).map_err(|source| WeldError::Write {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "wrote generated file");
        }

        info!(
            files = output.files.len(),
            native_out = %self.native_out.display(),
            client_out = %self.client_out.display(),
            "wrote generated files"
        );
        Ok(output)
    }

    /// Destination of a generated file
    pub fn output_path(&self, file: &GeneratedFile) -> PathBuf {
        match file.target {
            OutputTarget::Native => self.native_out.join(&file.name),
            OutputTarget::Client => self.client_out.join(&file.name),
        }
    }

    /// Declaration files under every input, sorted
    fn declaration_files(&self) -> Result<Vec<PathBuf>, WeldError> {
        let mut files = Vec::new();
        for input in &self.inputs {
            if input.is_file() {
                files.push(input.clone());
                continue;
            }
            if !input.exists() {
                return Err(WeldError::Scan {
                    path: input.clone(),
                    message: "no such file or directory".to_string(),
                });
            }
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.map_err(|e| WeldError::Scan {
                    path: input.clone(),
                    message: e.to_string(),
                })?;
                let is_declaration = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| DECLARATION_EXTENSIONS.contains(&e));
                if entry.file_type().is_file() && is_declaration {
                    files.push(entry.into_path());
                }
            }
        }
        files.sort();
        files.dedup();
        debug!(count = files.len(), "declaration files found");
        Ok(files)
    }

    fn matches(&self, names: &[String], suite: &str) -> bool {
        let short = self.config.conventions.short_suite_name(suite);
        names.iter().any(|n| *n == suite || *n == short)
    }

    /// Apply the name filters and the latest-version rule; result is sorted by name
    fn select(
        &self,
        found: IndexMap<String, (SuiteDescriptor, String)>,
        report: &mut BuildReport,
    ) -> IndexMap<String, (SuiteDescriptor, String)> {
        let conventions = &self.config.conventions;

        for wanted in &self.only {
            let present = found
                .keys()
                .any(|name| self.matches(std::slice::from_ref(wanted), name));
            if !present {
                warn!(suite = %wanted, "requested suite not found");
            }
        }

        let mut selected: IndexMap<String, (SuiteDescriptor, String)> = found
            .into_iter()
            .filter(|(name, _)| self.only.is_empty() || self.matches(&self.only, name))
            .filter(|(name, _)| !self.matches(&self.exclude, name))
            .collect();

        if self.latest_versions_only {
            let mut newest: IndexMap<String, (String, u32)> = IndexMap::new();
            for name in selected.keys() {
                let short = conventions.short_suite_name(name);
                let version = conventions.suite_version(name).unwrap_or(0);
                match newest.get(&short) {
                    Some((_, best)) if *best >= version => {}
                    _ => {
                        newest.insert(short, (name.clone(), version));
                    }
                }
            }
            let keep: Vec<&String> = newest.values().map(|(name, _)| name).collect();
            let superseded: Vec<String> = selected
                .keys()
                .filter(|name| !keep.contains(name))
                .cloned()
                .collect();
            for name in &superseded {
                debug!(suite = %name, "superseded by a newer version");
                selected.shift_remove(name);
            }
            report.superseded = superseded;
        }

        selected.sort_keys();
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::WirePrimitive;
    use crate::model::SkipReason;
    use pretty_assertions::assert_eq;

    const WIDGETS: &str = r#"
typedef struct {
    SPAPI A_Err (*GetWidgetCount)(ExampleWidgetH widget, A_long *count);
    SPAPI ExampleWidgetH (*GetDefaultWidget)(void);
    SPAPI A_Err (*GetMystery)(PF_Mystery mystery);
} ExampleSuite;
"#;

    const LAYERS: &str = r#"
typedef struct {
    SPAPI A_Err (*AEGP_GetLayerIndex)(AEGP_LayerH layerH, A_long *indexP);
} AEGP_LayerSuite8;

typedef struct {
    SPAPI A_Err (*AEGP_GetLayerIndex)(AEGP_LayerH layerH, A_long *indexP);
    SPAPI A_Err (*AEGP_SetLayerParent)(AEGP_LayerH layerH, AEGP_LayerH parent_layerH);
} AEGP_LayerSuite9;
"#;

    fn config() -> TypeMapConfig {
        TypeMapConfig::new()
            .handle("ExampleWidgetH", "widgets")
            .handle("AEGP_LayerH", "layers")
            .primitive("A_long", WirePrimitive::Int32)
    }

    #[test]
    fn test_generate_example_suite() {
        let output = BindingBuilder::new(config())
            .source("widgets.h", WIDGETS)
            .generate()
            .unwrap();

        let names: Vec<_> = output.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "ExampleSuiteBridge.h",
                "ExampleSuiteBridge.cpp",
                "ExampleSuite.ts",
                "index.ts",
                "SuiteRouter.h",
                "SuiteRouter.cpp",
                "SuiteBridgeSources.cmake",
            ]
        );

        let report = &output.report.suites[0];
        assert_eq!(report.generated, vec!["GetWidgetCount", "GetDefaultWidget"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(
            report.skipped[0].reason,
            SkipReason::UnknownParameter { .. }
        ));

        let ts = &output.file("ExampleSuite.ts").unwrap().contents;
        assert!(ts.contains("export async function GetWidgetCount(widget: number): Promise<number>"));
        assert!(ts.contains("export async function GetDefaultWidget(): Promise<number>"));
        assert!(!ts.contains("GetMystery"));

        let index = &output.file("index.ts").unwrap().contents;
        assert!(index.contains("export * as Example from \"./ExampleSuite\";"));
    }

    #[test]
    fn test_latest_versions_only() {
        let output = BindingBuilder::new(config())
            .source("layers.h", LAYERS)
            .generate()
            .unwrap();
        let suites: Vec<_> = output.report.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(suites, vec!["AEGP_LayerSuite9"]);
        assert_eq!(output.report.superseded, vec!["AEGP_LayerSuite8".to_string()]);

        let all = BindingBuilder::new(config())
            .source("layers.h", LAYERS)
            .latest_versions_only(false)
            .generate()
            .unwrap();
        assert_eq!(all.report.suites.len(), 2);
    }

    #[test]
    fn test_filters_and_duplicates() {
        let output = BindingBuilder::new(config())
            .source("widgets.h", WIDGETS)
            .source("layers.h", LAYERS)
            .source("copy.h", WIDGETS)
            .exclude("Layer")
            .generate()
            .unwrap();
        let suites: Vec<_> = output.report.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(suites, vec!["ExampleSuite"]);
        assert_eq!(output.report.suites[0].origin, "widgets.h");
        assert_eq!(output.report.duplicates, vec!["ExampleSuite".to_string()]);

        let only = BindingBuilder::new(config())
            .source("widgets.h", WIDGETS)
            .source("layers.h", LAYERS)
            .only("AEGP_LayerSuite9")
            .generate()
            .unwrap();
        let suites: Vec<_> = only.report.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(suites, vec!["AEGP_LayerSuite9"]);
    }

    #[test]
    fn test_build_writes_files() {
        let headers = tempfile::tempdir().unwrap();
        let nested = headers.path().join("sdk");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Widgets.h"), WIDGETS).unwrap();
        fs::write(nested.join("notes.txt"), "typedef struct { } NotesSuite;").unwrap();

        let out = tempfile::tempdir().unwrap();
        let native = out.path().join("native");
        let client = out.path().join("client");

        let output = BindingBuilder::new(config())
            .input(headers.path())
            .native_out(&native)
            .client_out(&client)
            .build()
            .unwrap();

        assert_eq!(output.report.sources_scanned, 1);
        assert!(native.join("ExampleSuiteBridge.cpp").is_file());
        assert!(native.join("SuiteBridgeSources.cmake").is_file());
        assert!(client.join("ExampleSuite.ts").is_file());
        assert!(client.join("index.ts").is_file());
        let cpp = fs::read_to_string(native.join("ExampleSuiteBridge.cpp")).unwrap();
        assert!(cpp.contains("Json ExampleSuite_GetWidgetCount(const Json& args)"));
    }

    #[test]
    fn test_missing_input_names_path() {
        let err = BindingBuilder::new(config())
            .input("/definitely/not/here")
            .generate()
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here"));
    }

    #[test]
    fn test_pointer_returning_slots_are_reported() {
        let source = r#"
typedef struct {
    SPAPI const char* (*GetLabel)(void);
    SPAPI ExampleWidgetH* (*GetPtr)(void);
    SPAPI A_Err (*Ping)(void);
} ExampleSuite;
"#;
        let output = BindingBuilder::new(config())
            .source("ptr.h", source)
            .generate()
            .unwrap();
        let report = &output.report.suites[0];
        assert_eq!(report.generated, vec!["GetLabel", "Ping"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "GetPtr");
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::UnsupportedReturn("ExampleWidgetH*".into())
        );
    }

    #[test]
    fn test_undecodable_source_is_recorded() {
        let headers = tempfile::tempdir().unwrap();
        fs::write(headers.path().join("Widgets.h"), WIDGETS).unwrap();
        let mut latin1 = b"/* \xa9 1992 */\n".to_vec();
        latin1.extend_from_slice(LAYERS.as_bytes());
        fs::write(headers.path().join("Layers.h"), latin1).unwrap();

        let output = BindingBuilder::new(config())
            .input(headers.path())
            .generate()
            .unwrap();

        assert_eq!(output.report.sources_scanned, 2);
        assert_eq!(output.report.failed_sources.len(), 1);
        let failed = &output.report.failed_sources[0];
        assert!(failed.origin.ends_with("Layers.h"));
        assert!(failed.reason.starts_with("not valid UTF-8"));

        let suites: Vec<_> = output.report.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(suites, vec!["ExampleSuite"]);
    }
}
