//! Template files (YAML or JSON)
//!
//! A template file mirrors the [`NodeSpec`] builder: one nested node per
//! container, with element metadata on `data_element` nodes. Code lists are
//! given inline (`codes`) or in a text file next to the template
//! (`code_file`). Files are loaded from the path given; there is no search
//! path.

use crate::builder::{NodeSpec, TreeBuilder};
use crate::callbacks::CallbackRegistry;
use crate::control::ControlLink;
use crate::registry::TemplateRegistry;
use crate::rules::ElementRule;
use crate::template::{ElementOptions, Prevalidation, TemplateTree};
use crate::{Error, Result};
use edi_ir::{CodeList, ContainerType, ElementKind, ElementSpec, FileCodeList, InMemoryCodeList, Occurs};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Serializable template format
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateFile {
    name: String,
    #[serde(default)]
    options: ElementOptions,
    root: NodeFile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeFile {
    kind: ContainerType,
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    occurs: Option<OccursFile>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    unused: bool,
    #[serde(default)]
    sequence: Option<usize>,
    #[serde(default)]
    prevalidate: Option<Prevalidation>,
    #[serde(default)]
    rules: Vec<String>,
    #[serde(default)]
    control: Option<ControlLink>,
    #[serde(default, rename = "type")]
    data_type: Option<String>,
    #[serde(default)]
    min: Option<usize>,
    #[serde(default)]
    max: Option<usize>,
    #[serde(default)]
    codes: Option<CodesFile>,
    #[serde(default)]
    code_file: Option<PathBuf>,
    #[serde(default)]
    check: Option<String>,
    #[serde(default)]
    preserve_precision: bool,
    #[serde(default, alias = "fields")]
    children: Vec<NodeFile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OccursFile {
    Count(usize),
    Text(String),
}

impl OccursFile {
    fn resolve(&self, id: &str) -> Result<Occurs> {
        match self {
            OccursFile::Count(0) => Err(Error::InvalidFormat(format!(
                "'{id}': occurs must be at least 1"
            ))),
            OccursFile::Count(n) => Ok(Occurs::Bounded(*n)),
            OccursFile::Text(text) => text
                .parse()
                .map_err(|e| Error::InvalidFormat(format!("'{id}': {e}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodesFile {
    List(Vec<String>),
    Described(BTreeMap<String, String>),
}

/// Reads template files into [`TemplateTree`]s
#[derive(Debug, Default)]
pub struct TemplateLoader {
    callbacks: CallbackRegistry,
    registry: Arc<TemplateRegistry>,
}

impl TemplateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `callbacks` to resolve `check` names
    #[must_use]
    pub fn with_callbacks(mut self, callbacks: CallbackRegistry) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Cache loaded trees in a shared registry
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<TemplateRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    /// Load a template file, using the registry as a cache keyed by path
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not describe a valid
    /// template.
    pub fn load_file(&self, path: &Path) -> Result<Arc<TemplateTree>> {
        let key = path.display().to_string();
        self.registry.get_or_build(&key, || {
            trace!("Loading template from file: {:?}", path);
            let content = std::fs::read_to_string(path)?;
            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let is_yaml = path
                .extension()
                .is_some_and(|e| e == "yaml" || e == "yml");
            let file = if is_yaml {
                parse_yaml(&content)?
            } else {
                parse_json(&content)?
            };
            let tree = self.convert(file, &base)?;
            info!(template = %tree.name(), path = %key, "Loaded template");
            Ok(tree)
        })
    }

    /// Build a template from YAML text; code files resolve against `.`
    ///
    /// # Errors
    ///
    /// Fails for malformed YAML or an invalid template.
    pub fn from_yaml(&self, yaml: &str) -> Result<TemplateTree> {
        self.convert(parse_yaml(yaml)?, Path::new("."))
    }

    /// Build a template from JSON text; code files resolve against `.`
    ///
    /// # Errors
    ///
    /// Fails for malformed JSON or an invalid template.
    pub fn from_json(&self, json: &str) -> Result<TemplateTree> {
        self.convert(parse_json(json)?, Path::new("."))
    }

    fn convert(&self, file: TemplateFile, base: &Path) -> Result<TemplateTree> {
        let mut code_files = HashMap::new();
        let root = convert_node(file.root, base, &mut code_files)?;
        TreeBuilder::new(file.name)
            .callbacks(self.callbacks.clone())
            .options(file.options)
            .build(root)
    }
}

fn parse_yaml(yaml: &str) -> Result<TemplateFile> {
    serde_yaml::from_str(yaml).map_err(|e| Error::InvalidFormat(format!("YAML parse error: {}", e)))
}

fn parse_json(json: &str) -> Result<TemplateFile> {
    serde_json::from_str(json).map_err(|e| Error::InvalidFormat(format!("JSON parse error: {}", e)))
}

fn convert_node(
    file: NodeFile,
    base: &Path,
    code_files: &mut HashMap<PathBuf, Arc<dyn CodeList>>,
) -> Result<NodeSpec> {
    let mut node = if file.kind == ContainerType::DataElement {
        NodeSpec::element(element_spec(&file, base, code_files)?)
    } else {
        NodeSpec::new(file.kind, file.id.clone())
    };

    if let Some(name) = &file.name {
        node = node.named(name.clone());
    }
    if let Some(occurs) = &file.occurs {
        node = node.occurs(occurs.resolve(&file.id)?);
    }
    if file.required {
        node = node.required();
    }
    if file.unused {
        node = node.unused();
    }
    if let Some(sequence) = file.sequence {
        node = node.sequence(sequence);
    }
    if let Some(check) = &file.check {
        node = node.check(check.clone());
    }
    node.prevalidate = file.prevalidate;
    node.control = file.control;
    for rule in &file.rules {
        node = node.rule(rule.parse::<ElementRule>()?);
    }
    for child in file.children {
        node = node.child(convert_node(child, base, code_files)?);
    }
    Ok(node)
}

fn element_spec(
    file: &NodeFile,
    base: &Path,
    code_files: &mut HashMap<PathBuf, Arc<dyn CodeList>>,
) -> Result<ElementSpec> {
    let kind: ElementKind = file
        .data_type
        .as_deref()
        .unwrap_or("AN")
        .parse()?;
    let min = file.min.unwrap_or(1);
    let max = file.max.unwrap_or(35_usize.max(min));
    let mut spec = ElementSpec::new(file.id.clone(), kind)
        .length(min, max)
        .preserve_precision(file.preserve_precision);

    match (&file.codes, &file.code_file) {
        (Some(_), Some(_)) => {
            return Err(Error::InvalidFormat(format!(
                "'{}': give either codes or code_file, not both",
                file.id
            )));
        }
        (Some(CodesFile::List(codes)), None) => {
            spec = spec.codes(Arc::new(InMemoryCodeList::with_codes(
                file.id.clone(),
                codes.iter().cloned(),
            )));
        }
        (Some(CodesFile::Described(codes)), None) => {
            let mut list = InMemoryCodeList::new(file.id.clone());
            for (code, description) in codes {
                list.add_described(code.clone(), description.clone());
            }
            spec = spec.codes(Arc::new(list));
        }
        (None, Some(path)) => {
            let path = base.join(path);
            let list = match code_files.get(&path) {
                Some(list) => Arc::clone(list),
                None => {
                    let list: Arc<dyn CodeList> = Arc::new(FileCodeList::open(&path)?);
                    debug!("Loaded code file {:?} for {}", path, file.id);
                    code_files.insert(path, Arc::clone(&list));
                    list
                }
            };
            spec = spec.codes(list);
        }
        (None, None) => {}
    }
    Ok(spec)
}
