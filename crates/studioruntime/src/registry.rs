use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use studiocore::{Node, PortType, Value};

/// Declared input port of a node type
#[derive(Debug, Clone)]
pub struct InputPort {
    pub id: String,
    pub port_type: PortType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

impl InputPort {
    pub fn required(id: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: id.into(),
            port_type,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    pub fn optional(id: impl Into<String>, port_type: PortType) -> Self {
        Self {
            required: false,
            ..Self::required(id, port_type)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Declared output port of a node type
#[derive(Debug, Clone)]
pub struct OutputPort {
    pub id: String,
    pub port_type: PortType,
    pub description: String,
}

impl OutputPort {
    pub fn new(id: impl Into<String>, port_type: PortType) -> Self {
        Self {
            id: id.into(),
            port_type,
            description: String::new(),
        }
    }
}

/// Schema of one configuration field
#[derive(Debug, Clone)]
pub struct ConfigField {
    pub id: String,
    pub field_type: PortType,
    pub default: Option<Value>,
    pub description: String,
}

impl ConfigField {
    pub fn new(id: impl Into<String>, field_type: PortType) -> Self {
        Self {
            id: id.into(),
            field_type,
            default: None,
            description: String::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Static declaration of a node type plus its executable unit
#[derive(Clone)]
pub struct NodeCatalogEntry {
    pub id: String,
    pub category: String,
    pub description: String,
    pub inputs: Vec<InputPort>,
    pub outputs: Vec<OutputPort>,
    pub config_schema: Vec<ConfigField>,
    pub executor: Arc<dyn Node>,
}

impl NodeCatalogEntry {
    pub fn new(id: impl Into<String>, category: impl Into<String>, executor: Arc<dyn Node>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            config_schema: Vec::new(),
            executor,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, port: InputPort) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: OutputPort) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_config_field(mut self, field: ConfigField) -> Self {
        self.config_schema.push(field);
        self
    }

    pub fn input(&self, id: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.id == id)
    }
}

impl fmt::Debug for NodeCatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCatalogEntry")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Registry of available node types
///
/// Constructed explicitly and shared behind an `Arc`; coordinators receive it
/// rather than reaching for global state.
#[derive(Default)]
pub struct NodeCatalog {
    entries: HashMap<String, NodeCatalogEntry>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type, replacing any entry with the same id
    pub fn register(&mut self, entry: NodeCatalogEntry) {
        tracing::debug!(node_type = %entry.id, category = %entry.category, "registering node type");
        if let Some(previous) = self.entries.insert(entry.id.clone(), entry) {
            tracing::warn!(node_type = %previous.id, "node type registered twice, replacing");
        }
    }

    pub fn register_all(&mut self, entries: impl IntoIterator<Item = NodeCatalogEntry>) {
        for entry in entries {
            self.register(entry);
        }
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeCatalogEntry> {
        self.entries.get(node_type)
    }

    pub fn has(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// Entries of one category, sorted by id
    pub fn by_category(&self, category: &str) -> Vec<&NodeCatalogEntry> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.category == category)
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.entries.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
