//! # Descriptor Extraction
//!
//! Flattens a [`SchemaRoot`] into plain, serializable data for display: every service, every
//! method, and for each method the tree of fields its request message is made of.
//!
//! Message graphs may be cyclic (`message Node { repeated Node children = 1; }`). Field
//! expansion carries the set of messages on the current ancestor chain and stops expanding a
//! field whose type is already on it. The set is copied on every descent, so one branch never
//! suppresses the expansion of a sibling branch.
use crate::schema::{Namespace, Node, SchemaRoot};
use prost_reflect::{Cardinality, FieldDescriptor, Kind, MessageDescriptor};
use serde::Serialize;
use std::collections::HashSet;

/// Everything a UI needs to list a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorSet {
    /// First named top-level namespace, empty when the schema has no package.
    pub package_name: String,
    pub services: Vec<ServiceInfo>,
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub full_name: String,
    /// Method names in declaration order.
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    pub name: String,
    /// Fully qualified name of the owning service.
    pub service: String,
    pub input_type: String,
    pub output_type: String,
    pub request_stream: bool,
    pub response_stream: bool,
    pub request_fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Scalar,
    Message,
    Enum,
    Map,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    pub json_name: String,
    /// Scalar name (`string`, `int32`...), full name of a message/enum, or `map<K, V>`.
    #[serde(rename = "type")]
    pub type_name: String,
    pub kind: FieldKind,
    pub repeated: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oneof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Fields of the message type (the value type for maps). Absent for scalars, enums,
    /// empty messages and fields that would recurse into an ancestor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_fields: Option<Vec<FieldInfo>>,
}

/// Extracts services, methods and request field trees from `schema`.
pub fn extract(schema: &SchemaRoot) -> DescriptorSet {
    let root = schema.namespace();
    let mut services = vec![];
    let mut methods = vec![];

    walk(root, "", &mut services, &mut methods);

    DescriptorSet {
        package_name: package_name(root),
        services,
        methods,
    }
}

/// Expands the fields of `message`, recursing into message-typed fields.
pub fn extract_fields(message: &MessageDescriptor) -> Vec<FieldInfo> {
    expand(message, HashSet::new())
}

fn package_name(root: &Namespace) -> String {
    root.nodes()
        .iter()
        .find_map(|node| match node {
            Node::Namespace(ns) if !ns.name().is_empty() => Some(ns.name().to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn walk(
    namespace: &Namespace,
    path: &str,
    services: &mut Vec<ServiceInfo>,
    methods: &mut Vec<MethodInfo>,
) {
    for node in namespace.nodes() {
        match node {
            Node::Namespace(nested) => {
                walk(nested, &join(path, nested.name()), services, methods);
            }
            Node::Service(service) => {
                let full_name = join(path, service.name());
                let mut method_names = vec![];

                for method in service.methods() {
                    let input = method.input();
                    methods.push(MethodInfo {
                        name: method.name().to_string(),
                        service: full_name.clone(),
                        input_type: input.full_name().to_string(),
                        output_type: method.output().full_name().to_string(),
                        request_stream: method.is_client_streaming(),
                        response_stream: method.is_server_streaming(),
                        request_fields: extract_fields(&input),
                    });
                    method_names.push(method.name().to_string());
                }

                services.push(ServiceInfo {
                    name: service.name().to_string(),
                    full_name,
                    methods: method_names,
                });
            }
            Node::Message(_) | Node::Enum(_) => {}
        }
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn expand(message: &MessageDescriptor, mut ancestors: HashSet<String>) -> Vec<FieldInfo> {
    ancestors.insert(message.full_name().to_string());
    message
        .fields()
        .map(|field| field_info(&field, &ancestors))
        .collect()
}

fn field_info(field: &FieldDescriptor, ancestors: &HashSet<String>) -> FieldInfo {
    let kind = field.kind();

    let (field_kind, type_name, target) = match &kind {
        Kind::Message(entry) if field.is_map() => {
            let key = entry.map_entry_key_field().kind();
            let value = entry.map_entry_value_field().kind();
            (
                FieldKind::Map,
                format!("map<{}, {}>", type_label(&key), type_label(&value)),
                value,
            )
        }
        Kind::Message(message) => (FieldKind::Message, message.full_name().to_string(), kind.clone()),
        Kind::Enum(e) => (FieldKind::Enum, e.full_name().to_string(), kind.clone()),
        scalar => (FieldKind::Scalar, type_label(scalar), kind.clone()),
    };

    let enum_values = target
        .as_enum()
        .map(|e| e.values().map(|v| v.name().to_string()).collect());

    let nested_fields = target
        .as_message()
        .filter(|message| message.fields().len() > 0)
        .filter(|message| !ancestors.contains(message.full_name()))
        .map(|message| expand(message, ancestors.clone()));

    FieldInfo {
        name: field.name().to_string(),
        json_name: field.json_name().to_string(),
        type_name,
        kind: field_kind,
        repeated: field.is_list(),
        required: field.cardinality() == Cardinality::Required,
        oneof: field
            .containing_oneof()
            .filter(|oneof| !oneof.is_synthetic())
            .map(|oneof| oneof.name().to_string()),
        enum_values,
        nested_fields,
    }
}

fn type_label(kind: &Kind) -> String {
    match kind {
        Kind::Double => "double".to_string(),
        Kind::Float => "float".to_string(),
        Kind::Int32 => "int32".to_string(),
        Kind::Int64 => "int64".to_string(),
        Kind::Uint32 => "uint32".to_string(),
        Kind::Uint64 => "uint64".to_string(),
        Kind::Sint32 => "sint32".to_string(),
        Kind::Sint64 => "sint64".to_string(),
        Kind::Fixed32 => "fixed32".to_string(),
        Kind::Fixed64 => "fixed64".to_string(),
        Kind::Sfixed32 => "sfixed32".to_string(),
        Kind::Sfixed64 => "sfixed64".to_string(),
        Kind::Bool => "bool".to_string(),
        Kind::String => "string".to_string(),
        Kind::Bytes => "bytes".to_string(),
        Kind::Message(message) => message.full_name().to_string(),
        Kind::Enum(e) => e.full_name().to_string(),
    }
}
